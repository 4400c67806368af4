use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// Secondary role played in the creation of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Artist,
    Editor,
    Translator,
}
impl Role {
    /// Lowercase term, used for element identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Artist => "artist",
            Role::Editor => "editor",
            Role::Translator => "translator",
        }
    }

    /// MARC relator code for the role.
    pub fn marc_code(&self) -> &'static str {
        match self {
            Role::Artist => "art",
            Role::Editor => "edt",
            Role::Translator => "trl",
        }
    }
}
impl FromStr for Role {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "artist" | "art" | "illustrator" => Self::Artist,
            "editor" | "edt" => Self::Editor,
            "translator" | "trl" => Self::Translator,
            _ => exn::bail!(ErrorKind::ParseError { field: "role", value: s.to_string() }),
        })
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::Artist => write!(f, "Artist"),
            Role::Editor => write!(f, "Editor"),
            Role::Translator => write!(f, "Translator"),
        }
    }
}

/// A person or organisation that played a secondary role in the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub role: Role,
    pub name: String,
    /// Copyright and terms-of-use for the contribution, formatted for display.
    pub terms: String,
    /// Year of the contribution; the work's year is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}
impl Contributor {
    pub fn new(role: Role, name: impl Into<String>, terms: impl Into<String>) -> Self {
        Self { role, name: name.into(), terms: terms.into(), year: None }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("artist", Role::Artist)]
    #[case(" Editor ", Role::Editor)]
    #[case("trl", Role::Translator)]
    fn test_role_from_str(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_role() {
        let err = "narrator".parse::<Role>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "role", .. }));
    }

    #[rstest]
    #[case(Role::Artist, "Artist", "art")]
    #[case(Role::Editor, "Editor", "edt")]
    #[case(Role::Translator, "Translator", "trl")]
    fn test_role_display_and_code(#[case] role: Role, #[case] display: &str, #[case] code: &str) {
        assert_eq!(role.to_string(), display);
        assert_eq!(role.marc_code(), code);
    }

    #[test]
    fn test_deserialize_contributor() {
        let contributor: Contributor =
            serde_json::from_str(r#"{"role": "artist", "name": "Rodd Halstead", "terms": "All rights reserved."}"#)
                .unwrap();
        assert_eq!(contributor, Contributor::new(Role::Artist, "Rodd Halstead", "All rights reserved."));
    }
}
