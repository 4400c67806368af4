use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use exn::ResultExt;

use super::sanitize;
use crate::error::{Error, ErrorKind, Result};

/// The three major partitions of a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatterPartition {
    Front,
    Body,
    Back,
}
impl MatterPartition {
    /// The `epub:type` term for the partition.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatterPartition::Front => "frontmatter",
            MatterPartition::Body => "bodymatter",
            MatterPartition::Back => "backmatter",
        }
    }
}
impl FromStr for MatterPartition {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match sanitize(s).as_str() {
            "front" | "frontmatter" => Self::Front,
            "body" | "bodymatter" => Self::Body,
            "back" | "backmatter" => Self::Back,
            _ => exn::bail!(ErrorKind::ParseError { field: "partition", value: s.to_string() }),
        })
    }
}

/// Declares a content vocabulary: the enum, its term, display name and parser.
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $term:literal, $display:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }
        impl $name {
            /// The `epub:type` term.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $term,)+
                }
            }
        }
        impl FromStr for $name {
            type Err = Error;
            fn from_str(s: &str) -> Result<Self> {
                let sanitized = sanitize(s);
                $(if sanitized == $term {
                    return Ok(Self::$variant);
                })+
                exn::bail!(ErrorKind::ParseError { field: $field, value: s.to_string() })
            }
        }
        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                match self {
                    $(Self::$variant => write!(f, $display),)+
                }
            }
        }
    };
}

vocabulary!(
    /// Material that appears before the main content.
    FrontMatter, "front matter" {
        Cover => "cover", "Cover";
        Titlepage => "titlepage", "Title page";
        Imprint => "imprint", "Imprint";
        Dedication => "dedication", "Dedication";
        Epigraph => "epigraph", "Epigraph";
        Acknowledgements => "acknowledgements", "Acknowledgements";
        Foreword => "foreword", "Foreword";
        Preface => "preface", "Preface";
        Introduction => "introduction", "Introduction";
        Toc => "toc", "Table of Contents";
    }
);

vocabulary!(
    /// Named body divisions; plain chapters carry no content term.
    BodyMatter, "body matter" {
        Prologue => "prologue", "Prologue";
        Epilogue => "epilogue", "Epilogue";
    }
);

vocabulary!(
    /// Material that follows the main content.
    BackMatter, "back matter" {
        Afterword => "afterword", "Afterword";
        Illustrations => "illustrations", "Illustrations";
        Endnotes => "endnotes", "Endnotes";
        Colophon => "colophon", "Colophon";
        Copyright => "copyright", "Copyright";
    }
);

/// One entry in the reading order.
///
/// The partition, content term and title are tied together by the variant:
/// a plain chapter always has a title, front and back matter always have a
/// content term from their own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matter {
    Front { content: FrontMatter, title: Option<String> },
    Chapter { title: String },
    Body { content: BodyMatter, title: Option<String> },
    Back { content: BackMatter, title: Option<String> },
}

impl Matter {
    /// Builds an entry from loosely-typed parts, enforcing the cross-field rules.
    pub fn new(partition: MatterPartition, content: Option<&str>, title: Option<String>) -> Result<Self> {
        let title = title.filter(|t| !t.trim().is_empty());
        let invalid = |reason: &str| ErrorKind::InvalidMatter(format!("{} {reason}", partition.as_str()));
        Ok(match (partition, content) {
            (MatterPartition::Body, None) => match title {
                Some(title) => Matter::Chapter { title },
                None => exn::bail!(invalid("chapter requires a title")),
            },
            (MatterPartition::Body, Some(c)) => {
                let content = c.parse::<BodyMatter>().or_raise(|| invalid("content is not body matter"))?;
                Matter::Body { content, title }
            },
            (MatterPartition::Front, Some(c)) => {
                let content = c.parse::<FrontMatter>().or_raise(|| invalid("content is not front matter"))?;
                Matter::Front { content, title }
            },
            (MatterPartition::Back, Some(c)) => {
                let content = c.parse::<BackMatter>().or_raise(|| invalid("content is not back matter"))?;
                Matter::Back { content, title }
            },
            (_, None) => exn::bail!(invalid("requires a content term")),
        })
    }

    pub fn chapter(title: impl Into<String>) -> Self {
        Matter::Chapter { title: title.into() }
    }

    pub fn dedication() -> Self {
        Matter::Front { content: FrontMatter::Dedication, title: None }
    }

    pub fn partition(&self) -> MatterPartition {
        match self {
            Matter::Front { .. } => MatterPartition::Front,
            Matter::Chapter { .. } | Matter::Body { .. } => MatterPartition::Body,
            Matter::Back { .. } => MatterPartition::Back,
        }
    }

    /// Display title, defaulting to the content term's name.
    pub fn title(&self) -> String {
        match self {
            Matter::Chapter { title } => title.clone(),
            Matter::Front { title: Some(title), .. }
            | Matter::Body { title: Some(title), .. }
            | Matter::Back { title: Some(title), .. } => title.clone(),
            Matter::Front { content, title: None } => content.to_string(),
            Matter::Body { content, title: None } => content.to_string(),
            Matter::Back { content, title: None } => content.to_string(),
        }
    }

    pub fn is_dedication(&self) -> bool {
        matches!(self, Matter::Front { content: FrontMatter::Dedication, .. })
    }
}
