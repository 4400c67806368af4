use exn::{OptionExt, ResultExt};
use serde::Deserialize;
use time::{Date, Month, OffsetDateTime};

use super::Contributor;
use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_RIGHTS: &str = "All rights reserved.";

/// Dublin Core metadata for one publication.
///
/// The single source of truth for every generated page and manifest. Use
/// [`MetadataPatch`] to build or update it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkMetadata {
    /// UUID, DOI or ISBN of the work.
    pub identifier: String,
    pub title: String,
    /// ISO 639-1 language code.
    pub language: String,
    /// Primary creators, in display order (never empty).
    pub creator: Vec<String>,
    /// Single-sentence statement of copyright.
    pub rights: String,
    pub subject: Vec<String>,
    pub publisher: Option<String>,
    pub publisher_uri: Option<String>,
    pub contributor: Vec<Contributor>,
    /// Single-sentence summary.
    pub description: Option<String>,
    /// Jacket-cover description.
    pub long_description: Option<String>,
    /// Full copyright paragraphs for the colophon.
    pub long_rights: Vec<String>,
    /// Publication date.
    pub date: Date,
    pub work_uri: Option<String>,
    /// Aggregate word count of all chapters, filled in by a build.
    pub word_count: Option<u64>,
}

impl WorkMetadata {
    /// Creates metadata with default identifier, language, rights and date.
    pub fn new<S: Into<String>>(title: impl Into<String>, creator: impl IntoIterator<Item = S>) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            exn::bail!(ErrorKind::MissingField("title"));
        }
        let creator: Vec<String> = creator.into_iter().map(Into::into).collect();
        if creator.is_empty() {
            exn::bail!(ErrorKind::MissingField("creator"));
        }
        Ok(Self {
            identifier: uuid::Uuid::new_v4().urn().to_string(),
            title,
            language: DEFAULT_LANGUAGE.to_string(),
            creator,
            rights: DEFAULT_RIGHTS.to_string(),
            subject: Vec::new(),
            publisher: None,
            publisher_uri: None,
            contributor: Vec::new(),
            description: None,
            long_description: None,
            long_rights: Vec::new(),
            date: OffsetDateTime::now_utc().date(),
            work_uri: None,
            word_count: None,
        })
    }

    /// Merges a patch into this record.
    ///
    /// Fields absent from the patch are left alone; repeatable fields present
    /// in the patch replace the existing list. The record is unchanged if
    /// the patch is rejected.
    pub fn apply(&mut self, patch: MetadataPatch) -> Result<()> {
        let MetadataPatch {
            identifier,
            title,
            language,
            creator,
            rights,
            subject,
            publisher,
            publisher_uri,
            contributor,
            description,
            long_description,
            long_rights,
            date,
            work_uri,
            word_count,
        } = patch;
        if title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            exn::bail!(ErrorKind::MissingField("title"));
        }
        if creator.as_ref().is_some_and(Vec::is_empty) {
            exn::bail!(ErrorKind::MissingField("creator"));
        }
        let date = date.map(parse_date).transpose()?;

        replace(&mut self.identifier, identifier);
        replace(&mut self.title, title);
        replace(&mut self.language, language);
        replace(&mut self.creator, creator);
        replace(&mut self.rights, rights);
        replace(&mut self.subject, subject);
        replace(&mut self.contributor, contributor);
        replace(&mut self.long_rights, long_rights);
        replace(&mut self.date, date);
        self.publisher = publisher.or(self.publisher.take());
        self.publisher_uri = publisher_uri.or(self.publisher_uri.take());
        self.description = description.or(self.description.take());
        self.long_description = long_description.or(self.long_description.take());
        self.work_uri = work_uri.or(self.work_uri.take());
        self.word_count = word_count.or(self.word_count);
        Ok(())
    }

    /// Creators joined for display: `A`, `A & B`, `A, B & C`.
    pub fn creator_display(&self) -> String {
        match self.creator.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [init @ .., last] => format!("{} & {}", init.join(", "), last),
        }
    }

    /// Year of publication.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Publication date as `YYYY-MM-DD`.
    pub fn iso_date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.date.year(), u8::from(self.date.month()), self.date.day())
    }

    /// Copyright paragraphs for the colophon, falling back to `rights`.
    pub fn rights_paragraphs(&self) -> Vec<&str> {
        match self.long_rights.is_empty() {
            true => vec![self.rights.as_str()],
            false => self.long_rights.iter().map(String::as_str).collect(),
        }
    }
}

fn replace<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn parse_date(value: String) -> Result<Date> {
    let invalid = || ErrorKind::ParseError { field: "date", value: value.clone() };
    // Accept full timestamps, only the calendar date is kept.
    let day = value.split('T').next().unwrap_or_default();
    let mut parts = day.splitn(3, '-');
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        exn::bail!(invalid());
    };
    let year = year.parse::<i32>().or_raise(invalid)?;
    let month = month.parse::<u8>().or_raise(invalid)?;
    let day = day.parse::<u8>().or_raise(invalid)?;
    let month = Month::try_from(month).or_raise(invalid)?;
    Date::from_calendar_date(year, month, day).or_raise(invalid)
}

/// Caller-supplied metadata where every field is optional.
///
/// Accepts both snake_case and the hyphenated field names used by Standard
/// Ebooks style metadata files (`long-description`, `publisher-uri`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetadataPatch {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub creator: Option<Vec<String>>,
    pub rights: Option<String>,
    pub subject: Option<Vec<String>>,
    pub publisher: Option<String>,
    #[serde(alias = "publisher-uri")]
    pub publisher_uri: Option<String>,
    pub contributor: Option<Vec<Contributor>>,
    pub description: Option<String>,
    #[serde(alias = "long-description")]
    pub long_description: Option<String>,
    #[serde(alias = "long-rights")]
    pub long_rights: Option<Vec<String>>,
    /// `YYYY-MM-DD`, optionally followed by a time component.
    #[serde(alias = "isodate")]
    pub date: Option<String>,
    #[serde(alias = "work-uri")]
    pub work_uri: Option<String>,
    #[serde(alias = "word-count")]
    pub word_count: Option<u64>,
}

impl TryFrom<MetadataPatch> for WorkMetadata {
    type Error = Error;
    fn try_from(mut patch: MetadataPatch) -> Result<Self> {
        let title = patch.title.take().ok_or_raise(|| ErrorKind::MissingField("title"))?;
        let creator = patch.creator.take().ok_or_raise(|| ErrorKind::MissingField("creator"))?;
        let mut metadata = WorkMetadata::new(title, creator)?;
        metadata.apply(patch)?;
        Ok(metadata)
    }
}
