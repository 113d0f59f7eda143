use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::ValidationError;

/// A validated date-prefixed episode slug.
///
/// Format: `YYYYMMDD-<kebab-text>`, e.g. `20250618-automation-pipeline`.
/// The date prefix carries the default publication date and the year used
/// in the audio key template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slug {
    value: String,
    date: NaiveDate,
}

impl Slug {
    /// Parse and validate a slug string
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidSlug {
            slug: value.to_string(),
            reason: reason.to_string(),
        };

        let bytes = value.as_bytes();
        if bytes.len() < 10 {
            return Err(invalid("too short, expected YYYYMMDD-<kebab-text>"));
        }

        // Byte-level check first so multi-byte characters in the prefix
        // are rejected instead of panicking a string slice below
        if !bytes[..8].iter().all(|b| b.is_ascii_digit()) {
            return Err(invalid("date prefix is not numeric"));
        }

        let date_part = &value[..8];
        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
            .map_err(|_| invalid("date prefix is not a valid calendar date"))?;
        if !(1900..=2099).contains(&date.year()) {
            return Err(invalid("date prefix year out of range (1900-2099)"));
        }

        if bytes[8] != b'-' {
            return Err(invalid("missing '-' separator after date prefix"));
        }

        let title_part = &value[9..];
        if !is_kebab_case(title_part) {
            return Err(invalid("title part is not kebab-case"));
        }

        Ok(Self {
            value: value.to_string(),
            date,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Publication date derived from the prefix, at midnight UTC
    pub fn publication_date(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc()
    }

    /// Year component used in the audio key template
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Human-readable title derived from the kebab part,
    /// e.g. `automation-pipeline` becomes `Automation Pipeline`
    pub fn derived_title(&self) -> String {
        self.value[9..]
            .split('-')
            .filter(|word| !word.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

fn is_kebab_case(text: &str) -> bool {
    if text.is_empty() || text.starts_with('-') || text.ends_with('-') || text.contains("--") {
        return false;
    }
    text.bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
