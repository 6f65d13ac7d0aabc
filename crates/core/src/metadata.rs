//! Metadata derived from a meeting file's name and body.
//!
//! Two patterns are recognised: file names shaped like
//! `2024-03-15_Project_Kickoff.md` and a `Participants: ...` line in the text.

use crate::models::{
    DocumentMetadata, DATE_KEY, DAY_KEY, MONTH_KEY, PARTICIPANTS_KEY, TOPIC_KEY, YEAR_KEY,
};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static DATED_TOPIC_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2})_(.*)\.([^.]*)$")
        .expect("dated topic filename pattern is valid")
});

static PARTICIPANTS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)participants(?::|\b)[ \t]*([^\r\n]*)")
        .expect("participants pattern is valid")
});

/// Extracts `date`, `year`, `month`, `day` and `topic` from a dated file name.
///
/// Names that don't follow `<YYYY-MM-DD>_<topic>.<ext>` produce an empty map.
/// A syntactically matching name with an impossible date (`2024-02-30_...`)
/// still yields its topic.
pub fn metadata_from_filename(filename: &str) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::new();

    let Some(captures) = DATED_TOPIC_FILENAME.captures(filename) else {
        return metadata;
    };

    let date_token = &captures[1];
    if let Ok(date) = NaiveDate::parse_from_str(date_token, DATE_FORMAT) {
        metadata.insert(DATE_KEY, date_token);
        metadata.insert(YEAR_KEY, i64::from(date.year()));
        metadata.insert(MONTH_KEY, i64::from(date.month()));
        metadata.insert(DAY_KEY, i64::from(date.day()));
    }

    let topic = normalize_topic(&captures[2]);
    if !topic.is_empty() {
        metadata.insert(TOPIC_KEY, topic);
    }

    metadata
}

/// Extracts `participants` from the first `participants:` line (case-insensitive).
pub fn metadata_from_content(content: &str) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::new();

    let participants = PARTICIPANTS_LINE
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty());

    if let Some(participants) = participants {
        metadata.insert(PARTICIPANTS_KEY, participants);
    }

    metadata
}

fn normalize_topic(raw: &str) -> String {
    raw.replace('_', " ").trim().to_string()
}
