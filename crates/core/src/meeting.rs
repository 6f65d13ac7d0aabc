use crate::error::IngestError;
use crate::metadata::DATE_FORMAT;
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const SECTIONS: [&str; 6] = [
    "Agenda",
    "Discussion",
    "Decisions",
    "Action Items",
    "Next Steps",
    "Next Meeting",
];

/// A new, empty meeting summary named so that the loader recognises its date and topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingDraft {
    pub topic: String,
    pub date: NaiveDate,
    pub participants: Option<String>,
}

impl MeetingDraft {
    pub fn new(topic: impl Into<String>, date: NaiveDate) -> Result<Self, IngestError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(IngestError::InvalidArgument(
                "meeting topic is empty".to_string(),
            ));
        }

        Ok(Self {
            topic,
            date,
            participants: None,
        })
    }

    pub fn with_participants(mut self, participants: impl Into<String>) -> Self {
        let participants = participants.into().trim().to_string();
        self.participants = (!participants.is_empty()).then_some(participants);
        self
    }

    pub fn parse_date(value: &str) -> Result<NaiveDate, IngestError> {
        Ok(NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)?)
    }

    pub fn file_name(&self) -> String {
        let topic = self
            .topic
            .replace(' ', "_")
            .replace(['/', '\\'], "-");
        format!("{}_{topic}.md", self.date.format(DATE_FORMAT))
    }

    pub fn render(&self) -> String {
        let mut content = format!("# {}\n\nDate: {}\n", self.topic, self.date.format(DATE_FORMAT));
        if let Some(participants) = &self.participants {
            content.push_str(&format!("Participants: {participants}\n"));
        }
        for section in SECTIONS {
            content.push_str(&format!("\n## {section}\n- \n"));
        }
        content
    }

    /// Writes the summary into `dir`, creating it if needed. Existing files are left alone.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, IngestError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|error| match error.kind() {
                std::io::ErrorKind::AlreadyExists => IngestError::InvalidArgument(format!(
                    "meeting summary already exists: {}",
                    path.display()
                )),
                _ => IngestError::Io(error),
            })?;
        file.write_all(self.render().as_bytes())?;

        Ok(path)
    }
}
