use crate::error::LoadFailure;
use crate::metadata::{metadata_from_content, metadata_from_filename};
use crate::models::{DocumentMetadata, LogicalDocument, FILENAME_KEY, SOURCE_KEY};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Result of loading one file. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(LogicalDocument),
    /// `metadata` still holds whatever could be derived from the path.
    Failed {
        metadata: DocumentMetadata,
        failure: LoadFailure,
    },
}

impl LoadOutcome {
    pub fn document(&self) -> Option<&LogicalDocument> {
        match self {
            Self::Loaded(document) => Some(document),
            Self::Failed { .. } => None,
        }
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        match self {
            Self::Loaded(document) => &document.metadata,
            Self::Failed { metadata, .. } => metadata,
        }
    }
}

/// Reads a meeting file as UTF-8 text and attaches filename and content metadata.
pub fn load_document(path: &Path) -> LoadOutcome {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut metadata = metadata_from_filename(&filename);
    metadata.insert(SOURCE_KEY, path.to_string_lossy().to_string());
    metadata.insert(FILENAME_KEY, filename);

    if !path.exists() {
        return LoadOutcome::Failed {
            metadata,
            failure: LoadFailure::MissingFile(path.to_path_buf()),
        };
    }

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            warn!(path = %path.display(), %error, "error loading document");
            return LoadOutcome::Failed {
                metadata,
                failure: LoadFailure::ReadFailure {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                },
            };
        }
    };

    metadata.extend(metadata_from_content(&text));
    debug!(path = %path.display(), chars = text.len(), fields = metadata.len(), "loaded document");

    LoadOutcome::Loaded(LogicalDocument { text, metadata })
}

#[cfg(test)]
mod tests {
    use super::{load_document, LoadOutcome};
    use crate::error::LoadFailure;
    use crate::models::{
        DATE_KEY, FILENAME_KEY, PARTICIPANTS_KEY, SOURCE_KEY, TOPIC_KEY, YEAR_KEY,
    };
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_text_with_merged_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("2024-03-15_Project_Kickoff.md");
        fs::write(&path, "# Kickoff\nParticipants: Alice, Bob\n\nWe chose Rust.")?;

        let outcome = load_document(&path);
        let document = outcome.document().ok_or("document should load")?;

        assert!(document.text.ends_with("We chose Rust."));
        assert_eq!(document.metadata.text(DATE_KEY), Some("2024-03-15"));
        assert_eq!(document.metadata.integer(YEAR_KEY), Some(2024));
        assert_eq!(document.metadata.text(TOPIC_KEY), Some("Project Kickoff"));
        assert_eq!(document.metadata.text(PARTICIPANTS_KEY), Some("Alice, Bob"));
        assert_eq!(
            document.metadata.text(FILENAME_KEY),
            Some("2024-03-15_Project_Kickoff.md")
        );
        assert_eq!(document.metadata.text(SOURCE_KEY), path.to_str());
        Ok(())
    }

    #[test]
    fn undated_file_only_gets_source_and_filename() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "just some notes")?;

        let outcome = load_document(&path);
        assert!(outcome.document().is_some());
        assert_eq!(outcome.metadata().len(), 2);
        Ok(())
    }

    #[test]
    fn missing_file_fails_softly_with_filename_metadata() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("2024-01-09_Standup.md");

        match load_document(&path) {
            LoadOutcome::Failed { metadata, failure } => {
                assert_eq!(failure, LoadFailure::MissingFile(path.clone()));
                assert_eq!(metadata.text(TOPIC_KEY), Some("Standup"));
                assert_eq!(metadata.text(FILENAME_KEY), Some("2024-01-09_Standup.md"));
            }
            LoadOutcome::Loaded(_) => panic!("missing file must not load"),
        }
        Ok(())
    }

    #[test]
    fn invalid_utf8_is_a_read_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.md");
        fs::write(&path, [0xff, 0xfe, 0x00, 0xc3])?;

        let outcome = load_document(&path);
        assert!(matches!(
            outcome,
            LoadOutcome::Failed {
                failure: LoadFailure::ReadFailure { .. },
                ..
            }
        ));
        assert_eq!(outcome.metadata().text(FILENAME_KEY), Some("broken.md"));
        Ok(())
    }

    #[test]
    fn directory_path_is_a_read_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let outcome = load_document(dir.path());
        assert!(outcome.document().is_none());
        Ok(())
    }
}
