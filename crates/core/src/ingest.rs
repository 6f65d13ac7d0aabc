use crate::chunking::{Chunker, ChunkingConfig};
use crate::error::IngestError;
use crate::loader::{load_document, LoadOutcome};
use crate::models::{IngestionOptions, MeetingChunk};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions picked up by the walker. Matching is case-sensitive.
pub const MEETING_EXTENSIONS: [&str; 2] = ["md", "txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub chunks: Vec<MeetingChunk>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Drives loading and chunking over every meeting file below a root directory.
#[derive(Debug, Clone)]
pub struct CorpusWalker {
    chunker: Chunker,
}

impl CorpusWalker {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    pub fn from_options(options: &IngestionOptions) -> Result<Self, IngestError> {
        Ok(Self::new(Chunker::new(ChunkingConfig::from(options))?))
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Lists `.md` and `.txt` files under `root`, sorted by path.
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        discover_meeting_files(root)
    }

    /// Loads and chunks every discovered file. Files that fail to load are
    /// reported in `skipped_files`; the walk itself never fails.
    pub fn walk(&self, root: &Path) -> IngestionReport {
        let mut report = IngestionReport::default();

        for path in self.discover(root) {
            match load_document(&path) {
                LoadOutcome::Loaded(document) => {
                    report.chunks.extend(self.chunker.chunk_document(&document));
                }
                LoadOutcome::Failed { failure, .. } => report.skipped_files.push(SkippedFile {
                    path,
                    reason: failure.to_string(),
                }),
            }
        }

        info!(
            root = %root.display(),
            chunk_count = report.chunks.len(),
            skipped = report.skipped_files.len(),
            "walked meeting corpus"
        );
        report
    }

    pub fn collect_chunks(&self, root: &Path) -> Vec<MeetingChunk> {
        self.walk(root).chunks
    }
}

pub fn discover_meeting_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(root = %root.display(), %error, "walk error");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let is_meeting_file = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MEETING_EXTENSIONS.contains(&ext));

        if is_meeting_file {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    debug!(root = %root.display(), file_count = files.len(), "discovered meeting files");
    files
}
