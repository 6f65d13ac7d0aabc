use chrono::{Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use meeting_rag_core::{
    format_sources, AnswerModel, CorpusWalker, Embedder, IngestionOptions, MeetingAssistant,
    MeetingDraft, OllamaChat, OllamaEmbedder, OpenAiChat, OpenAiEmbedder, QdrantStore,
    SearchQuery, VectorIndex, DEFAULT_COLLECTION, DEFAULT_OLLAMA_COMPLETION_MODEL,
    DEFAULT_OLLAMA_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_COMPLETION_MODEL,
    DEFAULT_OPENAI_EMBEDDING_MODEL, DEFAULT_QDRANT_URL,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynEmbedder = Box<dyn Embedder + Send + Sync>;
type DynAnswerModel = Box<dyn AnswerModel + Send + Sync>;
type Assistant = MeetingAssistant<QdrantStore, DynEmbedder, DynAnswerModel>;

#[derive(Parser)]
#[command(name = "meeting-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder that contains meeting summaries (.md / .txt), searched recursively
    #[arg(long, env = "DOCUMENT_STORE_DIRECTORY", default_value = "./meetings")]
    meetings_dir: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 512)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 50)]
    chunk_overlap: usize,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = DEFAULT_QDRANT_URL)]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Which model provider serves embeddings and answers
    #[arg(long, env = "RAG_PROVIDER", value_enum, default_value_t = Provider::Openai)]
    provider: Provider,

    /// OpenAI API key, required for the openai provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Embedding model; defaults depend on the provider
    #[arg(long, env = "EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Completion model; defaults depend on the provider
    #[arg(long, env = "COMPLETION_MODEL")]
    completion_model: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Provider {
    Openai,
    Ollama,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk every meeting summary and index the chunks into Qdrant.
    Ingest {
        /// Replace the collection's contents once all chunks are embedded.
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
    /// Print the chunks most similar to a query.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of chunks to return.
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
    /// Answer a question from the indexed meeting summaries.
    Ask {
        /// Question to answer
        #[arg(long)]
        question: String,
        /// Number of chunks used as context.
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
    /// Create a new meeting summary file from the template.
    New {
        /// Meeting topic
        topic: String,
        /// Meeting date (YYYY-MM-DD, default: today)
        #[arg(long, short)]
        date: Option<String>,
        /// Comma-separated list of participants
        #[arg(long, short)]
        participants: Option<String>,
    },
    /// Delete the indexed collection.
    Reset,
}

impl Cli {
    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_max_chars: self.chunk_size,
            chunk_overlap_chars: self.chunk_overlap,
            corpus_root: self.meetings_dir.clone(),
        }
    }

    fn store(&self) -> anyhow::Result<QdrantStore> {
        Ok(QdrantStore::new(&self.qdrant_url, self.collection.clone())?)
    }

    fn embedder(&self) -> anyhow::Result<DynEmbedder> {
        Ok(match self.provider {
            Provider::Ollama => Box::new(OllamaEmbedder::new(
                &self.ollama_url,
                self.embedding_model
                    .as_deref()
                    .unwrap_or(DEFAULT_OLLAMA_EMBEDDING_MODEL),
            )?),
            Provider::Openai => Box::new(OpenAiEmbedder::new(
                self.openai_api_key.clone().unwrap_or_default(),
                self.embedding_model
                    .as_deref()
                    .unwrap_or(DEFAULT_OPENAI_EMBEDDING_MODEL),
            )?),
        })
    }

    fn answer_model(&self) -> anyhow::Result<DynAnswerModel> {
        Ok(match self.provider {
            Provider::Ollama => Box::new(OllamaChat::new(
                &self.ollama_url,
                self.completion_model
                    .as_deref()
                    .unwrap_or(DEFAULT_OLLAMA_COMPLETION_MODEL),
            )?),
            Provider::Openai => Box::new(OpenAiChat::new(
                self.openai_api_key.clone().unwrap_or_default(),
                self.completion_model
                    .as_deref()
                    .unwrap_or(DEFAULT_OPENAI_COMPLETION_MODEL),
            )?),
        })
    }

    fn assistant(&self, top_k: usize) -> anyhow::Result<Assistant> {
        Ok(MeetingAssistant::new(self.store()?, self.embedder()?, self.answer_model()?)
            .with_top_k(top_k))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        provider = ?cli.provider,
        "meeting-rag boot"
    );

    match &cli.command {
        Command::Ingest { reset } => {
            let options = cli.ingestion_options();
            let walker = CorpusWalker::from_options(&options)?;
            let report = walker.walk(&options.corpus_root);

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    options.corpus_root.display()
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped meeting file");
                }
            }

            let assistant = cli.assistant(SearchQuery::DEFAULT_TOP_K)?;

            println!("Processed {} document chunks", report.chunks.len());
            let indexed = if *reset {
                assistant.reindex(&report.chunks).await?
            } else {
                assistant.index(&report.chunks).await?
            };
            println!(
                "{} chunks indexed into {} at {}",
                indexed,
                assistant.store().collection(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, top_k } => {
            let top_k = (*top_k).max(1);
            let assistant = cli.assistant(top_k)?;
            let hits = assistant
                .retrieve(&SearchQuery {
                    text: query.clone(),
                    top_k,
                })
                .await?;

            println!("query: {query}");
            for hit in &hits {
                println!("score={:.4} chunk={}", hit.score, hit.chunk_id);
                println!("  chunk_text:\n{}", hit.text);
            }
            println!("{}", format_sources(&hits));
        }
        Command::Ask { question, top_k } => {
            let assistant = cli.assistant(*top_k)?;
            let answer = assistant.answer(question).await?;

            println!("Query: {}", answer.question);
            println!("\nResponse:\n{}", answer.text);
            println!("\n{}", format_sources(&answer.sources));
        }
        Command::New {
            topic,
            date,
            participants,
        } => {
            let date = match date {
                Some(value) => MeetingDraft::parse_date(value)?,
                None => Local::now().date_naive(),
            };

            let mut draft = MeetingDraft::new(topic.as_str(), date)?;
            if let Some(participants) = participants {
                draft = draft.with_participants(participants.as_str());
            }

            let path = draft.write_to(&cli.meetings_dir)?;
            println!("Created meeting summary file: {}", path.display());
            println!("To index this file, run: meeting-rag ingest");
        }
        Command::Reset => {
            let store = cli.store()?;
            store.reset().await?;
            println!("Deleted collection {}", store.collection());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_documented_configuration() {
        let cli = Cli::try_parse_from(["meeting-rag", "reset"]).expect("parse");
        let options = cli.ingestion_options();

        assert_eq!(options.chunk_max_chars, 512);
        assert_eq!(options.chunk_overlap_chars, 50);
        assert_eq!(options.corpus_root, PathBuf::from("./meetings"));
        assert_eq!(cli.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn openai_provider_requires_an_api_key() {
        let cli = Cli::try_parse_from([
            "meeting-rag",
            "--provider",
            "openai",
            "--openai-api-key",
            "",
            "ask",
            "--question",
            "What was decided?",
        ])
        .expect("parse");
        assert!(cli.embedder().is_err());
    }

    #[test]
    fn ollama_provider_builds_without_a_key() {
        let cli = Cli::try_parse_from([
            "meeting-rag",
            "--provider",
            "ollama",
            "search",
            "--query",
            "budget",
        ])
        .expect("parse");
        assert!(cli.assistant(2).is_ok());
    }
}
