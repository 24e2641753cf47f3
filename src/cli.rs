//! Command-line interface for the onboarding core.
//!
//! Wires the process-scoped dependency graph (store, embedder, indexes,
//! router, handlers, cache, orchestrator) once and exposes it behind
//! `ingest`, `ask`, `status`, and `invalidate` subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::Result;
use crate::agent::{Agent, OpenAiGenerator, ProgressAgent, SpecialistAgent, TextGenerator};
use crate::cache::TwoTierCache;
use crate::classify::create_classifier;
use crate::config::Settings;
use crate::core::{ConversationMemory, Department, UserProfile};
use crate::embedding::create_embedder;
use crate::ingest::DocumentIngestion;
use crate::orchestrator::Orchestrator;
use crate::route::Router;
use crate::search::{Bm25Index, HybridSearchEngine};
use crate::storage::SqliteStore;
use crate::vectorstore::VectorStore;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputFormat {
    /// Parses the `--format` flag, defaulting to text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Onboarding copilot retrieval-and-routing core.
#[derive(Debug, Parser)]
#[command(name = "onboard-rs", version, about)]
pub struct Cli {
    /// Output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Sqlite database path override.
    #[arg(long, global = true, env = "ONBOARD_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest the policy corpus into the vector store and BM25 index.
    Ingest {
        /// Policies directory (defaults to the configured path).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Ask a question through the full pipeline.
    Ask {
        /// The question text.
        question: String,
        /// Acting user id.
        #[arg(long, default_value_t = 1)]
        user_id: i64,
        /// Acting user name.
        #[arg(long, default_value = "User")]
        name: String,
        /// Acting user role.
        #[arg(long, default_value = "Employee")]
        role: String,
        /// Acting user department.
        #[arg(long, default_value = "General")]
        department: String,
    },
    /// Show collection and cache statistics.
    Status,
    /// Invalidate cached answers, optionally for one department.
    Invalidate {
        /// Department to invalidate (all when omitted).
        #[arg(long)]
        department: Option<String>,
    },
}

fn settings_for(cli: &Cli) -> Result<Settings> {
    let mut builder = Settings::builder().from_env();
    if let Some(ref db_path) = cli.db_path {
        builder = builder.db_path(db_path.clone());
    }
    builder.build()
}

fn open_store(settings: &Settings) -> Result<Arc<SqliteStore>> {
    let store = Arc::new(SqliteStore::open(&settings.db_path)?);
    store.init()?;
    Ok(store)
}

fn build_retrieval(
    settings: &Settings,
    store: &Arc<SqliteStore>,
) -> Result<(Arc<VectorStore>, Arc<Bm25Index>, Arc<HybridSearchEngine>)> {
    let embedder = create_embedder(settings.embedding_cache_capacity);
    let vectorstore = Arc::new(VectorStore::new(Arc::clone(store), embedder));
    let bm25 = Arc::new(Bm25Index::default());
    // The BM25 postings are in-memory; rebuild from the persisted
    // collection at startup.
    bm25.rebuild(&vectorstore.all_chunks()?);
    let engine = Arc::new(HybridSearchEngine::new(
        Arc::clone(&vectorstore),
        Arc::clone(&bm25),
        settings,
    ));
    Ok((vectorstore, bm25, engine))
}

/// Executes the parsed command, returning the rendered output.
///
/// # Errors
///
/// Returns an error when the underlying operation fails; `ask` itself
/// never fails past construction (pipeline errors become the apology
/// response).
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let settings = settings_for(cli)?;

    match &cli.command {
        Commands::Ingest { dir } => {
            let store = open_store(&settings)?;
            let (vectorstore, bm25, _) = build_retrieval(&settings, &store)?;
            let ingestion = DocumentIngestion::new(
                vectorstore,
                bm25,
                settings.chunk_size,
                settings.chunk_overlap,
            )?;
            let dir = dir.clone().unwrap_or_else(|| settings.policies_dir.clone());
            let results = ingestion.ingest_directory(&dir)?;

            match format {
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&results)
                    .map_err(crate::error::StorageError::from)?),
                OutputFormat::Text => {
                    let total: usize = results.values().sum();
                    let mut out = String::new();
                    for (filename, count) in &results {
                        out.push_str(&format!("{filename}: {count} chunks\n"));
                    }
                    out.push_str(&format!("total: {total} chunks\n"));
                    Ok(out)
                }
            }
        }

        Commands::Ask {
            question,
            user_id,
            name,
            role,
            department,
        } => {
            let store = open_store(&settings)?;
            let (_, _, engine) = build_retrieval(&settings, &store)?;
            let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(&settings)?);
            let memory = Arc::new(ConversationMemory::new(settings.conversation_history_max));
            let classifier = create_classifier(&settings.model_path);
            let router = Router::new(classifier, settings.classifier_confidence_threshold);

            let mut handlers: Vec<Arc<dyn Agent>> = Department::ALL
                .iter()
                .filter(|&&d| d != Department::General)
                .map(|&department| {
                    Arc::new(SpecialistAgent::new(
                        department,
                        Arc::clone(&engine),
                        Arc::clone(&generator),
                        Arc::clone(&memory),
                        settings.clone(),
                    )) as Arc<dyn Agent>
                })
                .collect();
            handlers.push(Arc::new(ProgressAgent::new(
                Arc::clone(&generator),
                Arc::clone(&memory),
                settings.clone(),
            )));

            let cache = Arc::new(TwoTierCache::new(
                Arc::clone(&store),
                Some(create_embedder(settings.embedding_cache_capacity)),
                settings.cache_similarity_threshold,
                settings.answer_cache_ttl_hours,
            ));

            let orchestrator = Orchestrator::new(
                router,
                handlers,
                cache,
                memory,
                Arc::clone(&store),
                settings,
            );

            let profile = UserProfile {
                name: name.clone(),
                role: role.clone(),
                department: department.clone(),
                ..UserProfile::default()
            };
            let envelope = orchestrator
                .process(*user_id, question, profile, Vec::new(), Vec::new())
                .await;

            match format {
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&envelope)
                    .map_err(crate::error::StorageError::from)?),
                OutputFormat::Text => {
                    let mut out = String::new();
                    out.push_str(&envelope.response);
                    out.push('\n');
                    if !envelope.sources.is_empty() {
                        out.push_str("\nSources:\n");
                        for source in &envelope.sources {
                            out.push_str(&format!(
                                "  - {} | {} | {}\n",
                                source.document, source.section, source.department
                            ));
                        }
                    }
                    out.push_str(&format!(
                        "\n[agent: {} | department: {} | confidence: {} | {:.0} ms]\n",
                        envelope.agent,
                        envelope.routing.final_department,
                        envelope.confidence_level.as_str(),
                        envelope.total_time_ms
                    ));
                    Ok(out)
                }
            }
        }

        Commands::Status => {
            let store = open_store(&settings)?;
            let stats = store.stats()?;
            match format {
                OutputFormat::Json => Ok(format!(
                    "{{\"chunks\": {}, \"embeddings\": {}, \"cache_entries\": {}, \
                     \"messages\": {}}}\n",
                    stats.chunk_count,
                    stats.embedding_count,
                    stats.cache_entries,
                    stats.message_count
                )),
                OutputFormat::Text => Ok(format!(
                    "chunks: {}\nembeddings: {}\ncache entries: {}\nmessages: {}\n",
                    stats.chunk_count,
                    stats.embedding_count,
                    stats.cache_entries,
                    stats.message_count
                )),
            }
        }

        Commands::Invalidate { department } => {
            let store = open_store(&settings)?;
            let cache = TwoTierCache::new(
                Arc::clone(&store),
                None,
                settings.cache_similarity_threshold,
                settings.answer_cache_ttl_hours,
            );
            let affected = cache
                .invalidate(department.as_deref())
                .map_err(crate::Error::from)?;
            let removed = cache.cleanup_expired().map_err(crate::Error::from)?;
            Ok(format!(
                "invalidated {affected} entries, removed {removed}\n"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_parse_ask_command() {
        let cli = Cli::parse_from(["onboard-rs", "ask", "How much PTO do I get?"]);
        let Commands::Ask { question, user_id, .. } = cli.command else {
            unreachable!("expected ask command");
        };
        assert_eq!(question, "How much PTO do I get?");
        assert_eq!(user_id, 1);
    }

    #[test]
    fn test_parse_invalidate_with_department() {
        let cli = Cli::parse_from(["onboard-rs", "invalidate", "--department", "HR"]);
        let Commands::Invalidate { department } = cli.command else {
            unreachable!("expected invalidate command");
        };
        assert_eq!(department.as_deref(), Some("HR"));
    }

    #[tokio::test]
    async fn test_status_on_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "onboard-rs",
            "--db-path",
            dir.path().join("test.db").to_str().unwrap(),
            "status",
        ]);
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("chunks: 0"));
    }

    #[tokio::test]
    async fn test_ingest_then_status() {
        let dir = tempfile::tempdir().unwrap();
        let policies = dir.path().join("policies");
        std::fs::create_dir_all(&policies).unwrap();
        std::fs::write(
            policies.join("hr_policies.md"),
            "# PTO Policy\n\nTwenty days of vacation.\n",
        )
        .unwrap();

        let db = dir.path().join("test.db");
        let cli = Cli::parse_from([
            "onboard-rs",
            "--db-path",
            db.to_str().unwrap(),
            "ingest",
            "--dir",
            policies.to_str().unwrap(),
        ]);
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("hr_policies.md: 1 chunks"));

        let cli = Cli::parse_from(["onboard-rs", "--db-path", db.to_str().unwrap(), "status"]);
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("chunks: 1"));
    }
}
