//! Core configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap carried between consecutive chunks of one section.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
/// Default number of documents returned by retrieval.
pub const DEFAULT_TOP_K: usize = 5;
/// Default weight of the semantic leg in hybrid fusion.
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;
/// Default weight of the BM25 leg in hybrid fusion.
pub const DEFAULT_BM25_WEIGHT: f32 = 0.3;
/// Default TTL for the hybrid query cache.
const DEFAULT_HYBRID_CACHE_TTL_SECS: u64 = 300;
/// Default capacity of the hybrid query cache.
const DEFAULT_HYBRID_CACHE_MAXSIZE: usize = 1000;
/// Default TTL for answer cache entries.
const DEFAULT_ANSWER_CACHE_TTL_HOURS: i64 = 24;
/// Default cosine threshold for semantic cache hits.
const DEFAULT_CACHE_SIMILARITY_THRESHOLD: f32 = 0.92;
/// Default classifier confidence below which keyword overrides win.
const DEFAULT_CLASSIFIER_CONFIDENCE_THRESHOLD: f32 = 0.6;
/// Default score at or above which a response is high confidence.
const DEFAULT_CONFIDENCE_HIGH: f32 = 0.7;
/// Default score at or above which a response is medium confidence.
const DEFAULT_CONFIDENCE_MEDIUM: f32 = 0.4;
/// Default score below which escalation is suggested.
const DEFAULT_ESCALATION_THRESHOLD: f32 = 0.5;
/// Default capacity of the embedding LRU cache.
const DEFAULT_EMBEDDING_CACHE_CAPACITY: usize = 10_000;
/// Default sampling temperature for the text generator.
const DEFAULT_LLM_TEMPERATURE: f32 = 0.1;
/// Default model for the text generator backend.
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
/// Default number of retained conversation messages per user.
const DEFAULT_HISTORY_MAX: usize = 10;
/// Default text generator deadline in seconds.
const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 30;
/// Default retrieval deadline in seconds.
const DEFAULT_RETRIEVAL_TIMEOUT_SECS: u64 = 2;
/// Default embedder deadline per batch in seconds.
const DEFAULT_EMBEDDER_TIMEOUT_SECS: u64 = 1;
/// Default sqlite database path.
const DEFAULT_DB_PATH: &str = "./data/onboarding.db";
/// Default policies directory.
const DEFAULT_POLICIES_DIR: &str = "./data/policies";
/// Default classifier artifact path.
const DEFAULT_MODEL_PATH: &str = "./data/models/question_router.json";

/// Configuration for the retrieval-and-routing core.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks of the same section.
    pub chunk_overlap: usize,
    /// Number of documents returned by retrieval.
    pub top_k_retrieval: usize,
    /// Weight of the semantic leg in hybrid fusion. Must sum to 1 with
    /// `bm25_weight`.
    pub semantic_weight: f32,
    /// Weight of the BM25 leg in hybrid fusion.
    pub bm25_weight: f32,
    /// TTL of the hybrid query cache.
    pub hybrid_cache_ttl: Duration,
    /// Capacity of the hybrid query cache.
    pub hybrid_cache_maxsize: usize,
    /// TTL of answer cache entries, in hours.
    pub answer_cache_ttl_hours: i64,
    /// Cosine threshold for semantic cache hits.
    pub cache_similarity_threshold: f32,
    /// Classifier confidence below which keyword overrides win.
    pub classifier_confidence_threshold: f32,
    /// Score at or above which a response is high confidence.
    pub confidence_high_threshold: f32,
    /// Score at or above which a response is medium confidence.
    pub confidence_medium_threshold: f32,
    /// Score below which an escalation directive is attached.
    pub escalation_threshold: f32,
    /// Capacity of the embedding LRU cache.
    pub embedding_cache_capacity: usize,
    /// Sampling temperature for the text generator.
    pub llm_temperature: f32,
    /// Model name for the text generator backend.
    pub llm_model: String,
    /// API key for the text generator backend.
    pub api_key: String,
    /// Optional base URL override for the generator backend.
    pub base_url: Option<String>,
    /// Messages retained per user in conversation memory.
    pub conversation_history_max: usize,
    /// Deadline for a single text generator call.
    pub generator_timeout: Duration,
    /// Deadline for a retrieval pass.
    pub retrieval_timeout: Duration,
    /// Deadline for an embedding batch.
    pub embedder_timeout: Duration,
    /// Path to the sqlite database file.
    pub db_path: PathBuf,
    /// Directory containing the policy corpus.
    pub policies_dir: PathBuf,
    /// Path to the classifier artifact.
    pub model_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k_retrieval: DEFAULT_TOP_K,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            bm25_weight: DEFAULT_BM25_WEIGHT,
            hybrid_cache_ttl: Duration::from_secs(DEFAULT_HYBRID_CACHE_TTL_SECS),
            hybrid_cache_maxsize: DEFAULT_HYBRID_CACHE_MAXSIZE,
            answer_cache_ttl_hours: DEFAULT_ANSWER_CACHE_TTL_HOURS,
            cache_similarity_threshold: DEFAULT_CACHE_SIMILARITY_THRESHOLD,
            classifier_confidence_threshold: DEFAULT_CLASSIFIER_CONFIDENCE_THRESHOLD,
            confidence_high_threshold: DEFAULT_CONFIDENCE_HIGH,
            confidence_medium_threshold: DEFAULT_CONFIDENCE_MEDIUM,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            embedding_cache_capacity: DEFAULT_EMBEDDING_CACHE_CAPACITY,
            llm_temperature: DEFAULT_LLM_TEMPERATURE,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            api_key: String::new(),
            base_url: None,
            conversation_history_max: DEFAULT_HISTORY_MAX,
            generator_timeout: Duration::from_secs(DEFAULT_GENERATOR_TIMEOUT_SECS),
            retrieval_timeout: Duration::from_secs(DEFAULT_RETRIEVAL_TIMEOUT_SECS),
            embedder_timeout: Duration::from_secs(DEFAULT_EMBEDDER_TIMEOUT_SECS),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            policies_dir: PathBuf::from(DEFAULT_POLICIES_DIR),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl Settings {
    /// Creates a new builder for `Settings`.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Creates settings from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the resolved values are invalid
    /// (e.g. fusion weights that do not sum to 1).
    pub fn from_env() -> Result<Self, Error> {
        Self::builder().from_env().build()
    }

    /// Validates internal consistency of the settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when weights do not sum to 1,
    /// the overlap is not smaller than the chunk size, or thresholds
    /// are outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), Error> {
        if (self.semantic_weight + self.bm25_weight - 1.0).abs() > 1e-6 {
            return Err(Error::Config {
                message: format!(
                    "fusion weights must sum to 1 (semantic={}, bm25={})",
                    self.semantic_weight, self.bm25_weight
                ),
            });
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config {
                message: format!(
                    "chunk_overlap {} must be less than chunk_size {}",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }
        for (name, value) in [
            ("classifier_confidence_threshold", self.classifier_confidence_threshold),
            ("confidence_high_threshold", self.confidence_high_threshold),
            ("confidence_medium_threshold", self.confidence_medium_threshold),
            ("cache_similarity_threshold", self.cache_similarity_threshold),
            ("escalation_threshold", self.escalation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config {
                    message: format!("{name} must be within [0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    top_k_retrieval: Option<usize>,
    semantic_weight: Option<f32>,
    bm25_weight: Option<f32>,
    hybrid_cache_ttl: Option<Duration>,
    hybrid_cache_maxsize: Option<usize>,
    answer_cache_ttl_hours: Option<i64>,
    cache_similarity_threshold: Option<f32>,
    classifier_confidence_threshold: Option<f32>,
    embedding_cache_capacity: Option<usize>,
    llm_temperature: Option<f32>,
    llm_model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    conversation_history_max: Option<usize>,
    generator_timeout: Option<Duration>,
    db_path: Option<PathBuf>,
    policies_dir: Option<PathBuf>,
    model_path: Option<PathBuf>,
}

impl SettingsBuilder {
    /// Populates unset fields from `ONBOARD_*` environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        if self.chunk_size.is_none() {
            self.chunk_size = parse_env("ONBOARD_CHUNK_SIZE");
        }
        if self.chunk_overlap.is_none() {
            self.chunk_overlap = parse_env("ONBOARD_CHUNK_OVERLAP");
        }
        if self.top_k_retrieval.is_none() {
            self.top_k_retrieval = parse_env("ONBOARD_TOP_K");
        }
        if self.semantic_weight.is_none() {
            self.semantic_weight = parse_env("ONBOARD_SEMANTIC_WEIGHT");
        }
        if self.bm25_weight.is_none() {
            self.bm25_weight = parse_env("ONBOARD_BM25_WEIGHT");
        }
        if self.hybrid_cache_ttl.is_none() {
            self.hybrid_cache_ttl =
                parse_env::<u64>("ONBOARD_HYBRID_CACHE_TTL_SECS").map(Duration::from_secs);
        }
        if self.hybrid_cache_maxsize.is_none() {
            self.hybrid_cache_maxsize = parse_env("ONBOARD_HYBRID_CACHE_MAXSIZE");
        }
        if self.answer_cache_ttl_hours.is_none() {
            self.answer_cache_ttl_hours = parse_env("ONBOARD_ANSWER_CACHE_TTL_HOURS");
        }
        if self.cache_similarity_threshold.is_none() {
            self.cache_similarity_threshold = parse_env("ONBOARD_CACHE_SIMILARITY_THRESHOLD");
        }
        if self.classifier_confidence_threshold.is_none() {
            self.classifier_confidence_threshold =
                parse_env("ONBOARD_CLASSIFIER_CONFIDENCE_THRESHOLD");
        }
        if self.embedding_cache_capacity.is_none() {
            self.embedding_cache_capacity = parse_env("ONBOARD_EMBEDDING_CACHE_CAPACITY");
        }
        if self.llm_temperature.is_none() {
            self.llm_temperature = parse_env("ONBOARD_LLM_TEMPERATURE");
        }
        if self.llm_model.is_none() {
            self.llm_model = std::env::var("ONBOARD_LLM_MODEL").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("ONBOARD_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("ONBOARD_BASE_URL"))
                .ok();
        }
        if self.conversation_history_max.is_none() {
            self.conversation_history_max = parse_env("ONBOARD_HISTORY_MAX");
        }
        if self.generator_timeout.is_none() {
            self.generator_timeout =
                parse_env::<u64>("ONBOARD_GENERATOR_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.db_path.is_none() {
            self.db_path = std::env::var("ONBOARD_DB_PATH").ok().map(PathBuf::from);
        }
        if self.policies_dir.is_none() {
            self.policies_dir = std::env::var("ONBOARD_POLICIES_DIR").ok().map(PathBuf::from);
        }
        if self.model_path.is_none() {
            self.model_path = std::env::var("ONBOARD_MODEL_PATH").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Sets the chunk overlap.
    #[must_use]
    pub const fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = Some(overlap);
        self
    }

    /// Sets the retrieval top-k.
    #[must_use]
    pub const fn top_k_retrieval(mut self, k: usize) -> Self {
        self.top_k_retrieval = Some(k);
        self
    }

    /// Sets the fusion weights. Must sum to 1.
    #[must_use]
    pub const fn fusion_weights(mut self, semantic: f32, bm25: f32) -> Self {
        self.semantic_weight = Some(semantic);
        self.bm25_weight = Some(bm25);
        self
    }

    /// Sets the text generator model name.
    #[must_use]
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    /// Sets the generator API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the sqlite database path.
    #[must_use]
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Sets the policies directory.
    #[must_use]
    pub fn policies_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.policies_dir = Some(path.into());
        self
    }

    /// Sets the classifier artifact path.
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Sets the generator deadline.
    #[must_use]
    pub const fn generator_timeout(mut self, timeout: Duration) -> Self {
        self.generator_timeout = Some(timeout);
        self
    }

    /// Builds the settings, validating consistency.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the resolved values are invalid.
    pub fn build(self) -> Result<Settings, Error> {
        let defaults = Settings::default();
        let settings = Settings {
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(defaults.chunk_overlap),
            top_k_retrieval: self.top_k_retrieval.unwrap_or(defaults.top_k_retrieval),
            semantic_weight: self.semantic_weight.unwrap_or(defaults.semantic_weight),
            bm25_weight: self.bm25_weight.unwrap_or(defaults.bm25_weight),
            hybrid_cache_ttl: self.hybrid_cache_ttl.unwrap_or(defaults.hybrid_cache_ttl),
            hybrid_cache_maxsize: self
                .hybrid_cache_maxsize
                .unwrap_or(defaults.hybrid_cache_maxsize),
            answer_cache_ttl_hours: self
                .answer_cache_ttl_hours
                .unwrap_or(defaults.answer_cache_ttl_hours),
            cache_similarity_threshold: self
                .cache_similarity_threshold
                .unwrap_or(defaults.cache_similarity_threshold),
            classifier_confidence_threshold: self
                .classifier_confidence_threshold
                .unwrap_or(defaults.classifier_confidence_threshold),
            confidence_high_threshold: defaults.confidence_high_threshold,
            confidence_medium_threshold: defaults.confidence_medium_threshold,
            escalation_threshold: defaults.escalation_threshold,
            embedding_cache_capacity: self
                .embedding_cache_capacity
                .unwrap_or(defaults.embedding_cache_capacity),
            llm_temperature: self.llm_temperature.unwrap_or(defaults.llm_temperature),
            llm_model: self.llm_model.unwrap_or(defaults.llm_model),
            api_key: self.api_key.unwrap_or(defaults.api_key),
            base_url: self.base_url,
            conversation_history_max: self
                .conversation_history_max
                .unwrap_or(defaults.conversation_history_max),
            generator_timeout: self.generator_timeout.unwrap_or(defaults.generator_timeout),
            retrieval_timeout: defaults.retrieval_timeout,
            embedder_timeout: defaults.embedder_timeout,
            db_path: self.db_path.unwrap_or(defaults.db_path),
            policies_dir: self.policies_dir.unwrap_or(defaults.policies_dir),
            model_path: self.model_path.unwrap_or(defaults.model_path),
        };
        settings.validate()?;
        Ok(settings)
    }
}
