//! Error types for the onboarding retrieval-and-routing core.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! all core operations including ingestion, retrieval, classification,
//! agent execution, caching, and storage.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ingestion-related errors (corpus loading and chunking).
    #[error("ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Retrieval-related errors (hybrid search).
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Classifier errors (model artifact loading and prediction).
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Agent errors (prompt rendering and text generation).
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Cache errors (two-tier answer cache).
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (ingest command not run).
    #[error("store not initialized. Run: onboard-rs ingest")]
    NotInitialized,

    /// Chunk not found by ID.
    #[error("chunk not found: {id}")]
    ChunkNotFound {
        /// Chunk ID that was not found.
        id: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Embedding vector could not be decoded from storage.
    #[error("embedding decode error for chunk {chunk_id}")]
    EmbeddingDecode {
        /// Chunk whose embedding blob was malformed.
        chunk_id: String,
    },
}

/// Ingestion-specific errors for corpus loading and chunking.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Policies directory missing or contains no markdown files.
    #[error("policy corpus not found or empty: {path}")]
    CorpusNotFound {
        /// Directory that was searched.
        path: String,
    },

    /// Failed to read a policy file.
    #[error("failed to read policy file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },

    /// Invalid chunking configuration.
    #[error("invalid chunking configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Indexing failed on both the initial attempt and the retry.
    #[error("indexing failed after reset and retry: {reason}")]
    IndexingFailed {
        /// Reason for the final failure.
        reason: String,
    },
}

/// Retrieval-specific errors for the hybrid search pipeline.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// One retrieval leg failed; the other leg's results were used.
    #[error("partial retrieval: {side} search failed: {reason}")]
    Partial {
        /// Which leg failed (`"semantic"` or `"bm25"`).
        side: &'static str,
        /// Reason for the failure.
        reason: String,
    },

    /// Both retrieval legs failed or returned nothing.
    #[error("retrieval returned no results")]
    Empty,

    /// The embedding backend is unavailable.
    #[error("embedder unavailable: {reason}")]
    EmbedderUnavailable {
        /// Reason the embedder could not be used.
        reason: String,
    },
}

/// Classifier-specific errors for the department prediction model.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Model artifact absent at load time. Non-fatal: the router
    /// degrades to keyword-only mode.
    #[error("classifier artifact not found: {path}")]
    ModelMissing {
        /// Expected artifact path.
        path: String,
    },

    /// Artifact could not be parsed.
    #[error("malformed classifier artifact: {reason}")]
    MalformedArtifact {
        /// Reason the artifact is invalid.
        reason: String,
    },

    /// Artifact is internally inconsistent (dimension mismatch).
    #[error("inconsistent classifier artifact: {reason}")]
    InconsistentArtifact {
        /// Description of the inconsistency.
        reason: String,
    },
}

/// Agent-specific errors for handlers and the text generator.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Text generator call failed.
    #[error("text generation failed: {reason}")]
    Generation {
        /// Reason for the failure.
        reason: String,
    },

    /// Text generator call exceeded its deadline.
    #[error("text generation timed out after {seconds}s")]
    Timeout {
        /// Deadline that expired.
        seconds: u64,
    },

    /// API key missing for the generator backend.
    #[error("no API key configured for the text generator")]
    ApiKeyMissing,

    /// Prompt template referenced an unbound slot.
    #[error("unbound prompt slot: {slot}")]
    UnboundSlot {
        /// Name of the missing slot.
        slot: String,
    },

    /// Handler received a request it cannot serve.
    #[error("agent error: {message}")]
    Handler {
        /// Description of the handler failure.
        message: String,
    },
}

/// Cache-specific errors for the two-tier answer cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache backend read/write failure. Treated as a miss on read
    /// and a no-op on write.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Background writer queue is full; the write was dropped.
    #[error("cache write queue full")]
    QueueFull,
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedArtifact {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad weights".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad weights");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotInitialized;
        assert_eq!(
            err.to_string(),
            "store not initialized. Run: onboard-rs ingest"
        );

        let err = StorageError::ChunkNotFound {
            id: "hr_policies.md_3".to_string(),
        };
        assert_eq!(err.to_string(), "chunk not found: hr_policies.md_3");
    }

    #[test]
    fn test_ingest_error_display() {
        let err = IngestError::CorpusNotFound {
            path: "/data/policies".to_string(),
        };
        assert!(err.to_string().contains("/data/policies"));

        let err = IngestError::OverlapTooLarge {
            overlap: 100,
            size: 50,
        };
        assert_eq!(
            err.to_string(),
            "overlap 100 must be less than chunk size 50"
        );
    }

    #[test]
    fn test_retrieval_error_display() {
        let err = RetrievalError::Partial {
            side: "bm25",
            reason: "index poisoned".to_string(),
        };
        assert!(err.to_string().contains("bm25"));

        let err = RetrievalError::Empty;
        assert_eq!(err.to_string(), "retrieval returned no results");
    }

    #[test]
    fn test_classifier_error_display() {
        let err = ClassifierError::ModelMissing {
            path: "/data/models/question_router.json".to_string(),
        };
        assert!(err.to_string().contains("question_router.json"));
    }

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::Timeout { seconds: 30 };
        assert_eq!(err.to_string(), "text generation timed out after 30s");

        let err = AgentError::UnboundSlot {
            slot: "context".to_string(),
        };
        assert!(err.to_string().contains("context"));
    }

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::QueueFull;
        assert_eq!(err.to_string(), "cache write queue full");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_storage() {
        let storage_err = StorageError::NotInitialized;
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_error_from_retrieval() {
        let err: Error = RetrievalError::Empty.into();
        assert!(matches!(err, Error::Retrieval(_)));
    }

    #[test]
    fn test_error_from_agent() {
        let err: Error = AgentError::ApiKeyMissing.into();
        assert!(matches!(err, Error::Agent(_)));
    }

    #[test]
    fn test_from_rusqlite_error_to_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_from_serde_json_error_to_storage_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_classifier_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: ClassifierError = json_err.into();
        assert!(matches!(err, ClassifierError::MalformedArtifact { .. }));
    }
}
