//! # onboard-rs
//!
//! Retrieval-and-routing core for an enterprise onboarding copilot.
//!
//! Given a natural-language question from a user with a known role and
//! department, the core classifies the query into a responsible
//! department, retrieves the most relevant policy passages via hybrid
//! (dense + BM25) search, dispatches one or more department-specialist
//! handlers that synthesize a grounded answer through a pluggable text
//! generator, and memoizes results in a two-tier (exact + semantic)
//! cache.
//!
//! ## Pipeline
//!
//! ```text
//! message → cache lookup ──hit──→ cached envelope
//!     │ miss
//!     ▼
//! keyword detection ──→ single handler │ parallel fan-out
//!     ▼                                  ▼
//! hybrid search → text generator → merge → confidence/escalation
//!     ▼
//! cache write (background) → envelope
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod agent;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod confidence;
pub mod core;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod route;
pub mod search;
pub mod storage;
pub mod vectorstore;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    ChatRole, ChatTurn, ChunkSource, ConversationMemory, Department, DocumentChunk, Language,
    RouteTarget, RoutingDecision, TaskRecord, TaskStatus, UserProfile,
};

// Re-export configuration
pub use config::{Settings, SettingsBuilder};

// Re-export the pipeline surface
pub use agent::{Agent, AgentResponse, OpenAiGenerator, RequestState, TextGenerator};
pub use cache::{CacheTier, CacheWriter, CachedAnswer, TwoTierCache};
pub use classify::{ArtifactClassifier, DepartmentClassifier, create_classifier};
pub use confidence::{ConfidenceLevel, EscalationDirective, EscalationEngine};
pub use ingest::DocumentIngestion;
pub use orchestrator::{AnswerEnvelope, Orchestrator, RoutingInfo};
pub use route::Router;
pub use search::{Bm25Index, HybridResponse, HybridSearchEngine};
pub use storage::SqliteStore;
pub use vectorstore::VectorStore;
