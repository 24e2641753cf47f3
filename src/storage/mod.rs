//! Persistent storage for chunks, embeddings, the answer cache, and
//! best-effort conversation/routing logs.
//!
//! Backed by sqlite. The connection sits behind a mutex so one store can
//! be shared across the orchestrator's concurrent handlers.

mod schema;
mod sqlite;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::{CacheRecord, CollectionStats, SqliteStore};

/// Default sqlite database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "./data/onboarding.db";
