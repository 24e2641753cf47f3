//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the core's sqlite database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Policy chunks (the retrieval collection)
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    filename TEXT NOT NULL,
    section TEXT NOT NULL,
    department TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

-- Index for department-filtered retrieval
CREATE INDEX IF NOT EXISTS idx_chunks_department ON chunks(department);

-- Index for per-file ordering
CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(filename, ordinal);

-- Chunk embeddings for semantic search
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,  -- f32 array serialized as little-endian bytes
    dimensions INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id) ON DELETE CASCADE
);

-- Two-tier answer cache
CREATE TABLE IF NOT EXISTS answer_cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_hash TEXT NOT NULL UNIQUE,
    query_text TEXT NOT NULL,
    query_embedding BLOB,  -- optional, enables the semantic tier
    response TEXT NOT NULL,
    sources TEXT NOT NULL,  -- JSON array of citation objects
    department TEXT,
    confidence REAL,
    hit_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_accessed INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    is_valid INTEGER NOT NULL DEFAULT 1
);

-- Index for exact-tier lookup
CREATE INDEX IF NOT EXISTS idx_cache_hash ON answer_cache(query_hash);

-- Index for the semantic tier's recent-valid scan
CREATE INDEX IF NOT EXISTS idx_cache_recent ON answer_cache(is_valid, expires_at, created_at);

-- Conversation log (best-effort, written asynchronously)
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    agent TEXT,
    created_at INTEGER NOT NULL
);

-- Index for per-user history
CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id, created_at);

-- Routing decision log (best-effort, written asynchronously)
CREATE TABLE IF NOT EXISTS routing_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    query TEXT NOT NULL,
    predicted_department TEXT NOT NULL,
    prediction_confidence REAL NOT NULL,
    final_department TEXT NOT NULL,
    was_overridden INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
";
