//! Sqlite storage implementation.
//!
//! One store instance owns the connection; the mutex keeps it
//! `Send + Sync` so the orchestrator can share it across concurrent
//! handlers. Writes are short transactions.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use crate::core::{ChunkSource, Department, DocumentChunk, RoutingDecision};
use crate::error::{Result, StorageError};
use crate::storage::schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};

/// A row of the `answer_cache` table.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    /// Row id.
    pub id: i64,
    /// SHA-256 hex digest of the normalized query.
    pub query_hash: String,
    /// Original query text.
    pub query_text: String,
    /// Query embedding, when the embedder was available at write time.
    pub query_embedding: Option<Vec<f32>>,
    /// Cached response markdown.
    pub response: String,
    /// Cached citation list.
    pub sources: Vec<ChunkSource>,
    /// Department label the answer was routed to.
    pub department: Option<String>,
    /// Confidence score recorded at write time.
    pub confidence: Option<f32>,
    /// Number of times this entry served a hit.
    pub hit_count: i64,
    /// Unix seconds the entry was created.
    pub created_at: i64,
    /// Unix seconds the entry last served a hit.
    pub last_accessed: i64,
    /// Unix seconds the entry expires.
    pub expires_at: i64,
    /// Soft-validity flag; invalidation clears it.
    pub is_valid: bool,
}

/// Aggregate counts for the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStats {
    /// Chunks in the collection.
    pub chunk_count: usize,
    /// Chunks with a stored embedding.
    pub embedding_count: usize,
    /// Rows in the answer cache.
    pub cache_entries: usize,
    /// Rows in the message log.
    pub message_count: usize,
}

/// Sqlite-backed store for the retrieval collection and the answer cache.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database (tests and ephemeral runs).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Initializes the schema. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub fn init(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
            params![CURRENT_SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Checks whether the schema has been initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    pub fn is_initialized(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'chunks'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ==================== Collection operations ====================

    /// Inserts chunks with their embeddings in one transaction.
    ///
    /// Re-ingesting a file overwrites rows with the same `chunk_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is written in
    /// that case.
    pub fn upsert_chunks(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(StorageError::Database(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                "INSERT OR REPLACE INTO chunks
                 (chunk_id, content, filename, section, department, ordinal, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.chunk_id,
                    chunk.text,
                    chunk.filename,
                    chunk.section_title,
                    chunk.department.as_str(),
                    chunk.ordinal as i64,
                    now,
                ],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO chunk_embeddings
                 (chunk_id, embedding, dimensions, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    chunk.chunk_id,
                    encode_embedding(embedding),
                    embedding.len() as i64,
                    now,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Returns the number of chunks in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn chunk_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Retrieves a chunk by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<DocumentChunk>> {
        let conn = self.conn();
        let chunk = conn
            .query_row(
                "SELECT chunk_id, content, filename, section, department, ordinal
                 FROM chunks WHERE chunk_id = ?1",
                params![chunk_id],
                row_to_chunk,
            )
            .optional()?;
        Ok(chunk)
    }

    /// Returns all chunks, ordered by filename then ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_chunks(&self) -> Result<Vec<DocumentChunk>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT chunk_id, content, filename, section, department, ordinal
             FROM chunks ORDER BY filename, ordinal",
        )?;
        let chunks = stmt
            .query_map([], row_to_chunk)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Returns chunks with their embeddings, optionally filtered by
    /// department. Rows without an embedding are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or an embedding blob is
    /// malformed.
    pub fn chunks_with_embeddings(
        &self,
        department: Option<Department>,
    ) -> Result<Vec<(DocumentChunk, Vec<f32>)>> {
        let conn = self.conn();
        let sql = "SELECT c.chunk_id, c.content, c.filename, c.section, c.department, c.ordinal,
                          e.embedding
                   FROM chunks c
                   JOIN chunk_embeddings e ON e.chunk_id = c.chunk_id
                   WHERE (?1 IS NULL OR c.department = ?1)
                   ORDER BY c.filename, c.ordinal";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![department.map(Department::as_str)], |row| {
            let chunk = row_to_chunk(row)?;
            let blob: Vec<u8> = row.get(6)?;
            Ok((chunk, blob))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (chunk, blob) = row?;
            let embedding = decode_embedding(&blob).ok_or_else(|| StorageError::EmbeddingDecode {
                chunk_id: chunk.chunk_id.clone(),
            })?;
            out.push((chunk, embedding));
        }
        Ok(out)
    }

    /// Deletes all chunks and embeddings (collection reset).
    ///
    /// # Errors
    ///
    /// Returns an error if the deletes fail.
    pub fn reset_collection(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunk_embeddings", [])?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.commit()?;
        Ok(())
    }

    // ==================== Answer cache operations ====================

    /// Inserts or updates a cache entry keyed by `query_hash`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the write fails.
    #[allow(clippy::too_many_arguments)]
    pub fn cache_upsert(
        &self,
        query_hash: &str,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        response: &str,
        sources: &[ChunkSource],
        department: Option<&str>,
        confidence: Option<f32>,
        now: i64,
        expires_at: i64,
    ) -> Result<()> {
        let conn = self.conn();
        let sources_json =
            serde_json::to_string(sources).map_err(StorageError::from)?;
        conn.execute(
            "INSERT INTO answer_cache
             (query_hash, query_text, query_embedding, response, sources, department,
              confidence, hit_count, created_at, last_accessed, expires_at, is_valid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8, ?9, 1)
             ON CONFLICT(query_hash) DO UPDATE SET
                 query_text = excluded.query_text,
                 query_embedding = excluded.query_embedding,
                 response = excluded.response,
                 sources = excluded.sources,
                 department = excluded.department,
                 confidence = excluded.confidence,
                 expires_at = excluded.expires_at,
                 is_valid = 1",
            params![
                query_hash,
                query_text,
                query_embedding.map(encode_embedding),
                response,
                sources_json,
                department,
                confidence,
                now,
                expires_at,
            ],
        )?;
        Ok(())
    }

    /// Looks up a valid, unexpired entry by exact hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn cache_get_exact(&self, query_hash: &str, now: i64) -> Result<Option<CacheRecord>> {
        let conn = self.conn();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {CACHE_COLUMNS} FROM answer_cache
                     WHERE query_hash = ?1 AND is_valid = 1 AND expires_at > ?2"
                ),
                params![query_hash, now],
                row_to_cache_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Returns up to `limit` most recent valid entries that carry a
    /// stored embedding (the semantic tier's scan set).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn cache_recent_embedded(&self, limit: usize, now: i64) -> Result<Vec<CacheRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CACHE_COLUMNS} FROM answer_cache
             WHERE is_valid = 1 AND expires_at > ?1 AND query_embedding IS NOT NULL
             ORDER BY created_at DESC LIMIT ?2"
        ))?;
        let records = stmt
            .query_map(params![now, limit as i64], row_to_cache_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Records a hit: bumps `hit_count` and `last_accessed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn cache_touch(&self, id: i64, now: i64) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE answer_cache SET hit_count = hit_count + 1, last_accessed = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        Ok(())
    }

    /// Soft-invalidates entries, optionally only for one department.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn cache_invalidate(&self, department: Option<&str>) -> Result<usize> {
        let conn = self.conn();
        let affected = match department {
            Some(dept) => conn.execute(
                "UPDATE answer_cache SET is_valid = 0 WHERE department = ?1",
                params![dept],
            )?,
            None => conn.execute("UPDATE answer_cache SET is_valid = 0", [])?,
        };
        Ok(affected)
    }

    /// Deletes expired and invalidated entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn cache_cleanup_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn();
        let affected = conn.execute(
            "DELETE FROM answer_cache WHERE expires_at <= ?1 OR is_valid = 0",
            params![now],
        )?;
        Ok(affected)
    }

    /// Returns the number of cache rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn cache_len(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM answer_cache", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ==================== Log operations ====================

    /// Appends a conversation message. Best-effort from the caller's
    /// viewpoint; the orchestrator logs failures and moves on.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn append_message(
        &self,
        user_id: i64,
        role: &str,
        content: &str,
        agent: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO messages (user_id, role, content, agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, role, content, agent, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Appends a routing decision to the routing log.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn append_routing_log(
        &self,
        user_id: i64,
        query: &str,
        decision: &RoutingDecision,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO routing_log
             (user_id, query, predicted_department, prediction_confidence,
              final_department, was_overridden, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                query,
                decision.predicted_department.as_str(),
                f64::from(decision.prediction_confidence),
                decision.final_department.as_str(),
                i64::from(decision.was_overridden),
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Returns aggregate counts for the status surface.
    ///
    /// # Errors
    ///
    /// Returns an error if a count query fails.
    pub fn stats(&self) -> Result<CollectionStats> {
        let conn = self.conn();
        let count = |sql: &str| -> std::result::Result<usize, rusqlite::Error> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };
        Ok(CollectionStats {
            chunk_count: count("SELECT COUNT(*) FROM chunks")?,
            embedding_count: count("SELECT COUNT(*) FROM chunk_embeddings")?,
            cache_entries: count("SELECT COUNT(*) FROM answer_cache")?,
            message_count: count("SELECT COUNT(*) FROM messages")?,
        })
    }
}

const CACHE_COLUMNS: &str = "id, query_hash, query_text, query_embedding, response, sources, \
                             department, confidence, hit_count, created_at, last_accessed, \
                             expires_at, is_valid";

fn row_to_chunk(row: &rusqlite::Row<'_>) -> std::result::Result<DocumentChunk, rusqlite::Error> {
    let department: String = row.get(4)?;
    let ordinal: i64 = row.get(5)?;
    Ok(DocumentChunk {
        chunk_id: row.get(0)?,
        text: row.get(1)?,
        filename: row.get(2)?,
        section_title: row.get(3)?,
        department: Department::parse(&department).unwrap_or(Department::General),
        ordinal: usize::try_from(ordinal).unwrap_or(0),
    })
}

fn row_to_cache_record(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<CacheRecord, rusqlite::Error> {
    let embedding_blob: Option<Vec<u8>> = row.get(3)?;
    let sources_json: String = row.get(5)?;
    let confidence: Option<f64> = row.get(7)?;
    #[allow(clippy::cast_possible_truncation)]
    let confidence = confidence.map(|c| c as f32);
    Ok(CacheRecord {
        id: row.get(0)?,
        query_hash: row.get(1)?,
        query_text: row.get(2)?,
        query_embedding: embedding_blob.as_deref().and_then(decode_embedding),
        response: row.get(4)?,
        sources: serde_json::from_str(&sources_json).unwrap_or_default(),
        department: row.get(6)?,
        confidence,
        hit_count: row.get(8)?,
        created_at: row.get(9)?,
        last_accessed: row.get(10)?,
        expires_at: row.get(11)?,
        is_valid: row.get::<_, i64>(12)? != 0,
    })
}

/// Serializes an f32 vector as little-endian bytes.
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserializes little-endian bytes back into an f32 vector.
fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store
    }

    fn sample_chunks() -> Vec<DocumentChunk> {
        vec![
            DocumentChunk::new("hr_policies.md", "PTO Policy", "20 days of paid time off", 0),
            DocumentChunk::new("hr_policies.md", "Benefits", "health dental vision", 1),
            DocumentChunk::new("it_policies.md", "VPN Setup", "install the vpn client", 0),
        ]
    }

    fn sample_embeddings(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, 1.0, 0.0]).collect()
    }

    #[test]
    fn test_init_idempotent() {
        let store = store();
        store.init().unwrap();
        assert!(store.is_initialized().unwrap());
    }

    #[test]
    fn test_upsert_and_count() {
        let store = store();
        let chunks = sample_chunks();
        store.upsert_chunks(&chunks, &sample_embeddings(3)).unwrap();
        assert_eq!(store.chunk_count().unwrap(), 3);
    }

    #[test]
    fn test_upsert_overwrites_same_id() {
        let store = store();
        let chunks = sample_chunks();
        store.upsert_chunks(&chunks, &sample_embeddings(3)).unwrap();
        store.upsert_chunks(&chunks, &sample_embeddings(3)).unwrap();
        assert_eq!(store.chunk_count().unwrap(), 3);
    }

    #[test]
    fn test_mismatched_embeddings_rejected() {
        let store = store();
        let result = store.upsert_chunks(&sample_chunks(), &sample_embeddings(2));
        assert!(result.is_err());
    }

    #[test]
    fn test_get_chunk() {
        let store = store();
        store
            .upsert_chunks(&sample_chunks(), &sample_embeddings(3))
            .unwrap();
        let chunk = store.get_chunk("it_policies.md_0").unwrap().unwrap();
        assert_eq!(chunk.section_title, "VPN Setup");
        assert_eq!(chunk.department, Department::It);
        assert!(store.get_chunk("missing_0").unwrap().is_none());
    }

    #[test]
    fn test_chunks_with_embeddings_department_filter() {
        let store = store();
        store
            .upsert_chunks(&sample_chunks(), &sample_embeddings(3))
            .unwrap();

        let all = store.chunks_with_embeddings(None).unwrap();
        assert_eq!(all.len(), 3);

        let hr = store.chunks_with_embeddings(Some(Department::Hr)).unwrap();
        assert_eq!(hr.len(), 2);
        assert!(hr.iter().all(|(c, _)| c.department == Department::Hr));
    }

    #[test]
    fn test_embedding_roundtrip() {
        let store = store();
        let chunks = vec![DocumentChunk::new("welcome.md", "root", "hello", 0)];
        let embedding = vec![0.25f32, -1.5, 3.0];
        store.upsert_chunks(&chunks, &[embedding.clone()]).unwrap();

        let rows = store.chunks_with_embeddings(None).unwrap();
        assert_eq!(rows[0].1, embedding);
    }

    #[test]
    fn test_reset_collection() {
        let store = store();
        store
            .upsert_chunks(&sample_chunks(), &sample_embeddings(3))
            .unwrap();
        store.reset_collection().unwrap();
        assert_eq!(store.chunk_count().unwrap(), 0);
        assert!(store.chunks_with_embeddings(None).unwrap().is_empty());
    }

    #[test]
    fn test_cache_exact_roundtrip() {
        let store = store();
        let sources = vec![sample_chunks()[0].source()];
        store
            .cache_upsert(
                "abc123",
                "how much pto do i get?",
                Some([0.1, 0.2].as_slice()),
                "You get 20 days.",
                &sources,
                Some("HR"),
                Some(0.9),
                1000,
                2000,
            )
            .unwrap();

        let record = store.cache_get_exact("abc123", 1500).unwrap().unwrap();
        assert_eq!(record.response, "You get 20 days.");
        assert_eq!(record.sources.len(), 1);
        assert_eq!(record.department.as_deref(), Some("HR"));
        assert_eq!(record.query_embedding, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_cache_expired_not_returned() {
        let store = store();
        store
            .cache_upsert("h", "q", None, "r", &[], None, None, 1000, 2000)
            .unwrap();
        assert!(store.cache_get_exact("h", 2000).unwrap().is_none());
    }

    #[test]
    fn test_cache_touch_increments() {
        let store = store();
        store
            .cache_upsert("h", "q", None, "r", &[], None, None, 1000, 2000)
            .unwrap();
        let record = store.cache_get_exact("h", 1500).unwrap().unwrap();
        store.cache_touch(record.id, 1600).unwrap();

        let touched = store.cache_get_exact("h", 1500).unwrap().unwrap();
        assert_eq!(touched.hit_count, 1);
        assert_eq!(touched.last_accessed, 1600);
    }

    #[test]
    fn test_cache_invalidate_by_department() {
        let store = store();
        store
            .cache_upsert("h1", "q1", None, "r1", &[], Some("HR"), None, 1000, 9000)
            .unwrap();
        store
            .cache_upsert("h2", "q2", None, "r2", &[], Some("IT"), None, 1000, 9000)
            .unwrap();

        let affected = store.cache_invalidate(Some("HR")).unwrap();
        assert_eq!(affected, 1);
        assert!(store.cache_get_exact("h1", 1500).unwrap().is_none());
        assert!(store.cache_get_exact("h2", 1500).unwrap().is_some());
    }

    #[test]
    fn test_cache_cleanup_removes_expired_and_invalid() {
        let store = store();
        store
            .cache_upsert("h1", "q1", None, "r1", &[], None, None, 1000, 1500)
            .unwrap();
        store
            .cache_upsert("h2", "q2", None, "r2", &[], Some("IT"), None, 1000, 9000)
            .unwrap();
        store.cache_invalidate(Some("IT")).unwrap();

        let removed = store.cache_cleanup_expired(2000).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.cache_len().unwrap(), 0);
    }

    #[test]
    fn test_cache_recent_embedded_orders_and_limits() {
        let store = store();
        for i in 0..5 {
            store
                .cache_upsert(
                    &format!("h{i}"),
                    &format!("q{i}"),
                    Some([i as f32].as_slice()),
                    "r",
                    &[],
                    None,
                    None,
                    1000 + i64::from(i),
                    9000,
                )
                .unwrap();
        }
        // One without an embedding must be excluded
        store
            .cache_upsert("plain", "q", None, "r", &[], None, None, 2000, 9000)
            .unwrap();

        let recent = store.cache_recent_embedded(3, 1500).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].query_hash, "h4");
        assert!(recent.iter().all(|r| r.query_embedding.is_some()));
    }

    #[test]
    fn test_logs_and_stats() {
        let store = store();
        store
            .append_message(1, "user", "hello", Some("hr"))
            .unwrap();
        store
            .append_routing_log(1, "hello", &RoutingDecision::keyword_only())
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.chunk_count, 0);
    }
}
