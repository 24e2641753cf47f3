//! Background cache writer.
//!
//! Cache writes are fire-and-forget from the orchestrator's viewpoint:
//! jobs go onto a bounded queue drained by a single worker task. When
//! the queue is full the write is dropped and a counter incremented for
//! observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::TwoTierCache;
use crate::core::ChunkSource;

/// Default bound on queued cache writes.
const DEFAULT_QUEUE_SIZE: usize = 256;

/// One queued cache write.
#[derive(Debug, Clone)]
pub struct WriteJob {
    /// The query being cached.
    pub query: String,
    /// The answer markdown.
    pub response: String,
    /// Citations for the answer.
    pub sources: Vec<ChunkSource>,
    /// Department label (comma-joined for fan-out answers).
    pub department: Option<String>,
    /// Confidence recorded with the entry.
    pub confidence: f32,
}

/// Handle to the background cache writer.
#[derive(Debug, Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<WriteJob>,
    dropped: Arc<AtomicU64>,
}

impl CacheWriter {
    /// Spawns the worker task with the default queue bound.
    #[must_use]
    pub fn spawn(cache: Arc<TwoTierCache>) -> Self {
        Self::spawn_with_queue(cache, DEFAULT_QUEUE_SIZE)
    }

    /// Spawns the worker task with an explicit queue bound.
    #[must_use]
    pub fn spawn_with_queue(cache: Arc<TwoTierCache>, queue_size: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<WriteJob>(queue_size.max(1));

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(err) = cache.put(
                    &job.query,
                    &job.response,
                    &job.sources,
                    job.department.as_deref(),
                    job.confidence,
                ) {
                    warn!(error = %err, "background cache write failed");
                } else {
                    debug!(query = %truncate(&job.query), "cached response");
                }
            }
        });

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueues a write without waiting. Drops the job (and counts the
    /// drop) when the queue is full or the worker is gone.
    pub fn enqueue(&self, job: WriteJob) {
        if let Err(err) = self.tx.try_send(job) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "cache write queue full, dropping write");
        }
    }

    /// Number of writes dropped due to queue overflow.
    #[must_use]
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn truncate(query: &str) -> &str {
    let end = query
        .char_indices()
        .nth(50)
        .map_or(query.len(), |(idx, _)| idx);
    &query[..end]
}
