//! Core domain types for the retrieval-and-routing pipeline.
//!
//! Defines the units shared by every subsystem: departments and routing
//! targets, retrieval chunks, user/query context, routing decisions, and
//! per-user conversation memory.

mod chunk;
mod memory;
mod query;
mod routing;

pub use chunk::{ChunkSource, Department, DocumentChunk};
pub use memory::ConversationMemory;
pub use query::{ChatRole, ChatTurn, Language, TaskRecord, TaskStatus, UserProfile};
pub use routing::{RouteTarget, RoutingDecision};
