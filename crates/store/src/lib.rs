//! # Threadline Store
//!
//! Durable storage for sealed prompts. Topology (parent and reference edges,
//! topic visibility) lives in a JSON graph file; prompt records live in a
//! SQLite table keyed by hash.

pub mod blob;
pub mod graph;
pub mod store;

pub use graph::{Edge, EdgeKind, Node, PromptGraph};
pub use store::{PromptStore, TopicSummary};
