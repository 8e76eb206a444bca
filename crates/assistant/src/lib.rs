//! # Threadline Assistant
//!
//! Builds prompts from a request plus the history reachable through the
//! prompt graph, keeps them inside a token budget, and streams the model's
//! answer back while recording it in the store.

pub mod assistant;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assistant::{Assistant, MakePrompt};
pub use stream::ResponseStream;
