//! # Threadline Core
//!
//! Domain types, traits, and error definitions for Threadline.
//! This crate has **no storage or transport dependencies**: it defines the
//! prompt model that the store, the assistant and the providers build on.
//!
//! ## Layout
//!
//! - [`message`]: role-tagged, validated text units
//! - [`prompt`]: the open [`Prompt`] builder and the immutable [`SealedPrompt`]
//! - [`response`]: the normalized [`ChatResponse`] every provider produces
//! - [`chat`]: the [`Chat`] capability the assistant drives
//! - [`token`]: token cost estimation used for budgeting

pub mod chat;
pub mod error;
pub mod message;
pub mod prompt;
pub mod response;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use chat::{Chat, ChatStream};
pub use error::{Error, PromptError, ProviderError, Result, StoreError};
pub use message::{FunctionCall, Message, Role};
pub use prompt::{HistoryKind, NewKind, Prompt, SealedPrompt, ShortLog, User};
pub use response::{ChatResponse, Choice, Delta, Usage};
