//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, plus a fixed
//! per-message overhead for the role and delimiters of the wire format.
//! Close enough to BPE tokenizers on English text for budgeting.

use crate::message::Message;

/// Per-message overhead for role name, delimiters, and formatting markers.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a piece of text sent as one message.
pub fn estimate_text_message_tokens(text: &str) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(text)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let name_tokens = message.name().map(estimate_tokens).unwrap_or(0);
    estimate_text_message_tokens(&message.text()) + name_tokens
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
