//! Field extraction helpers for structured logging

use crate::conversation::{Conversation, Role};
use crate::dispatch::{Completion, DispatchError};

const PREVIEW_CHARS: usize = 100;

/// Outcome label for a dispatch or attempt result
///
/// `"success"` for Ok results, otherwise the error kind (e.g. `"rate_limited"`).
pub fn outcome_label(result: &Result<Completion, DispatchError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    }
}

/// Truncated preview of the latest user turn (privacy-safe)
///
/// Returns None when content logging is disabled or there is no non-empty
/// user turn. When enabled, returns roughly the first 100 characters.
///
/// # Examples
///
/// ```
/// use relay::conversation::Conversation;
/// use relay::logging::conversation_preview;
///
/// let conversation = Conversation::new().system("be brief").user("Hello, world!");
/// assert_eq!(conversation_preview(&conversation, true).as_deref(), Some("Hello, world!"));
/// assert_eq!(conversation_preview(&conversation, false), None);
/// ```
pub fn conversation_preview(conversation: &Conversation, enable_content_logging: bool) -> Option<String> {
    if !enable_content_logging {
        return None;
    }

    conversation
        .turns()
        .iter()
        .rev()
        .find(|turn| turn.role == Role::User && !turn.content.is_empty())
        .map(|turn| truncate_string(&turn.content, PREVIEW_CHARS))
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`
fn truncate_string(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
