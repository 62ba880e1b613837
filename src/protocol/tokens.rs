//! Approximate token counting.
//!
//! This is a word/punctuation heuristic, **not** a tokenizer. Counts are
//! typically within a few tens of percent of what a BPE tokenizer reports
//! for English prose and can be far off for code or non-Latin scripts.
//! Do not use them for billing or hard context limits.
//!
//! The estimate is `floor(1.3 × units)` where units are:
//!
//! - whitespace-separated words
//! - half the punctuation characters
//! - `len / 3 + 1` for every run of ASCII digits
//! - newlines
//! - `(len - 5) / 5` for every word longer than 10 characters

use crate::conversation::{Conversation, Role, Turn};

const TOKENS_PER_UNIT: f64 = 1.3;
const LONG_WORD_CHARS: usize = 10;
/// Per-message framing overhead
const TURN_OVERHEAD: usize = 3;
/// Added to each turn's role label
const ROLE_OVERHEAD: usize = 5;

fn is_counted_punctuation(c: char) -> bool {
    matches!(
        c,
        '.' | ','
            | '!'
            | '?'
            | ';'
            | ':'
            | '('
            | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | '"'
            | '\''
            | '`'
            | '-'
            | '–'
            | '—'
            | '…'
    )
}

/// Estimated token count of a piece of text. Empty text is zero.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut words = 0usize;
    let mut long_word_penalty = 0usize;
    for word in text.split_whitespace() {
        words += 1;
        let len = word.chars().count();
        if len > LONG_WORD_CHARS {
            long_word_penalty += (len - 5) / 5;
        }
    }

    let punctuation = text.chars().filter(|c| is_counted_punctuation(*c)).count();
    let newlines = text.chars().filter(|c| *c == '\n').count();

    let mut number_units = 0usize;
    let mut run = 0usize;
    for c in text.chars() {
        if c.is_ascii_digit() {
            run += 1;
        } else if run > 0 {
            number_units += run / 3 + 1;
            run = 0;
        }
    }
    if run > 0 {
        number_units += run / 3 + 1;
    }

    let units = words + punctuation / 2 + number_units + newlines + long_word_penalty;
    (units as f64 * TOKENS_PER_UNIT) as usize
}

fn turn_tokens(role: Role, content: &str) -> usize {
    estimate_tokens(content) + role.as_str().split_whitespace().count() + ROLE_OVERHEAD
}

/// Estimated tokens for a conversation plus, optionally, the generated answer
/// (counted as one more assistant turn).
pub fn conversation_tokens(conversation: &Conversation, answer: Option<&str>) -> usize {
    let mut total = conversation
        .turns()
        .iter()
        .map(|Turn { role, content }| turn_tokens(*role, content) + TURN_OVERHEAD)
        .sum::<usize>();
    if let Some(answer) = answer {
        total += turn_tokens(Role::Assistant, answer) + TURN_OVERHEAD;
    }
    total
}
