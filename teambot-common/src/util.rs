//! Utility functions for teambot services.

use regex::Regex;
use std::sync::LazyLock;

static CONVERSATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").unwrap());
static AT_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\s*<at[^>]*>.*?</at>\s*").unwrap());

static SENSITIVE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            "***@***.***",
        ),
        (
            r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
            "****-****-****-****",
        ),
        (r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", "***-***-****"),
        (r"\b[A-Za-z0-9]{32,}\b", "***API_KEY***"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Counts characters, not bytes, so multi-byte text is never split mid-codepoint.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Trim surrounding whitespace and keep at most `max_chars` characters.
///
/// The text itself is left as written.
pub fn clamp_user_input(text: &str, max_chars: usize) -> &str {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end(),
        None => text,
    }
}

/// Whether `id` is 1-100 characters of ASCII letters, digits, `-` or `_`.
pub fn validate_conversation_id(id: &str) -> bool {
    CONVERSATION_ID.is_match(id)
}

/// Generate a conversation id such as `conv-1a2b3c4d`.
pub fn generate_conversation_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..8])
}

/// Mask personal data and key-like tokens for logging.
pub fn mask_sensitive_data(text: &str) -> String {
    SENSITIVE_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Remove `<at>name</at>` mention markup from channel text.
pub fn strip_mentions(text: &str) -> String {
    AT_MENTION.replace_all(text, " ").trim().to_string()
}
