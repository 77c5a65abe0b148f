//! # Text Processing Utilities
//!
//! Redaction and truncation for text that ends up in logs and reports.

use once_cell::sync::Lazy;
use regex::Regex;

const REDACTED: &str = "[REDACTED]";

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization:\s*)([^\s,;]+(?:\s+[^\s,;]+)?)",
        r"(?i)(bearer\s+)([A-Za-z0-9\-\._~\+/]+=*)",
        r"(?i)([A-Z0-9_]*(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s&]+)",
        r#"(?i)("(?:password|secret|token|api_?key)"\s*:\s*")([^"]*)(")"#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid redaction pattern"))
    .collect()
});

static SENSITIVE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(authorization|proxy-authorization|cookie|set-cookie|x-api-key|.*(token|secret|password).*)$")
        .expect("valid header pattern")
});

/// Redacts values that look like secrets in a string.
///
/// Key names are preserved so log lines remain readable.
///
/// # Example
/// ```rust
/// use apirig_util::text_processing::redact_sensitive;
///
/// assert_eq!(redact_sensitive("API_KEY=abc123 TOKEN=xyz789"), "API_KEY=[REDACTED] TOKEN=[REDACTED]");
/// assert_eq!(redact_sensitive("Authorization: Bearer secret123"), "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{REDACTED}{suffix}")
            })
            .to_string();
    }
    redacted
}

/// Redact a header value for logging, hiding it entirely when the header name
/// is a known credential carrier.
pub fn redact_header_value(name: &str, value: &str) -> String {
    if SENSITIVE_HEADER.is_match(name.trim()) {
        REDACTED.to_string()
    } else {
        redact_sensitive(value)
    }
}

/// Trim and shorten text to at most `max_len` characters, ending with `...` when cut.
pub fn truncate_for_summary(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }

    // Reserve space for the trailing ellipsis.
    let target_len = max_len.saturating_sub(3);
    let truncated: String = trimmed.chars().take(target_len).collect();
    format!("{}...", truncated.trim_end())
}
