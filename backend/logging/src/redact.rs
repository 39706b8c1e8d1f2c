//! Log Redaction Layer
//!
//! Scrubs API keys and access tokens from strings prior to logging.

use once_cell::sync::Lazy;
use regex::Regex;

static GOOGLE_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"AIza[0-9A-Za-z\-_]{35}").unwrap());
static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap());
static QUERY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&](?:key|api_key|apikey)=)[^&\s)]+").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let mut redacted = GOOGLE_KEY_RE.replace_all(input, "[REDACTED_KEY]").to_string();

    // Redact API keys and bearer tokens
    redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]").to_string();

    // `?key=...` style credentials in URLs
    redacted = QUERY_KEY_RE.replace_all(&redacted, "${1}[REDACTED]").to_string();

    redacted
}
