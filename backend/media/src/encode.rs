//! Transfer encoding for image bytes.

use base64::{engine::general_purpose::STANDARD, Engine};

/// Standard-alphabet, padded base64 as expected by inline image parts.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// A displayable `data:` URI for local previews.
pub fn preview_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, encode_base64(bytes))
}

/// Strip a `data:<mime>;base64,` prefix if one is present.
pub fn strip_data_uri(value: &str) -> &str {
    match value.split_once(',') {
        Some((head, body)) if head.starts_with("data:") => body,
        _ => value,
    }
}
