//! MIME type detection for uploaded files.
//!
//! Used when the caller did not declare a media type (files read from disk).

use std::path::Path;

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "heic"         => "image/heic",
        "heif"         => "image/heif",
        "avif"         => "image/avif",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "svg"          => "image/svg+xml",

        // Documents people tend to drop in by mistake
        "pdf"          => "application/pdf",
        "txt"          => "text/plain",
        "md"           => "text/markdown",
        "html" | "htm" => "text/html",
        "json"         => "application/json",
        "csv"          => "text/csv",
        "docx"         => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",

        _              => "application/octet-stream",
    }
}

/// Whether a declared MIME type is for an image.
pub fn is_image(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// Normalise a declared type: drop parameters, lowercase, trim.
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
