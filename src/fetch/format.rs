//! Deterministic format derivation from content type and object key.

use crate::pipeline::DocumentFormat;

/// Derive the document format from a declared content type and the object key.
///
/// The content type wins when it names a known format (`html`, `markdown`, `pdf`, `text`,
/// matched as substrings in that order so `text/html` resolves to HTML). Otherwise the key's
/// extension decides, and anything else is treated as plain text.
pub fn derive_format(content_type: Option<&str>, key: &str) -> DocumentFormat {
    content_type
        .and_then(format_from_content_type)
        .or_else(|| format_from_extension(key))
        .unwrap_or(DocumentFormat::Text)
}

fn format_from_content_type(content_type: &str) -> Option<DocumentFormat> {
    let lowered = content_type.to_ascii_lowercase();
    if lowered.contains("html") {
        Some(DocumentFormat::Html)
    } else if lowered.contains("markdown") {
        Some(DocumentFormat::Markdown)
    } else if lowered.contains("pdf") {
        Some(DocumentFormat::Pdf)
    } else if lowered.contains("text") {
        Some(DocumentFormat::Text)
    } else {
        None
    }
}

fn format_from_extension(key: &str) -> Option<DocumentFormat> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => Some(DocumentFormat::Html),
        "md" | "markdown" => Some(DocumentFormat::Markdown),
        "pdf" => Some(DocumentFormat::Pdf),
        "txt" | "text" => Some(DocumentFormat::Text),
        _ => None,
    }
}
