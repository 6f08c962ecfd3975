//! MIME part metadata.

/// Metadata about one MIME part of a message.
///
/// Content is never held here; only what search and hit rendering need.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MimePart {
    /// IMAP-style part name (`"2"`, `"2.1"`).
    pub part: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Filename from the part headers, if any.
    #[serde(default)]
    pub filename: Option<String>,

    /// Decoded size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl MimePart {
    /// Filename or an empty string.
    pub fn filename_or_empty(&self) -> &str {
        self.filename.as_deref().unwrap_or("")
    }
}
