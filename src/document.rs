//! Loaded documents

use std::path::Path;

use crate::Result;
use crate::text::{Section, segment};

/// A document to be read aloud
///
/// Immutable once loaded; the playback engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    title: String,
    text: String,
}

impl Document {
    /// Create a document from a title and raw markdown text
    #[must_use]
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    /// Read a markdown or plain-text file
    ///
    /// The title defaults to the file stem.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub fn from_path(path: &Path, title: Option<String>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let title = title.unwrap_or_else(|| {
            path.file_stem()
                .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned())
        });

        tracing::debug!(path = %path.display(), bytes = text.len(), "loaded document");
        Ok(Self { title, text })
    }

    /// Document title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Raw markdown text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Split into playable sections
    #[must_use]
    pub fn sections(&self) -> Vec<Section> {
        segment(&self.text)
    }
}
