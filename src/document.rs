use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Immutable snapshot of a source file: storage path plus UTF-8 text.
///
/// A `Document` is read once at the start of a rewrite session and
/// superseded by a new one on a successful write; it is never mutated
/// in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    text: String,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8: {source}")]
    Utf8 {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
}

impl Document {
    /// Read a document from disk, validating UTF-8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|source| DocumentError::Utf8 {
                path: path.to_path_buf(),
                source,
            })?
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    /// Build a document from in-memory text (tests, dry runs).
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// xxh3 hash of the full contents, for cheap no-change verification.
    pub fn content_hash(&self) -> u64 {
        xxh3_64(self.text.as_bytes())
    }

    /// Leading whitespace of the line containing `offset`.
    ///
    /// This is the indentation the renderer re-uses so a replacement
    /// block stays visually aligned with the match site.
    pub fn indent_at(&self, offset: usize) -> &str {
        indent_at(&self.text, offset)
    }
}

/// Leading whitespace of the line containing `offset` in `text`.
pub fn indent_at(text: &str, offset: usize) -> &str {
    let offset = offset.min(text.len());
    let line_start = match text[..offset].rfind('\n') {
        Some(nl) => nl + 1,
        None => 0,
    };
    let line = &text[line_start..];
    let indent_len = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..indent_len]
}
