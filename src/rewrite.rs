//! The rewrite applier: pattern + template + target document composed
//! into one atomic, idempotent transformation.
//!
//! The pure core (`apply_text`) locates every non-overlapping
//! occurrence, renders each replacement at the indentation of its
//! match site, and rebuilds the document in one ascending pass.
//! The I/O shell (`apply`) adds the read-then-atomic-write discipline:
//! tempfile in the target directory, fsync, rename. A document whose
//! pattern does not occur is left byte-identical and reported as an
//! unchanged success.

use crate::cache;
use crate::document::{indent_at, Document, DocumentError};
use crate::locate::{locate_all, nearest_anchor_hint, LocateError, Match};
use crate::pattern::{Pattern, PatternError, PlaceholderKind};
use crate::render::{ListRender, RenderError, Template};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One pattern/template binding, stateless and re-executable.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pattern: Pattern,
    template: Template,
    lists: BTreeMap<String, ListRender>,
}

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("'{name}' is not a list placeholder in the pattern")]
    NotAList { name: String },

    #[error(
        "rendered output still matches the pattern at offset {offset}; \
         re-running this rewrite would change the document again"
    )]
    Reentrant { offset: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-rewrite diagnostic surfaced alongside results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Pattern did not occur; the no-op success case.
    NoMatch,
    /// A document line resembles the pattern anchor but does not match.
    NearMiss,
    /// A span was rewritten.
    Rewrote,
}

/// Outcome of the pure text transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the transformed text is returned, not applied in place"]
pub struct TextRewrite {
    pub changed: bool,
    pub output: String,
    /// Replaced spans in the output text, ascending.
    pub spans: Vec<(usize, usize)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of applying a rewrite to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteResult should be checked for changed/unchanged"]
pub struct RewriteResult {
    pub file: PathBuf,
    pub changed: bool,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl Rewrite {
    /// Compile a pattern/template pair into a rewrite.
    ///
    /// Template references are checked against the pattern here, so a
    /// mismatch surfaces before any document is read.
    pub fn new(pattern_source: &str, template_source: &str) -> Result<Self, RewriteError> {
        let pattern = cache::get_or_compile(pattern_source)?;
        let template = Template::compile(template_source)?;
        template.check_against(&pattern)?;
        Ok(Self {
            pattern,
            template,
            lists: BTreeMap::new(),
        })
    }

    /// Attach a list re-rendering configuration to a `list`
    /// placeholder.
    pub fn with_list(
        mut self,
        name: impl Into<String>,
        list: ListRender,
    ) -> Result<Self, RewriteError> {
        let name = name.into();
        match self.pattern.placeholder(&name) {
            Some(p) if p.kind == PlaceholderKind::List => {
                self.lists.insert(name, list);
                Ok(self)
            }
            _ => Err(RewriteError::NotAList { name }),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Transform `text`, rewriting every non-overlapping occurrence.
    ///
    /// Pure: no I/O, re-executable. `changed: false` either means the
    /// pattern did not occur (with a NoMatch diagnostic, possibly a
    /// NearMiss hint) or every occurrence already reads exactly as the
    /// template renders it.
    pub fn apply_text(&self, text: &str) -> Result<TextRewrite, RewriteError> {
        let matches = locate_all(text, &self.pattern)?;

        if matches.is_empty() {
            let mut diagnostics = vec![Diagnostic {
                kind: DiagnosticKind::NoMatch,
                message: "pattern does not occur; document left unchanged".to_string(),
                offset: None,
            }];
            if let Some(miss) = nearest_anchor_hint(text, &self.pattern) {
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::NearMiss,
                    message: format!(
                        "line {} resembles the pattern anchor ({:.0}% similar); \
                         has the target drifted?",
                        miss.line,
                        miss.similarity * 100.0
                    ),
                    offset: Some(miss.offset),
                });
            }
            return Ok(TextRewrite {
                changed: false,
                output: text.to_string(),
                spans: Vec::new(),
                diagnostics,
            });
        }

        // Render every replacement against the original text, then
        // rebuild the document in one ascending pass; spans are
        // recorded in output coordinates
        let mut replacements: Vec<(&Match, String)> = Vec::with_capacity(matches.len());
        for m in &matches {
            let indent = indent_at(text, m.byte_start);
            let rendered = self.template.render(&m.captures, &self.lists, indent)?;
            replacements.push((m, rendered));
        }

        let mut output = String::with_capacity(text.len());
        let mut changed = false;
        let mut spans = Vec::new();
        let mut diagnostics = Vec::new();
        let mut copied_to = 0;
        for (m, rendered) in &replacements {
            output.push_str(&text[copied_to..m.byte_start]);
            if *rendered == m.slice(text) {
                output.push_str(m.slice(text));
            } else {
                let start = output.len();
                output.push_str(rendered);
                spans.push((start, output.len()));
                changed = true;
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::Rewrote,
                    message: format!(
                        "replaced {} bytes with {} bytes",
                        m.byte_end - m.byte_start,
                        rendered.len()
                    ),
                    offset: Some(start),
                });
            }
            copied_to = m.byte_end;
        }
        output.push_str(&text[copied_to..]);

        if changed {
            self.check_reentrant(&output, &spans)?;
        }

        Ok(TextRewrite {
            changed,
            output,
            spans,
            diagnostics,
        })
    }

    /// A rewrite is only safe to re-run if its own output no longer
    /// matches the pattern. The original scripts skipped this check
    /// and could ping-pong; here a self-matching replacement is a
    /// hard error.
    fn check_reentrant(&self, output: &str, spans: &[(usize, usize)]) -> Result<(), RewriteError> {
        for m in locate_all(output, &self.pattern)? {
            let overlaps = spans
                .iter()
                .any(|&(start, end)| m.byte_start < end && start < m.byte_end);
            if overlaps {
                return Err(RewriteError::Reentrant {
                    offset: m.byte_start,
                });
            }
        }
        Ok(())
    }

    /// Apply this rewrite to a file on disk.
    ///
    /// NotFound is a no-op success that never touches storage; a
    /// change is written via tempfile + fsync + atomic rename so a
    /// crash mid-write cannot leave a partial document.
    pub fn apply(&self, path: impl AsRef<Path>) -> Result<RewriteResult, RewriteError> {
        let path = path.as_ref();
        let document = Document::load(path)?;
        let text_rewrite = self.apply_text(document.text())?;

        if !text_rewrite.changed {
            return Ok(RewriteResult {
                file: path.to_path_buf(),
                changed: false,
                bytes_before: document.len(),
                bytes_after: document.len(),
                diagnostics: text_rewrite.diagnostics,
            });
        }

        atomic_write(path, text_rewrite.output.as_bytes()).map_err(|source| {
            RewriteError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Ok(RewriteResult {
            file: path.to_path_buf(),
            changed: true,
            bytes_before: document.len(),
            bytes_after: text_rewrite.output.len(),
            diagnostics: text_rewrite.diagnostics,
        })
    }
}

/// Atomic file write: tempfile in the same directory + fsync + rename.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    // Touch mtime so file watchers and incremental builds notice
    filetime::set_file_mtime(path, filetime::FileTime::now())?;

    Ok(())
}
