//! Plan execution: resolve each rewrite definition, then apply (or
//! dry-run) against its target with per-file advisory locking.
//!
//! Rewrites are executed strictly in declaration order; several
//! rewrites naming the same target each re-read the file, so every one
//! sees the previous one's output and captured offsets are never
//! reused across splices.

use crate::document::{Document, DocumentError};
use crate::lock::{LockError, LockFile};
use crate::plan::schema::{RewriteDefinition, RewritePlan};
use crate::rewrite::{Rewrite, RewriteError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result of running a single rewrite definition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteOutcome should be checked for success/failure"]
pub enum RewriteOutcome {
    /// The target was changed (or would be, in check mode).
    Rewritten {
        file: PathBuf,
        bytes_before: usize,
        bytes_after: usize,
    },
    /// Pattern absent or output identical; nothing written.
    Unchanged { file: PathBuf, reason: String },
}

impl fmt::Display for RewriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteOutcome::Rewritten {
                file,
                bytes_before,
                bytes_after,
            } => write!(
                f,
                "rewrote {} ({} -> {} bytes)",
                file.display(),
                bytes_before,
                bytes_after
            ),
            RewriteOutcome::Unchanged { file, reason } => {
                write!(f, "unchanged {}: {}", file.display(), reason)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Apply every rewrite of a plan. Returns per-id results in
/// declaration order.
///
/// `root` resolves relative targets when `meta.target_relative` is
/// set; `plan_dir` resolves `pattern_file` / `template_file` paths.
pub fn apply_plan(
    plan: &RewritePlan,
    root: &Path,
    plan_dir: &Path,
) -> Vec<(String, Result<RewriteOutcome, RunError>)> {
    plan.rewrites
        .iter()
        .map(|definition| {
            (
                definition.id.clone(),
                run_one(plan, definition, root, plan_dir, false),
            )
        })
        .collect()
}

/// Evaluate every rewrite of a plan without touching any target file.
///
/// `Rewritten` means "would be changed if applied".
pub fn check_plan(
    plan: &RewritePlan,
    root: &Path,
    plan_dir: &Path,
) -> Vec<(String, Result<RewriteOutcome, RunError>)> {
    plan.rewrites
        .iter()
        .map(|definition| {
            (
                definition.id.clone(),
                run_one(plan, definition, root, plan_dir, true),
            )
        })
        .collect()
}

fn run_one(
    plan: &RewritePlan,
    definition: &RewriteDefinition,
    root: &Path,
    plan_dir: &Path,
    check_only: bool,
) -> Result<RewriteOutcome, RunError> {
    let rewrite = build_rewrite(definition, plan_dir)?;
    let target = resolve_target(plan, definition, root);

    if check_only {
        let document = Document::load(&target)?;
        let result = rewrite.apply_text(document.text())?;
        return Ok(if result.changed {
            RewriteOutcome::Rewritten {
                file: target,
                bytes_before: document.len(),
                bytes_after: result.output.len(),
            }
        } else {
            RewriteOutcome::Unchanged {
                file: target,
                reason: unchanged_reason(&result.diagnostics),
            }
        });
    }

    let _lock = LockFile::acquire(&target)?;
    let result = rewrite.apply(&target)?;
    Ok(if result.changed {
        RewriteOutcome::Rewritten {
            file: result.file,
            bytes_before: result.bytes_before,
            bytes_after: result.bytes_after,
        }
    } else {
        RewriteOutcome::Unchanged {
            file: result.file,
            reason: unchanged_reason(&result.diagnostics),
        }
    })
}

/// Build the engine-level Rewrite from a plan definition, reading
/// pattern/template files relative to the plan's directory.
pub fn build_rewrite(
    definition: &RewriteDefinition,
    plan_dir: &Path,
) -> Result<Rewrite, RunError> {
    let pattern = resolve_source(
        definition.pattern.as_deref(),
        definition.pattern_file.as_deref(),
        plan_dir,
    )?;
    let template = resolve_source(
        definition.template.as_deref(),
        definition.template_file.as_deref(),
        plan_dir,
    )?;

    let mut rewrite = Rewrite::new(&pattern, &template)?;
    for (name, config) in &definition.lists {
        rewrite = rewrite.with_list(name.clone(), config.into())?;
    }
    Ok(rewrite)
}

fn resolve_source(
    inline: Option<&str>,
    file: Option<&str>,
    plan_dir: &Path,
) -> Result<String, RunError> {
    match (inline, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(rel)) => {
            let path = plan_dir.join(rel);
            fs::read_to_string(&path).map_err(|source| RunError::Io { path, source })
        }
        // Unreachable for validated plans
        (None, None) => Ok(String::new()),
    }
}

fn resolve_target(plan: &RewritePlan, definition: &RewriteDefinition, root: &Path) -> PathBuf {
    if plan.meta.target_relative {
        root.join(&definition.target)
    } else {
        PathBuf::from(&definition.target)
    }
}

fn unchanged_reason(diagnostics: &[crate::rewrite::Diagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| d.message.clone())
        .unwrap_or_else(|| "already in target form".to_string())
}
