//! Patchweave: pattern-based source rewriting
//!
//! A lightweight rewrite engine that finds code by structural pattern
//! rather than regex, and replaces it from a template, with
//! delimiter-aware matching for brace/bracket/paren languages.
//!
//! # Architecture
//!
//! Every transformation flows through one pipeline: a [`Pattern`] is
//! compiled from `{name:kind}` syntax, located in a document by literal
//! anchors plus balance-aware placeholder matching, its captures fed to
//! a [`Template`], and the rendered spans spliced back atomically.
//! Intelligence lives in pattern location, not in the splice.
//!
//! # Safety
//!
//! - Bytes outside matched spans are never touched
//! - Atomic file writes (tempfile + fsync + rename)
//! - UTF-8 validation on load
//! - A rewrite whose output still matches its own pattern is rejected,
//!   so successful rewrites are always idempotent
//!
//! # Example
//!
//! ```no_run
//! use patchweave::Rewrite;
//!
//! let rewrite = Rewrite::new(
//!     "path: '{route:expr}',",
//!     "path: '/all',",
//! )?;
//!
//! match rewrite.apply("src/Sidebar.tsx") {
//!     Ok(result) if result.changed => println!("rewrote {}", result.file.display()),
//!     Ok(_) => println!("nothing to do"),
//!     Err(e) => eprintln!("rewrite failed: {}", e),
//! }
//! # Ok::<(), patchweave::RewriteError>(())
//! ```

pub mod cache;
pub mod capture;
pub mod document;
pub mod locate;
pub mod lock;
pub mod pattern;
pub mod plan;
pub mod render;
pub mod rewrite;

mod scan;

// Re-exports
pub use capture::{Capture, Captures, ExtractError};
pub use document::{Document, DocumentError};
pub use locate::{locate, locate_all, LocateError, Match, NearMiss};
pub use lock::{LockError, LockFile};
pub use pattern::{Greediness, Pattern, PatternError, Placeholder, PlaceholderKind, Segment};
pub use plan::{
    apply_plan, check_plan, load_from_path, load_from_str, PlanError, RewriteOutcome, RewritePlan,
    RunError,
};
pub use render::{ListRender, RenderError, Template};
pub use rewrite::{Diagnostic, DiagnosticKind, Rewrite, RewriteError, RewriteResult, TextRewrite};
