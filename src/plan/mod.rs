//! Declarative rewrite plans: TOML schema, loading/validation, and a
//! runner that applies every rewrite of a plan in order.

pub mod loader;
pub mod runner;
pub mod schema;

pub use loader::{load_from_path, load_from_str, PlanError};
pub use runner::{apply_plan, check_plan, RewriteOutcome, RunError};
pub use schema::{ListRenderConfig, Metadata, RewriteDefinition, RewritePlan, ValidationError};
