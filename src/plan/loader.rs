use crate::plan::schema::{RewritePlan, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("failed to read plan from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse plan TOML{}: {source}", origin_suffix(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid plan{}: {source}", origin_suffix(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn origin_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

impl PlanError {
    /// Attach the originating file to a path-less parse or validation
    /// error.
    fn at(mut self, origin: &Path) -> Self {
        if let PlanError::Toml { path, .. } | PlanError::Validation { path, .. } = &mut self {
            path.get_or_insert_with(|| origin.to_path_buf());
        }
        self
    }
}

pub fn load_from_str(input: &str) -> Result<RewritePlan, PlanError> {
    let plan: RewritePlan =
        toml_edit::de::from_str(input).map_err(|source| PlanError::Toml { path: None, source })?;
    plan.validate()
        .map_err(|source| PlanError::Validation { path: None, source })?;
    Ok(plan)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RewritePlan, PlanError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.at(path))
}
