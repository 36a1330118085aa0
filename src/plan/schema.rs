use crate::render::ListRender;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// A rewrite plan: metadata plus an ordered list of rewrite
/// definitions, typically loaded from a TOML file.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RewritePlan {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rewrites: Vec<RewriteDefinition>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolve targets against the --root directory rather than as
    /// literal paths.
    #[serde(default)]
    pub target_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewriteDefinition {
    pub id: String,
    pub target: String,
    /// Inline pattern source; exactly one of `pattern` /
    /// `pattern_file` must be set.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub pattern_file: Option<String>,
    /// Inline template source; exactly one of `template` /
    /// `template_file` must be set.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub template_file: Option<String>,
    /// Per-placeholder list re-rendering, keyed by placeholder name.
    #[serde(default)]
    pub lists: BTreeMap<String, ListRenderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListRenderConfig {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_item_template")]
    pub item_template: String,
    #[serde(default = "default_join")]
    pub join: String,
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_item_template() -> String {
    "{item}".to_string()
}

fn default_join() -> String {
    ",\n".to_string()
}

impl Default for ListRenderConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            item_template: default_item_template(),
            join: default_join(),
        }
    }
}

impl From<&ListRenderConfig> for ListRender {
    fn from(config: &ListRenderConfig) -> Self {
        ListRender {
            separator: config.separator.clone(),
            item_template: config.item_template.clone(),
            join: config.join.clone(),
        }
    }
}

impl RewritePlan {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rewrites.is_empty() {
            issues.push(ValidationIssue::EmptyPlan);
        }

        let mut seen_ids = std::collections::HashSet::new();
        for rewrite in &self.rewrites {
            if rewrite.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rewrite_id: None,
                    field: "id",
                });
            } else if !seen_ids.insert(rewrite.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    rewrite_id: rewrite.id.clone(),
                });
            }
            if rewrite.target.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rewrite_id: Some(rewrite.id.clone()),
                    field: "target",
                });
            }

            match (&rewrite.pattern, &rewrite.pattern_file) {
                (None, None) => issues.push(ValidationIssue::MissingField {
                    rewrite_id: Some(rewrite.id.clone()),
                    field: "pattern",
                }),
                (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                    rewrite_id: Some(rewrite.id.clone()),
                    message: "pattern and pattern_file are mutually exclusive".to_string(),
                }),
                _ => {}
            }
            match (&rewrite.template, &rewrite.template_file) {
                (None, None) => issues.push(ValidationIssue::MissingField {
                    rewrite_id: Some(rewrite.id.clone()),
                    field: "template",
                }),
                (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                    rewrite_id: Some(rewrite.id.clone()),
                    message: "template and template_file are mutually exclusive".to_string(),
                }),
                _ => {}
            }

            for (name, list) in &rewrite.lists {
                if list.separator.is_empty() {
                    issues.push(ValidationIssue::InvalidCombo {
                        rewrite_id: Some(rewrite.id.clone()),
                        message: format!("list '{name}' has an empty separator"),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPlan,
    MissingField {
        rewrite_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        rewrite_id: Option<String>,
        message: String,
    },
    DuplicateId {
        rewrite_id: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPlan => write!(f, "plan contains no rewrites"),
            ValidationIssue::MissingField { rewrite_id, field } => match rewrite_id {
                Some(id) => write!(f, "rewrite '{id}' missing required field '{field}'"),
                None => write!(f, "rewrite missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo {
                rewrite_id,
                message,
            } => match rewrite_id {
                Some(id) => write!(f, "rewrite '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid rewrite configuration: {message}"),
            },
            ValidationIssue::DuplicateId { rewrite_id } => {
                write!(f, "duplicate rewrite id '{rewrite_id}'")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str) -> RewriteDefinition {
        RewriteDefinition {
            id: id.to_string(),
            target: "src/app.tsx".to_string(),
            pattern: Some("x = {v:expr};".to_string()),
            pattern_file: None,
            template: Some("y = {v};".to_string()),
            template_file: None,
            lists: BTreeMap::new(),
        }
    }

    #[test]
    fn valid_plan_passes() {
        let plan = RewritePlan {
            meta: Metadata::default(),
            rewrites: vec![definition("a"), definition("b")],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn empty_plan_rejected() {
        let err = RewritePlan::default().validate().unwrap_err();
        assert!(matches!(err.issues[0], ValidationIssue::EmptyPlan));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let plan = RewritePlan {
            meta: Metadata::default(),
            rewrites: vec![definition("same"), definition("same")],
        };
        let err = plan.validate().unwrap_err();
        assert!(err
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::DuplicateId { .. })));
    }

    #[test]
    fn pattern_and_pattern_file_are_exclusive() {
        let mut def = definition("x");
        def.pattern_file = Some("p.pat".to_string());
        let plan = RewritePlan {
            meta: Metadata::default(),
            rewrites: vec![def],
        };
        let err = plan.validate().unwrap_err();
        assert!(err
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::InvalidCombo { .. })));
    }

    #[test]
    fn missing_template_rejected() {
        let mut def = definition("x");
        def.template = None;
        let plan = RewritePlan {
            meta: Metadata::default(),
            rewrites: vec![def],
        };
        let err = plan.validate().unwrap_err();
        assert!(err.issues.iter().any(|i| matches!(
            i,
            ValidationIssue::MissingField {
                field: "template",
                ..
            }
        )));
    }
}
