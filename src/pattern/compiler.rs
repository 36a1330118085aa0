use crate::pattern::segment::{Greediness, Placeholder, PlaceholderKind, Segment};
use std::collections::HashSet;
use thiserror::Error;

/// A compiled structural pattern: an ordered sequence of literal runs
/// and typed placeholders.
///
/// # Pattern syntax
///
/// ```text
/// path: '{route:expr}',          literal text with one expression slot
/// {body:block}                   balanced {...} / [...] / (...) block
/// [{entries:list}]               separator-splittable run
/// {_:gap}                        anonymous whitespace gap
/// {{ }}                          escaped literal braces
/// ```
///
/// Placeholders are `{name:kind}` with kinds `ident`, `expr`, `block`,
/// `list`, `gap`; `expr` and `list` accept a `:lazy` / `:greedy`
/// suffix. Compilation is pure and deterministic, so compiled patterns
/// are cached by source text (see [`crate::cache`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("unclosed placeholder at offset {offset}")]
    UnclosedPlaceholder { offset: usize },

    #[error("placeholder at offset {offset} has an empty name")]
    EmptyName { offset: usize },

    #[error("placeholder '{name}' at offset {offset} has no kind (expected '{{{name}:kind}}')")]
    MissingKind { name: String, offset: usize },

    #[error("unknown placeholder kind '{kind}' at offset {offset}{}", suggestion_suffix(.suggestion))]
    UnknownKind {
        kind: String,
        offset: usize,
        suggestion: Option<&'static str>,
    },

    #[error("'{name}' is not a variable-length placeholder and cannot take a greediness policy (offset {offset})")]
    InvalidGreediness { name: String, offset: usize },

    #[error("invalid greediness '{value}' at offset {offset} (expected 'lazy' or 'greedy')")]
    UnknownGreediness { value: String, offset: usize },

    #[error("'_' is reserved for anonymous gaps and cannot name a '{kind}' placeholder (offset {offset})")]
    ReservedName {
        kind: PlaceholderKind,
        offset: usize,
    },

    #[error("duplicate placeholder name '{name}' at offset {offset}")]
    DuplicatePlaceholder { name: String, offset: usize },

    #[error("pattern has no literal anchor segment")]
    NoLiteralAnchor,

    #[error("'{name}' placeholder at offset {offset} is not anchored by a literal segment")]
    UnanchoredPlaceholder { name: String, offset: usize },
}

fn suggestion_suffix(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

impl Pattern {
    /// Compile pattern source into segments, validating structure.
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let segments = parse_segments(source)?;
        validate(&segments, source)?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Index of the first literal segment (the primary scan anchor).
    ///
    /// Guaranteed to exist by validation.
    pub fn first_anchor(&self) -> usize {
        self.segments
            .iter()
            .position(|s| matches!(s, Segment::Literal(_)))
            .unwrap_or(0)
    }

    /// Names of captured placeholders, in pattern order.
    pub fn capture_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| s.as_placeholder())
            .filter(|p| p.is_captured())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Look up a captured placeholder by name.
    pub fn placeholder(&self, name: &str) -> Option<&Placeholder> {
        self.segments
            .iter()
            .filter_map(|s| s.as_placeholder())
            .find(|p| p.is_captured() && p.name == name)
    }
}

/// Parse the mixed literal/placeholder syntax into segments.
fn parse_segments(source: &str) -> Result<Vec<Segment>, PatternError> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut literal = String::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                literal.push('{');
                i += 2;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                literal.push('}');
                i += 2;
            }
            b'{' => {
                let close = source[i..]
                    .find('}')
                    .map(|rel| i + rel)
                    .ok_or(PatternError::UnclosedPlaceholder { offset: i })?;
                let placeholder = parse_placeholder(&source[i + 1..close], i)?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(placeholder));
                i = close + 1;
            }
            _ => {
                // Advance one whole char, not one byte
                let ch = source[i..].chars().next().expect("offset on char boundary");
                literal.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Parse the inside of `{...}`: `name:kind` or `name:kind:greediness`.
fn parse_placeholder(body: &str, offset: usize) -> Result<Placeholder, PatternError> {
    let mut parts = body.splitn(3, ':');
    let name = parts.next().unwrap_or("").trim();
    let kind_str = parts.next().map(str::trim);
    let greediness_str = parts.next().map(str::trim);

    if name.is_empty() {
        return Err(PatternError::EmptyName { offset });
    }

    let kind_str = kind_str.ok_or_else(|| PatternError::MissingKind {
        name: name.to_string(),
        offset,
    })?;

    let kind = PlaceholderKind::from_name(kind_str).ok_or_else(|| PatternError::UnknownKind {
        kind: kind_str.to_string(),
        offset,
        suggestion: nearest_kind(kind_str),
    })?;

    if name == "_" && kind != PlaceholderKind::Gap {
        return Err(PatternError::ReservedName { kind, offset });
    }

    let greediness = match greediness_str {
        None => default_greediness(kind),
        Some(value) => {
            if !kind.is_variable_length() {
                return Err(PatternError::InvalidGreediness {
                    name: name.to_string(),
                    offset,
                });
            }
            match value {
                "lazy" => Greediness::Lazy,
                "greedy" => Greediness::Greedy,
                other => {
                    return Err(PatternError::UnknownGreediness {
                        value: other.to_string(),
                        offset,
                    })
                }
            }
        }
    };

    Ok(Placeholder {
        name: name.to_string(),
        kind,
        greediness,
    })
}

/// Expressions stop at the first anchor; lists swallow consecutive
/// items up to the last viable anchor.
fn default_greediness(kind: PlaceholderKind) -> Greediness {
    match kind {
        PlaceholderKind::List => Greediness::Greedy,
        _ => Greediness::Lazy,
    }
}

/// Suggest the closest known kind for a typo'd kind name.
fn nearest_kind(input: &str) -> Option<&'static str> {
    PlaceholderKind::ALL
        .iter()
        .map(|k| (k.name(), strsim::normalized_levenshtein(input, k.name())))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name)
}

fn validate(segments: &[Segment], source: &str) -> Result<(), PatternError> {
    // Unique names among captured placeholders
    let mut seen: HashSet<&str> = HashSet::new();
    for segment in segments {
        if let Some(p) = segment.as_placeholder() {
            if p.name != "_" && !seen.insert(&p.name) {
                return Err(PatternError::DuplicatePlaceholder {
                    name: p.name.clone(),
                    offset: placeholder_offset(source, &p.name),
                });
            }
        }
    }

    // At least one literal anchor with visible content, otherwise a
    // pattern could match arbitrarily large stretches of any document
    let has_anchor = segments
        .iter()
        .filter_map(Segment::as_literal)
        .any(|text| text.chars().any(|c| !c.is_whitespace()));
    if !has_anchor {
        return Err(PatternError::NoLiteralAnchor);
    }

    let first_literal = segments
        .iter()
        .position(|s| matches!(s, Segment::Literal(_)))
        .expect("anchor checked above");

    // Structural placeholders must sit after the primary anchor so
    // anchor-first scanning only ever expands backwards across gaps
    // and identifiers
    for segment in &segments[..first_literal] {
        if let Some(p) = segment.as_placeholder() {
            if matches!(
                p.kind,
                PlaceholderKind::Expr | PlaceholderKind::List | PlaceholderKind::Block
            ) {
                return Err(PatternError::UnanchoredPlaceholder {
                    name: p.name.clone(),
                    offset: placeholder_offset(source, &p.name),
                });
            }
        }
    }

    // Every variable-length placeholder needs a terminating literal:
    // the next non-gap segment after it must be a literal
    for (idx, segment) in segments.iter().enumerate() {
        let Some(p) = segment.as_placeholder() else {
            continue;
        };
        if !p.kind.is_variable_length() {
            continue;
        }
        let next_non_gap = segments[idx + 1..].iter().find(|s| {
            !matches!(
                s.as_placeholder(),
                Some(Placeholder {
                    kind: PlaceholderKind::Gap,
                    ..
                })
            )
        });
        match next_non_gap {
            Some(Segment::Literal(_)) => {}
            _ => {
                return Err(PatternError::UnanchoredPlaceholder {
                    name: p.name.clone(),
                    offset: placeholder_offset(source, &p.name),
                });
            }
        }
    }

    Ok(())
}

/// Best-effort offset of a placeholder's opening brace in the source.
fn placeholder_offset(source: &str, name: &str) -> usize {
    source.find(&format!("{{{name}")).unwrap_or(0)
}
