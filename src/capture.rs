use crate::scan::{BalanceState, Step};
use thiserror::Error;

/// One captured placeholder value: the byte span within the source
/// document plus the captured text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    pub byte_start: usize,
    pub byte_end: usize,
    pub text: String,
}

/// Ordered name → capture mapping for one match.
///
/// Keys are unique and iteration order equals pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    entries: Vec<Capture>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, capture: Capture) {
        debug_assert!(
            self.get(&capture.name).is_none(),
            "duplicate capture name slipped past pattern validation"
        );
        self.entries.push(capture);
    }

    pub fn get(&self, name: &str) -> Option<&Capture> {
        self.entries.iter().find(|c| c.name == name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capture> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("list capture is malformed at offset {offset}: {reason}")]
    MalformedList { offset: usize, reason: String },
}

/// Split a `list` capture into its items on top-level occurrences of
/// `separator`.
///
/// Separators inside nested delimiters or string literals do not
/// split; each item is trimmed of surrounding whitespace; a dangling
/// trailing separator yields no empty final item. Offsets in errors
/// are relative to `text` (the caller rebases them onto the document).
pub fn split_items<'a>(text: &'a str, separator: &str) -> Result<Vec<&'a str>, ExtractError> {
    assert!(!separator.is_empty(), "list separator must be non-empty");

    let mut items = Vec::new();
    let mut state = BalanceState::new();
    let mut item_start = 0;
    let mut offset = 0;

    while offset < text.len() {
        if state.is_clean() && text[offset..].starts_with(separator) {
            items.push(&text[item_start..offset]);
            offset += separator.len();
            item_start = offset;
            continue;
        }

        let ch = text[offset..].chars().next().expect("offset on boundary");
        match state.step(ch, offset) {
            Step::Ok => {}
            Step::Underflow { found, offset } => {
                return Err(ExtractError::MalformedList {
                    offset,
                    reason: format!("unmatched closing '{found}'"),
                });
            }
            Step::Mismatch {
                expected,
                found,
                offset,
            } => {
                return Err(ExtractError::MalformedList {
                    offset,
                    reason: format!("expected '{expected}' but found '{found}'"),
                });
            }
        }
        offset += ch.len_utf8();
    }

    if let Some((open, offset)) = state.unclosed_at() {
        return Err(ExtractError::MalformedList {
            offset,
            reason: format!("'{open}' is never closed"),
        });
    }

    items.push(&text[item_start..]);

    let mut items: Vec<&str> = items.into_iter().map(str::trim).collect();
    if items.last() == Some(&"") && items.len() > 1 {
        items.pop();
    }

    Ok(items)
}
