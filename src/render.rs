//! Replacement rendering: a template plus captures produces the new
//! span text.
//!
//! Templates use the same brace conventions as patterns, but slots are
//! plain named references (`{name}`) rather than typed placeholders.
//! Indentation is never hardcoded in a template: the indent detected
//! from the first line of the matched span is appended after every
//! template-authored newline, so the rendered block lines up with its
//! surroundings wherever the match sits.

use crate::capture::{split_items, Capture, Captures, ExtractError};
use crate::pattern::Pattern;
use std::collections::BTreeMap;
use thiserror::Error;

/// A compiled replacement template: literal runs and capture
/// references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<TemplateSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    Literal(String),
    Reference(String),
}

/// How a `list` capture reference is re-rendered.
///
/// Each extracted item is run through `item_template` (which may
/// reference `{item}` and the 1-based `{index}`) and the results are
/// joined with `join`. Without a `ListRender` for its name, a list
/// capture is spliced verbatim like any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRender {
    /// Separator used to split the captured list into items.
    pub separator: String,
    pub item_template: String,
    pub join: String,
}

impl Default for ListRender {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            item_template: "{item}".to_string(),
            join: ",\n".to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("unclosed reference at offset {offset}")]
    UnclosedReference { offset: usize },

    #[error("reference at offset {offset} has an empty name")]
    EmptyReference { offset: usize },

    #[error("template references '{name}', which the pattern does not capture")]
    MissingCapture { name: String },

    #[error(transparent)]
    List(#[from] ExtractError),
}

impl Template {
    /// Compile template source. `{{` / `}}` escape literal braces,
    /// `{name}` references a capture.
    pub fn compile(source: &str) -> Result<Self, RenderError> {
        let segments = parse_template(source)?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names referenced by this template, in order of first use.
    pub fn reference_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for segment in &self.segments {
            if let TemplateSegment::Reference(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }
        names
    }

    /// Verify every reference is captured by `pattern`, so a
    /// pattern/template mismatch surfaces before any document is read.
    pub fn check_against(&self, pattern: &Pattern) -> Result<(), RenderError> {
        for name in self.reference_names() {
            if pattern.placeholder(name).is_none() {
                return Err(RenderError::MissingCapture {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Render the replacement text from `captures`.
    ///
    /// `indent` is the leading whitespace of the line containing the
    /// match; `lists` maps list placeholder names to their re-rendering
    /// configuration.
    pub fn render(
        &self,
        captures: &Captures,
        lists: &BTreeMap<String, ListRender>,
        indent: &str,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => push_indented(&mut out, text, indent),
                TemplateSegment::Reference(name) => {
                    let capture =
                        captures
                            .get(name)
                            .ok_or_else(|| RenderError::MissingCapture {
                                name: name.clone(),
                            })?;
                    match lists.get(name) {
                        Some(list) => {
                            let rendered = render_list(capture, list, indent)?;
                            out.push_str(&rendered);
                        }
                        // Capture text is spliced verbatim: it already
                        // carries its original indentation
                        None => out.push_str(&capture.text),
                    }
                }
            }
        }
        Ok(out)
    }
}

fn render_list(capture: &Capture, list: &ListRender, indent: &str) -> Result<String, RenderError> {
    let item_template = Template::compile(&list.item_template)?;
    // Splitting reports offsets relative to the capture text; rebase
    // them onto the document before surfacing
    let items = split_items(&capture.text, &list.separator).map_err(|error| match error {
        ExtractError::MalformedList { offset, reason } => ExtractError::MalformedList {
            offset: capture.byte_start + offset,
            reason,
        },
    })?;

    let mut out = String::new();
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            push_indented(&mut out, &list.join, indent);
        }
        for segment in &item_template.segments {
            match segment {
                TemplateSegment::Literal(text) => push_indented(&mut out, text, indent),
                TemplateSegment::Reference(name) => match name.as_str() {
                    "item" => out.push_str(item),
                    "index" => out.push_str(&(idx + 1).to_string()),
                    other => {
                        return Err(RenderError::MissingCapture {
                            name: other.to_string(),
                        })
                    }
                },
            }
        }
    }
    Ok(out)
}

/// Append `text`, re-indenting template-authored newlines to the
/// match site. Blank template lines stay blank.
fn push_indented(out: &mut String, text: &str, indent: &str) {
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        out.push(ch);
        if ch == '\n' && chars.peek() != Some(&'\n') {
            out.push_str(indent);
        }
    }
}

fn parse_template(source: &str) -> Result<Vec<TemplateSegment>, RenderError> {
    let mut segments = Vec::new();
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
                    .ok_or(RenderError::UnclosedReference { offset: i })?;
                let name = source[i + 1..close].trim();
                if name.is_empty() {
                    return Err(RenderError::EmptyReference { offset: i });
                }
                if !literal.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(TemplateSegment::Reference(name.to_string()));
                i = close + 1;
            }
            _ => {
                let ch = source[i..].chars().next().expect("offset on char boundary");
                literal.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    if !literal.is_empty() {
        segments.push(TemplateSegment::Literal(literal));
    }

    Ok(segments)
}
