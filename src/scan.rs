//! Balance-aware text scanning shared by the locator and the capture
//! extractor.
//!
//! Tracks nesting of `{}`, `[]` and `()` plus single/double/backtick
//! string literals with backslash escapes, so that placeholder
//! boundaries and list separators are only ever recognized at the top
//! nesting level of the scanned region.

pub(crate) fn closer_for(open: char) -> Option<char> {
    match open {
        '{' => Some('}'),
        '[' => Some(']'),
        '(' => Some(')'),
        _ => None,
    }
}

pub(crate) fn is_closer(ch: char) -> bool {
    matches!(ch, '}' | ']' | ')')
}

pub(crate) fn is_quote(ch: char) -> bool {
    matches!(ch, '\'' | '"' | '`')
}

/// What a single scan step observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Ordinary character, or a tracked open/close that kept the
    /// region well-formed.
    Ok,
    /// A closing delimiter with no matching opener in the scanned
    /// region; the region cannot extend past this point.
    Underflow { found: char, offset: usize },
    /// A closing delimiter that does not pair with the innermost open
    /// one (e.g. `( }`).
    Mismatch { expected: char, found: char, offset: usize },
}

/// Incremental nesting/string state over a scanned region.
#[derive(Debug, Clone, Default)]
pub(crate) struct BalanceState {
    /// Open delimiters: (expected closer, offset of the opener).
    stack: Vec<(char, usize)>,
    /// Inside a string literal: the quote char that closes it, plus
    /// the offset where it opened.
    string: Option<(char, usize)>,
    /// Previous char inside a string was a backslash.
    escaped: bool,
}

impl BalanceState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Outside any delimiter and any string.
    pub(crate) fn is_clean(&self) -> bool {
        self.stack.is_empty() && self.string.is_none()
    }

    /// Offset of the innermost unclosed opener or string quote, if any.
    pub(crate) fn unclosed_at(&self) -> Option<(char, usize)> {
        if let Some((quote, offset)) = self.string {
            return Some((quote, offset));
        }
        self.stack
            .last()
            .map(|&(closer, offset)| (open_for(closer), offset))
    }

    /// Advance over one character at `offset`.
    pub(crate) fn step(&mut self, ch: char, offset: usize) -> Step {
        if let Some((quote, _)) = self.string {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == quote {
                self.string = None;
            }
            return Step::Ok;
        }

        if is_quote(ch) {
            self.string = Some((ch, offset));
            return Step::Ok;
        }

        if let Some(closer) = closer_for(ch) {
            self.stack.push((closer, offset));
            return Step::Ok;
        }

        if is_closer(ch) {
            return match self.stack.pop() {
                Some((expected, _)) if expected == ch => Step::Ok,
                Some((expected, opener_offset)) => {
                    // Restore so the caller can still report the opener
                    self.stack.push((expected, opener_offset));
                    Step::Mismatch {
                        expected,
                        found: ch,
                        offset,
                    }
                }
                None => Step::Underflow { found: ch, offset },
            };
        }

        Step::Ok
    }
}

fn open_for(closer: char) -> char {
    match closer {
        '}' => '{',
        ']' => '[',
        ')' => '(',
        other => other,
    }
}

/// Scan a balanced block starting at `open_at` (which must hold an
/// opening delimiter) and return the end offset just past the matching
/// closer.
///
/// Returns the opener (and its offset) on failure: either the block is
/// never closed before `text` ends, or an inner delimiter mismatches.
pub(crate) fn scan_balanced(text: &str, open_at: usize) -> Result<usize, (char, usize)> {
    let open = text[open_at..]
        .chars()
        .next()
        .filter(|ch| closer_for(*ch).is_some())
        .ok_or_else(|| (text[open_at..].chars().next().unwrap_or('\0'), open_at))?;

    let mut state = BalanceState::new();
    for (rel, ch) in text[open_at..].char_indices() {
        let offset = open_at + rel;
        match state.step(ch, offset) {
            Step::Ok => {}
            Step::Underflow { .. } | Step::Mismatch { .. } => {
                return Err(state.unclosed_at().unwrap_or((open, open_at)));
            }
        }
        if state.is_clean() {
            return Ok(offset + ch.len_utf8());
        }
    }

    Err(state.unclosed_at().unwrap_or((open, open_at)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_block_with_nesting() {
        let text = "{ a: { b: [1, 2] }, c: (3) } tail";
        let end = scan_balanced(text, 0).unwrap();
        assert_eq!(&text[..end], "{ a: { b: [1, 2] }, c: (3) }");
    }

    #[test]
    fn braces_inside_strings_are_skipped() {
        let text = r#"{ label: "close} me", n: 1 }"#;
        let end = scan_balanced(text, 0).unwrap();
        assert_eq!(end, text.len());
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        let text = r#"{ s: 'it\'s {fine}' }"#;
        let end = scan_balanced(text, 0).unwrap();
        assert_eq!(end, text.len());
    }

    #[test]
    fn template_literal_contents_are_opaque() {
        let text = "{ cls: `a ${f(x)} b` }";
        let end = scan_balanced(text, 0).unwrap();
        assert_eq!(end, text.len());
    }

    #[test]
    fn unclosed_block_reports_innermost_opener() {
        let text = "{ a: [1, 2 }";
        let err = scan_balanced(text, 0).unwrap_err();
        assert_eq!(err, ('[', 5));
    }

    #[test]
    fn never_closed_reports_opener() {
        let err = scan_balanced("(a, b", 0).unwrap_err();
        assert_eq!(err, ('(', 0));
    }
}
