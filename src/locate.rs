//! Anchor-first pattern location.
//!
//! The locator never compiles a pattern into one flat expression.
//! It scans for occurrences of the pattern's first literal segment,
//! expands backwards across gap/identifier placeholders, then matches
//! the remaining segments forwards. Variable-length placeholders only
//! terminate at positions where the delimiter balance of their capture
//! is zero, which is what lets a `block` or `list` capture contain the
//! same delimiter that terminates it — the failure mode that breaks
//! naive non-greedy regex captures.

use crate::capture::{Capture, Captures, ExtractError};
use crate::pattern::{Greediness, Pattern, PlaceholderKind, Segment};
use crate::scan::{closer_for, scan_balanced, BalanceState, Step};
use thiserror::Error;

/// A located occurrence of a pattern: a contiguous byte span plus the
/// captures extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Starting byte offset (inclusive).
    pub byte_start: usize,
    /// Ending byte offset (exclusive).
    pub byte_end: usize,
    /// Captured placeholders, in pattern order.
    pub captures: Captures,
}

impl Match {
    /// The matched text within `text`.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.byte_start..self.byte_end]
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("'{open}' opened at offset {offset} is never closed before the document ends")]
    UnbalancedDelimiter { open: char, offset: usize },

    /// A `list` capture's terminator was anchored, but the content
    /// leading up to it is delimiter-broken and cannot be decomposed.
    #[error(transparent)]
    List(#[from] ExtractError),
}

/// Find the first occurrence of `pattern` in `text` at or after `from`.
///
/// `Ok(None)` is the normal negative result: the pattern simply does
/// not occur. Only structural failures (an unclosable `block`
/// delimiter, a delimiter-broken `list` interior) are errors.
pub fn locate(text: &str, pattern: &Pattern, from: usize) -> Result<Option<Match>, LocateError> {
    let segments = pattern.segments();
    let anchor_idx = pattern.first_anchor();
    let anchor = segments[anchor_idx]
        .as_literal()
        .expect("validated: first_anchor is a literal");

    let mut search = from.min(text.len());
    while let Some(rel) = text[search..].find(anchor) {
        let anchor_pos = search + rel;

        if let Some((start, leading)) =
            match_backward(text, &segments[..anchor_idx], anchor_pos, from)
        {
            if let Some((end, trailing)) = match_forward(text, &segments[anchor_idx..], anchor_pos)?
            {
                let mut captures = Captures::new();
                for capture in leading.into_iter().chain(trailing) {
                    captures.push(capture);
                }
                return Ok(Some(Match {
                    byte_start: start,
                    byte_end: end,
                    captures,
                }));
            }
        }

        let step = anchor
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        search = anchor_pos + step;
    }

    Ok(None)
}

/// Find every non-overlapping occurrence of `pattern`, in document
/// order. Each search resumes at the end of the previous match.
pub fn locate_all(text: &str, pattern: &Pattern) -> Result<Vec<Match>, LocateError> {
    let mut matches = Vec::new();
    let mut from = 0;
    while let Some(m) = locate(text, pattern, from)? {
        // Anchors are non-empty, so the span always advances
        from = m.byte_end;
        matches.push(m);
    }
    Ok(matches)
}

/// A near-miss hint for NotFound diagnostics: the document line most
/// similar to the pattern's primary anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    /// 1-based line number.
    pub line: usize,
    /// Byte offset of the line start.
    pub offset: usize,
    pub similarity: f64,
}

/// Scan for the line closest to the pattern's first literal anchor.
///
/// Used to explain a NotFound result ("did the anchor text drift?");
/// lines below 0.5 normalized similarity are not worth reporting.
pub fn nearest_anchor_hint(text: &str, pattern: &Pattern) -> Option<NearMiss> {
    let anchor = pattern.segments()[pattern.first_anchor()]
        .as_literal()?
        .trim();
    if anchor.is_empty() {
        return None;
    }

    let mut best: Option<NearMiss> = None;
    let mut offset = 0;
    for (idx, line) in text.lines().enumerate() {
        let similarity = strsim::normalized_levenshtein(anchor, line.trim());
        if similarity >= 0.5 && best.as_ref().map_or(true, |b| similarity > b.similarity) {
            best = Some(NearMiss {
                line: idx + 1,
                offset,
                similarity,
            });
        }
        offset += line.len() + 1;
    }
    best
}

fn is_gap_char(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Match the segments preceding the primary anchor, walking backwards
/// from `end`. Validation guarantees these are only gaps and
/// identifiers, both of which match deterministically in reverse.
fn match_backward(
    text: &str,
    segments: &[Segment],
    end: usize,
    min: usize,
) -> Option<(usize, Vec<Capture>)> {
    let mut pos = end;
    let mut captures = Vec::new();

    for segment in segments.iter().rev() {
        let placeholder = segment
            .as_placeholder()
            .expect("validated: no literal before the primary anchor");
        match placeholder.kind {
            PlaceholderKind::Gap => {
                while pos > min {
                    let prev = text[..pos].chars().next_back()?;
                    if !is_gap_char(prev) {
                        break;
                    }
                    pos -= prev.len_utf8();
                }
            }
            PlaceholderKind::Ident => {
                let ident_end = pos;
                while pos > min {
                    let prev = text[..pos].chars().next_back()?;
                    if !is_ident_char(prev) {
                        break;
                    }
                    pos -= prev.len_utf8();
                }
                if pos == ident_end {
                    return None;
                }
                let first = text[pos..].chars().next()?;
                if first.is_ascii_digit() {
                    return None;
                }
                captures.push(Capture {
                    name: placeholder.name.clone(),
                    byte_start: pos,
                    byte_end: ident_end,
                    text: text[pos..ident_end].to_string(),
                });
            }
            _ => return None,
        }
    }

    captures.reverse();
    Some((pos, captures))
}

/// Match `segments` forwards starting at `pos`.
///
/// Returns the end offset and captures on success, `None` when this
/// candidate position does not satisfy the pattern.
fn match_forward(
    text: &str,
    segments: &[Segment],
    pos: usize,
) -> Result<Option<(usize, Vec<Capture>)>, LocateError> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(Some((pos, Vec::new())));
    };

    match segment {
        Segment::Literal(lit) => {
            if text[pos..].starts_with(lit.as_str()) {
                match_forward(text, rest, pos + lit.len())
            } else {
                Ok(None)
            }
        }
        Segment::Placeholder(placeholder) => match placeholder.kind {
            PlaceholderKind::Gap => {
                // Absorb maximally, backtracking a char at a time in
                // case the following literal itself begins with
                // whitespace
                let mut end = pos
                    + text[pos..]
                        .find(|c: char| !is_gap_char(c))
                        .unwrap_or(text.len() - pos);
                loop {
                    if let Some(found) = match_forward(text, rest, end)? {
                        return Ok(Some(found));
                    }
                    if end == pos {
                        return Ok(None);
                    }
                    end -= text[..end]
                        .chars()
                        .next_back()
                        .map(char::len_utf8)
                        .unwrap_or(1);
                }
            }
            PlaceholderKind::Ident => {
                let end = pos
                    + text[pos..]
                        .find(|c: char| !is_ident_char(c))
                        .unwrap_or(text.len() - pos);
                if end == pos {
                    return Ok(None);
                }
                let first = text[pos..].chars().next().expect("non-empty ident run");
                if first.is_ascii_digit() {
                    return Ok(None);
                }
                attach(text, rest, placeholder.name.clone(), pos, end)
            }
            PlaceholderKind::Block => {
                let Some(open) = text[pos..].chars().next() else {
                    return Ok(None);
                };
                if closer_for(open).is_none() {
                    return Ok(None);
                }
                let end = scan_balanced(text, pos).map_err(|(open, offset)| {
                    LocateError::UnbalancedDelimiter { open, offset }
                })?;
                attach(text, rest, placeholder.name.clone(), pos, end)
            }
            PlaceholderKind::Expr | PlaceholderKind::List => {
                let scan = candidate_ends(text, pos, rest);
                let try_end = |end: usize| -> Result<Option<(usize, Vec<Capture>)>, LocateError> {
                    attach(text, rest, placeholder.name.clone(), pos, end)
                };
                match placeholder.greediness {
                    Greediness::Lazy => {
                        for end in scan.ends.iter().copied() {
                            if let Some(found) = try_end(end)? {
                                return Ok(Some(found));
                            }
                        }
                    }
                    Greediness::Greedy => {
                        for end in scan.ends.iter().copied().rev() {
                            if let Some(found) = try_end(end)? {
                                return Ok(Some(found));
                            }
                        }
                    }
                }
                // A list that found its terminator literal but no
                // balance-clean end has malformed content, not a
                // missing pattern. An expr in the same position stays
                // a plain non-match: its terminator may legitimately
                // belong to surrounding code.
                if placeholder.kind == PlaceholderKind::List && scan.ends.is_empty() {
                    if let Some(malformed) = scan.malformed {
                        return Err(LocateError::List(malformed));
                    }
                }
                Ok(None)
            }
        },
    }
}

/// Match `rest` after a placeholder capture ending at `end`, and
/// prepend the capture to the result.
fn attach(
    text: &str,
    rest: &[Segment],
    name: String,
    start: usize,
    end: usize,
) -> Result<Option<(usize, Vec<Capture>)>, LocateError> {
    match match_forward(text, rest, end)? {
        Some((fin, mut captures)) => {
            captures.insert(
                0,
                Capture {
                    name,
                    byte_start: start,
                    byte_end: end,
                    text: text[start..end].to_string(),
                },
            );
            Ok(Some((fin, captures)))
        }
        None => Ok(None),
    }
}

/// Result of scanning for variable-length capture ends.
struct CandidateScan {
    /// Viable end offsets, ascending.
    ends: Vec<usize>,
    /// The structural break that cut the scan short, if any.
    malformed: Option<ExtractError>,
}

/// Candidate end offsets for a variable-length capture starting at
/// `pos`, ascending.
///
/// A candidate must leave the capture delimiter-balanced and must be
/// followed (after any gap segments) by the terminating literal.
/// Candidates are found by enumerating occurrences of that literal
/// rather than walking positions one by one, so scanning stays linear
/// in the document.
fn candidate_ends(text: &str, pos: usize, rest: &[Segment]) -> CandidateScan {
    let mut gap_before_term = false;
    let mut term: Option<&str> = None;
    for segment in rest {
        match segment {
            Segment::Literal(lit) => {
                term = Some(lit);
                break;
            }
            Segment::Placeholder(p) if p.kind == PlaceholderKind::Gap => {
                gap_before_term = true;
            }
            Segment::Placeholder(_) => break,
        }
    }
    let Some(term) = term else {
        // Unreachable for validated patterns
        return CandidateScan {
            ends: Vec::new(),
            malformed: None,
        };
    };

    // Offsets where the capture-so-far is balanced and outside strings,
    // up to the first point the region becomes structurally invalid.
    // The break is remembered: a closer that stops the scan is normal
    // when it is the terminator itself, malformed when it leaves no
    // candidate behind.
    let mut clean_offsets = vec![pos];
    let mut limit = text.len();
    let mut malformed = None;
    let mut state = BalanceState::new();
    for (rel, ch) in text[pos..].char_indices() {
        let offset = pos + rel;
        match state.step(ch, offset) {
            Step::Ok => {}
            Step::Underflow { found, offset } => {
                malformed = Some(ExtractError::MalformedList {
                    offset,
                    reason: format!("unmatched closing '{found}'"),
                });
                limit = offset;
                break;
            }
            Step::Mismatch {
                expected,
                found,
                offset,
            } => {
                malformed = Some(ExtractError::MalformedList {
                    offset,
                    reason: format!("expected '{expected}' but found '{found}'"),
                });
                limit = offset;
                break;
            }
        }
        if state.is_clean() {
            clean_offsets.push(offset + ch.len_utf8());
        }
    }

    let mut candidates = Vec::new();
    let mut search = pos;
    let term_step = term.chars().next().map(char::len_utf8).unwrap_or(1);
    while let Some(rel) = text[search..].find(term) {
        let term_at = search + rel;
        if term_at > limit {
            break;
        }
        // The gap between capture and terminator absorbs whitespace
        // maximally, trimming the capture
        let mut end = term_at;
        if gap_before_term {
            while end > pos {
                let Some(prev) = text[..end].chars().next_back() else {
                    break;
                };
                if !is_gap_char(prev) {
                    break;
                }
                end -= prev.len_utf8();
            }
        }
        if end >= pos && end <= limit && clean_offsets.binary_search(&end).is_ok() {
            candidates.push(end);
        }
        search = term_at + term_step;
    }

    candidates.sort_unstable();
    candidates.dedup();
    CandidateScan {
        ends: candidates,
        malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(src: &str) -> Pattern {
        Pattern::compile(src).unwrap()
    }

    #[test]
    fn literal_only_pattern() {
        let p = pattern("hello");
        let m = locate("say hello twice: hello", &p, 0).unwrap().unwrap();
        assert_eq!((m.byte_start, m.byte_end), (4, 9));
        let m2 = locate("say hello twice: hello", &p, 9).unwrap().unwrap();
        assert_eq!(m2.byte_start, 17);
    }

    #[test]
    fn not_found_is_none() {
        let p = pattern("absent");
        assert_eq!(locate("nothing here", &p, 0).unwrap(), None);
    }

    #[test]
    fn expr_stops_at_anchor() {
        let p = pattern("path: '{route:expr}',");
        let m = locate("  path: '/results/2024',\n", &p, 0).unwrap().unwrap();
        assert_eq!(m.captures.text("route"), Some("/results/2024"));
    }

    #[test]
    fn block_captures_nested_braces() {
        // The captured block itself contains the delimiter that a
        // non-greedy regex would stop at
        let text = "const v = { a: { b: 1 }, c: 2 }; rest";
        let p = pattern("const v = {body:block};");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(m.captures.text("body"), Some("{ a: { b: 1 }, c: 2 }"));
        assert_eq!(m.slice(text), "const v = { a: { b: 1 }, c: 2 };");
    }

    #[test]
    fn block_with_conditional_braces() {
        let text = "render({ cls: isActive ? { on: 1 } : { off: 0 } })";
        let p = pattern("render({cfg:block})");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(
            m.captures.text("cfg"),
            Some("{ cls: isActive ? { on: 1 } : { off: 0 } }")
        );
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let text = "const v = { a: [1, 2 ;";
        let p = pattern("const v = {body:block};");
        let err = locate(text, &p, 0).unwrap_err();
        assert!(matches!(
            err,
            LocateError::UnbalancedDelimiter { open: '[', offset: 15 }
        ));
    }

    #[test]
    fn list_is_greedy_across_items() {
        let text = r#"items = [{p:"/a"},{p:"/b"},{p:"/c"}];"#;
        let p = pattern("items = [{entries:list}];");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(
            m.captures.text("entries"),
            Some(r#"{p:"/a"},{p:"/b"},{p:"/c"}"#)
        );
    }

    #[test]
    fn list_candidate_cannot_split_nested_bracket() {
        // The `]` terminator also appears inside a nested array; the
        // capture must not end there
        let text = "rows = [[1, 2], [3, 4]];";
        let p = pattern("rows = [{entries:list}];");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(m.captures.text("entries"), Some("[1, 2], [3, 4]"));
    }

    #[test]
    fn unbalanced_list_interior_is_an_error() {
        // The anchor and terminator are both present, but the list
        // content between them is delimiter-broken; silently treating
        // this as not-found would hide the damage
        let text = "prefix(); nav = [a, {b];";
        let p = pattern("nav = [{items:list}];");
        let err = locate(text, &p, 0).unwrap_err();
        match err {
            LocateError::List(ExtractError::MalformedList { offset, .. }) => {
                assert_eq!(offset, 22);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stray_closer_in_list_interior_is_an_error() {
        let text = "nav = [a}b];";
        let p = pattern("nav = [{items:list}];");
        assert!(matches!(
            locate(text, &p, 0),
            Err(LocateError::List(ExtractError::MalformedList { offset: 8, .. }))
        ));
    }

    #[test]
    fn missing_list_terminator_is_not_found() {
        // No terminator anywhere: the pattern is absent, not malformed
        let text = "nav = [a, b";
        let p = pattern("nav = [{items:list}];");
        assert_eq!(locate(text, &p, 0).unwrap(), None);
    }

    #[test]
    fn unbalanced_expr_stays_a_plain_non_match() {
        // The expr terminator `;` here belongs to code the pattern
        // does not describe; that is a non-match, not broken content
        let text = "f(x = a);";
        let p = pattern("x = {v:expr}; done");
        assert_eq!(locate(text, &p, 0).unwrap(), None);
    }

    #[test]
    fn gap_absorbs_whitespace_without_capturing() {
        let text = "key   :\n    value;";
        let p = pattern("key{_:gap}:{_:gap}value;");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(m.slice(text), text);
        assert!(m.captures.is_empty());
    }

    #[test]
    fn ident_before_anchor_expands_backwards() {
        let text = "let counter = 0;";
        let p = pattern("{name:ident} = {value:expr};");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(m.captures.text("name"), Some("counter"));
        assert_eq!(m.captures.text("value"), Some("0"));
        assert_eq!(m.byte_start, 4);
    }

    #[test]
    fn captures_come_back_in_pattern_order() {
        let text = "fn apply(a, b) { a + b }";
        let p = pattern("fn {name:ident}({args:list}) {body:block}");
        let m = locate(text, &p, 0).unwrap().unwrap();
        let names: Vec<_> = m.captures.names().collect();
        assert_eq!(names, vec!["name", "args", "body"]);
        assert_eq!(m.captures.text("body"), Some("{ a + b }"));
    }

    #[test]
    fn gap_between_list_and_terminator_trims_capture() {
        let text = "[\n  a,\n  b\n]";
        let p = pattern("[{_:gap}{items:list}{_:gap}]");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(m.captures.text("items"), Some("a,\n  b"));
    }

    #[test]
    fn locate_all_is_non_overlapping_and_ordered() {
        let text = "x=1; x=2; x=3;";
        let p = pattern("x={v:expr};");
        let matches = locate_all(text, &p).unwrap();
        assert_eq!(matches.len(), 3);
        let values: Vec<_> = matches
            .iter()
            .map(|m| m.captures.text("v").unwrap())
            .collect();
        assert_eq!(values, vec!["1", "2", "3"]);
        for pair in matches.windows(2) {
            assert!(pair[0].byte_end <= pair[1].byte_start);
        }
    }

    #[test]
    fn from_offset_skips_earlier_matches() {
        let text = "x=1; x=2;";
        let p = pattern("x={v:expr};");
        let m = locate(text, &p, 4).unwrap().unwrap();
        assert_eq!(m.captures.text("v"), Some("2"));
    }

    #[test]
    fn multibyte_text_matches_on_char_boundaries() {
        let text = "label: 'café ✓', next";
        let p = pattern("label: '{v:expr}',");
        let m = locate(text, &p, 0).unwrap().unwrap();
        assert_eq!(m.captures.text("v"), Some("café ✓"));
        assert!(text.is_char_boundary(m.byte_start));
        assert!(text.is_char_boundary(m.byte_end));
    }

    #[test]
    fn near_miss_hint_finds_drifted_anchor() {
        let text = "alpha\n  path: '/resuls/2024',\nomega";
        let p = pattern("path: '/results/2024',");
        let hint = nearest_anchor_hint(text, &p).unwrap();
        assert_eq!(hint.line, 2);
        assert!(hint.similarity > 0.8);
    }

    #[test]
    fn near_miss_hint_absent_for_unrelated_text() {
        let p = pattern("path: '/results/2024',");
        assert_eq!(nearest_anchor_hint("zzz\nqqq\n", &p), None);
    }
}
