//! Integration tests for the rewrite engine core
//!
//! Exercises the full compile -> locate -> extract -> render -> splice
//! pipeline over in-memory documents and real files.

use patchweave::capture::ExtractError;
use patchweave::locate::LocateError;
use patchweave::pattern::{Pattern, PatternError};
use patchweave::render::ListRender;
use patchweave::rewrite::{Rewrite, RewriteError};
use patchweave::{locate, Document};
use std::fs;
use tempfile::TempDir;

const FLAT_RESULTS: &str = "// results: flat\nconst results = [{path:\"/r/2024\"},{path:\"/r/2023\"},{path:\"/r/2022\"}];\n";

fn grouping_rewrite() -> Rewrite {
    let pattern = "// results: flat\nconst results = [{entries:list}];";
    let template =
        "const results = [{{ label: \"Results\", children: [\n  {entries}\n] }}];";
    Rewrite::new(pattern, template)
        .unwrap()
        .with_list(
            "entries",
            ListRender {
                separator: ",".to_string(),
                item_template: "{item}".to_string(),
                join: ",\n  ".to_string(),
            },
        )
        .unwrap()
}

#[test]
fn groups_repeated_entries_into_one_parent() {
    let rewrite = grouping_rewrite();
    let result = rewrite.apply_text(FLAT_RESULTS).unwrap();

    assert!(result.changed);
    assert_eq!(
        result.output,
        "const results = [{ label: \"Results\", children: [\n  \
         {path:\"/r/2024\"},\n  {path:\"/r/2023\"},\n  {path:\"/r/2022\"}\n] }];\n"
    );

    // Exactly one top-level grouped entry, children in original order
    assert_eq!(result.output.matches("children:").count(), 1);
    let p2024 = result.output.find("/r/2024").unwrap();
    let p2023 = result.output.find("/r/2023").unwrap();
    let p2022 = result.output.find("/r/2022").unwrap();
    assert!(p2024 < p2023 && p2023 < p2022);
}

#[test]
fn grouping_is_idempotent() {
    let rewrite = grouping_rewrite();
    let first = rewrite.apply_text(FLAT_RESULTS).unwrap();
    assert!(first.changed);

    // The marker comment is gone, so the pattern no longer occurs
    let second = rewrite.apply_text(&first.output).unwrap();
    assert!(!second.changed);
    assert_eq!(second.output, first.output);
}

#[test]
fn block_capture_spans_nested_braces() {
    // A lazy regex would truncate the capture at the first inner `}`
    let text = "const theme = { light: { fg: 1 }, dark: { fg: 0 } };\nrest();\n";
    let rewrite = Rewrite::new("const theme = {cfg:block};", "const theme = presets.dark;")
        .unwrap();
    let result = rewrite.apply_text(text).unwrap();

    assert!(result.changed);
    assert_eq!(result.output, "const theme = presets.dark;\nrest();\n");
}

#[test]
fn absent_pattern_leaves_bytes_untouched() {
    let rewrite = Rewrite::new("path: '{route:expr}',", "path: '/all',").unwrap();
    let before = Document::from_text("mem", "completely unrelated content\n");
    let result = rewrite.apply_text(before.text()).unwrap();

    assert!(!result.changed);
    let after = Document::from_text("mem", result.output);
    assert_eq!(after.content_hash(), before.content_hash());
}

#[test]
fn duplicate_placeholder_fails_before_any_document_is_read() {
    let err = Rewrite::new("a = {v:expr}; b = {v:expr};", "swapped").unwrap_err();
    assert!(matches!(
        err,
        RewriteError::Pattern(PatternError::DuplicatePlaceholder { .. })
    ));
}

#[test]
fn bytes_outside_the_span_are_byte_identical() {
    let before = format!("prefix();\n{}suffix();\n", FLAT_RESULTS);
    let result = grouping_rewrite().apply_text(&before).unwrap();

    assert!(result.changed);
    assert!(result.output.starts_with("prefix();\n"));
    assert!(result.output.ends_with("suffix();\n"));
}

#[test]
fn list_captures_round_trip_through_render() {
    let pattern = Pattern::compile("nav = [{items:list}];").unwrap();
    let text = "nav = [{p:\"/a\"},{p:\"/b\"},{p:\"/c\"}];";
    let m = locate(text, &pattern, 0).unwrap().unwrap();
    let original = m.captures.text("items").unwrap().to_string();

    // Splice the capture verbatim into an identically shaped document
    let rendered = format!("nav = [{}];", original);
    let again = locate(&rendered, &pattern, 0).unwrap().unwrap();
    assert_eq!(again.captures.text("items"), Some(original.as_str()));
}

#[test]
fn apply_rewrites_file_atomically() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("results.ts");
    fs::write(&target, FLAT_RESULTS).unwrap();

    let rewrite = grouping_rewrite();
    let result = rewrite.apply(&target).unwrap();
    assert!(result.changed);
    assert_eq!(result.bytes_before, FLAT_RESULTS.len());

    let on_disk = fs::read_to_string(&target).unwrap();
    assert_eq!(on_disk.len(), result.bytes_after);
    assert!(on_disk.contains("children:"));

    // Second application reports unchanged and does not rewrite
    let second = rewrite.apply(&target).unwrap();
    assert!(!second.changed);
    assert_eq!(fs::read_to_string(&target).unwrap(), on_disk);
}

#[test]
fn failed_rewrite_leaves_file_unchanged() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("broken.ts");
    // The block opener is never closed
    fs::write(&target, "const theme = { light: { fg: 1 ;\n").unwrap();

    let rewrite = Rewrite::new("const theme = {cfg:block};", "const theme = presets.dark;")
        .unwrap();
    let err = rewrite.apply(&target).unwrap_err();
    assert!(matches!(err, RewriteError::Locate(_)));
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "const theme = { light: { fg: 1 ;\n"
    );
}

#[test]
fn broken_list_content_fails_instead_of_reporting_no_match() {
    // Anchor and closing bracket are both present but the entries
    // between them are delimiter-broken; that must surface as an
    // error, not a quiet "nothing to do"
    let rewrite = Rewrite::new("nav = [{items:list}];", "nav = grouped();")
        .unwrap()
        .with_list("items", ListRender::default())
        .unwrap();
    let err = rewrite.apply_text("prefix(); nav = [a, {b];").unwrap_err();
    match err {
        RewriteError::Locate(LocateError::List(ExtractError::MalformedList {
            offset, ..
        })) => assert_eq!(offset, 22),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn self_matching_template_is_rejected() {
    // The rendered output would still satisfy the pattern, so a rerun
    // would keep growing the document
    let rewrite = Rewrite::new("count: {v:expr},", "count: next({v}),").unwrap();
    let err = rewrite.apply_text("{ count: 3, }").unwrap_err();
    assert!(matches!(err, RewriteError::Reentrant { .. }));
}
