//! Integration tests for the CLI
//!
//! Tests the command-line interface for run, plan, and check commands

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Helper to create a target tree with a plans/ directory
fn setup_root() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::write(
        dir.path().join("app.ts"),
        "// banner: old\nconst banner = 'welcome';\n",
    )
    .unwrap();

    let plans_dir = dir.path().join("plans");
    fs::create_dir(&plans_dir).unwrap();
    fs::write(
        plans_dir.join("banner.toml"),
        r#"[meta]
name = "banner"
target_relative = true

[[rewrites]]
id = "retire-banner"
target = "app.ts"
pattern = '''
// banner: old
const banner = '{text:expr}';'''
template = "const banner = greeting('{text}');"
"#,
    )
    .unwrap();

    dir
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_patchweave"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn run_help() {
    let output = run_cli(&["run", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pattern-file"));
    assert!(stdout.contains("template-file"));
}

#[test]
fn run_rewrites_target() {
    let dir = TempDir::new().unwrap();
    let pattern = dir.path().join("p.pat");
    let template = dir.path().join("t.tmpl");
    let target = dir.path().join("app.ts");
    fs::write(&pattern, "// banner: old\nconst banner = '{text:expr}';").unwrap();
    fs::write(&template, "const banner = greeting('{text}');").unwrap();
    fs::write(&target, "// banner: old\nconst banner = 'welcome';\n").unwrap();

    let output = run_cli(&[
        "run",
        "--pattern-file",
        pattern.to_str().unwrap(),
        "--template-file",
        template.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "const banner = greeting('welcome');\n"
    );
}

#[test]
fn run_dry_run_leaves_target_alone() {
    let dir = TempDir::new().unwrap();
    let pattern = dir.path().join("p.pat");
    let template = dir.path().join("t.tmpl");
    let target = dir.path().join("app.ts");
    fs::write(&pattern, "const banner = '{text:expr}';").unwrap();
    fs::write(&template, "const banner = shout('{text}');").unwrap();
    fs::write(&target, "const banner = 'welcome';\n").unwrap();

    let output = run_cli(&[
        "run",
        "--pattern-file",
        pattern.to_str().unwrap(),
        "--template-file",
        template.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
        "--dry-run",
        "--diff",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("would rewrite"));
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "const banner = 'welcome';\n"
    );
}

#[test]
fn run_exits_nonzero_on_bad_pattern() {
    let dir = TempDir::new().unwrap();
    let pattern = dir.path().join("p.pat");
    let template = dir.path().join("t.tmpl");
    let target = dir.path().join("app.ts");
    // Duplicate placeholder name
    fs::write(&pattern, "a = {v:expr}; b = {v:expr};").unwrap();
    fs::write(&template, "swapped").unwrap();
    fs::write(&target, "a = 1; b = 2;").unwrap();

    let output = run_cli(&[
        "run",
        "--pattern-file",
        pattern.to_str().unwrap(),
        "--template-file",
        template.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
}

#[test]
fn run_respects_another_processes_lock() {
    // `run` takes the advisory lock for the whole read-report-write
    // window; while a peer holds it, the rewrite must not proceed
    let dir = TempDir::new().unwrap();
    let pattern = dir.path().join("p.pat");
    let template = dir.path().join("t.tmpl");
    let target = dir.path().join("app.ts");
    fs::write(&pattern, "const banner = '{text:expr}';").unwrap();
    fs::write(&template, "const banner = shout('{text}');").unwrap();
    fs::write(&target, "const banner = 'welcome';\n").unwrap();
    fs::write(dir.path().join("app.ts.pweave.lock"), "").unwrap();

    let output = run_cli(&[
        "run",
        "--pattern-file",
        pattern.to_str().unwrap(),
        "--template-file",
        template.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("locked"));
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "const banner = 'welcome';\n"
    );
}

#[test]
fn plan_applies_discovered_plans() {
    let root = setup_root();

    let output = run_cli(&["plan", "--root", root.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Loading plan"));
    assert!(stdout.contains("retire-banner"));
    assert!(stdout.contains("Summary:"));
    assert_eq!(
        fs::read_to_string(root.path().join("app.ts")).unwrap(),
        "const banner = greeting('welcome');\n"
    );
}

#[test]
fn plan_is_idempotent_across_invocations() {
    let root = setup_root();
    let root_arg = root.path().to_str().unwrap().to_string();

    let first = run_cli(&["plan", "--root", &root_arg]);
    assert!(first.status.success());
    let after_first = fs::read_to_string(root.path().join("app.ts")).unwrap();

    let second = run_cli(&["plan", "--root", &root_arg]);
    assert!(second.status.success());
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("Unchanged"));
    assert_eq!(
        fs::read_to_string(root.path().join("app.ts")).unwrap(),
        after_first
    );
}

#[test]
fn plan_dry_run_writes_nothing() {
    let root = setup_root();

    let output = run_cli(&[
        "plan",
        "--root",
        root.path().to_str().unwrap(),
        "--dry-run",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would rewrite"));
    assert_eq!(
        fs::read_to_string(root.path().join("app.ts")).unwrap(),
        "// banner: old\nconst banner = 'welcome';\n"
    );
}

#[test]
fn check_reports_pending_then_settled() {
    let root = setup_root();
    let root_arg = root.path().to_str().unwrap().to_string();

    let pending = run_cli(&["check", "--root", &root_arg]);
    assert!(pending.status.success());
    assert!(String::from_utf8_lossy(&pending.stdout).contains("PENDING"));

    let apply = run_cli(&["plan", "--root", &root_arg]);
    assert!(apply.status.success());

    let settled = run_cli(&["check", "--root", &root_arg]);
    assert!(settled.status.success());
    assert!(String::from_utf8_lossy(&settled.stdout).contains("SETTLED"));
}

#[test]
fn plan_without_plan_files_fails_with_message() {
    let dir = TempDir::new().unwrap();
    let missing = PathBuf::from(dir.path()).join("empty");
    fs::create_dir(&missing).unwrap();

    let output = run_cli(&["plan", "--root", missing.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No .toml plan files"));
}
