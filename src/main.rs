use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use patchweave::lock::LockFile;
use patchweave::plan::{apply_plan, check_plan, load_from_path, RewriteOutcome, RunError};
use patchweave::rewrite::{DiagnosticKind, Rewrite};
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "patchweave")]
#[command(about = "Pattern-based source rewriting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a single pattern/template rewrite to one file
    Run {
        /// File containing the pattern source
        #[arg(short, long)]
        pattern_file: PathBuf,

        /// File containing the template source
        #[arg(short = 't', long)]
        template_file: PathBuf,

        /// Target file to rewrite
        #[arg(long)]
        target: PathBuf,

        /// Dry run - show what would change without modifying the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Apply rewrite plans (TOML files)
    Plan {
        /// Specific plan file to apply (otherwise applies all in plans/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Root directory for relative targets (defaults to cwd)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Dry run - show what would change without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check whether plans would change anything, without writing
    Check {
        /// Specific plan file to check (otherwise checks all in plans/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Root directory for relative targets (defaults to cwd)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pattern_file,
            template_file,
            target,
            dry_run,
            diff,
        } => cmd_run(&pattern_file, &template_file, &target, dry_run, diff),

        Commands::Plan {
            plan,
            root,
            dry_run,
            diff,
        } => cmd_plan(plan, root, dry_run, diff),

        Commands::Check { plan, root } => cmd_check(plan, root),
    }
}

/// Collect every `.toml` plan under `<root>/plans`, in name order.
fn discover_plan_files(root: &Path) -> Result<Vec<PathBuf>> {
    let plans_dir = root.join("plans");

    let mut files: Vec<PathBuf> = WalkDir::new(&plans_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("toml"))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .toml plan files found in {}", plans_dir.display());
    }
    Ok(files)
}

fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    match cli_root {
        Some(path) => Ok(path.canonicalize()?),
        None => Ok(env::current_dir()?),
    }
}

/// Print the changed hunks (with two lines of context) between the
/// target's original and rewritten content.
fn print_diff(file: &Path, original: &str, rewritten: &str) {
    println!("\n{}", format!("rewrite {}", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, rewritten);
    let mut unified = diff.unified_diff();
    unified.context_radius(2);

    for hunk in unified.iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            match change.tag() {
                ChangeTag::Delete => print!("{}", format!("-{}", change).red()),
                ChangeTag::Insert => print!("{}", format!("+{}", change).green()),
                ChangeTag::Equal => print!(" {}", change),
            }
        }
    }
}

fn cmd_run(
    pattern_file: &Path,
    template_file: &Path,
    target: &Path,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let pattern = fs::read_to_string(pattern_file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", pattern_file.display()))?;
    let template = fs::read_to_string(template_file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", template_file.display()))?;

    let rewrite = Rewrite::new(&pattern, &template)?;

    // Hold the advisory lock across the whole read-report-write window
    // so the printed diff describes the write that follows it.
    let _lock = if dry_run {
        None
    } else {
        Some(LockFile::acquire(target)?)
    };

    let before = fs::read_to_string(target)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", target.display()))?;

    let result = rewrite.apply_text(&before)?;

    for diagnostic in &result.diagnostics {
        match diagnostic.kind {
            DiagnosticKind::NoMatch => {
                println!("{} {}", "⊙".yellow(), diagnostic.message);
            }
            DiagnosticKind::NearMiss => {
                println!("{} {}", "?".yellow(), diagnostic.message.dimmed());
            }
            DiagnosticKind::Rewrote => {
                println!("{} {}", "✓".green(), diagnostic.message);
            }
        }
    }

    if !result.changed {
        println!("{} {}: nothing to do", "⊙".yellow(), target.display());
        return Ok(());
    }

    if show_diff {
        print_diff(target, &before, &result.output);
    }

    if dry_run {
        println!(
            "{} {}: would rewrite ({} -> {} bytes)",
            "✓".green(),
            target.display(),
            before.len(),
            result.output.len()
        );
        return Ok(());
    }

    let applied = rewrite.apply(target)?;
    println!(
        "{} {}: rewrote ({} -> {} bytes)",
        "✓".green(),
        applied.file.display(),
        applied.bytes_before,
        applied.bytes_after
    );

    Ok(())
}

fn cmd_plan(
    plan: Option<PathBuf>,
    root: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let root = resolve_root(root)?;

    let plan_files = if let Some(path) = plan {
        vec![path]
    } else {
        discover_plan_files(&root)?
    };

    println!("Root: {}", root.display());
    println!();

    let mut total_rewritten = 0;
    let mut total_unchanged = 0;
    let mut total_failed = 0;

    for plan_file in plan_files {
        println!("Loading plan from {}...", plan_file.display());

        let plan = load_from_path(&plan_file)?;
        let plan_dir = plan_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Capture target contents before applying, for diff output
        let mut contents_before: HashMap<PathBuf, String> = HashMap::new();
        if show_diff || dry_run {
            let targets: std::collections::HashSet<PathBuf> = plan
                .rewrites
                .iter()
                .map(|r| {
                    if plan.meta.target_relative {
                        root.join(&r.target)
                    } else {
                        PathBuf::from(&r.target)
                    }
                })
                .collect();
            for target in targets {
                if let Ok(content) = fs::read_to_string(&target) {
                    contents_before.insert(target, content);
                }
            }
        }

        let results = if dry_run {
            println!("{}", "  [DRY RUN - nothing will be written]".cyan());
            check_plan(&plan, &root, &plan_dir)
        } else {
            apply_plan(&plan, &root, &plan_dir)
        };

        for (rewrite_id, result) in results {
            match result {
                Ok(RewriteOutcome::Rewritten {
                    ref file,
                    bytes_before,
                    bytes_after,
                }) => {
                    let verb = if dry_run { "Would rewrite" } else { "Rewrote" };
                    println!(
                        "{} {}: {} {} ({} -> {} bytes)",
                        "✓".green(),
                        rewrite_id,
                        verb,
                        file.display(),
                        bytes_before,
                        bytes_after
                    );
                    total_rewritten += 1;

                    if show_diff && !dry_run {
                        if let Some(before) = contents_before.get(file) {
                            if let Ok(after) = fs::read_to_string(file) {
                                if before != &after {
                                    print_diff(file, before, &after);
                                }
                            }
                        }
                    }
                }
                Ok(RewriteOutcome::Unchanged { file, reason }) => {
                    println!(
                        "{} {}: Unchanged {} ({})",
                        "⊙".yellow(),
                        rewrite_id,
                        file.display(),
                        reason.dimmed()
                    );
                    total_unchanged += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: Error - {}", "✗".red(), rewrite_id, e);
                    total_failed += 1;

                    if let RunError::Rewrite(rewrite_err) = &e {
                        eprintln!("  Rewrite error: {}", rewrite_err);
                    }
                }
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} rewritten", format!("{}", total_rewritten).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(plan: Option<PathBuf>, root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;

    let plan_files = if let Some(path) = plan {
        vec![path]
    } else {
        discover_plan_files(&root)?
    };

    println!("{}", "Plan Status Report".bold());
    println!("Root: {}", root.display());
    println!();

    let mut pending = Vec::new();
    let mut settled = Vec::new();
    let mut failed = Vec::new();

    // Read-only; no target file is written
    for plan_file in plan_files {
        let plan = load_from_path(&plan_file)?;
        let plan_dir = plan_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let results = check_plan(&plan, &root, &plan_dir);

        for (rewrite_id, result) in results {
            match result {
                Ok(RewriteOutcome::Rewritten { .. }) => {
                    pending.push(rewrite_id);
                }
                Ok(RewriteOutcome::Unchanged { reason, .. }) => {
                    settled.push((rewrite_id, reason));
                }
                Err(e) => {
                    failed.push((rewrite_id, e.to_string()));
                }
            }
        }
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} rewrites)",
            "⊙".yellow(),
            "PENDING".yellow().bold(),
            pending.len()
        );
        for id in &pending {
            println!("  - {}", id);
        }
        println!();
    }

    if !settled.is_empty() {
        println!(
            "{} {} ({} rewrites)",
            "✓".green(),
            "SETTLED".green().bold(),
            settled.len()
        );
        for (id, reason) in &settled {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !failed.is_empty() {
        println!(
            "{} {} ({} rewrites)",
            "✗".red(),
            "FAILED".red().bold(),
            failed.len()
        );
        for (id, reason) in &failed {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
        std::process::exit(1);
    }

    Ok(())
}
