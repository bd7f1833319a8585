//! CLI commands for ditaref: check, fix, unused, ids, keys, keywords.

use std::path::Path;
use std::process::ExitCode;

use crate::audit::{self, Audit, BrokenReference, Mode};
use crate::config::Config;
use crate::crawler::{self, Inventory};
use crate::diagnostics;
use crate::error;
use crate::repair::{RepairOutcome, Unrepairable};
use crate::reports;

/// Exit code for broken references that all have a repair.
const EXIT_REPAIRABLE: u8 = 1;

/// Exit code for runtime failures.
pub const EXIT_RUNTIME: u8 = 3;

/// Exit code for problems that need a human.
const EXIT_UNREPAIRABLE: u8 = 2;

/// JSON shape of a `check` run.
#[derive(serde::Serialize)]
struct CheckReport<'a> {
    /// Findings of the audit pass.
    #[serde(flatten)]
    audit: &'a Audit,
    /// External references met while crawling; never validated.
    external: &'a [String],
}

/// Output format for `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Machine-readable report on stdout.
    Json,
    /// One line per broken reference.
    Text,
}

/// Crawl from the seed and report every broken reference with the repair the
/// engine would make. Nothing is written.
///
/// # Errors
///
/// Returns errors from config loading, seed validation, enumeration, or JSON output.
pub fn check(seed: &Path, format: Format) -> Result<ExitCode, error::Error> {
    let config = Config::load(Path::new("."))?;
    let inventory = crawler::crawl_from(seed)?;
    let unreached = crawler::unreached_records(&inventory, &crawler::seed_root(seed), &config)?;
    let report = audit::audit(&inventory, &unreached, Mode::DryRun);

    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&CheckReport { audit: &report, external: &inventory.external })?;
            println!("{json}");
        },
        Format::Text => print_check_report(&report, &inventory, &config),
    }

    print_failures(&report);
    return Ok(exit_code(&report));
}

/// What the repair engine proposes for one broken reference.
fn describe_outcome(broken: &BrokenReference) -> String {
    return match &broken.outcome {
        RepairOutcome::Repaired(result) => {
            format!("fix: `{}` -> `{}` ({:?})", result.old_reference, result.new_reference, result.heuristic)
        },
        RepairOutcome::Unrepairable(Unrepairable::Ambiguous { locations }) => {
            let places: Vec<String> = locations.iter().map(|l| return display_path(l)).collect();
            format!("unfixable: found in {} places: {}", locations.len(), places.join(", "))
        },
        RepairOutcome::Unrepairable(Unrepairable::FileNotFound) => "unfixable: no file of that name".to_string(),
        RepairOutcome::Unrepairable(Unrepairable::Unresolved) => "unfixable: no repair resolves".to_string(),
    };
}

/// Relative form of `path` for display, when it lies under the working directory.
fn display_path(path: &Path) -> String {
    let shown = std::env::current_dir()
        .ok()
        .and_then(|cwd| return path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| return path.to_path_buf());
    return shown.display().to_string();
}

/// Exit code priority: runtime failure (3) > unrepairable (2) > unapplied repair (1) > clean (0).
fn exit_code(report: &Audit) -> ExitCode {
    if !report.failures.is_empty() {
        return ExitCode::from(EXIT_RUNTIME);
    }
    if report.unrepairable() > 0 {
        return ExitCode::from(EXIT_UNREPAIRABLE);
    }
    let pending = report
        .broken
        .iter()
        .any(|b| return matches!(&b.outcome, RepairOutcome::Repaired(r) if !r.applied));
    if pending {
        return ExitCode::from(EXIT_REPAIRABLE);
    }
    return ExitCode::SUCCESS;
}

/// Crawl from the seed, apply every repair with one rewrite per document,
/// and print a markdown report of what was fixed and what could not be.
///
/// # Errors
///
/// Returns errors from config loading, seed validation, or enumeration.
pub fn fix(seed: &Path) -> Result<ExitCode, error::Error> {
    let config = Config::load(Path::new("."))?;
    let inventory = crawler::crawl_from(seed)?;
    let unreached = crawler::unreached_records(&inventory, &crawler::seed_root(seed), &config)?;
    let report = audit::audit(&inventory, &unreached, Mode::Write);

    if report.broken.is_empty() {
        eprintln!("All {} references valid, nothing to fix.", report.checked);
    } else {
        print_fix_report(&report, &config);
    }

    print_failures(&report);
    return Ok(exit_code(&report));
}

/// List topic ids declared by more than one section.
///
/// # Errors
///
/// Returns `Error::SeedNotFound` if the seed does not exist.
pub fn ids(seed: &Path) -> Result<ExitCode, error::Error> {
    let inventory = crawler::crawl_from(seed)?;
    let duplicates = reports::duplicate_topic_ids(&inventory);

    for (id, files) in &duplicates {
        println!("DUPLICATE  {id} ({} sections)", files.len());
        for file in files {
            println!("  - {}", display_path(file));
        }
    }

    if duplicates.is_empty() {
        eprintln!("No duplicate topic ids");
        return Ok(ExitCode::SUCCESS);
    }
    println!();
    println!("{} duplicate topic ids", duplicates.len());
    return Ok(ExitCode::from(EXIT_UNREPAIRABLE));
}

/// List defined keys and every key reference whose key is undefined.
///
/// # Errors
///
/// Returns errors from config loading or seed validation.
pub fn keys(seed: &Path) -> Result<ExitCode, error::Error> {
    let config = Config::load(Path::new("."))?;
    let inventory = crawler::crawl_from(seed)?;

    if inventory.keys.is_empty() {
        eprintln!("No keys defined");
    }
    for (key, target) in inventory.keys.iter() {
        println!("KEY        {key} -> {target}");
    }

    let undefined = audit::undefined_keys(&inventory);
    print_undefined_keys(&undefined, config.key_report_limit);

    println!();
    println!("{} keys defined, {} undefined key references", inventory.keys.len(), undefined.len());
    if undefined.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    return Ok(ExitCode::from(EXIT_UNREPAIRABLE));
}

/// Print every keyword with the documents that declare it.
///
/// # Errors
///
/// Returns `Error::SeedNotFound` if the seed does not exist.
pub fn keywords(seed: &Path) -> Result<ExitCode, error::Error> {
    let inventory = crawler::crawl_from(seed)?;
    let index = reports::keyword_index(&inventory);

    for (keyword, files) in &index {
        println!("{keyword}");
        for file in files {
            println!("  - {}", display_path(file));
        }
    }
    if index.is_empty() {
        eprintln!("No keywords declared");
    }
    return Ok(ExitCode::SUCCESS);
}

/// One line per broken reference, bounded by `report_limit`, then a summary.
fn print_check_report(report: &Audit, inventory: &Inventory, config: &Config) {
    if !report.undefined_keys.is_empty() {
        print_undefined_keys(&report.undefined_keys, config.key_report_limit);
        println!();
    }

    for broken in report.broken.iter().take(config.report_limit) {
        println!(
            "BROKEN  {}  {}=\"{}\" ({})",
            display_path(&broken.referrer),
            broken.attribute,
            broken.raw,
            broken.reason.describe()
        );
        println!("        {}", describe_outcome(broken));
    }
    print_truncation(report.broken.len(), config.report_limit);

    if report.broken.is_empty() {
        println!(
            "All {} references resolve across {} documents",
            report.checked,
            inventory.scanned.len()
        );
        return;
    }
    println!();
    println!(
        "{} broken, {} repairable, {} unrepairable",
        report.broken.len(),
        report.repairable(),
        report.unrepairable()
    );
    if report.repairable() > 0 {
        eprintln!();
        eprintln!("hint: run `ditaref fix <path>` to apply the repairs");
    }
    return;
}

/// Report logic inconsistencies and failed rewrites as diagnostics.
fn print_failures(report: &Audit) {
    for failure in &report.failures {
        diagnostics::print_error(failure);
    }
    return;
}

/// Print a markdown summary of fix results.
fn print_fix_report(report: &Audit, config: &Config) {
    let (fixed, unfixable): (Vec<&BrokenReference>, Vec<&BrokenReference>) = report
        .broken
        .iter()
        .partition(|b| return matches!(&b.outcome, RepairOutcome::Repaired(r) if r.applied));

    if !fixed.is_empty() {
        eprintln!("## Fixed\n");
        for broken in fixed.iter().take(config.report_limit) {
            if let RepairOutcome::Repaired(result) = &broken.outcome {
                eprintln!(
                    "- {}  `{}` -> `{}`",
                    display_path(&broken.referrer),
                    result.old_reference,
                    result.new_reference
                );
            }
        }
        print_truncation(fixed.len(), config.report_limit);
        eprintln!();
    }

    if !unfixable.is_empty() {
        eprintln!("## Unfixable\n");
        for broken in unfixable.iter().take(config.report_limit) {
            eprintln!(
                "- {}  `{}` ({}; {})",
                display_path(&broken.referrer),
                broken.raw,
                broken.reason.describe(),
                describe_outcome(broken)
            );
        }
        print_truncation(unfixable.len(), config.report_limit);
        eprintln!();
    }

    eprintln!(
        "{} fixed in {} documents, {} unfixable",
        fixed.len(),
        report.written.len(),
        unfixable.len()
    );
    return;
}

/// Note how many entries a bounded listing left out.
fn print_truncation(total: usize, limit: usize) {
    if total > limit {
        println!("... and {} more", total.saturating_sub(limit));
    }
    return;
}

/// Undefined key references, bounded by `limit`.
fn print_undefined_keys(undefined: &[audit::UndefinedKey], limit: usize) {
    for problem in undefined.iter().take(limit) {
        println!("UNDEFINED  {}  keyref=\"{}\"", display_path(&problem.referrer), problem.key_ref);
    }
    print_truncation(undefined.len(), limit);
    return;
}

/// List structured documents and images no map reaches, within the
/// directories the maps do reach.
///
/// # Errors
///
/// Returns errors from config loading, seed validation, or enumeration.
pub fn unused(seed: &Path) -> Result<ExitCode, error::Error> {
    let config = Config::load(Path::new("."))?;
    let inventory = crawler::crawl_from(seed)?;
    let root = crawler::seed_root(seed);

    let files = crawler::enumerate_files(&root, &config)?;
    let unused = reports::unused_files(&inventory, &files);
    for file in &unused {
        println!("UNUSED  {}", display_path(file));
    }

    if unused.is_empty() {
        eprintln!("All {} files under {} are reached", files.len(), root.display());
        return Ok(ExitCode::SUCCESS);
    }
    println!();
    println!("{} of {} files unused", unused.len(), files.len());
    return Ok(ExitCode::from(EXIT_UNREPAIRABLE));
}
