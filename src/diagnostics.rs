use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
    return;
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::SeedNotFound { path } => render_seed_not_found(&path.display().to_string()),
        Error::ReferenceNotLocated { file, reference } => {
            render_reference_not_located(&file.display().to_string(), reference)
        },
        Error::OverlappingPatches { file } => render_overlapping_patches(&file.display().to_string()),
        _ => render_generic(e),
    };
}

fn render_generic(e: &Error) -> String {
    return match e {
        Error::NotADirectory { path } => format!("\
# Error: Not A Directory

`{}` is not a directory.

## Fix

Pass the directory that holds the maps, or a single map file.
", path.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::Json(e) => format!("\
# Error: JSON Output

{e}
"),
        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}

## Fix

Correct `.ditaref.toml`. Known keys: `include`, `exclude`, `report_limit`, `key_report_limit`.
"),
        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    };
}

fn render_overlapping_patches(file: &str) -> String {
    return format!("\
# Error: Overlapping Repairs

Two repairs in `{file}` cover the same bytes. The document was left unchanged.

## Fix

Repair the references in `{file}` by hand, then run:

    ditaref check <path>
");
}

fn render_reference_not_located(file: &str, reference: &str) -> String {
    return format!("\
# Error: Reference Not Located

The repair for `{reference}` could not find that text where `{file}` was scanned.
The document changed during the run or its record does not match its source.
The document was left unchanged.

## Fix

Run the command again on the current files.
");
}

fn render_seed_not_found(path: &str) -> String {
    return format!("\
# Error: Seed Not Found

`{path}` does not exist.

## Fix

Pass an existing map file, or a directory containing `.ditamap` files:

    ditaref check path/to/book.ditamap
");
}
