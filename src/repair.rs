//! Heuristic repair of broken references and in-place source patching.
//!
//! Three heuristics run in a fixed order and each one re-resolves its
//! candidate before accepting it:
//!
//! 1. swap the file extension between `.dita`/`.ditamap` and `.xml`;
//! 2. relocate to the only directory that holds a file of that name;
//! 3. substitute the topic id of that uniquely named file.
//!
//! A repair never guesses between several same-named files.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Error;
use crate::grammar;
use crate::index::ResolutionIndex;
use crate::reference::{Reference, parse_reference, serialize_reference};
use crate::resolver::resolve_normalized;
use crate::types::{DocumentRecord, OutgoingRef};

/// Which heuristic produced a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// The target was moved to another directory.
    DirectoryRelocation,
    /// The target exists under the other structured-document extension.
    ExtensionSwap,
    /// The target file's only topic has a different id.
    TopicSubstitution,
}

/// Why no repair was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unrepairable {
    /// Several files share the name; the engine refuses to pick one.
    Ambiguous {
        /// Every file with the referenced name.
        locations: Vec<PathBuf>,
    },
    /// No file with the referenced name exists anywhere in the inventory.
    FileNotFound,
    /// A unique candidate file exists but no heuristic made the reference resolve.
    Unresolved,
}

/// A replacement reference that resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairResult {
    /// Whether the replacement has been written to the document.
    pub applied: bool,
    /// Heuristic that found the replacement.
    pub heuristic: Heuristic,
    /// Replacement reference text.
    pub new_reference: String,
    /// Reference text as currently written.
    pub old_reference: String,
    /// Byte range of the old text in the referrer's source.
    #[serde(skip)]
    pub span: Range<usize>,
}

impl RepairResult {
    /// The source patch that applies this repair.
    pub fn patch(&self) -> Patch {
        return Patch {
            expected: self.old_reference.clone(),
            range: self.span.clone(),
            replacement: self.new_reference.clone(),
        };
    }
}

/// Result of one repair attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    /// No heuristic applied; the reference is left as is.
    Unrepairable(Unrepairable),
    /// A heuristic found a resolving replacement.
    Repaired(RepairResult),
}

/// One textual substitution in a document's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Text that must currently occupy `range`.
    pub expected: String,
    /// Byte range to replace.
    pub range: Range<usize>,
    /// Text to put in its place.
    pub replacement: String,
}

/// All patches for one document, applied together in a single rewrite.
#[derive(Debug, Clone)]
pub struct PatchSet {
    file: PathBuf,
    patches: Vec<Patch>,
}

impl PatchSet {
    /// Apply every patch to `source`, right to left.
    ///
    /// # Errors
    ///
    /// Returns `Error::OverlappingPatches` if two patches share bytes, or
    /// `Error::ReferenceNotLocated` if a patch's expected text is not at its range.
    pub fn apply(&self, source: &str) -> Result<String, Error> {
        let mut ordered: Vec<&Patch> = self.patches.iter().collect();
        ordered.sort_by_key(|p| return (p.range.start, p.range.end));
        ordered.dedup();

        for pair in ordered.windows(2) {
            if let [first, second] = pair
                && first.range.end > second.range.start
            {
                return Err(Error::OverlappingPatches { file: self.file.clone() });
            }
        }

        let mut out = source.to_string();
        for patch in ordered.iter().rev() {
            if source.get(patch.range.clone()) != Some(patch.expected.as_str()) {
                return Err(Error::ReferenceNotLocated {
                    file: self.file.clone(),
                    reference: patch.expected.clone(),
                });
            }
            out.replace_range(patch.range.clone(), &patch.replacement);
        }
        return Ok(out);
    }

    /// Whether no patch has been added.
    pub fn is_empty(&self) -> bool {
        return self.patches.is_empty();
    }

    /// Number of patches.
    pub fn len(&self) -> usize {
        return self.patches.len();
    }

    /// An empty patch set for `file`.
    pub const fn new(file: PathBuf) -> Self {
        return Self { file, patches: Vec::new() };
    }

    /// Queue a patch.
    pub fn push(&mut self, patch: Patch) {
        self.patches.push(patch);
        return;
    }

    /// Read the document, apply every patch, and write it back once.
    /// Nothing is written if any patch fails to apply.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on read/write failure, or the errors of [`PatchSet::apply`].
    pub fn write(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        let source = std::fs::read_to_string(&self.file)?;
        let patched = self.apply(&source)?;
        std::fs::write(&self.file, patched)?;
        tracing::info!(file = %self.file.display(), changes = self.len(), "rewrote document");
        return Ok(());
    }
}

/// Try to repair a broken reference written in `referrer`.
///
/// # Errors
///
/// Returns `Error::ReferenceNotLocated` if `referrer` does not contain
/// `outgoing`: the caller's records and the reference disagree.
pub fn repair(
    outgoing: &OutgoingRef,
    referrer: &DocumentRecord,
    index: &ResolutionIndex<'_>,
) -> Result<RepairOutcome, Error> {
    if !referrer.outgoing_refs.contains(outgoing) {
        tracing::warn!(reference = %outgoing.raw, file = %referrer.path().display(), "reference not in referrer");
        return Err(Error::ReferenceNotLocated { file: referrer.path(), reference: outgoing.raw.clone() });
    }

    let written = parse_reference(&outgoing.raw);
    let target = written.normalize(&referrer.directory, &referrer.basename);
    let found = |heuristic: Heuristic, new_reference: String| {
        tracing::debug!(?heuristic, old = %outgoing.raw, new = %new_reference, "repair found");
        return RepairOutcome::Repaired(RepairResult {
            applied: false,
            heuristic,
            new_reference,
            old_reference: outgoing.raw.clone(),
            span: outgoing.span.clone(),
        });
    };

    if let Some(new_reference) = try_extension_swap(&written, &target, index) {
        return Ok(found(Heuristic::ExtensionSwap, new_reference));
    }

    let same_name = index.by_filename(&target.filename);
    let directories: BTreeSet<&Path> = same_name.iter().map(|r| return r.directory.as_path()).collect();
    let directories: Vec<&Path> = directories.into_iter().collect();
    let [directory] = directories[..] else {
        let locations: Vec<PathBuf> = same_name.locations().into_iter().collect();
        if locations.is_empty() {
            tracing::debug!(file = %target.filename, "no file of that name anywhere");
            return Ok(RepairOutcome::Unrepairable(Unrepairable::FileNotFound));
        }
        tracing::debug!(file = %target.filename, places = locations.len(), "found in several places, cannot fix");
        return Ok(RepairOutcome::Unrepairable(Unrepairable::Ambiguous { locations }));
    };

    let relocated = Reference { directory: directory.to_string_lossy().into_owned(), ..target.clone() };
    tracing::debug!(candidate = %relocated, "trying directory relocation");
    if resolve_normalized(&relocated, index).is_found() {
        return Ok(found(Heuristic::DirectoryRelocation, render(&written, &relocated, referrer)));
    }

    if same_name.len() == 1
        && let Some(only) = same_name.first()
        && !only.topic_id.is_empty()
    {
        let retopiced = Reference { topic_id: only.topic_id.clone(), ..relocated };
        tracing::debug!(candidate = %retopiced, "trying topic substitution");
        if retopiced != target && resolve_normalized(&retopiced, index).is_found() {
            return Ok(found(Heuristic::TopicSubstitution, render(&written, &retopiced, referrer)));
        }
    }

    tracing::debug!(reference = %outgoing.raw, "all fixes failed");
    return Ok(RepairOutcome::Unrepairable(Unrepairable::Unresolved));
}

/// Write `target` the way the referrer should spell it: fragment-only when it
/// stays in the referrer's own file and was written that way, otherwise
/// relative to the referrer's directory.
fn render(written: &Reference, target: &Reference, referrer: &DocumentRecord) -> String {
    let target_directory = Path::new(&target.directory);
    let same_file = target_directory == referrer.directory && target.filename == referrer.basename;
    if same_file && !written.names_file() {
        return serialize_reference("", "", &target.topic_id, &target.anchor_id);
    }

    let relative = pathdiff::diff_paths(target_directory, &referrer.directory)
        .unwrap_or_else(|| return target_directory.to_path_buf());
    let relative = relative
        .components()
        .map(|c| return c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    return serialize_reference(&relative, &target.filename, &target.topic_id, &target.anchor_id);
}

/// Heuristic 1: the same reference under the other extension group.
fn try_extension_swap(written: &Reference, target: &Reference, index: &ResolutionIndex<'_>) -> Option<String> {
    if !written.names_file() {
        return None;
    }
    let swapped_name = grammar::alternate_extension(&target.filename)?;
    let swapped = Reference { filename: swapped_name.clone(), ..target.clone() };
    tracing::debug!(candidate = %swapped, "trying extension swap");
    if !resolve_normalized(&swapped, index).is_found() {
        return None;
    }
    return Some(serialize_reference(&written.directory, &swapped_name, &written.topic_id, &written.anchor_id));
}
