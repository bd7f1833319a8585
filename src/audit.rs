//! Classify every reference of a crawl, attempt repairs, and in fix mode
//! coalesce them into one rewrite per document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::crawler::Inventory;
use crate::error::Error;
use crate::index::ResolutionIndex;
use crate::reference::parse_keyref;
use crate::repair::{PatchSet, RepairOutcome, repair};
use crate::resolver::{NotFound, Resolution, resolve_raw};
use crate::types::DocumentRecord;

/// Whether repairs are only proposed or also written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report what would be repaired without touching any file.
    DryRun,
    /// Write every repair, one rewrite per document.
    Write,
}

/// A reference that did not resolve, with what the repair engine made of it.
#[derive(Debug, Clone, Serialize)]
pub struct BrokenReference {
    /// Attribute carrying the reference.
    pub attribute: String,
    /// Repair proposal or the reason there is none.
    pub outcome: RepairOutcome,
    /// Reference text as written.
    pub raw: String,
    /// First part of the reference that failed to resolve.
    pub reason: NotFound,
    /// Document containing the reference.
    pub referrer: PathBuf,
    /// Section of the referrer the reference sits in.
    pub topic_id: String,
}

impl BrokenReference {
    /// Whether the repair engine found a replacement.
    pub const fn is_repairable(&self) -> bool {
        return matches!(self.outcome, RepairOutcome::Repaired(_));
    }
}

/// A key reference whose key no document declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndefinedKey {
    /// Key name taken from the key reference.
    pub key: String,
    /// Key reference as written.
    pub key_ref: String,
    /// Document containing the key reference.
    pub referrer: PathBuf,
}

/// Everything found while auditing one inventory.
#[derive(Debug, Default, Serialize)]
pub struct Audit {
    /// Broken references in crawl order.
    pub broken: Vec<BrokenReference>,
    /// Number of plain references examined.
    pub checked: usize,
    /// Caller/index mismatches and failed rewrites. Each one aborts only its own document.
    #[serde(skip)]
    pub failures: Vec<Error>,
    /// Key references with no declared key.
    pub undefined_keys: Vec<UndefinedKey>,
    /// Documents rewritten in place.
    pub written: Vec<PathBuf>,
}

impl Audit {
    /// Broken references with a repair.
    pub fn repairable(&self) -> usize {
        return self.broken.iter().filter(|b| return b.is_repairable()).count();
    }

    /// Broken references without a repair.
    pub fn unrepairable(&self) -> usize {
        return self.broken.len().saturating_sub(self.repairable());
    }
}

/// Resolve every reference in `inventory` and try to repair the broken ones.
///
/// References resolve against the reachable records only. Repairs may also
/// land on `unreached` records, files under the seed root no map references.
///
/// Nothing here aborts: logic inconsistencies and write failures are
/// collected in [`Audit::failures`] and the rest of the run continues.
pub fn audit(inventory: &Inventory, unreached: &[DocumentRecord], mode: Mode) -> Audit {
    let index = ResolutionIndex::new(&inventory.records);
    let repair_index = ResolutionIndex::new(inventory.records.iter().chain(unreached));
    let mut audit = Audit::default();
    let mut pending: BTreeMap<PathBuf, (PatchSet, Vec<usize>)> = BTreeMap::new();

    for record in inventory.records.iter().filter(|r| return r.is_source()) {
        for outgoing in &record.outgoing_refs {
            audit.checked = audit.checked.saturating_add(1);
            let Resolution::NotFound(reason) = resolve_raw(&outgoing.raw, record, &index) else {
                continue;
            };
            let outcome = match repair(outgoing, record, &repair_index) {
                Ok(outcome) => outcome,
                Err(e) => {
                    audit.failures.push(e);
                    continue;
                },
            };

            if mode == Mode::Write
                && let RepairOutcome::Repaired(result) = &outcome
            {
                let path = record.path();
                let (set, members) = pending
                    .entry(path.clone())
                    .or_insert_with(|| return (PatchSet::new(path), Vec::new()));
                set.push(result.patch());
                members.push(audit.broken.len());
            }

            audit.broken.push(BrokenReference {
                attribute: outgoing.attribute.clone(),
                outcome,
                raw: outgoing.raw.clone(),
                reason,
                referrer: record.path(),
                topic_id: record.topic_id.clone(),
            });
        }
    }

    for (path, (set, members)) in pending {
        if let Err(e) = set.write() {
            tracing::warn!(file = %path.display(), error = %e, "document left unchanged");
            audit.failures.push(e);
            continue;
        }
        for member in members {
            if let Some(broken) = audit.broken.get_mut(member)
                && let RepairOutcome::Repaired(result) = &mut broken.outcome
            {
                result.applied = true;
            }
        }
        audit.written.push(path);
    }

    audit.undefined_keys = undefined_keys(inventory);
    return audit;
}

/// Key references whose key is declared by no record of the inventory.
pub fn undefined_keys(inventory: &Inventory) -> Vec<UndefinedKey> {
    let declared: BTreeSet<&str> = inventory
        .records
        .iter()
        .flat_map(|r| return r.declared_keys.iter().map(String::as_str))
        .collect();

    let mut undefined = Vec::new();
    for record in &inventory.records {
        for key_ref in &record.key_refs {
            let (key, _element) = parse_keyref(key_ref);
            if declared.contains(key) || inventory.keys.contains(key) {
                continue;
            }
            undefined.push(UndefinedKey {
                key: key.to_string(),
                key_ref: key_ref.clone(),
                referrer: record.path(),
            });
        }
    }
    return undefined;
}
