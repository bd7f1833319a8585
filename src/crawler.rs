//! Reachability crawl from entry maps, and whole-directory file enumeration.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Error;
use crate::grammar;
use crate::reference::{self, parse_reference};
use crate::scanner;
use crate::types::{DocumentRecord, KeyTable};

/// Everything reachable from the seeds, owned by one run.
#[derive(Debug, Default)]
pub struct Inventory {
    /// External references met while crawling, first occurrence order.
    pub external: Vec<String>,
    /// Key bindings declared anywhere in the reachable set.
    pub keys: KeyTable,
    /// One record per scanned section, in the order reached.
    pub records: Vec<DocumentRecord>,
    /// Every file the crawl scanned, in the order reached.
    pub scanned: Vec<PathBuf>,
}

/// Crawl the documents reachable from `seeds` until no new file turns up.
///
/// Each distinct normalized file path is scanned exactly once, so cycles and
/// self-references terminate.
pub fn crawl(seeds: &[PathBuf]) -> Inventory {
    let mut inventory = Inventory::default();
    let mut scanned: HashMap<PathBuf, bool> = HashMap::new();
    let mut known: Vec<PathBuf> = Vec::new();
    let mut external_seen: HashSet<String> = HashSet::new();

    for seed in seeds {
        let path = absolute(seed);
        if !scanned.contains_key(&path) {
            scanned.insert(path.clone(), false);
            known.push(path);
        }
    }

    loop {
        let pending: Vec<PathBuf> = known
            .iter()
            .filter(|p| return scanned.get(*p) == Some(&false))
            .cloned()
            .collect();
        if pending.is_empty() {
            break;
        }
        tracing::debug!(count = pending.len(), "files to be scanned");

        for path in pending {
            scanned.insert(path.clone(), true);
            let output = scanner::scan(&path);
            inventory.keys.merge(output.keys);

            for record in &output.records {
                for outgoing in &record.outgoing_refs {
                    if reference::is_external(&outgoing.raw) {
                        if external_seen.insert(outgoing.raw.clone()) {
                            inventory.external.push(outgoing.raw.clone());
                        }
                        continue;
                    }
                    let target = parse_reference(&outgoing.raw)
                        .normalize(&record.directory, &record.basename)
                        .file_path();
                    if !scanned.contains_key(&target) {
                        tracing::debug!(reference = %outgoing.raw, target = %target.display(), "discovered");
                        scanned.insert(target.clone(), false);
                        known.push(target);
                    }
                }
            }

            inventory.records.extend(output.records);
            inventory.scanned.push(path);
        }
    }

    return inventory;
}

/// Validate a seed path and crawl from it.
///
/// A directory seeds every map file directly inside it.
///
/// # Errors
///
/// Returns `Error::SeedNotFound` if the seed does not exist,
/// or `Error::Io` if a seed directory cannot be listed.
pub fn crawl_from(seed: &Path) -> Result<Inventory, Error> {
    let seeds = seed_paths(seed)?;
    return Ok(crawl(&seeds));
}

/// Every file under `root`, filtered by the config's include/exclude prefixes.
///
/// # Errors
///
/// Returns `Error::SeedNotFound` if `root` does not exist,
/// or `Error::NotADirectory` if it is not a directory.
pub fn enumerate_files(root: &Path, config: &Config) -> Result<Vec<PathBuf>, Error> {
    if !root.exists() {
        return Err(Error::SeedNotFound { path: root.to_path_buf() });
    }
    if !root.is_dir() {
        return Err(Error::NotADirectory { path: root.to_path_buf() });
    }

    let root = absolute(root);
    let mut files: Vec<PathBuf> = WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            let relative = p.strip_prefix(&root).unwrap_or(p);
            return config.should_scan(&relative.to_string_lossy());
        })
        .collect();
    files.sort();
    return Ok(files);
}

/// The seed files for a crawl: the file itself, or the maps in a directory.
///
/// # Errors
///
/// Returns `Error::SeedNotFound` if the seed does not exist,
/// or `Error::Io` if a seed directory cannot be listed.
pub fn seed_paths(seed: &Path) -> Result<Vec<PathBuf>, Error> {
    if !seed.exists() {
        return Err(Error::SeedNotFound { path: seed.to_path_buf() });
    }
    if !seed.is_dir() {
        return Ok(vec![absolute(seed)]);
    }

    let mut maps = Vec::new();
    for entry in std::fs::read_dir(seed)? {
        let path = entry?.path();
        if path.is_file() && grammar::is_map(&path) {
            maps.push(absolute(&path));
        }
    }
    maps.sort();
    return Ok(maps);
}

/// Directory whose files a crawl from `seed` may repair towards: the seed
/// itself when it is a directory, otherwise the directory holding it.
pub fn seed_root(seed: &Path) -> PathBuf {
    if seed.is_dir() {
        return seed.to_path_buf();
    }
    return seed
        .parent()
        .filter(|p| return !p.as_os_str().is_empty())
        .map_or_else(|| return PathBuf::from("."), Path::to_path_buf);
}

/// Scan every file under `root` that the crawl did not reach.
///
/// Renamed or moved documents that nothing references any more are only
/// found this way; their own references are never audited.
///
/// # Errors
///
/// Returns the errors of [`enumerate_files`].
pub fn unreached_records(inventory: &Inventory, root: &Path, config: &Config) -> Result<Vec<DocumentRecord>, Error> {
    let reached: HashSet<&PathBuf> = inventory.scanned.iter().collect();
    let mut records = Vec::new();
    for path in enumerate_files(root, config)? {
        if reached.contains(&path) {
            continue;
        }
        records.extend(scanner::scan(&path).records);
    }
    tracing::debug!(count = records.len(), root = %root.display(), "unreached records");
    return Ok(records);
}

/// Absolute, lexically normalized form of `path`.
fn absolute(path: &Path) -> PathBuf {
    let joined = std::path::absolute(path).unwrap_or_else(|_err| return path.to_path_buf());
    return reference::normalize_path(&joined);
}
