use std::path::Path;

use crate::index::ResolutionIndex;
use crate::reference::{Reference, parse_reference};
use crate::types::DocumentRecord;

/// Why a reference did not resolve, naming the first part that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFound {
    /// The topic exists but does not contain the anchor id.
    Anchor,
    /// No indexed file lives in the referenced directory.
    Directory,
    /// The directory has no file with that name.
    File,
    /// No section has the topic id and no anchor carries it either.
    Topic,
}

impl NotFound {
    /// Short human-readable reason.
    pub const fn describe(self) -> &'static str {
        return match self {
            Self::Anchor => "content id not found",
            Self::Directory => "directory not found",
            Self::File => "file not found",
            Self::Topic => "topic id not found",
        };
    }
}

/// Outcome of resolving one reference against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The reference names something that exists.
    Found,
    /// The reference is broken.
    NotFound(NotFound),
}

impl Resolution {
    /// Whether the reference resolved.
    pub const fn is_found(self) -> bool {
        return matches!(self, Self::Found);
    }
}

/// Resolve a parsed reference written in `referrer`.
///
/// External references are always `Found`. A topic id that matches no section
/// is retried as an anchor id within the file, but only when the reference has
/// no anchor of its own; a real topic match always wins over that fallback.
pub fn resolve(reference: &Reference, referrer: &DocumentRecord, index: &ResolutionIndex<'_>) -> Resolution {
    if reference.is_external {
        return Resolution::Found;
    }
    let target = reference.normalize(&referrer.directory, &referrer.basename);
    return resolve_normalized(&target, index);
}

/// Resolve a reference whose directory is already absolute and whose filename is filled in.
pub fn resolve_normalized(target: &Reference, index: &ResolutionIndex<'_>) -> Resolution {
    if target.is_external {
        return Resolution::Found;
    }

    let in_directory = index.by_directory(Path::new(&target.directory));
    if in_directory.is_empty() {
        return Resolution::NotFound(NotFound::Directory);
    }
    let files = in_directory.by_filename(&target.filename);
    if files.is_empty() {
        return Resolution::NotFound(NotFound::File);
    }
    if target.topic_id.is_empty() {
        return Resolution::Found;
    }

    let topics = files.clone().by_topic_id(&target.topic_id);
    if !topics.is_empty() {
        if target.anchor_id.is_empty() || !topics.containing_anchor(&target.anchor_id).is_empty() {
            return Resolution::Found;
        }
        return Resolution::NotFound(NotFound::Anchor);
    }

    // Authors sometimes put an element id in the topic slot.
    if target.anchor_id.is_empty() && !files.containing_anchor(&target.topic_id).is_empty() {
        return Resolution::Found;
    }
    return Resolution::NotFound(NotFound::Topic);
}

/// Parse and resolve a raw reference string written in `referrer`.
pub fn resolve_raw(raw: &str, referrer: &DocumentRecord, index: &ResolutionIndex<'_>) -> Resolution {
    return resolve(&parse_reference(raw), referrer, index);
}
