//! Read-only lookups over the records of a finished crawl.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::types::DocumentRecord;

/// A narrowed set of records. Filters compose left to right in the same
/// order as a reference's parts: directory, filename, topic, anchor.
#[derive(Debug, Clone, Default)]
pub struct Candidates<'a> {
    records: Vec<&'a DocumentRecord>,
}

impl<'a> Candidates<'a> {
    /// Records whose file name is `name`.
    #[must_use]
    pub fn by_filename(self, name: &str) -> Self {
        return self.retain(|r| return r.basename == name);
    }

    /// Records whose own topic id is `id`.
    #[must_use]
    pub fn by_topic_id(self, id: &str) -> Self {
        return self.retain(|r| return r.topic_id == id);
    }

    /// Records that carry `id` among their anchor ids.
    #[must_use]
    pub fn containing_anchor(self, id: &str) -> Self {
        return self.retain(|r| return r.anchor_ids.contains(id));
    }

    /// The first candidate, if any.
    pub fn first(&self) -> Option<&'a DocumentRecord> {
        return self.records.first().copied();
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        return self.records.is_empty();
    }

    /// Iterate the matching records.
    pub fn iter(&self) -> impl Iterator<Item = &'a DocumentRecord> + '_ {
        return self.records.iter().copied();
    }

    /// Number of matching records.
    pub fn len(&self) -> usize {
        return self.records.len();
    }

    /// Distinct files among the candidates, sorted.
    pub fn locations(&self) -> BTreeSet<std::path::PathBuf> {
        return self.records.iter().map(|r| return r.path()).collect();
    }

    fn retain(mut self, keep: impl Fn(&DocumentRecord) -> bool) -> Self {
        self.records.retain(|r| return keep(*r));
        return self;
    }
}

/// Index over an inventory's records, built once the crawl has settled.
///
/// Records of files that are not on disk are left out, so a reference to a
/// missing file can never resolve.
#[derive(Debug)]
pub struct ResolutionIndex<'a> {
    /// Records keyed by file name, across directories.
    by_basename: HashMap<&'a str, Vec<&'a DocumentRecord>>,
    /// Records keyed by absolute directory.
    by_directory: HashMap<&'a Path, Vec<&'a DocumentRecord>>,
}

impl<'a> ResolutionIndex<'a> {
    /// Index every existing record.
    pub fn new(records: impl IntoIterator<Item = &'a DocumentRecord>) -> Self {
        let mut by_basename: HashMap<&'a str, Vec<&'a DocumentRecord>> = HashMap::new();
        let mut by_directory: HashMap<&'a Path, Vec<&'a DocumentRecord>> = HashMap::new();

        for record in records.into_iter().filter(|r| return r.exists) {
            by_basename.entry(record.basename.as_str()).or_default().push(record);
            by_directory.entry(record.directory.as_path()).or_default().push(record);
        }

        return Self { by_basename, by_directory };
    }

    /// Records of files in `directory`.
    pub fn by_directory(&self, directory: &Path) -> Candidates<'a> {
        return Candidates { records: self.by_directory.get(directory).cloned().unwrap_or_default() };
    }

    /// Records of files named `name`, in any directory.
    pub fn by_filename(&self, name: &str) -> Candidates<'a> {
        return Candidates { records: self.by_basename.get(name).cloned().unwrap_or_default() };
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn record(dir: &str, name: &str, topic: &str, anchors: &[&str]) -> DocumentRecord {
        return DocumentRecord {
            anchor_ids: anchors.iter().map(|a| a.to_string()).collect(),
            basename: name.to_string(),
            directory: PathBuf::from(dir),
            doc_type: Some("topic".to_string()),
            exists: true,
            topic_id: topic.to_string(),
            ..DocumentRecord::default()
        };
    }

    #[test]
    fn lookups_compose_left_to_right() {
        let records = vec![
            record("/d", "a.dita", "intro", &["fig1"]),
            record("/d", "a.dita", "more", &["fig2"]),
            record("/d", "b.dita", "intro", &["fig1"]),
            record("/e", "a.dita", "intro", &[]),
        ];
        let index = ResolutionIndex::new(&records);

        let in_d = index.by_directory(Path::new("/d"));
        assert_eq!(in_d.len(), 3);
        let a = in_d.by_filename("a.dita");
        assert_eq!(a.len(), 2);
        assert_eq!(a.clone().by_topic_id("intro").len(), 1);
        assert_eq!(a.clone().by_topic_id("intro").containing_anchor("fig2").len(), 0);
        assert_eq!(a.containing_anchor("fig2").first().map(|r| r.topic_id.as_str()), Some("more"));
    }

    #[test]
    fn filename_lookup_spans_directories() {
        let records = vec![record("/d", "a.dita", "t", &[]), record("/e", "a.dita", "t", &[])];
        let index = ResolutionIndex::new(&records);
        let found = index.by_filename("a.dita");
        assert_eq!(found.len(), 2);
        assert_eq!(found.locations().len(), 2);
        assert!(index.by_filename("z.dita").is_empty());
    }

    #[test]
    fn missing_files_are_not_indexed() {
        let mut gone = record("/d", "gone.dita", "", &[]);
        gone.exists = false;
        let records = vec![gone];
        let index = ResolutionIndex::new(&records);
        assert!(index.by_directory(Path::new("/d")).is_empty());
        assert!(index.by_filename("gone.dita").is_empty());
    }
}
