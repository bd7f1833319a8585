/// Core domain types: scanned document records, their references, and keys.
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// One topic section discovered while scanning a document.
///
/// A file yields several records when it nests sections. Opaque files
/// (images, unknown formats, unparsable or missing documents) carry only
/// their identity: no ids, no references, no document type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Ids found in the section, outside any nested section.
    pub anchor_ids: BTreeSet<String>,
    /// File name of the owning document.
    pub basename: String,
    /// Key names this section declares.
    pub declared_keys: Vec<String>,
    /// Absolute directory of the owning document.
    pub directory: PathBuf,
    /// Declared document type; `None` marks an opaque file.
    pub doc_type: Option<String>,
    /// False for a referenced file that is not on disk.
    pub exists: bool,
    /// Raw key references in document order.
    pub key_refs: Vec<String>,
    /// Text of every keyword declaration in the section.
    pub keywords: Vec<String>,
    /// Plain references in document order.
    pub outgoing_refs: Vec<OutgoingRef>,
    /// The section's own id; empty when it declares none.
    pub topic_id: String,
}

impl DocumentRecord {
    /// A record for a file that contributes only its location.
    pub fn opaque(path: &Path, exists: bool) -> Self {
        let (directory, basename) = split_file_path(path);
        return Self { basename, directory, exists, ..Self::default() };
    }

    /// Whether this record came from a structured source document.
    pub const fn is_source(&self) -> bool {
        return self.doc_type.is_some();
    }

    /// Full path of the owning document.
    pub fn path(&self) -> PathBuf {
        return self.directory.join(&self.basename);
    }
}

/// Key name to target reference bindings, accumulated during one crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTable {
    bindings: BTreeMap<String, String>,
}

impl KeyTable {
    /// Bind a key to a target. A later binding of the same key wins.
    pub fn bind(&mut self, key: &str, target: &str) {
        self.bindings.insert(key.to_string(), target.to_string());
        return;
    }

    /// Whether the key has a binding.
    pub fn contains(&self, key: &str) -> bool {
        return self.bindings.contains_key(key);
    }

    /// Whether no key has been bound.
    pub fn is_empty(&self) -> bool {
        return self.bindings.is_empty();
    }

    /// Bindings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        return self.bindings.iter().map(|(k, v)| return (k.as_str(), v.as_str()));
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        return self.bindings.len();
    }

    /// Absorb every binding of `other`.
    pub fn merge(&mut self, other: Self) {
        self.bindings.extend(other.bindings);
        return;
    }
}

/// A reference as written on a reference-bearing attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRef {
    /// Attribute that carried the reference (`href`, `conref`, `data`).
    pub attribute: String,
    /// Attribute value exactly as it appears in the source.
    pub raw: String,
    /// Byte range of `raw` in the document source.
    pub span: Range<usize>,
}

/// Split an absolute file path into its directory and file name.
pub fn split_file_path(path: &Path) -> (PathBuf, String) {
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let basename = path
        .file_name()
        .map(|n| return n.to_string_lossy().into_owned())
        .unwrap_or_default();
    return (directory, basename);
}
