//! The four-part reference syntax: `directory/filename#topicid/contentid`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Scheme markers that make a reference external. Matched anywhere in the raw
/// string, not parsed as URLs.
pub const EXTERNAL_SCHEMES: [&str; 4] = ["http:", "https:", "news:", "mailto:"];

/// Parsed form of a raw reference string.
///
/// External references carry no parts: they are opaque and never resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference {
    /// Element id inside the topic (the part after the `/` in the fragment).
    pub anchor_id: String,
    /// Directory part; empty means the referrer's own directory.
    pub directory: String,
    /// File part; empty means the referrer's own file.
    pub filename: String,
    /// The raw string used a URL scheme.
    pub is_external: bool,
    /// Topic id (the fragment up to the first separator).
    pub topic_id: String,
}

impl Reference {
    /// Absolute path of the target file. Only meaningful after [`Reference::normalize`].
    pub fn file_path(&self) -> PathBuf {
        return Path::new(&self.directory).join(&self.filename);
    }

    /// Whether the reference targets a file rather than only a fragment of the referrer.
    pub fn names_file(&self) -> bool {
        return !self.filename.is_empty();
    }

    /// Resolve the directory against `base_directory` and collapse `.`/`..`.
    ///
    /// An empty filename (fragment-only reference) is filled from
    /// `referrer_file`, so the same target reached through different relative
    /// paths normalizes identically.
    pub fn normalize(&self, base_directory: &Path, referrer_file: &str) -> Self {
        if self.is_external {
            return self.clone();
        }
        let directory = normalize_path(&base_directory.join(&self.directory));
        let filename = if self.filename.is_empty() {
            referrer_file.to_string()
        } else {
            self.filename.clone()
        };
        return Self {
            anchor_id: self.anchor_id.clone(),
            directory: directory.to_string_lossy().into_owned(),
            filename,
            is_external: false,
            topic_id: self.topic_id.clone(),
        };
    }

    /// Serialize back to the raw syntax.
    pub fn serialize(&self) -> String {
        return serialize_reference(&self.directory, &self.filename, &self.topic_id, &self.anchor_id);
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.serialize());
    }
}

/// True iff the raw string contains one of the recognized URL schemes.
pub fn is_external(raw: &str) -> bool {
    return EXTERNAL_SCHEMES.iter().any(|scheme| return raw.contains(scheme));
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// Split a key reference `key/elementid` into its key and element id.
pub fn parse_keyref(raw: &str) -> (&str, &str) {
    return raw.split_once('/').unwrap_or((raw, ""));
}

/// Parse a raw reference.
///
/// Everything before the first `#` is split into directory and filename at the
/// last `/`; the fragment is split into topic id and anchor id at its first
/// separator. An empty string yields an all-empty reference.
pub fn parse_reference(raw: &str) -> Reference {
    if is_external(raw) {
        return Reference { is_external: true, ..Reference::default() };
    }

    let (location, fragment) = raw.split_once('#').unwrap_or((raw, ""));
    let (directory, filename) = split_location(location);
    let (topic_id, anchor_id) = fragment
        .split_once(['/', '\\'])
        .unwrap_or((fragment, ""));

    return Reference {
        anchor_id: anchor_id.to_string(),
        directory: directory.to_string(),
        filename: filename.to_string(),
        is_external: false,
        topic_id: topic_id.to_string(),
    };
}

/// Build a raw reference from its parts.
///
/// An anchor is only written when a topic is present, mirroring how the
/// parser assigns the first fragment segment to the topic.
pub fn serialize_reference(directory: &str, filename: &str, topic: &str, anchor: &str) -> String {
    let mut out = String::from(directory);
    if !directory.is_empty() && !directory.ends_with('/') {
        out.push('/');
    }
    out.push_str(filename);
    if !topic.is_empty() {
        out.push('#');
        out.push_str(topic);
        if !anchor.is_empty() {
            out.push('/');
            out.push_str(anchor);
        }
    }
    return out;
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, preserves it otherwise.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            let can_pop = matches!(
                components.last(),
                Some(c) if !matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
            );
            let at_root = matches!(components.last(), Some(Component::RootDir | Component::Prefix(_)));
            if can_pop {
                components.pop();
            } else if !at_root {
                components.push(component);
            }
        },
        other => components.push(other),
    }
    return;
}

/// Split `dir/sub/file.dita` into (`dir/sub`, `file.dita`). A leading `/`
/// with no further directory keeps the root.
fn split_location(location: &str) -> (&str, &str) {
    return match location.rsplit_once('/') {
        None => ("", location),
        Some(("", file)) => ("/", file),
        Some((dir, file)) => (dir, file),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;

    #[test]
    fn parses_all_four_parts() {
        let r = parse_reference("../topics/intro.dita#intro/fig1");
        assert_eq!(r.directory, "../topics");
        assert_eq!(r.filename, "intro.dita");
        assert_eq!(r.topic_id, "intro");
        assert_eq!(r.anchor_id, "fig1");
        assert!(!r.is_external);
    }

    #[test]
    fn fragment_only_reference_has_no_location() {
        let r = parse_reference("#intro/fig1");
        assert!(r.directory.is_empty());
        assert!(r.filename.is_empty());
        assert!(!r.names_file());
        assert_eq!(r.topic_id, "intro");
        assert_eq!(r.anchor_id, "fig1");
    }

    #[test]
    fn empty_string_is_all_empty() {
        assert_eq!(parse_reference(""), Reference::default());
    }

    #[test]
    fn backslash_splits_fragment() {
        let r = parse_reference("a.dita#t\\c");
        assert_eq!(r.topic_id, "t");
        assert_eq!(r.anchor_id, "c");
    }

    #[test]
    fn external_schemes_are_opaque() {
        for raw in ["http://x.org/a.dita#t", "https://x.org", "mailto:me@x.org", "news:comp.text"] {
            let r = parse_reference(raw);
            assert!(r.is_external, "{raw} should be external");
            assert!(r.filename.is_empty());
            assert!(r.topic_id.is_empty());
        }
        assert!(!is_external("topics/http.dita"));
    }

    #[test]
    fn round_trips_well_formed_references() {
        let samples = [
            "a.dita",
            "a.dita#s1",
            "a.dita#s1/fig",
            "../x/y/a.xml#t/c",
            "sub/b.ditamap",
            "#t",
            "#t/c",
            "/abs/path/a.dita#t",
            "/a.dita",
        ];
        for s in samples {
            assert_eq!(parse_reference(s).serialize(), s, "round trip of {s}");
        }
    }

    #[test]
    fn normalize_resolves_directory_and_fills_file() {
        let base = Path::new("/docs/topics");
        let r = parse_reference("../shared/a.dita#t").normalize(base, "me.dita");
        assert_eq!(r.directory, "/docs/shared");
        assert_eq!(r.file_path(), PathBuf::from("/docs/shared/a.dita"));

        let own = parse_reference("#t/c").normalize(base, "me.dita");
        assert_eq!(own.directory, "/docs/topics");
        assert_eq!(own.filename, "me.dita");
        assert_eq!(own.topic_id, "t");
    }

    #[test]
    fn normalize_is_idempotent_on_absolute_directories() {
        let base = Path::new("/docs");
        let once = parse_reference("x/../y/a.dita").normalize(base, "m.ditamap");
        let twice = once.normalize(Path::new("/elsewhere"), "other.dita");
        assert_eq!(once, twice);
    }

    #[test]
    fn keyref_splits_on_first_slash() {
        assert_eq!(parse_keyref("product/name"), ("product", "name"));
        assert_eq!(parse_keyref("product"), ("product", ""));
    }
}
