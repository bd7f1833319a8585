use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::crawler::Inventory;
use crate::grammar;

/// Topic ids declared by more than one section, with every section's file.
pub fn duplicate_topic_ids(inventory: &Inventory) -> BTreeMap<String, Vec<PathBuf>> {
    let mut by_id: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for record in inventory.records.iter().filter(|r| return r.is_source() && !r.topic_id.is_empty()) {
        by_id.entry(record.topic_id.clone()).or_default().push(record.path());
    }
    by_id.retain(|_, files| return files.len() > 1);
    return by_id;
}

/// Keyword to the documents that declare it.
pub fn keyword_index(inventory: &Inventory) -> BTreeMap<String, BTreeSet<PathBuf>> {
    let mut index: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    for record in &inventory.records {
        for keyword in &record.keywords {
            index.entry(keyword.clone()).or_default().insert(record.path());
        }
    }
    return index;
}

/// Structured documents and images among `files` that no map reaches.
///
/// Only directories that hold at least one reached document are considered,
/// so unrelated trees next to the maps are not reported.
pub fn unused_files(inventory: &Inventory, files: &[PathBuf]) -> Vec<PathBuf> {
    let reached: BTreeSet<PathBuf> = inventory.records.iter().filter(|r| return r.exists).map(|r| return r.path()).collect();
    let live_directories: BTreeSet<&Path> = inventory
        .records
        .iter()
        .filter(|r| return r.is_source())
        .map(|r| return r.directory.as_path())
        .collect();

    return files
        .iter()
        .filter(|f| return grammar::is_structured(f) || grammar::is_image(f))
        .filter(|f| return !reached.contains(*f))
        .filter(|f| return f.parent().is_some_and(|p| return live_directories.contains(p)))
        .cloned()
        .collect();
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crawler::{crawl, enumerate_files};

    const MAP_HEAD: &str = "<?xml version=\"1.0\"?>\n<!DOCTYPE map PUBLIC \"-//OASIS//DTD DITA Map//EN\" \"map.dtd\">\n";
    const TOPIC_HEAD: &str = "<?xml version=\"1.0\"?>\n<!DOCTYPE topic PUBLIC \"-//OASIS//DTD DITA Topic//EN\" \"topic.dtd\">\n";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        return path;
    }

    #[test]
    fn reports_unreached_documents_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let map = write(
            dir.path(),
            "book.ditamap",
            &format!("{MAP_HEAD}<map><topicref href=\"t/a.dita\"/></map>"),
        );
        write(dir.path(), "t/a.dita", &format!("{TOPIC_HEAD}<topic id=\"a\"><body><image href=\"used.png\"/></body></topic>"));
        write(dir.path(), "t/used.png", "png");
        write(dir.path(), "t/orphan.dita", &format!("{TOPIC_HEAD}<topic id=\"o\"/>"));
        write(dir.path(), "t/orphan.gif", "gif");
        write(dir.path(), "t/notes.txt", "text");
        write(dir.path(), "elsewhere/far.dita", &format!("{TOPIC_HEAD}<topic id=\"f\"/>"));

        let inventory = crawl(&[map]);
        let files = enumerate_files(dir.path(), &Config::default()).unwrap();
        let unused: Vec<String> = unused_files(&inventory, &files)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(unused, ["orphan.dita", "orphan.gif"]);
    }

    #[test]
    fn finds_duplicate_topic_ids_and_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let map = write(
            dir.path(),
            "book.ditamap",
            &format!("{MAP_HEAD}<map><topicref href=\"a.dita\"/><topicref href=\"b.dita\"/></map>"),
        );
        let body = "<prolog><metadata><keywords><keyword>install</keyword></keywords></metadata></prolog>";
        write(dir.path(), "a.dita", &format!("{TOPIC_HEAD}<topic id=\"same\">{body}</topic>"));
        write(dir.path(), "b.dita", &format!("{TOPIC_HEAD}<topic id=\"same\">{body}</topic>"));

        let inventory = crawl(&[map]);
        let duplicates = duplicate_topic_ids(&inventory);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates.get("same").map(Vec::len), Some(2));

        let keywords = keyword_index(&inventory);
        assert_eq!(keywords.get("install").map(BTreeSet::len), Some(2));
    }
}
