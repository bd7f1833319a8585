/// Tree-sitter grammar and file-extension classification for DITA sources.
use std::path::Path;

use tree_sitter::Language;

/// Element names that open a nested section inside a structured document.
pub const SECTION_ELEMENTS: [&str; 6] =
    ["concept", "glossentry", "reference", "task", "topic", "troubleshooting"];

/// Root element whose children are each a top-level section.
pub const CONTAINER_ELEMENT: &str = "dita";

/// Image extensions reported by the unused-file listing.
const IMAGE_EXTENSIONS: [&str; 5] = ["bmp", "gif", "jpeg", "jpg", "png"];

/// Extension of entry-point map files.
const MAP_EXTENSION: &str = "ditamap";

/// The extension a broken reference is retried with, if it has one.
///
/// `.dita` and `.ditamap` swap to `.xml`; `.xml` swaps to `.dita`.
pub fn alternate_extension(file_name: &str) -> Option<String> {
    let path = Path::new(file_name);
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    let swapped = match ext {
        "dita" | "ditamap" => "xml",
        _ if ext.eq_ignore_ascii_case("xml") => "dita",
        _ => return None,
    };
    return Some(format!("{stem}.{swapped}"));
}

/// Whether the file is an image (case-insensitive extension match).
pub fn is_image(path: &Path) -> bool {
    return extension_of(path)
        .is_some_and(|ext| return IMAGE_EXTENSIONS.iter().any(|i| return ext.eq_ignore_ascii_case(i)));
}

/// Whether the file is a map, the entry point of a publication.
pub fn is_map(path: &Path) -> bool {
    return extension_of(path) == Some(MAP_EXTENSION);
}

/// Whether the file carries one of the structured-document extensions.
pub fn is_structured(path: &Path) -> bool {
    return match extension_of(path) {
        Some("dita" | "ditamap") => true,
        Some(ext) => ext.eq_ignore_ascii_case("xml"),
        None => false,
    };
}

/// The XML grammar used for every structured document.
pub fn xml_language() -> Language {
    return tree_sitter_xml::LANGUAGE_XML.into();
}

fn extension_of(path: &Path) -> Option<&str> {
    return path.extension().and_then(|e| return e.to_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dita_swaps_to_xml() {
        assert_eq!(alternate_extension("a.dita").as_deref(), Some("a.xml"));
        assert_eq!(alternate_extension("book.ditamap").as_deref(), Some("book.xml"));
    }

    #[test]
    fn xml_swaps_to_dita() {
        assert_eq!(alternate_extension("a.xml").as_deref(), Some("a.dita"));
        assert_eq!(alternate_extension("A.XML").as_deref(), Some("A.dita"));
    }

    #[test]
    fn other_extensions_do_not_swap() {
        assert_eq!(alternate_extension("logo.png"), None);
        assert_eq!(alternate_extension("README"), None);
    }

    #[test]
    fn classifies_extensions() {
        assert!(is_structured(Path::new("t/a.dita")));
        assert!(is_structured(Path::new("t/a.XML")));
        assert!(!is_structured(Path::new("t/a.png")));
        assert!(is_map(Path::new("book.ditamap")));
        assert!(!is_map(Path::new("a.dita")));
        assert!(is_image(Path::new("img/Logo.PNG")));
        assert!(is_image(Path::new("img/photo.jpeg")));
        assert!(!is_image(Path::new("img/notes.txt")));
        assert!(!is_image(Path::new("img/README")));
    }
}
