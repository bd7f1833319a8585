use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::grammar;
use crate::types::{DocumentRecord, KeyTable, OutgoingRef, split_file_path};

/// Attributes whose values are key references.
const KEYREF_ATTRIBUTES: [&str; 2] = ["conkeyref", "keyref"];

/// Element whose text content is a keyword declaration.
const KEYWORD_ELEMENT: &str = "keyword";

/// Attributes whose values are plain references.
const REFERENCE_ATTRIBUTES: [&str; 3] = ["conref", "data", "href"];

/// Everything one document contributes to the inventory.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Key bindings declared by the document.
    pub keys: KeyTable,
    /// One record per section, in document order; a single opaque record for
    /// anything that is not a structured document.
    pub records: Vec<DocumentRecord>,
}

impl ScanOutput {
    fn opaque(path: &Path, exists: bool) -> Self {
        return Self { keys: KeyTable::default(), records: vec![DocumentRecord::opaque(path, exists)] };
    }
}

/// An attribute read from a start tag.
struct Attribute<'s> {
    name: &'s str,
    span: Range<usize>,
    value: &'s str,
}

/// A pending element on the section walk.
struct Frame<'t> {
    node: Node<'t>,
    /// Arena index of the enclosing section; `None` for a section root.
    owner: Option<usize>,
}

/// Scan one document. Never fails: missing, foreign, or unparsable files
/// yield a single opaque record.
pub fn scan(path: &Path) -> ScanOutput {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "file does not exist");
        return ScanOutput::opaque(path, false);
    }
    if !grammar::is_structured(path) {
        return ScanOutput::opaque(path, true);
    }

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read document");
            return ScanOutput::opaque(path, true);
        },
    };

    return scan_source(path, &source);
}

/// Scan already-loaded source text for `path`.
pub fn scan_source(path: &Path, source: &str) -> ScanOutput {
    let masked = mask_processing_instructions(source);
    let source: &str = &masked;

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar::xml_language()) {
        tracing::warn!(error = %e, "xml grammar rejected by tree-sitter");
        return ScanOutput::opaque(path, true);
    }
    let Some(tree) = parser.parse(source, None) else {
        tracing::warn!(path = %path.display(), "document not parsed");
        return ScanOutput::opaque(path, true);
    };

    let document = tree.root_node();
    if document.has_error() {
        tracing::warn!(path = %path.display(), "document is not well-formed xml");
        return ScanOutput::opaque(path, true);
    }

    let Some(doc_type) = declared_doc_type(document, source) else {
        tracing::debug!(path = %path.display(), "no document type declaration");
        return ScanOutput::opaque(path, true);
    };
    let Some(root) = child_of_kind(document, "element") else {
        return ScanOutput::opaque(path, true);
    };

    let sections = if element_name(root, source) == Some(grammar::CONTAINER_ELEMENT) {
        child_elements(root)
    } else {
        vec![root]
    };

    let (directory, basename) = split_file_path(path);
    let template = DocumentRecord {
        basename,
        directory,
        doc_type: Some(doc_type),
        exists: true,
        ..DocumentRecord::default()
    };

    let mut keys = KeyTable::default();
    let records = walk_sections(&sections, source, &template, &mut keys);
    tracing::debug!(path = %path.display(), sections = records.len(), "scanned");
    return ScanOutput { keys, records };
}

/// Apply one element's attributes and text to its section record.
fn absorb_element(
    record: &mut DocumentRecord,
    node: Node<'_>,
    source: &str,
    opens_section: bool,
    keys: &mut KeyTable,
) {
    let attributes = start_tag(node).map(|tag| return tag_attributes(tag, source)).unwrap_or_default();
    let href = attributes.iter().find(|a| return a.name == "href").map(|a| return a.value);

    for attribute in &attributes {
        match attribute.name {
            "id" if opens_section => record.topic_id = attribute.value.to_string(),
            "id" => {
                record.anchor_ids.insert(attribute.value.to_string());
            },
            "keys" => {
                for key in attribute.value.split_whitespace() {
                    record.declared_keys.push(key.to_string());
                    if let Some(target) = href {
                        keys.bind(key, target);
                    }
                }
            },
            name if REFERENCE_ATTRIBUTES.contains(&name) => record.outgoing_refs.push(OutgoingRef {
                attribute: name.to_string(),
                raw: attribute.value.to_string(),
                span: attribute.span.clone(),
            }),
            name if KEYREF_ATTRIBUTES.contains(&name) => record.key_refs.push(attribute.value.to_string()),
            _ => {},
        }
    }

    if !opens_section && element_name(node, source) == Some(KEYWORD_ELEMENT) {
        record.keywords.push(element_text(node, source));
    }
    return;
}

/// Element children of an element, in document order.
fn child_elements(element: Node<'_>) -> Vec<Node<'_>> {
    let Some(content) = child_of_kind(element, "content") else {
        return Vec::new();
    };
    let mut cursor = content.walk();
    return content.children(&mut cursor).filter(|c| return c.kind() == "element").collect();
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    return node.children(&mut cursor).find(|c| return c.kind() == kind);
}

/// The root name of a `<!DOCTYPE name ...>` declaration in the prolog.
fn declared_doc_type(document: Node<'_>, source: &str) -> Option<String> {
    let decl = child_of_kind(document, "doctypedecl").or_else(|| {
        return child_of_kind(document, "prolog").and_then(|p| return child_of_kind(p, "doctypedecl"));
    })?;
    let text = node_text(decl, source)?;
    if !text.starts_with("<!DOCTYPE") {
        return None;
    }
    let name = child_of_kind(decl, "Name").and_then(|n| return node_text(n, source))?;
    return Some(name.to_string());
}

fn element_name<'s>(element: Node<'_>, source: &'s str) -> Option<&'s str> {
    let tag = start_tag(element)?;
    return node_text(child_of_kind(tag, "Name")?, source);
}

/// Concatenated character data under an element.
fn element_text(element: Node<'_>, source: &str) -> String {
    let mut text = String::new();
    let mut stack = vec![element];
    while let Some(node) = stack.pop() {
        if node.kind() == "CharData" {
            text.push_str(node_text(node, source).unwrap_or(""));
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    return text;
}

/// Whether the processing instruction at the front of `markup` is the XML
/// declaration.
fn is_declaration(markup: &str) -> bool {
    return markup
        .strip_prefix("<?")
        .and_then(|body| return body.split(|c: char| return c.is_whitespace() || c == '?').next())
        .is_some_and(|target| return target.eq_ignore_ascii_case("xml"));
}

/// Length of the start tag, end tag or declaration at the front of `markup`,
/// skipping quoted values and an internal subset.
fn markup_len(markup: &str) -> usize {
    let mut quote = None;
    let mut depth = 0_usize;
    for (i, c) in markup.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth = depth.saturating_add(1),
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => return i.saturating_add(1),
            _ => {},
        }
    }
    return markup.len();
}

/// Blank out processing instructions other than the XML declaration.
///
/// The grammar rejects a processing instruction with content inside an
/// element, which editors such as oXygen write for review comments. Each one
/// becomes the same number of spaces, so every byte offset still matches the
/// file on disk.
fn mask_processing_instructions(source: &str) -> Cow<'_, str> {
    let instructions = processing_instructions(source);
    if instructions.is_empty() {
        return Cow::Borrowed(source);
    }

    let mut masked = String::with_capacity(source.len());
    let mut copied = 0;
    for range in instructions {
        masked.push_str(source.get(copied..range.start).unwrap_or_default());
        masked.push_str(&" ".repeat(range.len()));
        copied = range.end;
    }
    masked.push_str(source.get(copied..).unwrap_or_default());
    return Cow::Owned(masked);
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    return source.get(node.byte_range());
}

/// Byte ranges of processing instructions outside comments, CDATA sections
/// and markup, leaving out the XML declaration.
fn processing_instructions(source: &str) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut at = 0_usize;
    while let Some(offset) = source.get(at..).and_then(|rest| return rest.find('<')) {
        let start = at.saturating_add(offset);
        let rest = source.get(start..).unwrap_or_default();
        let len = if rest.starts_with("<?") {
            let instruction = rest.find("?>").map_or(rest.len(), |end| return end.saturating_add(2));
            if !is_declaration(rest) {
                found.push(start..start.saturating_add(instruction));
            }
            instruction
        } else if rest.starts_with("<!--") {
            rest.find("-->").map_or(rest.len(), |end| return end.saturating_add(3))
        } else if rest.starts_with("<![CDATA[") {
            rest.find("]]>").map_or(rest.len(), |end| return end.saturating_add(3))
        } else {
            markup_len(rest)
        };
        at = start.saturating_add(len.max(1));
    }
    return found;
}

fn start_tag(element: Node<'_>) -> Option<Node<'_>> {
    return child_of_kind(element, "STag").or_else(|| return child_of_kind(element, "EmptyElemTag"));
}

/// Attributes of a start tag with the byte span of each unquoted value.
fn tag_attributes<'s>(tag: Node<'_>, source: &'s str) -> Vec<Attribute<'s>> {
    let mut cursor = tag.walk();
    let mut attributes = Vec::new();
    for attribute in tag.children(&mut cursor).filter(|c| return c.kind() == "Attribute") {
        let Some(name) = child_of_kind(attribute, "Name").and_then(|n| return node_text(n, source)) else {
            continue;
        };
        let Some(value_node) = child_of_kind(attribute, "AttValue") else {
            continue;
        };
        let quoted = value_node.byte_range();
        let is_quoted = quoted.len() >= 2
            && source.get(quoted.start..quoted.start.saturating_add(1)).is_some_and(|q| return q == "\"" || q == "'");
        let span = if is_quoted { quoted.start.saturating_add(1)..quoted.end.saturating_sub(1) } else { quoted };
        let Some(value) = source.get(span.clone()) else {
            continue;
        };
        attributes.push(Attribute { name, span, value });
    }
    return attributes;
}

/// Walk every section with an explicit stack, recording nested sections in an
/// arena so deep nesting cannot exhaust the call stack.
///
/// Each element's ids and references go to the innermost section enclosing it.
fn walk_sections(
    roots: &[Node<'_>],
    source: &str,
    template: &DocumentRecord,
    keys: &mut KeyTable,
) -> Vec<DocumentRecord> {
    let mut arena: Vec<DocumentRecord> = Vec::new();
    let mut stack: Vec<Frame<'_>> = roots.iter().rev().map(|&node| return Frame { node, owner: None }).collect();

    while let Some(frame) = stack.pop() {
        let nested = frame.owner.is_some()
            && element_name(frame.node, source).is_some_and(|n| return grammar::SECTION_ELEMENTS.contains(&n));
        let opens_section = frame.owner.is_none() || nested;

        let owner = match frame.owner {
            Some(index) if !opens_section => index,
            _ => {
                arena.push(template.clone());
                arena.len().saturating_sub(1)
            },
        };

        if let Some(record) = arena.get_mut(owner) {
            absorb_element(record, frame.node, source, opens_section, keys);
        }

        let children = child_elements(frame.node);
        stack.extend(children.into_iter().rev().map(|node| return Frame { node, owner: Some(owner) }));
    }

    return arena;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;

    const TOPIC_DOCTYPE: &str =
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE topic PUBLIC \"-//OASIS//DTD DITA Topic//EN\" \"topic.dtd\">\n";

    fn scan_text(body: &str) -> ScanOutput {
        let source = format!("{TOPIC_DOCTYPE}{body}");
        return scan_source(Path::new("/docs/topics/a.dita"), &source);
    }

    #[test]
    fn single_topic_collects_ids_and_refs() {
        let out = scan_text(
            r##"<topic id="intro"><title>Intro</title><body><p id="p1">See <xref href="b.dita#b/fig"/> and <xref href="#intro/p1"/>.</p><fig id="fig1"/><p conref="shared.dita#s/c"/><ph keyref="product"/></body></topic>"##,
        );
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.topic_id, "intro");
        assert_eq!(r.basename, "a.dita");
        assert_eq!(r.directory, Path::new("/docs/topics"));
        assert_eq!(r.doc_type.as_deref(), Some("topic"));
        assert!(r.anchor_ids.contains("p1"));
        assert!(r.anchor_ids.contains("fig1"));
        assert!(!r.anchor_ids.contains("intro"));
        let raws: Vec<&str> = r.outgoing_refs.iter().map(|o| o.raw.as_str()).collect();
        assert_eq!(raws, ["b.dita#b/fig", "#intro/p1", "shared.dita#s/c"]);
        assert_eq!(r.key_refs, ["product"]);
    }

    #[test]
    fn reference_spans_point_at_raw_text() {
        let source = format!("{TOPIC_DOCTYPE}<topic id=\"t\"><body><xref href='x.dita#t'/></body></topic>");
        let out = scan_source(Path::new("/d/a.dita"), &source);
        let outgoing = &out.records[0].outgoing_refs[0];
        assert_eq!(&source[outgoing.span.clone()], "x.dita#t");
        assert_eq!(outgoing.attribute, "href");
    }

    #[test]
    fn nested_topics_get_their_own_records() {
        let out = scan_text(
            r#"<topic id="outer"><body><p id="o1" href="x.dita"/></body><topic id="inner"><body><p id="i1" href="y.dita"/></body></topic></topic>"#,
        );
        assert_eq!(out.records.len(), 2);
        let outer = out.records.iter().find(|r| r.topic_id == "outer").unwrap();
        let inner = out.records.iter().find(|r| r.topic_id == "inner").unwrap();
        assert!(outer.anchor_ids.contains("o1"));
        assert!(!outer.anchor_ids.contains("i1"));
        assert!(!outer.anchor_ids.contains("inner"));
        assert!(inner.anchor_ids.contains("i1"));
        assert_eq!(outer.outgoing_refs.len(), 1);
        assert_eq!(inner.outgoing_refs[0].raw, "y.dita");
    }

    #[test]
    fn dita_container_yields_one_record_per_child() {
        let source = "<?xml version=\"1.0\"?>\n<!DOCTYPE dita PUBLIC \"-//OASIS//DTD DITA Composite//EN\" \"ditabase.dtd\">\n<dita><topic id=\"a\"/><concept id=\"b\"><conbody><p id=\"c\"/></conbody></concept></dita>";
        let out = scan_source(Path::new("/d/all.dita"), source);
        let ids: Vec<&str> = out.records.iter().map(|r| r.topic_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(out.records[1].anchor_ids.contains("c"));
    }

    #[test]
    fn map_keys_bind_to_colocated_href() {
        let source = "<?xml version=\"1.0\"?>\n<!DOCTYPE map PUBLIC \"-//OASIS//DTD DITA Map//EN\" \"map.dtd\">\n<map><keydef keys=\"product brand\" href=\"product.dita\"/><keydef keys=\"loose\"/><topicref href=\"a.dita\"><topicmeta><keywords><keyword>alpha</keyword></keywords></topicmeta></topicref></map>";
        let out = scan_source(Path::new("/d/book.ditamap"), source);
        let bound: Vec<(&str, &str)> = out.keys.iter().collect();
        assert_eq!(bound, [("brand", "product.dita"), ("product", "product.dita")]);
        assert!(!out.keys.contains("loose"));
        let map = &out.records[0];
        assert_eq!(map.declared_keys, ["product", "brand", "loose"]);
        assert_eq!(map.keywords, ["alpha"]);
        assert_eq!(map.doc_type.as_deref(), Some("map"));
    }

    #[test]
    fn missing_doctype_is_opaque() {
        let out = scan_source(Path::new("/d/a.dita"), "<topic id=\"t\"><p href=\"x.dita\"/></topic>");
        assert_eq!(out.records.len(), 1);
        assert!(!out.records[0].is_source());
        assert!(out.records[0].outgoing_refs.is_empty());
        assert!(out.records[0].exists);
    }

    #[test]
    fn malformed_xml_is_opaque() {
        let out = scan_text("<topic id=\"t\"><body><p></body></topic>");
        assert_eq!(out.records.len(), 1);
        assert!(!out.records[0].is_source());
    }

    #[test]
    fn processing_instructions_in_content_keep_the_document() {
        let source = format!(
            "{TOPIC_DOCTYPE}<?xml-stylesheet href=\"s.css\"?>\n<topic id=\"t\"><?oxy_comment_start author=\"x\" comment=\"a > b\"?><body><p>x<?pi y?></p><!-- <?not one?> --><xref href=\"x.dita\"/><?oxy_comment_end?></body></topic>"
        );
        let out = scan_source(Path::new("/d/a.dita"), &source);
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert!(r.is_source());
        assert_eq!(r.topic_id, "t");
        let raws: Vec<&str> = r.outgoing_refs.iter().map(|o| o.raw.as_str()).collect();
        assert_eq!(raws, ["x.dita"]);
        assert_eq!(&source[r.outgoing_refs[0].span.clone()], "x.dita");
    }

    #[test]
    fn masking_keeps_offsets_and_the_declaration() {
        let source = "<?xml version=\"1.0\"?><a b=\"<?no?>\"><?pi é?><![CDATA[<?no?>]]></a>";
        let masked = mask_processing_instructions(source);
        assert_eq!(masked.len(), source.len());
        assert_eq!(masked, "<?xml version=\"1.0\"?><a b=\"<?no?>\">         <![CDATA[<?no?>]]></a>");
        assert!(matches!(mask_processing_instructions("<a/>"), Cow::Borrowed(_)));
    }

    #[test]
    fn missing_and_foreign_files_are_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let missing = scan(&dir.path().join("gone.dita"));
        assert!(!missing.records[0].exists);
        assert_eq!(missing.records[0].basename, "gone.dita");

        let image = dir.path().join("logo.png");
        std::fs::write(&image, b"\x89PNG").unwrap();
        let out = scan(&image);
        assert!(out.records[0].exists);
        assert!(!out.records[0].is_source());
    }
}
