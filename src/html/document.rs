//! Parse-once element arena.
//!
//! The document keeps the original text and, for every element, the byte
//! span of its start tag. Serialising splices rebuilt start tags of modified
//! elements back into the original text, so untouched markup is preserved
//! byte for byte.

use super::common::{
    create_xml_reader, decode_entities, is_raw_text_element, is_void_element, write_start_tag,
};
use super::{HtmlError, Selector, SelectorError};
use quick_xml::events::{BytesStart, Event};
use rustc_hash::FxHashMap;
use std::ops::Range;

/// Handle to an element inside a [`Document`], ordered by document position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Element {
    /// Tag name as written, used when rebuilding the start tag
    name: String,
    /// Lower-cased tag name, used for matching
    tag: String,
    attrs: Vec<(String, String)>,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    /// Decoded text content of all descendants
    text: String,
    /// Byte range of the start tag in the source
    span: Range<usize>,
    self_closing: bool,
    modified: bool,
}

/// A parsed HTML page.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    elements: Vec<Element>,
}

impl Document {
    /// Parse `source` leniently: void elements, raw-text elements and stray
    /// end tags are tolerated.
    pub fn parse(source: impl Into<String>) -> Result<Self, HtmlError> {
        let source = source.into();
        let elements = build_elements(&source)?;
        Ok(Self { source, elements })
    }

    /// Parse `selector` and return matching elements in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query(&selector))
    }

    /// Matching elements in document order.
    pub fn query(&self, selector: &Selector) -> Vec<NodeId> {
        self.nodes().filter(|&id| selector.matches(self, id)).collect()
    }

    /// All elements in document order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.elements.len()).map(NodeId)
    }

    /// Lower-cased tag name.
    pub fn tag_name(&self, id: NodeId) -> &str {
        &self.elements[id.0].tag
    }

    /// Decoded text content of the element and its descendants.
    pub fn text(&self, id: NodeId) -> &str {
        &self.elements[id.0].text
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.elements[id.0].parent
    }

    /// Previous element sibling.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.elements[id.0].prev
    }

    /// Next element sibling.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.elements[id.0].next
    }

    /// Attribute value; names compare case-insensitively.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.elements[id.0]
            .attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set (or add) an attribute and mark the element as modified.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let element = &mut self.elements[id.0];
        let value = value.into();
        match element
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value,
            None => element.attrs.push((name.to_owned(), value)),
        }
        element.modified = true;
    }

    /// Every non-empty `id` attribute in the page.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes()
            .filter_map(|id| self.attr(id, "id"))
            .filter(|value| !value.is_empty())
    }

    /// Whether any element has been modified since parsing.
    pub fn is_modified(&self) -> bool {
        self.elements.iter().any(|element| element.modified)
    }

    /// The text the document was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the document, rebuilding only modified start tags.
    pub fn serialize(&self) -> Result<String, HtmlError> {
        let mut output = String::with_capacity(self.source.len() + 64);
        let mut cursor = 0;
        for element in self.elements.iter().filter(|element| element.modified) {
            output.push_str(&self.source[cursor..element.span.start]);
            output.push_str(&write_start_tag(
                &element.name,
                &element.attrs,
                element.self_closing,
            )?);
            cursor = element.span.end;
        }
        output.push_str(&self.source[cursor..]);
        Ok(output)
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn build_elements(source: &str) -> Result<Vec<Element>, HtmlError> {
    let bytes = source.as_bytes();
    // Raw-text bodies are skipped by restarting the reader after them
    let mut base = 0;
    let mut reader = create_xml_reader(bytes);
    let mut elements: Vec<Element> = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();

    loop {
        let start = base + reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|source| HtmlError::Parse {
            position: (base as u64) + reader.error_position(),
            source,
        })?;

        match event {
            Event::Start(elem) => {
                let end = base + reader.buffer_position() as usize;
                let span = tag_start(source, start)..end;
                let id = push_element(&mut elements, &elem, open.last().copied(), span, false);
                let tag = elements[id.0].tag.clone();

                if is_void_element(&tag) {
                    continue;
                }
                if is_raw_text_element(&tag) {
                    let (body_end, resume) = raw_text_end(source, end, &tag);
                    elements[id.0].text.push_str(&source[end..body_end]);
                    base = resume;
                    reader = create_xml_reader(&bytes[resume..]);
                    continue;
                }
                open.push(id);
            }
            Event::Empty(elem) => {
                let end = base + reader.buffer_position() as usize;
                let span = tag_start(source, start)..end;
                push_element(&mut elements, &elem, open.last().copied(), span, true);
            }
            Event::End(elem) => {
                let tag = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
                // Close up to the nearest matching open element; stray end tags are ignored
                if let Some(pos) = open.iter().rposition(|id| elements[id.0].tag == tag) {
                    open.truncate(pos);
                }
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                append_text(&mut elements, &open, &decode_entities(&raw));
            }
            Event::GeneralRef(reference) => {
                let raw = format!("&{};", String::from_utf8_lossy(&reference));
                append_text(&mut elements, &open, &decode_entities(&raw));
            }
            Event::CData(data) => {
                append_text(&mut elements, &open, &String::from_utf8_lossy(&data));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    link_siblings(&mut elements);
    Ok(elements)
}

/// Locate the end tag closing a raw-text body that starts at `from`.
///
/// Returns the end of the body and the offset just past the end tag. Tag
/// names compare case-insensitively; an unclosed body runs to the end.
fn raw_text_end(source: &str, from: usize, tag: &str) -> (usize, usize) {
    let bytes = source.as_bytes();
    let name_len = tag.len();
    let mut at = from;
    while let Some(offset) = source[at..].find("</") {
        let open = at + offset;
        let name_start = open + 2;
        let name = bytes.get(name_start..name_start + name_len);
        let boundary = bytes
            .get(name_start + name_len)
            .is_none_or(|&b| b == b'>' || b == b'/' || b.is_ascii_whitespace());
        if boundary && name.is_some_and(|name| name.eq_ignore_ascii_case(tag.as_bytes())) {
            let resume = source[open..]
                .find('>')
                .map_or(source.len(), |close| open + close + 1);
            return (open, resume);
        }
        at = name_start;
    }
    (source.len(), source.len())
}

/// Record each element's neighbouring siblings.
///
/// Elements are stored in document order, so the previous sibling of an
/// element is the last element seen before it with the same parent.
fn link_siblings(elements: &mut [Element]) {
    let mut last_child: FxHashMap<Option<NodeId>, NodeId> = FxHashMap::default();
    for index in 0..elements.len() {
        let id = NodeId(index);
        if let Some(prev) = last_child.insert(elements[index].parent, id) {
            elements[index].prev = Some(prev);
            elements[prev.0].next = Some(id);
        }
    }
}

/// Byte offset of the `<` opening the tag read from `position`.
///
/// After a text event the reader has already consumed the `<`.
fn tag_start(source: &str, position: usize) -> usize {
    if source.as_bytes().get(position) == Some(&b'<') {
        position
    } else {
        source[..position].rfind('<').unwrap_or(position)
    }
}

fn push_element(
    elements: &mut Vec<Element>,
    elem: &BytesStart<'_>,
    parent: Option<NodeId>,
    span: Range<usize>,
    self_closing: bool,
) -> NodeId {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let attrs = elem
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value);
            (key, decode_entities(&raw).into_owned())
        })
        .collect();

    let id = NodeId(elements.len());
    elements.push(Element {
        tag: name.to_ascii_lowercase(),
        name,
        attrs,
        parent,
        prev: None,
        next: None,
        text: String::new(),
        span,
        self_closing,
        modified: false,
    });
    id
}

/// Text belongs to every open ancestor's text content.
fn append_text(elements: &mut [Element], open: &[NodeId], text: &str) {
    for id in open {
        elements[id.0].text.push_str(text);
    }
}
