use quick_xml::{
    Reader, Writer,
    escape::{resolve_html5_entity, unescape_with},
    events::{BytesStart, Event},
};
use std::borrow::Cow;
use std::io::Cursor;

pub type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Elements that never have an end tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose body is raw text, not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[inline]
pub fn create_xml_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    // `Q&A`, `Tom & Jerry`: HTML text may carry a bare ampersand
    reader.config_mut().allow_dangling_amp = true;
    reader
}

#[inline]
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[inline]
pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// Resolve character and HTML5 named references.
///
/// Unknown references and bare ampersands stay as written.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    if let Ok(decoded) = unescape_with(raw, resolve_html5_entity) {
        return decoded;
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let reference = tail
            .find(';')
            .map(|end| &tail[..=end])
            .filter(|reference| !reference[1..].contains(['&', ' ', '<']));
        match reference.and_then(|reference| unescape_with(reference, resolve_html5_entity).ok()) {
            Some(decoded) => {
                out.push_str(&decoded);
                rest = &tail[reference.map_or(1, str::len)..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Write a start tag with the given attributes: `<tag a="1">` or `<tag a="1"/>`.
///
/// Attribute values are escaped on the way out.
pub fn write_start_tag(
    tag: &str,
    attrs: &[(String, String)],
    self_closing: bool,
) -> std::io::Result<String> {
    let mut elem = BytesStart::new(tag);
    for (key, value) in attrs {
        elem.push_attribute((key.as_str(), value.as_str()));
    }

    let mut writer: XmlWriter = Writer::new(Cursor::new(Vec::new()));
    if self_closing {
        writer.write_event(Event::Empty(elem))?;
    } else {
        writer.write_event(Event::Start(elem))?;
    }
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("plain"), "plain");
        assert_eq!(decode_entities("Q&amp;A"), "Q&A");
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{a0}b");
        assert_eq!(decode_entities("&#65;"), "A");
    }

    #[test]
    fn test_decode_entities_keeps_bare_ampersands() {
        assert_eq!(decode_entities("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&A"), "&A");
        assert_eq!(decode_entities("AT&T &amp; co"), "AT&T & co");
        assert_eq!(decode_entities("&bogus; &lt;"), "&bogus; <");
    }

    #[test]
    fn test_reader_allows_dangling_ampersand() {
        let mut reader = create_xml_reader(b"<p>Q&A</p>");
        let mut text = String::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Text(chunk) => text.push_str(&String::from_utf8_lossy(&chunk)),
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(text, "Q&A");
    }

    #[test]
    fn test_decode_entities_keeps_unknown() {
        assert_eq!(decode_entities("fish &chips"), "fish &chips");
    }

    #[test]
    fn test_write_start_tag() {
        let attrs = vec![
            ("class".to_string(), "title".to_string()),
            ("id".to_string(), "a\"b".to_string()),
        ];
        assert_eq!(
            write_start_tag("h2", &attrs, false).unwrap(),
            r#"<h2 class="title" id="a&quot;b">"#
        );
        assert_eq!(write_start_tag("h2", &[], true).unwrap(), "<h2/>");
    }

    #[test]
    fn test_element_kinds() {
        assert!(is_void_element("br"));
        assert!(!is_void_element("h2"));
        assert!(is_raw_text_element("script"));
        assert!(!is_raw_text_element("div"));
    }
}
