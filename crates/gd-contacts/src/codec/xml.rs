//! Minimal namespace-aware element tree and writer on top of quick-xml.

use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;

use crate::error::{ContactsError, Result};

/// A parsed XML element with its namespace resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Namespace URI, `None` when the element is not bound to any namespace.
    pub ns: Option<String>,
    pub local: String,
    /// Attributes keyed by local name. Namespace declarations are dropped.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated direct character data.
    pub text: String,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(xml).map_err(|e| ContactsError::XmlParseError(e.to_string()))?;
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let (ns, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(ref e) => {
                    let element = Self::open(namespace(ns)?, e)?;
                    stack.push(element);
                }
                Event::Empty(ref e) => {
                    let element = Self::open(namespace(ns)?, e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        return Err(ContactsError::XmlParseError("unbalanced end tag".to_string()));
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(ref t) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        let raw = c.into_inner();
                        current.text.push_str(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::Eof => {
                    return Err(ContactsError::XmlParseError(
                        "unexpected end of document".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    fn open(ns: Option<String>, start: &BytesStart<'_>) -> Result<Self> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let name = utf8(attr.key.local_name().as_ref())?;
            let value = attr.unescape_value()?.into_owned();
            attrs.push((name, value));
        }

        Ok(Self {
            ns,
            local: utf8(start.local_name().as_ref())?,
            attrs,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Local name match, optionally constrained to a namespace.
    pub fn is(&self, ns: Option<&str>, local: &str) -> bool {
        self.local == local && (ns.is_none() || self.ns.as_deref() == ns)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, or the empty string when absent.
    pub fn attr_or_empty(&self, name: &str) -> String {
        self.attr(name).unwrap_or_default().to_string()
    }

    /// Boolean attribute; absent means `false`.
    pub fn bool_attr(&self, name: &str) -> Result<bool> {
        match self.attr(name) {
            None => Ok(false),
            Some(value) => parse_bool(value).ok_or_else(|| {
                ContactsError::Format(format!(
                    "invalid boolean {:?} in attribute {} of <{}>",
                    value, name, self.local
                ))
            }),
        }
    }

    /// First child with the given local name, in any namespace.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local == local)
    }

    /// Children matching `ns`/`local`, in document order.
    pub fn children_named<'a>(
        &'a self,
        ns: Option<&'a str>,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.is(ns, local))
    }

    /// Text of the first child with the given local name, empty when absent.
    pub fn child_text(&self, local: &str) -> String {
        self.child(local).map(|c| c.text.clone()).unwrap_or_default()
    }
}

fn namespace(resolved: ResolveResult<'_>) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(ContactsError::XmlParseError(format!(
            "unknown namespace prefix {:?}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ContactsError::XmlParseError(e.to_string()))
}

/// Accepts the spellings the service and common serializers produce.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Buffered XML writer used by the encoders.
pub struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl Default for XmlOut {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlOut {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    /// Opening tag. Attributes with empty values are left out.
    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let start = tag(name, &[], attrs);
        self.emit(Event::Start(start))
    }

    /// Self-closing tag. Attributes with empty values are left out.
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let start = tag(name, &[], attrs);
        self.emit(Event::Empty(start))
    }

    /// Self-closing tag whose `required` attributes are written even when empty.
    pub fn empty_with(
        &mut self,
        name: &str,
        required: &[(&str, &str)],
        optional: &[(&str, &str)],
    ) -> Result<()> {
        let start = tag(name, required, optional);
        self.emit(Event::Empty(start))
    }

    pub fn end(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    pub fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.emit(Event::Text(BytesText::new(text)))
    }

    /// `<name>text</name>`, or nothing when `text` is empty.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.start(name, &[])?;
        self.text(text)?;
        self.end(name)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| ContactsError::XmlWriteError(e.to_string()))
    }
}

fn tag<'a>(
    name: &'a str,
    required: &[(&'a str, &'a str)],
    optional: &[(&'a str, &'a str)],
) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    let optional = optional.iter().filter(|(_, value)| !value.is_empty());
    for (key, value) in required.iter().chain(optional) {
        start.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: Cow::Owned(escape_attribute(value).into_bytes()),
        });
    }
    start
}

/// Escape an attribute value, including the whitespace characters a parser
/// would otherwise normalize to spaces.
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\n', "&#xA;")
        .replace('\r', "&#xD;")
        .replace('\t', "&#x9;")
}

/// Attribute value for a boolean flag: `"true"` when set, omitted otherwise.
pub(crate) fn flag(value: bool) -> &'static str {
    if value { "true" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GD: &str = "http://schemas.google.com/g/2005";

    #[test]
    fn test_parse_resolves_namespaces() {
        let xml = br#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005" gd:etag="&quot;abc&quot;">
            <gd:email address="a@b.com"/>
            <title>x &amp; y</title>
        </entry>"#;

        let root = Element::parse(xml).unwrap();
        assert_eq!(root.local, "entry");
        assert_eq!(root.ns.as_deref(), Some("http://www.w3.org/2005/Atom"));
        assert_eq!(root.attr("etag"), Some("\"abc\""));
        assert!(root.attr("gd").is_none());

        let email = root.children_named(Some(GD), "email").next().unwrap();
        assert_eq!(email.attr("address"), Some("a@b.com"));
        assert_eq!(root.child_text("title"), "x & y");
    }

    #[test]
    fn test_parse_rejects_truncated_document() {
        let err = Element::parse(b"<entry><id>1</id>").unwrap_err();
        assert!(matches!(err, ContactsError::XmlParseError(_)));
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(Element::parse(b"<entry><id>1</name></entry>").is_err());
    }

    #[test]
    fn test_cdata_is_text() {
        let root = Element::parse(b"<content><![CDATA[a <b>]]></content>").unwrap();
        assert_eq!(root.text, "a <b>");
    }

    #[test]
    fn test_bool_attr() {
        let root = Element::parse(br#"<x a="true" b="0" c="maybe"/>"#).unwrap();
        assert!(root.bool_attr("a").unwrap());
        assert!(!root.bool_attr("b").unwrap());
        assert!(!root.bool_attr("missing").unwrap());
        assert!(matches!(root.bool_attr("c"), Err(ContactsError::Format(_))));
    }

    #[test]
    fn test_attribute_whitespace_is_escaped() {
        let mut out = XmlOut::new();
        out.empty("x", &[("v", "a\nb\tc\rd & \"e\"")]).unwrap();
        let xml = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(xml, r#"<x v="a&#xA;b&#x9;c&#xD;d &amp; &quot;e&quot;"/>"#);

        let root = Element::parse(xml.as_bytes()).unwrap();
        assert_eq!(root.attr("v"), Some("a\nb\tc\rd & \"e\""));
    }

    #[test]
    fn test_writer_omits_empty_attributes_and_text() {
        let mut out = XmlOut::new();
        out.empty("gd:email", &[("address", "a@b.com"), ("label", ""), ("primary", flag(false))])
            .unwrap();
        out.text_element("gd:city", "").unwrap();
        out.text_element("gd:city", "Oslo & Bergen").unwrap();
        let xml = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(
            xml,
            r#"<gd:email address="a@b.com"/><gd:city>Oslo &amp; Bergen</gd:city>"#
        );
    }
}
