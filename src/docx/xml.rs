//! An owned element tree over `quick-xml` events, for rewriting parts in place.
//!
//! quick-xml does the lexing, entity handling and escaping; this module only
//! stacks its events into [`Element`]s so a paragraph can be inspected and
//! rebuilt as a whole. Element and attribute names are kept as qualified
//! names (`w:p`, `xml:space`) and namespace declarations ride along as
//! ordinary attributes, so a parse/write cycle leaves untouched markup
//! equivalent to the source.
//!
//! Everything written goes through [`sanitize_text`]: XML 1.0 has no
//! representation for most C0 control characters, even escaped.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Comment, processing instruction or CDATA section, written back as-is.
    Other(Event<'static>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A parsed XML part: prolog events (declaration, comments) plus the root.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub prolog: Vec<Event<'static>>,
    pub root: Element,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Direct element children.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Every descendant element with the given name, document order.
    pub fn descendants<'a>(&'a self, name: &'a str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// Visit every descendant element with the given name, mutably, in
    /// document order. Matches are not searched for nested matches.
    pub fn for_each_named_mut(&mut self, name: &str, f: &mut dyn FnMut(&mut Element)) {
        for child in self.elements_mut() {
            if child.name == name {
                f(child);
            } else {
                child.for_each_named_mut(name, f);
            }
        }
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), String> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attrs {
            start.push_attribute((k.as_str(), sanitize_text(v).as_ref()));
        }
        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(|e| e.to_string());
        }
        writer
            .write_event(Event::Start(start))
            .map_err(|e| e.to_string())?;
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_to(writer)?,
                Node::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(&sanitize_text(t))))
                    .map_err(|e| e.to_string())?,
                Node::Other(event) => writer
                    .write_event(event.clone())
                    .map_err(|e| e.to_string())?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| e.to_string())
    }

    pub fn to_xml(&self) -> Result<String, String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
    }
}

impl XmlDocument {
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.prolog {
            writer
                .write_event(event.clone())
                .map_err(|e| e.to_string())?;
        }
        self.root.write_to(&mut writer)?;
        Ok(writer.into_inner())
    }
}

/// Parse a complete XML part.
pub fn parse(xml: &str) -> Result<XmlDocument, String> {
    let mut reader = Reader::from_str(xml);
    let mut prolog = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{e} (at byte {})", reader.buffer_position()))?;
        match event {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => attach(element_from(&start)?, &mut stack, &mut root)?,
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| e.to_string())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(text.into_owned())),
                    None if text.trim().is_empty() => {}
                    None => return Err("text outside the root element".to_string()),
                }
            }
            Event::Eof => break,
            other => {
                let other = other.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Other(other)),
                    None => prolog.push(other),
                }
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    let root = root.ok_or_else(|| "document has no root element".to_string())?;
    Ok(XmlDocument { prolog, root })
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        element.attrs.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!("second root element <{}>", element.name)),
    }
}

/// Whether XML 1.0 can carry `c` at all (`Char` production).
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Make `s` representable in XML 1.0. Vertical tab and form feed become line
/// breaks; every other character outside the `Char` production is dropped.
pub fn sanitize_text(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .filter_map(|c| match c {
                '\u{0B}' | '\u{0C}' => Some('\n'),
                c if is_xml_char(c) => Some(c),
                _ => None,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reparse(doc: &XmlDocument) -> XmlDocument {
        let bytes = doc.to_bytes().unwrap();
        parse(std::str::from_utf8(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn parses_nested_elements_and_text() {
        let doc = parse(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t xml:space="preserve">Hi &amp; bye</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#,
        )
        .unwrap();
        assert_eq!(doc.root.name, "w:document");
        assert_eq!(doc.root.attr("xmlns:w"), Some("urn:w"));
        let texts = doc.root.descendants("w:t");
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].children, vec![Node::Text("Hi & bye".into())]);
        assert_eq!(texts[0].attr("xml:space"), Some("preserve"));
    }

    #[test]
    fn write_then_parse_keeps_structure() {
        let src = r#"<a x="1" y='two &quot;q&quot;'><!-- note --><b/><c>t&lt;1</c></a>"#;
        let doc = parse(src).unwrap();
        let again = reparse(&doc);
        assert_eq!(doc.root, again.root);
        assert_eq!(doc.root.attr("y"), Some("two \"q\""));
    }

    #[test]
    fn rejects_malformed_parts() {
        assert!(parse("<a><b></a></b>").is_err());
        assert!(parse("<a>").is_err());
        assert!(parse("").is_err());
        assert!(parse("<a/><b/>").is_err());
    }

    #[test]
    fn control_characters_never_reach_the_output() {
        let mut root = Element::new("w:t").with_attr("note", "bell\u{7}");
        root.push_text("Page one\u{0C}page two\u{0B}end\u{0}");
        let doc = XmlDocument {
            prolog: Vec::new(),
            root,
        };
        let bytes = doc.to_bytes().unwrap();
        assert!(
            bytes.iter().all(|&b| b >= 0x20 || matches!(b, b'\t' | b'\n' | b'\r')),
            "{bytes:?}"
        );
        let again = reparse(&doc);
        assert_eq!(
            again.root.children,
            vec![Node::Text("Page one\npage two\nend".into())]
        );
        assert_eq!(again.root.attr("note"), Some("bell"));
    }

    #[test]
    fn sanitize_borrows_clean_text() {
        assert!(matches!(sanitize_text("plain – text\t"), Cow::Borrowed(_)));
        assert_eq!(sanitize_text("a\u{1}b\u{FFFE}c"), "abc");
    }

    #[test]
    fn for_each_named_mut_visits_in_order() {
        let mut doc = parse("<r><p>1</p><t><p>2</p></t></r>").unwrap();
        let mut seen = Vec::new();
        doc.root.for_each_named_mut("p", &mut |p| {
            if let Some(Node::Text(t)) = p.children.first() {
                seen.push(t.clone());
            }
            p.attrs.push(("seen".into(), "1".into()));
        });
        assert_eq!(seen, vec!["1", "2"]);
        assert_eq!(doc.root.descendants("p")[1].attr("seen"), Some("1"));
    }
}
