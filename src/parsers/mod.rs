//! Feed document parsing into a navigable element tree.
//!
//! The mapping DSL selects nodes dynamically at runtime, so the document is
//! materialized as a tree rather than deserialized into typed structs. The
//! tree is built from a single `quick-xml` event pass; malformed input is a
//! hard error, never a partial parse.

pub mod resolver;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::errors::ImportError;

/// One element of the parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// Parse a complete document, returning its root element.
    pub fn parse(data: &[u8]) -> Result<Self, ImportError> {
        let mut reader = Reader::from_reader(data);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| ImportError::Xml(e.to_string()))?;
            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let decoded = text
                            .unescape()
                            .map_err(|e| ImportError::Xml(e.to_string()))?;
                        current.text.push_str(&decoded);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ImportError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(ImportError::Xml("unclosed element".to_string()));
        }

        root.ok_or_else(|| ImportError::Xml("document has no root element".to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// All descendants matching a `/`-separated relative path.
    pub fn find_all(&self, path: &str) -> Vec<&XmlElement> {
        let mut matches: Vec<&XmlElement> = vec![self];
        for segment in path.split('/') {
            matches = matches
                .iter()
                .flat_map(|node| node.children.iter().filter(|c| c.name == segment))
                .collect();
        }
        matches
    }

    /// First descendant matching a relative path.
    pub fn first(&self, path: &str) -> Option<&XmlElement> {
        self.find_all(path).into_iter().next()
    }

    /// Trimmed text of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.first(name).map(|node| node.text.trim())
    }
}

fn element_from_start(
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<XmlElement, ImportError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ImportError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ImportError::Xml(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), ImportError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None => {
            if root.is_some() {
                return Err(ImportError::Xml(
                    "document has multiple root elements".to_string(),
                ));
            }
            *root = Some(element);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
        <openimmo>
            <anbieter>
                <anbieternr>AB123</anbieternr>
                <immobilie>
                    <geo><plz> 50667 </plz><ort>K&#246;ln</ort></geo>
                    <freitexte><objekttitel><![CDATA[Altbau & Garten]]></objekttitel></freitexte>
                    <verwaltung_techn>
                        <aktion aktionart="CHANGE"/>
                    </verwaltung_techn>
                </immobilie>
            </anbieter>
        </openimmo>"#;

    #[test]
    fn parses_document_tree() {
        let root = XmlElement::parse(SAMPLE).unwrap();
        assert_eq!(root.name(), "openimmo");
        assert_eq!(root.children().len(), 1);

        let listing = root.first("anbieter/immobilie").unwrap();
        assert_eq!(listing.child_text("geo/plz"), Some("50667"));
        assert_eq!(root.first("anbieter/fehlt"), None);
    }

    #[test]
    fn decodes_entities_and_cdata() {
        let root = XmlElement::parse(SAMPLE).unwrap();
        let ort = root.first("anbieter/immobilie/geo/ort").unwrap();
        assert_eq!(ort.text(), "K\u{f6}ln");

        let title = root
            .first("anbieter/immobilie/freitexte/objekttitel")
            .unwrap();
        assert_eq!(title.text(), "Altbau & Garten");
    }

    #[test]
    fn reads_attributes_of_empty_elements() {
        let root = XmlElement::parse(SAMPLE).unwrap();
        let aktion = root
            .first("anbieter/immobilie/verwaltung_techn/aktion")
            .unwrap();
        assert_eq!(aktion.attr("aktionart"), Some("CHANGE"));
        assert_eq!(aktion.attr("missing"), None);
    }

    #[test]
    fn find_all_collects_repeated_nodes() {
        let data = b"<r><a><b>1</b><b>2</b></a><a><b>3</b></a></r>";
        let root = XmlElement::parse(data).unwrap();
        let matches = root.find_all("a/b");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[2].text(), "3");
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = XmlElement::parse(b"<openimmo><anbieter></openimmo>").unwrap_err();
        assert!(err.is_feed());
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(XmlElement::parse(b"<openimmo><anbieter>").is_err());
        assert!(XmlElement::parse(b"").is_err());
    }
}
