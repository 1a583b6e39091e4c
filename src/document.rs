//! Markup-to-tree parsing
//!
//! Inference and validation both work on a small owned element tree. This module
//! builds that tree from text with `quick-xml`'s pull reader and rejects input
//! that is not well-formed. Namespaces, entities beyond the predefined ones,
//! processing instructions and DOCTYPE subsets are not interpreted: the XML
//! declaration, PIs and DOCTYPE are skipped, and a namespace declaration is just
//! another attribute.
//!
//! Nesting depth is capped (see [`ParseOptions::max_depth`]) so the recursive
//! walks done by the inferrer and validator stay bounded on hostile input.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;

use crate::error::{DtdError, Result};

/// Default cap on element nesting
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A node in an element's ordered child list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Character data, with CDATA sections folded in
    Text(String),
    Comment(String),
}

/// An element with its attributes and children in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Direct child elements, skipping text and comments
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// True if any direct text child contains something other than whitespace
    pub fn has_direct_text(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, XmlNode::Text(text) if !text.trim().is_empty()))
    }

    /// True if the element holds a child element or non-whitespace text
    pub fn has_meaningful_content(&self) -> bool {
        self.children.iter().any(|node| match node {
            XmlNode::Element(_) => true,
            XmlNode::Text(text) => !text.trim().is_empty(),
            XmlNode::Comment(_) => false,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(key, _)| key.as_str())
    }
}

/// Parser limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum element nesting depth; the root element is depth 1
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A parsed, well-formed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: XmlElement,
}

impl Document {
    /// Parse text with the default limits
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, &ParseOptions::default())
    }

    /// Parse text, rejecting it if it is not well-formed or nests too deeply
    pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().check_end_names = true;

        let mut open: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(DtdError::invalid_input(format!(
                        "malformed markup at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            };

            match event {
                Event::Start(start) => {
                    ensure_inside_document(&open, &root)?;
                    if open.len() >= options.max_depth {
                        return Err(DtdError::DepthLimitExceeded {
                            limit: options.max_depth,
                        });
                    }
                    open.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    ensure_inside_document(&open, &root)?;
                    if open.len() >= options.max_depth {
                        return Err(DtdError::DepthLimitExceeded {
                            limit: options.max_depth,
                        });
                    }
                    let element = element_from_start(&start)?;
                    attach(&mut open, &mut root, element)?;
                }
                Event::End(end) => {
                    let element = open.pop().ok_or_else(|| {
                        DtdError::invalid_input(format!(
                            "closing tag </{}> has no matching opening tag",
                            String::from_utf8_lossy(end.name().as_ref())
                        ))
                    })?;
                    attach(&mut open, &mut root, element)?;
                }
                Event::Text(text) => {
                    let content = text
                        .unescape()
                        .map_err(|e| DtdError::invalid_input(format!("bad character data: {}", e)))?;
                    push_text(&mut open, content.into_owned())?;
                }
                Event::CData(cdata) => {
                    push_text(&mut open, String::from_utf8_lossy(&cdata).into_owned())?;
                }
                Event::Comment(comment) => {
                    if let Some(parent) = open.last_mut() {
                        parent.children.push(XmlNode::Comment(
                            String::from_utf8_lossy(&comment).into_owned(),
                        ));
                    }
                }
                Event::Eof => break,
                // XML declaration, processing instructions and DOCTYPE carry nothing we model
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(DtdError::invalid_input(format!(
                "element <{}> is never closed",
                unclosed.name
            )));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| DtdError::invalid_input("document has no root element"))
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn into_root(self) -> XmlElement {
        self.root
    }
}

impl From<XmlElement> for Document {
    fn from(root: XmlElement) -> Self {
        Self { root }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| DtdError::invalid_input(format!("tag name is not UTF-8: {}", e)))?
        .to_string();

    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            DtdError::invalid_input(format!("bad attribute on <{}>: {}", element.name, e))
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| DtdError::invalid_input(format!("attribute name is not UTF-8: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| {
                DtdError::invalid_input(format!(
                    "bad value for attribute \"{}\" on <{}>: {}",
                    key, element.name, e
                ))
            })?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// A new element may only start inside the root, or be the root itself
fn ensure_inside_document(open: &[XmlElement], root: &Option<XmlElement>) -> Result<()> {
    if open.is_empty() && root.is_some() {
        return Err(DtdError::invalid_input(
            "document has more than one root element",
        ));
    }
    Ok(())
}

fn attach(
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(DtdError::invalid_input(
                "document has more than one root element",
            ));
        }
    }
    Ok(())
}

fn push_text(open: &mut [XmlElement], text: String) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Text(text)),
        None if text.trim().is_empty() => {}
        None => {
            return Err(DtdError::invalid_input(format!(
                "text outside the root element: {:?}",
                text.trim()
            )));
        }
    }
    Ok(())
}

/// Outcome of the quick pre-check run before conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputCheck {
    pub is_valid: bool,
    pub message: String,
}

/// Check that text is non-empty and well-formed without keeping the tree
pub fn check_input(text: &str) -> InputCheck {
    if text.trim().is_empty() {
        return InputCheck {
            is_valid: false,
            message: "Input cannot be empty.".to_string(),
        };
    }

    match Document::parse(text) {
        Ok(_) => InputCheck {
            is_valid: true,
            message: "Valid XML.".to_string(),
        },
        Err(_) => InputCheck {
            is_valid: false,
            message: "Invalid XML format.".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<note id="n1">
    <to>Tove</to>
    <from>Jani</from>
    <!-- reminder -->
    <body><![CDATA[Don't forget <me>]]></body>
    <flag/>
</note>"#;

    #[test]
    fn test_parse_builds_tree() {
        let doc = Document::parse(NOTE).unwrap();
        let root = doc.root();

        assert_eq!(root.name, "note");
        assert_eq!(root.attribute("id"), Some("n1"));

        let names: Vec<&str> = root.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["to", "from", "body", "flag"]);
        assert!(
            root.children
                .iter()
                .any(|n| matches!(n, XmlNode::Comment(c) if c.trim() == "reminder"))
        );
    }

    #[test]
    fn test_text_detection() {
        let doc = Document::parse(NOTE).unwrap();
        let root = doc.root();
        assert!(!root.has_direct_text());

        let to = root.child_elements().next().unwrap();
        assert!(to.has_direct_text());

        let body = root.child_elements().find(|e| e.name == "body").unwrap();
        assert!(body.has_direct_text());

        let flag = root.child_elements().find(|e| e.name == "flag").unwrap();
        assert!(!flag.has_meaningful_content());
    }

    #[test]
    fn test_entities_are_unescaped() {
        let doc = Document::parse(r#"<t a="x &amp; y">1 &lt; 2</t>"#).unwrap();
        assert_eq!(doc.root().attribute("a"), Some("x & y"));
        assert_eq!(doc.root().children, vec![XmlNode::Text("1 < 2".to_string())]);
    }

    #[test]
    fn test_comment_only_element_has_no_meaningful_content() {
        let doc = Document::parse("<e>  <!-- nothing -->  </e>").unwrap();
        assert!(!doc.root().has_meaningful_content());
    }

    #[test]
    fn test_unclosed_tag_rejected() {
        let err = Document::parse("<note><to>Tove</to>").unwrap_err();
        assert!(err.is_input_rejection());
        assert!(err.to_string().contains("note"));
    }

    #[test]
    fn test_mismatched_tag_rejected() {
        let err = Document::parse("<note><body>text</note>").unwrap_err();
        assert!(err.is_input_rejection());
    }

    #[test]
    fn test_stray_end_tag_rejected() {
        assert!(Document::parse("<a/></b>").is_err());
    }

    #[test]
    fn test_second_root_rejected() {
        let err = Document::parse("<a/><b/>").unwrap_err();
        assert!(err.to_string().contains("more than one root"));
    }

    #[test]
    fn test_text_outside_root_rejected() {
        assert!(Document::parse("<a/>trailing").is_err());
        assert!(Document::parse("   \n<a/>\n  ").is_ok());
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = Document::parse("").unwrap_err();
        assert!(err.to_string().contains("no root element"));
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        assert!(Document::parse(r#"<a x="1" x="2"/>"#).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let options = ParseOptions { max_depth: 3 };
        assert!(Document::parse_with("<a><b><c/></b></a>", &options).is_ok());

        let err = Document::parse_with("<a><b><c><d/></c></b></a>", &options).unwrap_err();
        match err {
            DtdError::DepthLimitExceeded { limit } => assert_eq!(limit, 3),
            other => panic!("Expected DepthLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_check_input_messages() {
        assert_eq!(
            check_input("  ").message,
            "Input cannot be empty.".to_string()
        );

        let bad = check_input("<message><text>Hello</message>");
        assert!(!bad.is_valid);
        assert_eq!(bad.message, "Invalid XML format.");

        let good = check_input("<message><text>Hello</text></message>");
        assert!(good.is_valid);
        assert_eq!(good.message, "Valid XML.");
    }
}
