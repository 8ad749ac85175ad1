//! XML tree and codec for the persisted object-store format
//!
//! Documents are read into a small owned element tree and every component
//! walks that tree in its `from_xml`. Writing goes the other way: a component
//! builds an [`XmlElement`] and [`write_document`] renders it.
//!
//! ## Whitespace
//!
//! Leaf text is kept verbatim. Whitespace-only text in an element that has
//! child elements is indentation and is dropped.

use std::collections::BTreeMap;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::config::{OutputConfig, OutputFormat};
use crate::error::{ObjectStoreError, Result};

/// A parsed XML element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A leaf element holding only text, e.g. `<name>value</name>`
    pub fn text_node(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).with_text(text)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Set an attribute, replacing an existing value with the same key
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn required_attr(&self, name: &str) -> Result<&str> {
        self.attr(name)
            .ok_or_else(|| ObjectStoreError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn required_child(&self, name: &str) -> Result<&XmlElement> {
        self.child(name)
            .ok_or_else(|| ObjectStoreError::MissingElement {
                parent: self.name.clone(),
                element: name.to_string(),
            })
    }

    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// The first child element, whatever its name
    pub fn first_child(&self) -> Option<&XmlElement> {
        self.children.first()
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    pub fn required_child_text(&self, name: &str) -> Result<&str> {
        self.required_child(name).map(|c| c.text.as_str())
    }

    /// Fail with `UnknownNodeType` unless this element is named `expected`
    pub fn expect_name(&self, expected: &str) -> Result<()> {
        if self.name == expected {
            Ok(())
        } else {
            Err(ObjectStoreError::unknown_node(expected, &self.name))
        }
    }
}

/// A component with a fixed XML representation
pub trait XmlComponent: Sized {
    /// Root element name of this component
    const NODE_NAME: &'static str;

    fn to_xml(&self) -> XmlElement;

    fn from_xml(node: &XmlElement) -> Result<Self>;

    fn to_xml_string(&self) -> Result<String> {
        self.to_xml_string_with(&WriteOptions::default())
    }

    fn to_xml_string_with(&self, options: &WriteOptions) -> Result<String> {
        write_document(&self.to_xml(), options)
    }

    fn from_xml_str(input: &str) -> Result<Self> {
        Self::from_xml(&parse_document(input)?)
    }
}

/// How documents are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub format: OutputFormat,
    pub indent: usize,
    pub include_declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            indent: 2,
            include_declaration: true,
        }
    }
}

impl WriteOptions {
    /// Single-line output without declaration, used for fingerprints and diffs
    pub fn canonical() -> Self {
        Self {
            format: OutputFormat::Compact,
            indent: 0,
            include_declaration: false,
        }
    }
}

impl From<&OutputConfig> for WriteOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            format: config.format,
            indent: config.indent,
            include_declaration: config.include_declaration,
        }
    }
}

/// Parse a document into its root element
pub fn parse_document(input: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| ObjectStoreError::Malformed("unexpected closing tag".into()))?;
                if !element.children.is_empty() && element.text.trim().is_empty() {
                    element.text.clear();
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(ObjectStoreError::Malformed(
                            "text outside of the root element".into(),
                        ))
                    }
                }
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(text);
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ObjectStoreError::Malformed(format!(
            "element <{}> is never closed",
            open.name
        )));
    }

    let root = root.ok_or_else(|| ObjectStoreError::Malformed("empty document".into()))?;
    debug!(root = %root.name, "parsed document");
    Ok(root)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ObjectStoreError::Malformed(format!(
            "second root element <{}>",
            element.name
        ))),
    }
}

/// Render an element tree as a document
pub fn write_document(root: &XmlElement, options: &WriteOptions) -> Result<String> {
    let mut writer = match options.format {
        OutputFormat::Pretty => Writer::new_with_indent(Vec::new(), b' ', options.indent),
        OutputFormat::Compact => Writer::new(Vec::new()),
    };

    if options.include_declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    }
    write_element(&mut writer, root)?;

    let bytes = writer.into_inner();
    let document = String::from_utf8(bytes).map_err(|e| e.utf8_error())?;
    Ok(document)
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

// =============================================================================
// Value helpers
// =============================================================================

/// Persisted form of a boolean
pub fn flag_text(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Parse a persisted boolean (`yes`/`no`, `true`/`false`)
pub fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err(ObjectStoreError::invalid(field, value, "expected 'yes' or 'no'")),
    }
}

/// Read a yes/no child element; a missing child is `false`
pub fn child_flag(node: &XmlElement, name: &str) -> Result<bool> {
    match node.child_text(name) {
        Some(text) => parse_flag(name, text),
        None => Ok(false),
    }
}

/// Read a yes/no attribute; a missing attribute is `default`
pub fn attr_flag(node: &XmlElement, name: &str, default: bool) -> Result<bool> {
    match node.attr(name) {
        Some(value) => parse_flag(name, value),
        None => Ok(default),
    }
}

pub fn parse_number<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ObjectStoreError::invalid(field, value, e.to_string()))
}

/// Parse a count or threshold, rejecting negative numbers explicitly
pub fn parse_non_negative(field: &str, value: &str) -> Result<u32> {
    let number: i64 = parse_number(field, value)?;
    if number < 0 {
        return Err(ObjectStoreError::invalid(field, value, "must not be negative"));
    }
    u32::try_from(number).map_err(|_| ObjectStoreError::invalid(field, value, "out of range"))
}

/// Write a name/value map as `<container><item name="k">v</item>...</container>`
pub fn properties_to_xml(
    container: &str,
    item: &str,
    map: &BTreeMap<String, String>,
) -> XmlElement {

    let mut node = XmlElement::new(container);
    for (name, value) in map {
        node.push(XmlElement::text_node(item, value.as_str()).with_attr("name", name.as_str()));
    }
    node
}

/// Read a name/value map written by [`properties_to_xml`]
pub fn properties_from_xml(node: &XmlElement, item: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in node.children_named(item) {
        let name = entry.required_attr("name")?;
        if map.insert(name.to_string(), entry.text.clone()).is_some() {
            return Err(ObjectStoreError::Duplicate {
                kind: "property",
                name: name.to_string(),
            });
        }
    }
    Ok(map)
}
