//! Extension calls
//!
//! Extensions are server-side exits resolved by the extension manager. The
//! object store keeps the fully qualified name (`handler/context/name`) and
//! the parameter values bound to each call.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ObjectStoreError, Result};
use crate::model::replacement::ReplacementValue;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{XmlComponent, XmlElement};

static EXTENSION_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/\s]+/[^/\s]+(/[^/\s]+)*/[^/\s]+$").unwrap());

/// A bound call to an extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionCall {
    name: String,
    parameters: Vec<ReplacementValue>,
}

impl ExtensionCall {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_extension_ref(&name)?;
        Ok(Self {
            name,
            parameters: Vec::new(),
        })
    }

    pub fn with_parameter(mut self, value: ReplacementValue) -> Self {
        self.parameters.push(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler part of the reference, e.g. `Java` in `Java/global/com.acme.Exit`
    pub fn handler(&self) -> &str {
        self.name.split('/').next().unwrap_or_default()
    }

    /// Last segment of the reference
    pub fn extension_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    pub fn parameters(&self) -> &[ReplacementValue] {
        &self.parameters
    }

    pub fn add_parameter(&mut self, value: ReplacementValue) {
        self.parameters.push(value);
    }
}

fn check_extension_ref(name: &str) -> Result<()> {
    if EXTENSION_REF.is_match(name) {
        Ok(())
    } else {
        Err(ObjectStoreError::invalid(
            "extension name",
            name,
            "expected 'handler/context/name'",
        ))
    }
}

impl XmlComponent for ExtensionCall {
    const NODE_NAME: &'static str = "PSXExtensionCall";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_child(XmlElement::text_node("name", self.name.as_str()));
        for param in &self.parameters {
            node.push(
                XmlElement::new("PSXExtensionParamValue")
                    .with_child(param.to_wrapped_xml("value")),
            );

        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut call = Self::new(node.required_child_text("name")?)?;
        for param in node.children_named("PSXExtensionParamValue") {
            call.parameters
                .push(ReplacementValue::from_wrapped_xml(param.required_child("value")?)?);
        }
        Ok(call)
    }
}

impl Validate for ExtensionCall {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_extension_ref(&self.name) {
            cx.error("INVALID_EXTENSION_REF", e.to_string());
        }
        for (i, param) in self.parameters.iter().enumerate() {
            cx.validate_child(format!("PSXExtensionParamValue[{}]", i), param);
        }
    }
}

/// Ordered set of extension calls, run in sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExtensionCallSet {
    calls: Vec<ExtensionCall>,
}

impl ExtensionCallSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[ExtensionCall] {
        &self.calls
    }

    pub fn push(&mut self, call: ExtensionCall) {
        self.calls.push(call);
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }
}

impl FromIterator<ExtensionCall> for ExtensionCallSet {
    fn from_iter<I: IntoIterator<Item = ExtensionCall>>(iter: I) -> Self {
        Self {
            calls: iter.into_iter().collect(),
        }
    }
}

impl XmlComponent for ExtensionCallSet {
    const NODE_NAME: &'static str = "PSXExtensionCallSet";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME);
        for call in &self.calls {
            node.push(call.to_xml());
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        node.children_named(ExtensionCall::NODE_NAME)
            .map(ExtensionCall::from_xml)
            .collect()
    }
}

impl Validate for ExtensionCallSet {
    fn validate(&self, cx: &mut ValidationContext) {
        for (i, call) in self.calls.iter().enumerate() {
            cx.validate_child(format!("PSXExtensionCall[{}]", i), call);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_parts() {
        let call = ExtensionCall::new("Java/global/percussion.html.sys_FormatDate").unwrap();
        assert_eq!(call.handler(), "Java");
        assert_eq!(call.extension_name(), "percussion.html.sys_FormatDate");
    }

    #[test]
    fn test_bad_references() {
        assert!(ExtensionCall::new("justaname").is_err());
        assert!(ExtensionCall::new("Java/global/").is_err());
        assert!(ExtensionCall::new("Java/my context/exit").is_err());
    }

    #[test]
    fn test_call_set_xml() {
        let set: ExtensionCallSet = vec![
            ExtensionCall::new("Java/global/a.First").unwrap(),
            ExtensionCall::new("Java/global/b.Second")
                .unwrap()
                .with_parameter(ReplacementValue::html_param("p")),
        ]
        .into_iter()
        .collect();

        let parsed = ExtensionCallSet::from_xml_str(&set.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, set);
        assert_eq!(parsed.calls()[1].extension_name(), "b.Second");
    }
}
