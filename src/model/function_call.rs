//! Database function calls

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ObjectStoreError, Result};
use crate::model::replacement::ReplacementValue;
use crate::model::require_text;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{XmlComponent, XmlElement};

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap());

/// A call to a named database function with positional parameters
///
/// The function itself is resolved by the server's database function
/// manager; here it is only referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCall {
    name: String,
    parameters: Vec<ReplacementValue>,
}

impl FunctionCall {
    pub const MAX_NAME_LENGTH: usize = 255;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let mut call = Self {
            name: String::new(),
            parameters: Vec::new(),
        };
        call.set_name(name)?;
        Ok(call)
    }

    pub fn with_parameter(mut self, value: ReplacementValue) -> Self {
        self.parameters.push(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        check_function_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn parameters(&self) -> &[ReplacementValue] {
        &self.parameters
    }

    pub fn add_parameter(&mut self, value: ReplacementValue) {
        self.parameters.push(value);
    }

    pub fn set_parameters(&mut self, parameters: Vec<ReplacementValue>) {
        self.parameters = parameters;
    }
}

fn check_function_name(name: &str) -> Result<()> {
    require_text("function name", name, FunctionCall::MAX_NAME_LENGTH)?;
    if !FUNCTION_NAME.is_match(name) {
        return Err(ObjectStoreError::invalid(
            "function name",
            name,
            "must start with a letter or underscore and contain only letters, digits, '_' or '.'",
        ));
    }
    Ok(())
}

impl XmlComponent for FunctionCall {
    const NODE_NAME: &'static str = "PSXFunctionCall";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_child(XmlElement::text_node("name", self.name.as_str()));
        for param in &self.parameters {
            node.push(
                XmlElement::new("PSXFunctionParamValue").with_child(param.to_wrapped_xml("value")),
            );

        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut call = Self::new(node.required_child_text("name")?)?;
        for param in node.children_named("PSXFunctionParamValue") {
            call.parameters
                .push(ReplacementValue::from_wrapped_xml(param.required_child("value")?)?);
        }
        Ok(call)
    }
}

impl Validate for FunctionCall {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_function_name(&self.name) {
            cx.error("INVALID_FUNCTION_NAME", e.to_string());
        }
        for (i, param) in self.parameters.iter().enumerate() {
            cx.validate_child(format!("PSXFunctionParamValue[{}]", i), param);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_order_survives_xml() {
        let call = FunctionCall::new("COALESCE")
            .unwrap()
            .with_parameter(ReplacementValue::column("T", "A"))
            .with_parameter(ReplacementValue::html_param("fallback"))
            .with_parameter(ReplacementValue::literal("0"));
        let text = call.to_xml_string().unwrap();
        let parsed = FunctionCall::from_xml_str(&text).unwrap();
        assert_eq!(parsed, call);
        assert_eq!(parsed.parameters()[1], ReplacementValue::html_param("fallback"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(FunctionCall::new("").is_err());
        assert!(FunctionCall::new("1ABS").is_err());
        assert!(FunctionCall::new("my func").is_err());
        assert!(FunctionCall::new("pkg.func_2").is_ok());
        assert!(FunctionCall::new("F".repeat(256)).is_err());
    }

    #[test]
    fn test_wrong_root_is_unknown_node() {
        let err = FunctionCall::from_xml_str("<PSXExtensionCall><name>x</name></PSXExtensionCall>")
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::UnknownNodeType { .. }));
    }

    #[test]
    fn test_validation_recurses_into_parameters() {
        let call = FunctionCall::new("LOWER")
            .unwrap()
            .with_parameter(ReplacementValue::html_param(""));
        let mut cx = ValidationContext::new();
        call.validate(&mut cx);
        assert!(cx.has_code("EMPTY_REPLACEMENT_VALUE"));
        assert_eq!(cx.issues()[0].path, "PSXFunctionParamValue[0]");
    }
}
