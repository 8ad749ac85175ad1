//! Replacement values
//!
//! A replacement value names where a runtime value comes from: a literal, an
//! HTML parameter, a CGI variable, a back-end column and so on. They appear
//! wherever the object store needs an operand (conditionals, function and
//! extension parameters). In XML each one is wrapped by the element that
//! uses it, e.g. `<variable><PSXSingleHtmlParameter>...</PSXSingleHtmlParameter></variable>`.

use std::fmt;

use crate::error::{ObjectStoreError, Result};
use crate::model::function_call::FunctionCall;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{XmlComponent, XmlElement};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReplacementValue {
    /// A constant
    TextLiteral(String),
    /// A single-valued HTML parameter of the request
    HtmlParameter(String),
    /// A CGI variable such as `REMOTE_USER`
    CgiVariable(String),
    Cookie(String),
    /// A value from the user context, e.g. `User/Name`
    UserContext(String),
    BackEndColumn { table: String, column: String },
    /// A field of the XML document being processed
    XmlField(String),
    FunctionCall(Box<FunctionCall>),
}

impl ReplacementValue {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::TextLiteral(text.into())
    }

    pub fn html_param(name: impl Into<String>) -> Self {
        Self::HtmlParameter(name.into())
    }

    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::BackEndColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Element name of this value type
    pub fn node_name(&self) -> &'static str {
        match self {
            Self::TextLiteral(_) => "PSXTextLiteral",
            Self::HtmlParameter(_) => "PSXSingleHtmlParameter",
            Self::CgiVariable(_) => "PSXCgiVariable",
            Self::Cookie(_) => "PSXCookie",
            Self::UserContext(_) => "PSXUserContext",
            Self::BackEndColumn { .. } => "PSXBackEndColumn",
            Self::XmlField(_) => "PSXXmlField",
            Self::FunctionCall(_) => FunctionCall::NODE_NAME,
        }
    }

    pub fn to_xml(&self) -> XmlElement {
        let node = XmlElement::new(self.node_name());
        match self {
            Self::TextLiteral(text) => {
                node.with_child(XmlElement::text_node("text", text.as_str()))
            }
            Self::HtmlParameter(name)
            | Self::Cookie(name)
            | Self::UserContext(name)
            | Self::XmlField(name) => node.with_child(XmlElement::text_node("name", name.as_str())),
            Self::CgiVariable(name) => {
                node.with_child(XmlElement::text_node("variable", name.as_str()))
            }
            Self::BackEndColumn { table, column } => node
                .with_child(XmlElement::text_node("tableAlias", table.as_str()))
                .with_child(XmlElement::text_node("column", column.as_str())),
            Self::FunctionCall(call) => call.to_xml(),
        }
    }

    pub fn from_xml(node: &XmlElement) -> Result<Self> {
        let name = || node.required_child_text("name").map(str::to_string);
        match node.name.as_str() {
            "PSXTextLiteral" => Ok(Self::TextLiteral(
                node.child_text("text").unwrap_or_default().to_string(),
            )),
            "PSXSingleHtmlParameter" => Ok(Self::HtmlParameter(name()?)),
            "PSXCgiVariable" => Ok(Self::CgiVariable(
                node.required_child_text("variable")?.to_string(),
            )),
            "PSXCookie" => Ok(Self::Cookie(name()?)),
            "PSXUserContext" => Ok(Self::UserContext(name()?)),
            "PSXBackEndColumn" => Ok(Self::BackEndColumn {
                table: node.required_child_text("tableAlias")?.to_string(),
                column: node.required_child_text("column")?.to_string(),
            }),
            "PSXXmlField" => Ok(Self::XmlField(name()?)),
            "PSXFunctionCall" => Ok(Self::FunctionCall(Box::new(FunctionCall::from_xml(node)?))),
            other => Err(ObjectStoreError::unknown_node("replacement value", other)),
        }
    }

    /// Wrap this value in a named element, e.g. `<variable>...</variable>`
    pub fn to_wrapped_xml(&self, wrapper: &str) -> XmlElement {
        XmlElement::new(wrapper).with_child(self.to_xml())
    }

    /// Read the single value held by a wrapper element
    pub fn from_wrapped_xml(wrapper: &XmlElement) -> Result<Self> {
        let inner = wrapper
            .first_child()
            .ok_or_else(|| ObjectStoreError::MissingElement {
                parent: wrapper.name.clone(),
                element: "replacement value".to_string(),
            })?;
        Self::from_xml(inner)
    }
}

impl fmt::Display for ReplacementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextLiteral(text) => write!(f, "'{}'", text),
            Self::HtmlParameter(name) => write!(f, "HTML/{}", name),
            Self::CgiVariable(name) => write!(f, "CGI/{}", name),
            Self::Cookie(name) => write!(f, "Cookie/{}", name),
            Self::UserContext(name) => write!(f, "UserContext/{}", name),
            Self::BackEndColumn { table, column } => write!(f, "{}.{}", table, column),
            Self::XmlField(name) => write!(f, "XML/{}", name),
            Self::FunctionCall(call) => write!(f, "{}(...)", call.name()),
        }
    }
}

impl Validate for ReplacementValue {
    fn validate(&self, cx: &mut ValidationContext) {
        let blank = match self {
            Self::TextLiteral(_) => false,
            Self::HtmlParameter(name)
            | Self::CgiVariable(name)
            | Self::Cookie(name)
            | Self::UserContext(name)
            | Self::XmlField(name) => name.trim().is_empty(),
            Self::BackEndColumn { table, column } => {
                table.trim().is_empty() || column.trim().is_empty()
            }
            Self::FunctionCall(call) => {
                cx.validate_child(FunctionCall::NODE_NAME, call.as_ref());
                false
            }
        };
        if blank {
            cx.error(
                "EMPTY_REPLACEMENT_VALUE",
                format!("{} must name its source", self.node_name()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn test_each_value_type_survives_xml() {
        let values = vec![
            ReplacementValue::literal("hello"),
            ReplacementValue::html_param("sys_contentid"),
            ReplacementValue::CgiVariable("REMOTE_USER".into()),
            ReplacementValue::Cookie("session".into()),
            ReplacementValue::UserContext("User/Name".into()),
            ReplacementValue::column("CONTENTSTATUS", "TITLE"),
            ReplacementValue::XmlField("root/item".into()),
            ReplacementValue::FunctionCall(Box::new(
                FunctionCall::new("UPPER").unwrap().with_parameter(ReplacementValue::literal("x")),
            )),
        ];
        for value in values {
            let parsed =
                ReplacementValue::from_wrapped_xml(&value.to_wrapped_xml("value")).unwrap();

            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn test_unknown_value_type() {
        let node = parse_document("<value><PSXMystery/></value>").unwrap();
        assert!(matches!(
            ReplacementValue::from_wrapped_xml(&node),
            Err(ObjectStoreError::UnknownNodeType { .. })
        ));
    }

    #[test]
    fn test_empty_wrapper() {
        let node = parse_document("<value/>").unwrap();
        assert!(matches!(
            ReplacementValue::from_wrapped_xml(&node),
            Err(ObjectStoreError::MissingElement { .. })
        ));
    }

    #[test]
    fn test_blank_names_are_errors() {
        let mut cx = ValidationContext::new();
        ReplacementValue::html_param(" ").validate(&mut cx);
        ReplacementValue::literal("").validate(&mut cx);
        assert_eq!(cx.error_count(), 1);
    }
}
