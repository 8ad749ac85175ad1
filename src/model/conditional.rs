//! Conditionals
//!
//! A conditional is one term of a filter expression:
//! `variable operator value`, chained to the next term with `AND` or `OR`.
//!
//! ```xml
//! <PSXConditional>
//!   <variable><PSXSingleHtmlParameter><name>status</name></PSXSingleHtmlParameter></variable>
//!   <operator>=</operator>
//!   <value><PSXTextLiteral><text>public</text></PSXTextLiteral></value>
//!   <boolean>AND</boolean>
//! </PSXConditional>
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{ObjectStoreError, Result};
use crate::model::replacement::ReplacementValue;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{XmlComponent, XmlElement};

/// Comparison operator of a conditional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    IsNull,
    IsNotNull,
    Between,
    NotBetween,
    In,
    NotIn,
    Like,
    NotLike,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Self::Equal,
        Self::NotEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::IsNull,
        Self::IsNotNull,
        Self::Between,
        Self::NotBetween,
        Self::In,
        Self::NotIn,
        Self::Like,
        Self::NotLike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }

    /// Operators that take no right-hand value
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| ObjectStoreError::invalid("operator", s, "unknown operator"))
    }
}

/// How a conditional chains to the one after it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Joiner {
    #[default]
    And,
    Or,
}

impl Joiner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for Joiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Joiner {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(ObjectStoreError::invalid("boolean", s, "expected AND or OR")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conditional {
    variable: ReplacementValue,
    operator: Operator,
    value: Option<ReplacementValue>,
    joiner: Joiner,
}

impl Conditional {
    pub fn new(
        variable: ReplacementValue,
        operator: Operator,
        value: Option<ReplacementValue>,
    ) -> Self {

        Self {
            variable,
            operator,
            value,
            joiner: Joiner::And,
        }
    }

    /// `variable = value`
    pub fn equals(variable: ReplacementValue, value: ReplacementValue) -> Self {
        Self::new(variable, Operator::Equal, Some(value))
    }

    pub fn with_joiner(mut self, joiner: Joiner) -> Self {
        self.joiner = joiner;
        self
    }

    pub fn variable(&self) -> &ReplacementValue {
        &self.variable
    }

    pub fn set_variable(&mut self, variable: ReplacementValue) {
        self.variable = variable;
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn set_operator(&mut self, operator: Operator) {
        self.operator = operator;
    }

    /// Set the operator from its persisted text, rejecting unknown operators
    pub fn set_operator_str(&mut self, operator: &str) -> Result<()> {
        self.operator = operator.parse()?;
        Ok(())
    }

    pub fn value(&self) -> Option<&ReplacementValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<ReplacementValue>) {
        self.value = value;
    }

    pub fn joiner(&self) -> Joiner {
        self.joiner
    }

    pub fn set_joiner(&mut self, joiner: Joiner) {
        self.joiner = joiner;
    }
}

impl fmt::Display for Conditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.variable, self.operator)?;
        if let Some(value) = &self.value {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

impl XmlComponent for Conditional {
    const NODE_NAME: &'static str = "PSXConditional";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_child(self.variable.to_wrapped_xml("variable"))
            .with_child(XmlElement::text_node("operator", self.operator.as_str()));
        if let Some(value) = &self.value {
            node.push(value.to_wrapped_xml("value"));
        }
        node.push(XmlElement::text_node("boolean", self.joiner.as_str()));
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let variable = ReplacementValue::from_wrapped_xml(node.required_child("variable")?)?;
        let operator = node.required_child_text("operator")?.parse()?;
        let value = node
            .child("value")
            .map(ReplacementValue::from_wrapped_xml)
            .transpose()?;
        let joiner = match node.child_text("boolean") {
            Some(text) => text.parse()?,
            None => Joiner::default(),
        };
        Ok(Self {
            variable,
            operator,
            value,
            joiner,
        })
    }
}

impl Validate for Conditional {
    fn validate(&self, cx: &mut ValidationContext) {
        cx.validate_child("variable", &self.variable);
        match (&self.value, self.operator.is_unary()) {
            (Some(_), true) => cx.warning(
                "VALUE_IGNORED",
                format!("operator '{}' takes no value; the value is ignored", self.operator),
            ),
            (None, false) => cx.error(
                "MISSING_VALUE",
                format!("operator '{}' requires a value", self.operator),
            ),
            (Some(value), false) => cx.validate_child("value", value),
            (None, true) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_is_public() -> Conditional {
        Conditional::equals(
            ReplacementValue::html_param("status"),
            ReplacementValue::literal("public"),
        )
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Equal);
        assert_eq!("is  not\tnull".parse::<Operator>().unwrap(), Operator::IsNotNull);
        assert_eq!("not like".parse::<Operator>().unwrap(), Operator::NotLike);
        assert!("!=".parse::<Operator>().is_err());
        assert!("CONTAINS".parse::<Operator>().is_err());
    }

    #[test]
    fn test_every_operator_reparses() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_set_operator_str_rejects_unknown() {
        let mut cond = status_is_public();
        assert!(cond.set_operator_str("~=").is_err());
        assert_eq!(cond.operator(), Operator::Equal);
        cond.set_operator_str("like").unwrap();
        assert_eq!(cond.operator(), Operator::Like);
    }

    #[test]
    fn test_xml_round_trip() {
        let cond = status_is_public().with_joiner(Joiner::Or);
        let parsed = Conditional::from_xml_str(&cond.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, cond);

        let unary = Conditional::new(ReplacementValue::column("T", "C"), Operator::IsNull, None);
        let parsed = Conditional::from_xml(&unary.to_xml()).unwrap();
        assert_eq!(parsed, unary);
        assert!(parsed.value().is_none());
    }

    #[test]
    fn test_missing_boolean_defaults_to_and() {
        let xml = r#"<PSXConditional>
            <variable><PSXCgiVariable><variable>REMOTE_USER</variable></PSXCgiVariable></variable>
            <operator>IS NOT NULL</operator>
        </PSXConditional>"#;
        let cond = Conditional::from_xml_str(xml).unwrap();
        assert_eq!(cond.joiner(), Joiner::And);
        assert_eq!(cond.operator(), Operator::IsNotNull);
    }

    #[test]
    fn test_unknown_operator_in_xml() {
        let xml = r#"<PSXConditional>
            <variable><PSXTextLiteral><text>a</text></PSXTextLiteral></variable>
            <operator>SOUNDS LIKE</operator>
        </PSXConditional>"#;
        assert!(matches!(
            Conditional::from_xml_str(xml),
            Err(ObjectStoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validation_of_operand_count() {
        let mut cx = ValidationContext::new();
        Conditional::new(ReplacementValue::html_param("a"), Operator::Less, None).validate(&mut cx);
        assert!(cx.has_code("MISSING_VALUE"));

        let mut cx = ValidationContext::new();
        Conditional::new(
            ReplacementValue::html_param("a"),
            Operator::IsNull,
            Some(ReplacementValue::literal("x")),
        )
        .validate(&mut cx);
        assert!(cx.has_code("VALUE_IGNORED"));
        assert!(!cx.has_errors());
    }
}
