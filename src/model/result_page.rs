//! Result pages
//!
//! A result page renders the XML produced by a data set. The first result
//! page whose conditionals all hold is used; its stylesheet formats the
//! output after the page's extensions have filtered the document.

use crate::error::Result;
use crate::model::conditional::Conditional;
use crate::model::extension::ExtensionCallSet;
use crate::model::requestor::{conditionals_from_xml, validate_conditionals};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{attr_flag, flag_text, XmlComponent, XmlElement};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResultPage {
    /// Stylesheet URL
    pub stylesheet: String,
    /// Strip unused namespace declarations from the output
    pub allow_namespace_cleanup: bool,
    conditionals: Vec<Conditional>,
    extensions: ExtensionCallSet,
}

impl ResultPage {
    pub fn new(stylesheet: impl Into<String>) -> Self {
        Self {
            stylesheet: stylesheet.into(),
            ..Default::default()
        }
    }

    pub fn conditionals(&self) -> &[Conditional] {
        &self.conditionals
    }

    pub fn add_conditional(&mut self, conditional: Conditional) {
        self.conditionals.push(conditional);
    }

    /// A page without conditionals matches every request
    pub fn is_default_page(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn extensions(&self) -> &ExtensionCallSet {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionCallSet {
        &mut self.extensions
    }
}

impl XmlComponent for ResultPage {
    const NODE_NAME: &'static str = "PSXResultPage";

    fn to_xml(&self) -> XmlElement {
        let mut conditions = XmlElement::new("Conditionals");
        for conditional in &self.conditionals {
            conditions.push(conditional.to_xml());
        }
        XmlElement::new(Self::NODE_NAME)
            .with_attr("allowNamespaceCleanup", flag_text(self.allow_namespace_cleanup))
            .with_child(XmlElement::text_node("styleSheet", self.stylesheet.as_str()))
            .with_child(conditions)
            .with_child(self.extensions.to_xml())
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        Ok(Self {
            stylesheet: node.child_text("styleSheet").unwrap_or_default().to_string(),
            allow_namespace_cleanup: attr_flag(node, "allowNamespaceCleanup", false)?,
            conditionals: conditionals_from_xml(node.child("Conditionals"))?,
            extensions: match node.child(ExtensionCallSet::NODE_NAME) {
                Some(set) => ExtensionCallSet::from_xml(set)?,
                None => ExtensionCallSet::default(),
            },
        })
    }
}

impl Validate for ResultPage {
    fn validate(&self, cx: &mut ValidationContext) {
        if self.stylesheet.trim().is_empty() {
            cx.error("MISSING_STYLESHEET", "result page has no stylesheet");
        }
        validate_conditionals(cx, "Conditionals", &self.conditionals);
        cx.validate_child(ExtensionCallSet::NODE_NAME, &self.extensions);
    }
}
