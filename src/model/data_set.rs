//! Data sets: one request entry point of an application

use std::collections::HashSet;

use crate::error::Result;
use crate::model::requestor::Requestor;
use crate::model::require_text;
use crate::model::result_page::ResultPage;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{XmlComponent, XmlElement};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSet {
    name: String,
    pub description: String,
    pub requestor: Option<Requestor>,
    result_pages: Vec<ResultPage>,
}

impl DataSet {
    pub const MAX_NAME_LENGTH: usize = 50;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        require_text("data set name", &name, Self::MAX_NAME_LENGTH)?;
        Ok(Self {
            name,
            description: String::new(),
            requestor: None,
            result_pages: Vec::new(),
        })
    }

    pub fn with_requestor(mut self, requestor: Requestor) -> Self {
        self.requestor = Some(requestor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        require_text("data set name", &name, Self::MAX_NAME_LENGTH)?;
        self.name = name;
        Ok(())
    }

    pub fn result_pages(&self) -> &[ResultPage] {
        &self.result_pages
    }

    pub fn add_result_page(&mut self, page: ResultPage) {
        self.result_pages.push(page);
    }

    /// Whether both data sets would answer the same request
    ///
    /// Pages match case-insensitively. Selection criteria are compared as
    /// sets; an empty set matches anything.
    pub fn conflicts_with(&self, other: &DataSet) -> bool {
        let (Some(mine), Some(theirs)) = (&self.requestor, &other.requestor) else {
            return false;
        };
        if !mine.matches_page(theirs.request_page()) {
            return false;
        }
        let a = mine.selection_criteria();
        let b = theirs.selection_criteria();
        if a.is_empty() || b.is_empty() {
            return true;
        }
        a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
    }
}

impl XmlComponent for DataSet {
    const NODE_NAME: &'static str = "PSXDataSet";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_child(XmlElement::text_node("name", self.name.as_str()))
            .with_child(XmlElement::text_node("description", self.description.as_str()));
        if let Some(requestor) = &self.requestor {
            node.push(requestor.to_xml());
        }
        let mut pages = XmlElement::new("PSXResultPageSet");
        for page in &self.result_pages {
            pages.push(page.to_xml());
        }
        node.with_child(pages)
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut data_set = Self::new(node.required_child_text("name")?)?;
        data_set.description = node.child_text("description").unwrap_or_default().to_string();
        data_set.requestor = node
            .child(Requestor::NODE_NAME)
            .map(Requestor::from_xml)
            .transpose()?;
        if let Some(pages) = node.child("PSXResultPageSet") {
            data_set.result_pages = pages
                .children_named(ResultPage::NODE_NAME)
                .map(ResultPage::from_xml)
                .collect::<Result<_>>()?;
        }
        Ok(data_set)
    }
}

impl Validate for DataSet {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = require_text("data set name", &self.name, Self::MAX_NAME_LENGTH) {
            cx.error("INVALID_NAME", e.to_string());
        }
        match &self.requestor {
            Some(requestor) => cx.validate_child(Requestor::NODE_NAME, requestor),
            None => cx.warning(
                "NO_REQUESTOR",
                format!("data set '{}' cannot be requested", self.name),
            ),

        }
        if self.result_pages.iter().filter(|p| p.is_default_page()).count() > 1 {
            cx.warning(
                "UNREACHABLE_RESULT_PAGE",
                "only the first result page without conditionals is ever used",
            );
        }
        for (i, page) in self.result_pages.iter().enumerate() {
            cx.validate_child(format!("PSXResultPageSet/PSXResultPage[{}]", i), page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::conditional::Conditional;
    use crate::model::replacement::ReplacementValue;

    fn data_set(name: &str, page: &str, criteria: &[(&str, &str)]) -> DataSet {
        let mut requestor = Requestor::new(page).unwrap();
        for (variable, value) in criteria {
            requestor.add_selection_criterion(Conditional::equals(
                ReplacementValue::html_param(*variable),
                ReplacementValue::literal(*value),
            ));
        }
        DataSet::new(name).unwrap().with_requestor(requestor)
    }

    #[test]
    fn test_conflicts_on_same_page() {
        let a = data_set("a", "query", &[]);
        let b = data_set("b", "QUERY", &[("mode", "edit")]);
        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn test_criteria_compared_as_sets() {
        let a = data_set("a", "query", &[("mode", "edit"), ("lang", "en")]);
        let b = data_set("b", "query", &[("lang", "en"), ("mode", "edit")]);
        let c = data_set("c", "query", &[("mode", "view")]);
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
    }

    #[test]
    fn test_no_conflict_without_requestor_or_on_other_page() {
        let a = data_set("a", "query", &[]);
        let b = DataSet::new("b").unwrap();
        let c = data_set("c", "update", &[]);
        assert!(!a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
    }

    #[test]
    fn test_xml_round_trip() {
        let mut data_set = data_set("articles", "articles", &[("type", "news")]);
        data_set.description = "article listing".into();
        data_set.add_result_page(ResultPage::new("articles.xsl"));
        let xml = data_set.to_xml_string().unwrap();
        assert_eq!(DataSet::from_xml_str(&xml).unwrap(), data_set);
    }

    #[test]
    fn test_name_length_boundary() {
        assert!(DataSet::new("x".repeat(50)).is_ok());
        assert!(DataSet::new("x".repeat(51)).is_err());
        assert!(DataSet::new("  ").is_err());
    }
}
