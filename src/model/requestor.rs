//! Requestors
//!
//! A requestor decides which requests a data set handles. It matches the
//! request page, then narrows with *selection criteria* (all must hold for
//! the data set to be chosen) and checks *validation rules* on the chosen
//! request. It can also override the MIME type and character encoding of
//! the response.

use std::collections::BTreeMap;

use crate::error::{ObjectStoreError, Result};
use crate::model::conditional::Conditional;
use crate::model::{check_mime_type, require_text};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{attr_flag, flag_text, XmlComponent, XmlElement};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requestor {
    request_page: String,
    pub description: String,
    /// Stream the result set straight to the client without a stylesheet
    pub direct_data_stream: bool,
    pub character_encoding: Option<String>,
    output_mime_type: Option<String>,
    /// File extension to MIME type overrides
    mime_properties: BTreeMap<String, String>,
    selection_criteria: Vec<Conditional>,
    validation_rules: Vec<Conditional>,
}

impl Requestor {
    pub const MAX_REQUEST_PAGE_LENGTH: usize = 255;

    pub fn new(request_page: impl Into<String>) -> Result<Self> {
        let request_page = request_page.into();
        check_request_page(&request_page)?;
        Ok(Self {
            request_page,
            description: String::new(),
            direct_data_stream: false,
            character_encoding: None,
            output_mime_type: None,
            mime_properties: BTreeMap::new(),
            selection_criteria: Vec::new(),
            validation_rules: Vec::new(),
        })
    }

    pub fn request_page(&self) -> &str {
        &self.request_page
    }

    pub fn set_request_page(&mut self, page: impl Into<String>) -> Result<()> {
        let page = page.into();
        check_request_page(&page)?;
        self.request_page = page;
        Ok(())
    }

    /// Request pages match case-insensitively
    pub fn matches_page(&self, page: &str) -> bool {
        self.request_page.eq_ignore_ascii_case(page)
    }

    pub fn output_mime_type(&self) -> Option<&str> {
        self.output_mime_type.as_deref()
    }

    pub fn set_output_mime_type(&mut self, mime: Option<String>) -> Result<()> {
        if let Some(mime) = &mime {
            check_mime_type("MIME type", mime)?;
        }
        self.output_mime_type = mime;
        Ok(())
    }

    pub fn mime_properties(&self) -> &BTreeMap<String, String> {
        &self.mime_properties
    }

    /// Map a file extension to a MIME type for this requestor's output
    pub fn set_mime_property(
        &mut self,
        extension: impl Into<String>,
        mime: impl Into<String>,
    ) -> Result<()> {
        let extension = extension.into();
        let mime = mime.into();
        require_text("extension", &extension, 32)?;
        check_mime_type("MIME type", &mime)?;
        self.mime_properties
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), mime);
        Ok(())
    }

    /// MIME type used for a file extension, if overridden
    pub fn mime_type_for(&self, extension: &str) -> Option<&str> {
        self.mime_properties
            .get(&extension.trim_start_matches('.').to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn selection_criteria(&self) -> &[Conditional] {
        &self.selection_criteria
    }

    pub fn add_selection_criterion(&mut self, conditional: Conditional) {
        self.selection_criteria.push(conditional);
    }

    pub fn set_selection_criteria(&mut self, criteria: Vec<Conditional>) {
        self.selection_criteria = criteria;
    }

    pub fn validation_rules(&self) -> &[Conditional] {
        &self.validation_rules
    }

    pub fn add_validation_rule(&mut self, conditional: Conditional) {
        self.validation_rules.push(conditional);
    }

    pub fn set_validation_rules(&mut self, rules: Vec<Conditional>) {
        self.validation_rules = rules;
    }
}

fn check_request_page(page: &str) -> Result<()> {
    require_text("request page", page, Requestor::MAX_REQUEST_PAGE_LENGTH)?;
    if page.chars().any(char::is_whitespace) {
        return Err(ObjectStoreError::invalid("request page", page, "must not contain whitespace"));
    }
    Ok(())
}


fn conditionals_to_xml(container: &str, conditionals: &[Conditional]) -> XmlElement {
    let mut node = XmlElement::new(container);
    for conditional in conditionals {
        node.push(conditional.to_xml());
    }
    node
}

pub(crate) fn conditionals_from_xml(node: Option<&XmlElement>) -> Result<Vec<Conditional>> {
    match node {
        Some(node) => node
            .children_named(Conditional::NODE_NAME)
            .map(Conditional::from_xml)
            .collect(),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn validate_conditionals(
    cx: &mut ValidationContext,
    container: &str,
    conditionals: &[Conditional],
) {
    for (i, conditional) in conditionals.iter().enumerate() {
        cx.validate_child(format!("{}/PSXConditional[{}]", container, i), conditional);
    }
}

impl XmlComponent for Requestor {
    const NODE_NAME: &'static str = "PSXRequestor";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_attr("directDataStream", flag_text(self.direct_data_stream))
            .with_child(XmlElement::text_node("requestPage", self.request_page.as_str()))
            .with_child(XmlElement::text_node("description", self.description.as_str()))
            .with_child(conditionals_to_xml("SelectionCriteria", &self.selection_criteria))
            .with_child(conditionals_to_xml("ValidationRules", &self.validation_rules));
        if let Some(encoding) = &self.character_encoding {
            node.push(XmlElement::text_node("characterEncoding", encoding.as_str()));
        }
        let mut mime = XmlElement::new("MimeProperties");
        for (extension, mime_type) in &self.mime_properties {
            mime.push(
                XmlElement::text_node("MimeProperty", mime_type.as_str())
                    .with_attr("extension", extension.as_str()),
            );
        }
        node.push(mime);
        if let Some(output) = &self.output_mime_type {
            node.push(XmlElement::text_node("outputMimeType", output.as_str()));
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut requestor = Self::new(node.required_child_text("requestPage")?)?;
        requestor.direct_data_stream = attr_flag(node, "directDataStream", false)?;
        requestor.description = node.child_text("description").unwrap_or_default().to_string();
        requestor.selection_criteria = conditionals_from_xml(node.child("SelectionCriteria"))?;
        requestor.validation_rules = conditionals_from_xml(node.child("ValidationRules"))?;
        requestor.character_encoding = node.child_text("characterEncoding").map(str::to_string);
        if let Some(mime) = node.child("MimeProperties") {
            for property in mime.children_named("MimeProperty") {
                let extension = property.required_attr("extension")?;
                requestor.set_mime_property(extension, property.text.as_str())?;

            }
        }
        if let Some(output) = node.child_text("outputMimeType").filter(|m| !m.is_empty()) {
            requestor.set_output_mime_type(Some(output.to_string()))?;
        }
        Ok(requestor)
    }
}

impl Validate for Requestor {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_request_page(&self.request_page) {
            cx.error("INVALID_REQUEST_PAGE", e.to_string());
        }
        if let Some(encoding) = &self.character_encoding {
            if encoding.trim().is_empty() {
                cx.warning("EMPTY_ENCODING", "character encoding override is blank");
            }
        }
        if self.direct_data_stream && self.output_mime_type.is_none() {
            cx.warning(
                "MISSING_MIME_TYPE",
                "direct data streams should declare an output MIME type",
            );
        }
        validate_conditionals(cx, "SelectionCriteria", &self.selection_criteria);
        validate_conditionals(cx, "ValidationRules", &self.validation_rules);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::conditional::Operator;
    use crate::model::replacement::ReplacementValue;

    fn requestor() -> Requestor {
        let mut r = Requestor::new("query").unwrap();
        r.description = "Item lookup".into();
        r.character_encoding = Some("UTF-8".into());
        r.add_selection_criterion(Conditional::equals(
            ReplacementValue::html_param("mode"),
            ReplacementValue::literal("view"),
        ));
        r.add_validation_rule(Conditional::new(
            ReplacementValue::html_param("sys_contentid"),
            Operator::IsNotNull,
            None,
        ));
        r.set_mime_property(".PDF", "application/pdf").unwrap();
        r.set_output_mime_type(Some("text/html".into())).unwrap();
        r
    }

    #[test]
    fn test_request_page_rules() {
        assert!(Requestor::new("").is_err());
        assert!(Requestor::new("my page").is_err());
        assert!(Requestor::new("p".repeat(255)).is_ok());
        assert!(Requestor::new("p".repeat(256)).is_err());
        assert!(Requestor::new("QUERY").unwrap().matches_page("query"));
    }

    #[test]
    fn test_mime_overrides() {
        let r = requestor();
        assert_eq!(r.mime_type_for("pdf"), Some("application/pdf"));
        assert_eq!(r.mime_type_for(".Pdf"), Some("application/pdf"));
        let mut r = r;
        assert!(r.set_mime_property("doc", "not a mime").is_err());
        assert!(r.set_output_mime_type(Some("html".into())).is_err());
    }

    #[test]
    fn test_xml_round_trip() {
        let r = requestor();
        let xml = r.to_xml_string().unwrap();
        assert!(xml.contains(r#"<MimeProperty extension="pdf">application/pdf</MimeProperty>"#));
        assert_eq!(Requestor::from_xml_str(&xml).unwrap(), r);
    }

    #[test]
    fn test_blank_encoding_round_trip() {
        let mut r = Requestor::new("query").unwrap();
        r.character_encoding = Some(String::new());
        let xml = r.to_xml_string().unwrap();
        let parsed = Requestor::from_xml_str(&xml).unwrap();
        assert_eq!(parsed.character_encoding.as_deref(), Some(""));
        assert_eq!(parsed, r);

        let cx = crate::validation::validate(&parsed, &Default::default());
        assert!(cx.has_code("EMPTY_ENCODING"));
    }

    #[test]
    fn test_minimal_xml() {
        let r = Requestor::from_xml_str("<PSXRequestor><requestPage>p</requestPage></PSXRequestor>")
            .unwrap();
        assert!(r.selection_criteria().is_empty());
        assert!(!r.direct_data_stream);
        assert_eq!(r.character_encoding, None);
    }

    #[test]
    fn test_validation_walks_conditionals() {
        let mut r = requestor();
        r.add_selection_criterion(Conditional::new(
            ReplacementValue::html_param("x"),
            Operator::Greater,
            None,
        ));
        let mut cx = ValidationContext::new();
        r.validate(&mut cx);
        assert!(cx.has_code("MISSING_VALUE"));
        assert_eq!(cx.issues()[0].path, "SelectionCriteria/PSXConditional[1]");
    }
}
