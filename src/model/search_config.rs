//! Search engine settings
//!
//! ```xml
//! <PSXSearchConfig fullTextSearchEnabled="yes" asynchronousIndexing="no" maxSearchResult="-1">
//!   <CustomProperties>
//!     <Property name="indexDirectory">/var/rx/index</Property>
//!   </CustomProperties>
//!   <Analyzers>
//!     <Analyzer locale="en-us" className="org.apache.lucene.analysis.standard.StandardAnalyzer"/>
//!   </Analyzers>
//!   <TextConverters>
//!     <TextConverter mimetype="application/pdf" className="com.acme.PdfConverter"/>
//!   </TextConverters>
//! </PSXSearchConfig>
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ObjectStoreError, Result};
use crate::model::check_mime_type;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{
    attr_flag, flag_text, parse_number, properties_from_xml, properties_to_xml, XmlComponent,
    XmlElement,
};

static LOCALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{2,8})*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchConfig {
    /// Global full-text search toggle
    pub fts_enabled: bool,
    pub async_indexing: bool,
    /// `None` means unlimited (persisted as `-1`)
    pub max_search_results: Option<u32>,
    custom_properties: BTreeMap<String, String>,
    /// Locale to analyzer class
    analyzers: BTreeMap<String, String>,
    /// MIME type to text converter class
    text_converters: BTreeMap<String, String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fts_enabled: true,
            async_indexing: true,
            max_search_results: None,
            custom_properties: BTreeMap::new(),
            analyzers: BTreeMap::new(),
            text_converters: BTreeMap::new(),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custom_properties(&self) -> &BTreeMap<String, String> {
        &self.custom_properties
    }

    pub fn custom_property(&self, name: &str) -> Option<&str> {
        self.custom_properties.get(name).map(String::as_str)
    }

    pub fn set_custom_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ObjectStoreError::invalid("property", &name, "name must not be empty"));
        }
        self.custom_properties.insert(name, value.into());
        Ok(())
    }

    pub fn remove_custom_property(&mut self, name: &str) -> Option<String> {
        self.custom_properties.remove(name)
    }

    pub fn analyzers(&self) -> &BTreeMap<String, String> {
        &self.analyzers
    }

    /// Register the analyzer class for a locale (e.g. `en-us`)
    pub fn set_analyzer(
        &mut self,
        locale: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Result<()> {
        let locale = locale.into().to_ascii_lowercase();
        let class_name = class_name.into();
        check_locale(&locale)?;
        check_class_name(&class_name)?;
        self.analyzers.insert(locale, class_name);
        Ok(())
    }

    pub fn analyzer_for(&self, locale: &str) -> Option<&str> {
        self.analyzers
            .get(&locale.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn text_converters(&self) -> &BTreeMap<String, String> {
        &self.text_converters
    }

    /// Register the converter that extracts text from a MIME type
    pub fn set_text_converter(
        &mut self,
        mime_type: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Result<()> {
        let mime_type = mime_type.into().to_ascii_lowercase();
        let class_name = class_name.into();
        check_mime_type("mimetype", &mime_type)?;
        check_class_name(&class_name)?;
        self.text_converters.insert(mime_type, class_name);
        Ok(())
    }

    pub fn converter_for(&self, mime_type: &str) -> Option<&str> {
        self.text_converters
            .get(&mime_type.to_ascii_lowercase())
            .map(String::as_str)
    }
}

fn check_locale(locale: &str) -> Result<()> {
    if LOCALE.is_match(locale) {
        Ok(())
    } else {
        Err(ObjectStoreError::invalid("locale", locale, "expected e.g. 'en' or 'en-us'"))
    }
}


fn check_class_name(class_name: &str) -> Result<()> {
    if class_name.trim().is_empty() {
        Err(ObjectStoreError::invalid("className", class_name, "must not be empty"))
    } else {
        Ok(())
    }
}

fn class_map_to_xml(
    container: &str,
    item: &str,
    key: &str,
    map: &BTreeMap<String, String>,
) -> XmlElement {
    let mut node = XmlElement::new(container);
    for (k, class_name) in map {
        node.push(
            XmlElement::new(item)
                .with_attr(key, k.as_str())
                .with_attr("className", class_name.as_str()),
        );
    }
    node
}

impl XmlComponent for SearchConfig {
    const NODE_NAME: &'static str = "PSXSearchConfig";

    fn to_xml(&self) -> XmlElement {
        let max = self
            .max_search_results
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-1".to_string());
        XmlElement::new(Self::NODE_NAME)
            .with_attr("fullTextSearchEnabled", flag_text(self.fts_enabled))
            .with_attr("asynchronousIndexing", flag_text(self.async_indexing))
            .with_attr("maxSearchResult", max)
            .with_child(properties_to_xml("CustomProperties", "Property", &self.custom_properties))
            .with_child(class_map_to_xml("Analyzers", "Analyzer", "locale", &self.analyzers))
            .with_child(class_map_to_xml(
                "TextConverters",
                "TextConverter",
                "mimetype",
                &self.text_converters,
            ))
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut config = Self {
            fts_enabled: attr_flag(node, "fullTextSearchEnabled", true)?,
            async_indexing: attr_flag(node, "asynchronousIndexing", true)?,
            ..Default::default()
        };

        config.max_search_results = match node.attr("maxSearchResult") {
            None => None,
            Some(value) => match parse_number::<i64>("maxSearchResult", value)? {
                -1 => None,
                n if n < 0 => {
                    return Err(ObjectStoreError::invalid(
                        "maxSearchResult",
                        value,
                        "must be -1 (unlimited) or a non-negative count",
                    ))
                }
                n => Some(u32::try_from(n).map_err(|_| {
                    ObjectStoreError::invalid("maxSearchResult", value, "out of range")
                })?),
            },
        };

        if let Some(props) = node.child("CustomProperties") {
            config.custom_properties = properties_from_xml(props, "Property")?;
        }
        if let Some(analyzers) = node.child("Analyzers") {
            for analyzer in analyzers.children_named("Analyzer") {
                config.set_analyzer(
                    analyzer.required_attr("locale")?,
                    analyzer.required_attr("className")?,
                )?;
            }
        }
        if let Some(converters) = node.child("TextConverters") {
            for converter in converters.children_named("TextConverter") {
                config.set_text_converter(
                    converter.required_attr("mimetype")?,
                    converter.required_attr("className")?,
                )?;
            }
        }
        Ok(config)
    }
}

impl Validate for SearchConfig {
    fn validate(&self, cx: &mut ValidationContext) {
        for (locale, class_name) in &self.analyzers {
            if let Err(e) = check_locale(locale).and_then(|_| check_class_name(class_name)) {
                cx.error("INVALID_ANALYZER", e.to_string());
            }
        }
        for (mime, class_name) in &self.text_converters {
            let checked =
                check_mime_type("mimetype", mime).and_then(|_| check_class_name(class_name));
            if let Err(e) = checked {
                cx.error("INVALID_TEXT_CONVERTER", e.to_string());
            }
        }
        for name in self.custom_properties.keys() {
            if name.trim().is_empty() {
                cx.error("EMPTY_PROPERTY_NAME", "custom property with an empty name");
            }
        }
        if !self.fts_enabled && !(self.analyzers.is_empty() && self.text_converters.is_empty()) {
            cx.warning(
                "SEARCH_DISABLED",
                "analyzers and text converters are ignored while full-text search is disabled",
            );
        }
        if self.max_search_results == Some(0) {
            cx.warning("NO_RESULTS", "maxSearchResult of 0 returns no search results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SearchConfig {
        let mut c = SearchConfig::new();
        c.max_search_results = Some(500);
        c.set_custom_property("indexDirectory", "/var/rx/index").unwrap();
        c.set_analyzer("en-US", "org.apache.lucene.analysis.standard.StandardAnalyzer").unwrap();
        c.set_analyzer("de", "org.apache.lucene.analysis.de.GermanAnalyzer").unwrap();
        c.set_text_converter("application/pdf", "com.acme.PdfConverter").unwrap();
        c
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let c = config();
        assert_eq!(
            c.analyzer_for("EN-us"),
            Some("org.apache.lucene.analysis.standard.StandardAnalyzer")
        );

        assert_eq!(c.converter_for("Application/PDF"), Some("com.acme.PdfConverter"));
        assert_eq!(c.analyzer_for("fr"), None);
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let mut c = SearchConfig::new();
        assert!(c.set_analyzer("english", "X").is_err());
        assert!(c.set_analyzer("en", "").is_err());
        assert!(c.set_text_converter("pdf", "X").is_err());
        assert!(c.set_custom_property("", "x").is_err());
    }

    #[test]
    fn test_xml_round_trip() {
        let c = config();
        let parsed = SearchConfig::from_xml_str(&c.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, c);

        let unlimited = SearchConfig::new();
        let xml = unlimited.to_xml_string().unwrap();
        assert!(xml.contains(r#"maxSearchResult="-1""#));
        assert_eq!(SearchConfig::from_xml_str(&xml).unwrap().max_search_results, None);
    }

    #[test]
    fn test_negative_limit_rejected() {
        assert!(SearchConfig::from_xml_str(r#"<PSXSearchConfig maxSearchResult="-7"/>"#).is_err());
    }

    #[test]
    fn test_disabled_engine_warns() {
        let mut c = config();
        c.fts_enabled = false;
        let mut cx = ValidationContext::new();
        c.validate(&mut cx);
        assert!(cx.has_code("SEARCH_DISABLED"));
        assert!(!cx.has_errors());
    }
}
