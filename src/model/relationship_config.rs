//! Relationship type definitions
//!
//! A relationship config names a kind of association between two content
//! items and fixes its behaviour: its category, whether and how it is cloned,
//! and which revisions of owner and dependent it refers to. The behaviour
//! flags are persisted as the config's *system properties*; *user
//! properties* are free-form defaults that each relationship instance may
//! override.
//!
//! ```xml
//! <PSXRelationshipConfig name="ActiveAssembly" label="Active Assembly"
//!                        category="rs_activeassembly" type="system">
//!   <description>Page slot contents</description>
//!   <SysProperties>
//!     <Property name="rs_allowcloning">yes</Property>
//!     ...
//!   </SysProperties>
//!   <UserProperties>
//!     <Property name="sort_rank">0</Property>
//!   </UserProperties>
//!   <CloneOverrideFieldList>
//!     <Field>sys_title</Field>
//!   </CloneOverrideFieldList>
//! </PSXRelationshipConfig>
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use bitflags::bitflags;
use regex::Regex;

use crate::error::{ObjectStoreError, Result};
use crate::model::require_text;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{
    flag_text, parse_flag, properties_from_xml, properties_to_xml, XmlComponent, XmlElement,
};

static CONFIG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

bitflags! {
    /// Behaviour flags of a relationship type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ConfigOptions: u32 {
        const ALLOW_CLONING = 1 << 0;
        /// Clone only the owner, sharing the dependents
        const SHALLOW_CLONING = 1 << 1;
        const USE_OWNER_REVISION = 1 << 2;
        const USE_DEPENDENT_REVISION = 1 << 3;
        const USE_SERVER_ID = 1 << 4;
        const SKIP_PROMOTION = 1 << 5;
    }
}

/// System property name of each flag
pub const SYSTEM_PROPERTIES: [(ConfigOptions, &str); 6] = [
    (ConfigOptions::ALLOW_CLONING, "rs_allowcloning"),
    (ConfigOptions::SHALLOW_CLONING, "rs_shallowcloning"),
    (ConfigOptions::USE_OWNER_REVISION, "rs_useownerrevision"),
    (ConfigOptions::USE_DEPENDENT_REVISION, "rs_usedependentrevision"),
    (ConfigOptions::USE_SERVER_ID, "rs_useserverid"),
    (ConfigOptions::SKIP_PROMOTION, "rs_skippromotion"),
];

/// Whether `name` is reserved for a system property
pub fn is_system_property(name: &str) -> bool {
    SYSTEM_PROPERTIES.iter().any(|(_, n)| *n == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipCategory {
    ActiveAssembly,
    Copy,
    Promotable,
    Translation,
    Folder,
    Recycled,
}

impl RelationshipCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveAssembly => "rs_activeassembly",
            Self::Copy => "rs_copy",
            Self::Promotable => "rs_promotable",
            Self::Translation => "rs_translation",
            Self::Folder => "rs_folder",
            Self::Recycled => "rs_recycled",
        }
    }
}

impl fmt::Display for RelationshipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipCategory {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rs_activeassembly" => Ok(Self::ActiveAssembly),
            "rs_copy" => Ok(Self::Copy),
            "rs_promotable" => Ok(Self::Promotable),
            "rs_translation" => Ok(Self::Translation),
            "rs_folder" => Ok(Self::Folder),
            "rs_recycled" => Ok(Self::Recycled),
            _ => Err(ObjectStoreError::invalid("category", s, "unknown relationship category")),
        }
    }
}

/// Who owns the definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConfigType {
    /// Shipped with the server, not editable
    System,
    #[default]
    User,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

impl FromStr for ConfigType {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            _ => Err(ObjectStoreError::invalid("type", s, "expected 'system' or 'user'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipConfig {
    name: String,
    pub label: String,
    pub description: String,
    pub category: RelationshipCategory,
    pub config_type: ConfigType,
    options: ConfigOptions,
    user_properties: BTreeMap<String, String>,
    clone_override_fields: Vec<String>,
}

impl RelationshipConfig {
    pub const MAX_NAME_LENGTH: usize = 50;

    pub fn new(name: impl Into<String>, category: RelationshipCategory) -> Result<Self> {
        let name = name.into();
        check_config_name(&name)?;
        Ok(Self {
            label: name.clone(),
            name,
            description: String::new(),
            category,
            config_type: ConfigType::User,
            options: ConfigOptions::empty(),
            user_properties: BTreeMap::new(),
            clone_override_fields: Vec::new(),
        })
    }

    pub fn with_options(mut self, options: ConfigOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_type(mut self, config_type: ConfigType) -> Self {
        self.config_type = config_type;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        check_config_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn options(&self) -> ConfigOptions {
        self.options
    }

    pub fn is_enabled(&self, option: ConfigOptions) -> bool {
        self.options.contains(option)
    }

    pub fn set_enabled(&mut self, option: ConfigOptions, enabled: bool) {
        self.options.set(option, enabled);
    }

    pub fn is_system(&self) -> bool {
        self.config_type == ConfigType::System
    }

    /// The behaviour flags as persisted system properties (`yes`/`no`)
    pub fn system_properties(&self) -> BTreeMap<String, String> {
        SYSTEM_PROPERTIES
            .iter()
            .map(|(flag, name)| (name.to_string(), flag_text(self.is_enabled(*flag)).to_string()))
            .collect()
    }

    /// Default values of the user properties
    pub fn user_properties(&self) -> &BTreeMap<String, String> {
        &self.user_properties
    }

    pub fn user_property(&self, name: &str) -> Option<&str> {
        self.user_properties.get(name).map(String::as_str)
    }

    /// Declare a user property with its default value
    pub fn set_user_property(
        &mut self,
        name: impl Into<String>,
        default: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        require_text("user property", &name, Self::MAX_NAME_LENGTH)?;
        if is_system_property(&name) {
            return Err(ObjectStoreError::invalid(
                "user property",
                &name,
                "name is reserved for a system property",
            ));
        }
        self.user_properties.insert(name, default.into());
        Ok(())
    }

    pub fn remove_user_property(&mut self, name: &str) -> Option<String> {
        self.user_properties.remove(name)
    }

    /// Fields whose values are replaced when an item is cloned through this relationship
    pub fn clone_override_fields(&self) -> &[String] {
        &self.clone_override_fields
    }

    pub fn add_clone_override_field(&mut self, field: impl Into<String>) {
        self.clone_override_fields.push(field.into());
    }
}

fn check_config_name(name: &str) -> Result<()> {
    require_text("relationship config name", name, RelationshipConfig::MAX_NAME_LENGTH)?;
    if !CONFIG_NAME.is_match(name) {
        return Err(ObjectStoreError::invalid(
            "relationship config name",
            name,
            "must start with a letter and contain only letters, digits or '_'",
        ));
    }
    Ok(())
}

impl XmlComponent for RelationshipConfig {
    const NODE_NAME: &'static str = "PSXRelationshipConfig";

    fn to_xml(&self) -> XmlElement {
        let mut fields = XmlElement::new("CloneOverrideFieldList");
        for field in &self.clone_override_fields {
            fields.push(XmlElement::text_node("Field", field.as_str()));
        }

        XmlElement::new(Self::NODE_NAME)
            .with_attr("name", self.name.as_str())
            .with_attr("label", self.label.as_str())
            .with_attr("category", self.category.as_str())
            .with_attr("type", self.config_type.as_str())
            .with_child(XmlElement::text_node("description", self.description.as_str()))
            .with_child(properties_to_xml("SysProperties", "Property", &self.system_properties()))
            .with_child(properties_to_xml("UserProperties", "Property", &self.user_properties))
            .with_child(fields)
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut config = Self::new(
            node.required_attr("name")?,
            node.required_attr("category")?.parse()?,
        )?;
        if let Some(label) = node.attr("label") {
            config.label = label.to_string();
        }
        if let Some(config_type) = node.attr("type") {
            config.config_type = config_type.parse()?;
        }
        config.description = node.child_text("description").unwrap_or_default().to_string();

        if let Some(sys) = node.child("SysProperties") {
            for (name, value) in properties_from_xml(sys, "Property")? {
                let flag = SYSTEM_PROPERTIES
                    .iter()
                    .find(|(_, n)| *n == name)
                    .map(|(flag, _)| *flag)
                    .ok_or_else(|| {
                        ObjectStoreError::invalid(
                            "system property",
                            &name,
                            "unknown system property",
                        )
                    })?;
                config.options.set(flag, parse_flag(&name, &value)?);
            }
        }
        if let Some(user) = node.child("UserProperties") {
            for (name, value) in properties_from_xml(user, "Property")? {
                config.set_user_property(name, value)?;
            }
        }
        if let Some(fields) = node.child("CloneOverrideFieldList") {
            config.clone_override_fields = fields
                .children_named("Field")
                .map(|f| f.text.clone())
                .collect();
        }
        Ok(config)
    }
}

impl Validate for RelationshipConfig {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_config_name(&self.name) {
            cx.error("INVALID_NAME", e.to_string());
        }
        if self.label.trim().is_empty() {
            cx.warning("MISSING_LABEL", format!("relationship config {} has no label", self.name));
        }
        if self.is_enabled(ConfigOptions::SHALLOW_CLONING)
            && !self.is_enabled(ConfigOptions::ALLOW_CLONING)
        {
            cx.error(
                "SHALLOW_WITHOUT_CLONING",
                "shallow cloning requires cloning to be allowed",
            );
        }
        if !self.clone_override_fields.is_empty()
            && !self.is_enabled(ConfigOptions::ALLOW_CLONING)
        {
            cx.warning(
                "UNUSED_CLONE_OVERRIDES",
                "clone override fields have no effect when cloning is not allowed",
            );
        }
        if self.category == RelationshipCategory::Folder
            && self.options.intersects(
                ConfigOptions::USE_OWNER_REVISION | ConfigOptions::USE_DEPENDENT_REVISION,
            )
        {
            cx.warning("FOLDER_REVISION", "folder relationships are not revision specific");
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.clone_override_fields {
            if field.trim().is_empty() {
                cx.error("EMPTY_FIELD_NAME", "clone override field name is empty");
            } else if !seen.insert(field.as_str()) {
                cx.warning(
                    "DUPLICATE_FIELD",
                    format!("clone override field {} is listed twice", field),
                );
            }
        }
        for name in self.user_properties.keys() {
            if is_system_property(name) {
                cx.error("RESERVED_PROPERTY", format!("{} is a system property", name));
            }
        }
    }
}

/// The relationship types known to a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RelationshipConfigSet {
    configs: Vec<RelationshipConfig>,
}

impl RelationshipConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The relationship types every server ships with
    pub fn system_defaults() -> Self {
        let system = |name: &str, label: &str, category, options| RelationshipConfig {
            name: name.to_string(),
            label: label.to_string(),
            description: String::new(),
            category,
            config_type: ConfigType::System,
            options,
            user_properties: BTreeMap::new(),
            clone_override_fields: Vec::new(),
        };

        let mut active = system(
            "ActiveAssembly",
            "Active Assembly",
            RelationshipCategory::ActiveAssembly,
            ConfigOptions::ALLOW_CLONING | ConfigOptions::USE_OWNER_REVISION,
        );
        active.user_properties.insert("sort_rank".into(), "1".into());
        active.user_properties.insert("sys_slotid".into(), String::new());

        Self {
            configs: vec![
                active,
                system(
                    "NewCopy",
                    "New Copy",
                    RelationshipCategory::Copy,
                    ConfigOptions::empty(),
                ),
                system(
                    "PromotableVersion",
                    "Promotable Version",
                    RelationshipCategory::Promotable,
                    ConfigOptions::USE_DEPENDENT_REVISION,
                ),
                system(
                    "Translation",
                    "Translation",
                    RelationshipCategory::Translation,
                    ConfigOptions::SKIP_PROMOTION,
                ),
                system(
                    "FolderContent",
                    "Folder Content",
                    RelationshipCategory::Folder,
                    ConfigOptions::ALLOW_CLONING | ConfigOptions::SHALLOW_CLONING,
                ),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&RelationshipConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    /// Add a config; names must be unique
    pub fn add(&mut self, config: RelationshipConfig) -> Result<()> {
        if self.get(config.name()).is_some() {
            return Err(ObjectStoreError::Duplicate {
                kind: "relationship config",
                name: config.name,
            });
        }
        self.configs.push(config);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<RelationshipConfig> {
        let index = self.configs.iter().position(|c| c.name == name)?;
        Some(self.configs.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationshipConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// All configs of a category
    pub fn by_category(&self, category: RelationshipCategory) -> Vec<&RelationshipConfig> {
        self.configs.iter().filter(|c| c.category == category).collect()
    }
}

impl XmlComponent for RelationshipConfigSet {
    const NODE_NAME: &'static str = "PSXRelationshipConfigSet";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME);
        for config in &self.configs {
            node.push(config.to_xml());
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut set = Self::new();
        for child in node.children_named(RelationshipConfig::NODE_NAME) {
            set.add(RelationshipConfig::from_xml(child)?)?;
        }
        Ok(set)
    }
}

impl Validate for RelationshipConfigSet {
    fn validate(&self, cx: &mut ValidationContext) {
        for config in &self.configs {
            cx.validate_child(
                format!("{}[{}]", RelationshipConfig::NODE_NAME, config.name),
                config,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rules() {
        let assembly = RelationshipCategory::ActiveAssembly;
        assert!(RelationshipConfig::new("ActiveAssembly", assembly).is_ok());
        assert!(RelationshipConfig::new("Active Assembly", assembly).is_err());

        assert!(RelationshipConfig::new("", RelationshipCategory::Copy).is_err());
        assert!(RelationshipConfig::new("A".repeat(50), RelationshipCategory::Copy).is_ok());
        assert!(RelationshipConfig::new("A".repeat(51), RelationshipCategory::Copy).is_err());
    }

    #[test]
    fn test_system_properties_follow_flags() {
        let config = RelationshipConfig::new("Link", RelationshipCategory::ActiveAssembly)
            .unwrap()
            .with_options(ConfigOptions::ALLOW_CLONING | ConfigOptions::USE_SERVER_ID);
        let sys = config.system_properties();
        assert_eq!(sys.len(), SYSTEM_PROPERTIES.len());
        assert_eq!(sys["rs_allowcloning"], "yes");
        assert_eq!(sys["rs_useserverid"], "yes");
        assert_eq!(sys["rs_skippromotion"], "no");
    }

    #[test]
    fn test_user_property_cannot_use_system_name() {
        let mut config = RelationshipConfig::new("Link", RelationshipCategory::Copy).unwrap();
        assert!(config.set_user_property("rs_allowcloning", "no").is_err());
        config.set_user_property("weight", "10").unwrap();
        assert_eq!(config.user_property("weight"), Some("10"));
    }

    #[test]
    fn test_xml_round_trip() {
        let mut config = RelationshipConfig::new("Related", RelationshipCategory::ActiveAssembly)
            .unwrap()
            .with_options(ConfigOptions::ALLOW_CLONING | ConfigOptions::USE_DEPENDENT_REVISION);
        config.label = "Related Content".into();
        config.description = "Links & references".into();
        config.set_user_property("sort_rank", "0").unwrap();
        config.add_clone_override_field("sys_title");

        let xml = config.to_xml_string().unwrap();
        assert!(xml.contains(r#"<Property name="rs_usedependentrevision">yes</Property>"#));
        assert_eq!(RelationshipConfig::from_xml_str(&xml).unwrap(), config);
    }

    #[test]
    fn test_unknown_system_property_rejected() {
        let xml = r#"<PSXRelationshipConfig name="X" category="rs_copy">
            <SysProperties><Property name="rs_teleport">yes</Property></SysProperties>
        </PSXRelationshipConfig>"#;
        assert!(RelationshipConfig::from_xml_str(xml).is_err());
    }

    #[test]
    fn test_unknown_category_rejected() {
        let xml = r#"<PSXRelationshipConfig name="X" category="rs_magic"/>"#;
        assert!(RelationshipConfig::from_xml_str(xml).is_err());
    }

    #[test]
    fn test_cloning_rules() {
        let mut config = RelationshipConfig::new("Folder", RelationshipCategory::Folder)
            .unwrap()
            .with_options(ConfigOptions::SHALLOW_CLONING | ConfigOptions::USE_OWNER_REVISION);
        config.add_clone_override_field("sys_title");
        let mut cx = ValidationContext::new();
        config.validate(&mut cx);
        assert!(cx.has_code("SHALLOW_WITHOUT_CLONING"));
        assert!(cx.has_code("UNUSED_CLONE_OVERRIDES"));
        assert!(cx.has_code("FOLDER_REVISION"));
    }

    #[test]
    fn test_system_defaults_are_valid_and_unique() {
        let set = RelationshipConfigSet::system_defaults();
        assert_eq!(set.len(), 5);
        assert!(set.iter().all(RelationshipConfig::is_system));

        let mut cx = ValidationContext::new();
        set.validate(&mut cx);
        assert!(!cx.has_errors(), "{:?}", cx.issues());

        let parsed = RelationshipConfigSet::from_xml_str(&set.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_duplicate_config_rejected() {
        let mut set = RelationshipConfigSet::system_defaults();
        let dup = RelationshipConfig::new("NewCopy", RelationshipCategory::Copy).unwrap();
        assert!(matches!(set.add(dup), Err(ObjectStoreError::Duplicate { .. })));
        assert_eq!(set.by_category(RelationshipCategory::Copy).len(), 1);
    }
}
