//! Relationship instances
//!
//! A relationship is a [`Relation`] bound to the full definition of its type.
//! Its properties are a merged view:
//!
//! 1. the config's system properties (derived from its behaviour flags),
//! 2. the config's user property defaults,
//! 3. values set on this instance, which override user defaults.
//!
//! System properties always win; an instance can never change them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{ObjectStoreError, Result};
use crate::model::relation::{locator_from_xml, locator_to_xml, Locator, Relation};
use crate::model::relationship_config::{
    is_system_property, ConfigOptions, RelationshipConfig, RelationshipConfigSet,
};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{parse_number, properties_from_xml, properties_to_xml, XmlComponent, XmlElement};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    id: u32,
    config: RelationshipConfig,
    owner: Locator,
    dependent: Locator,
    /// Instance overrides of user properties
    properties: BTreeMap<String, String>,
}

impl Relationship {
    pub fn new(id: u32, config: RelationshipConfig, owner: Locator, dependent: Locator) -> Self {
        Self {
            id,
            config,
            owner,
            dependent,
            properties: BTreeMap::new(),
        }
    }

    /// Bind a relation to its config from `configs`
    pub fn bind(id: u32, relation: &Relation, configs: &RelationshipConfigSet) -> Result<Self> {
        let config = configs
            .get(&relation.config_name)
            .ok_or_else(|| ObjectStoreError::NotFound {
                kind: "relationship config",
                name: relation.config_name.clone(),
            })?;
        let mut relationship = Self::new(id, config.clone(), relation.owner, relation.dependent);
        for (name, value) in &relation.properties {
            relationship.set_property(name.as_str(), value.as_str())?;
        }
        Ok(relationship)
    }

    /// The unbound form of this relationship, carrying only instance overrides
    pub fn to_relation(&self) -> Relation {
        Relation {
            config_name: self.config.name().to_string(),
            owner: self.owner,
            dependent: self.dependent,
            properties: self.properties.clone(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn config(&self) -> &RelationshipConfig {
        &self.config
    }

    pub fn owner(&self) -> Locator {
        self.owner
    }

    pub fn dependent(&self) -> Locator {
        self.dependent
    }

    /// Owner as this relationship refers to it: pinned to a revision only when
    /// the type uses owner revisions
    pub fn effective_owner(&self) -> Locator {
        if self.config.is_enabled(ConfigOptions::USE_OWNER_REVISION) {
            self.owner
        } else {
            self.owner.unversioned()
        }
    }

    /// Dependent as this relationship refers to it
    pub fn effective_dependent(&self) -> Locator {
        if self.config.is_enabled(ConfigOptions::USE_DEPENDENT_REVISION) {
            self.dependent
        } else {
            self.dependent.unversioned()
        }
    }

    /// Values set on this instance only
    pub fn instance_properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Set a user property on this instance
    ///
    /// The property must be declared by the config; system properties are
    /// read-only.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if is_system_property(&name) {
            return Err(ObjectStoreError::invalid(
                "relationship property",
                &name,
                "system properties are defined by the relationship config",
            ));
        }
        if self.config.user_property(&name).is_none() {
            return Err(ObjectStoreError::NotFound {
                kind: "user property",
                name: format!("{} in {}", name, self.config.name()),
            });
        }
        self.properties.insert(name, value.into());
        Ok(())
    }

    /// Drop an instance value, falling back to the config default
    pub fn reset_property(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    /// One property from the merged view
    pub fn property(&self, name: &str) -> Option<String> {
        if is_system_property(name) {
            return self.config.system_properties().remove(name);
        }
        self.properties
            .get(name)
            .or_else(|| self.config.user_properties().get(name))
            .cloned()
    }

    /// System, user-default and instance properties merged into one map
    pub fn all_properties(&self) -> BTreeMap<String, String> {
        let mut merged = self.config.user_properties().clone();
        for (name, value) in &self.properties {
            if !is_system_property(name) {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged.extend(self.config.system_properties());
        debug!(
            relationship = self.id,
            config = self.config.name(),
            count = merged.len(),
            "merged relationship properties"
        );
        merged
    }
}

impl XmlComponent for Relationship {
    const NODE_NAME: &'static str = "PSXRelationship";

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attr("id", self.id.to_string())
            .with_child(self.config.to_xml())
            .with_child(locator_to_xml("Owner", &self.owner))
            .with_child(locator_to_xml("Dependent", &self.dependent))
            .with_child(properties_to_xml("Properties", "Property", &self.properties))
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let config =
            RelationshipConfig::from_xml(node.required_child(RelationshipConfig::NODE_NAME)?)?;
        let mut relationship = Self::new(
            parse_number("id", node.required_attr("id")?)?,
            config,
            locator_from_xml(node, "Owner")?,
            locator_from_xml(node, "Dependent")?,
        );
        if let Some(props) = node.child("Properties") {
            for (name, value) in properties_from_xml(props, "Property")? {
                relationship.set_property(name, value)?;
            }
        }
        Ok(relationship)
    }
}

impl Validate for Relationship {
    fn validate(&self, cx: &mut ValidationContext) {
        cx.validate_child(RelationshipConfig::NODE_NAME, &self.config);
        cx.validate_child(Relation::NODE_NAME, &self.to_relation());
        for name in self.properties.keys() {
            if self.config.user_property(name).is_none() {
                cx.error(
                    "UNDECLARED_PROPERTY",
                    format!("{} is not a user property of {}", name, self.config.name()),
                );
            }
        }
    }
}
