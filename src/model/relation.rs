//! Content locators and unbound relations

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ObjectStoreError, Result};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{parse_number, properties_from_xml, properties_to_xml, XmlComponent, XmlElement};

/// Identity of a content item: its id and, optionally, a specific revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub id: u64,
    /// `None` refers to whichever revision is current
    pub revision: Option<u32>,
}

impl Locator {
    pub fn new(id: u64) -> Self {
        Self { id, revision: None }
    }

    pub fn with_revision(id: u64, revision: u32) -> Self {
        Self {
            id,
            revision: Some(revision),
        }
    }

    /// The same item without a revision
    pub fn unversioned(&self) -> Self {
        Self::new(self.id)
    }

    /// Whether both locators name the same item, ignoring revisions
    pub fn same_item(&self, other: &Locator) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(rev) => write!(f, "{}:{}", self.id, rev),
            None => write!(f, "{}", self.id),
        }
    }
}

impl XmlComponent for Locator {
    const NODE_NAME: &'static str = "PSXLocator";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME).with_attr("id", self.id.to_string());
        if let Some(rev) = self.revision {
            node.set_attr("revision", rev.to_string());
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        Ok(Self {
            id: parse_number("id", node.required_attr("id")?)?,
            revision: node
                .attr("revision")
                .map(|rev| parse_number("revision", rev))
                .transpose()?,
        })
    }
}

/// Write a locator wrapped in a role element (`<Owner>`, `<Dependent>`)
pub(crate) fn locator_to_xml(role: &str, locator: &Locator) -> XmlElement {
    XmlElement::new(role).with_child(locator.to_xml())
}

pub(crate) fn locator_from_xml(parent: &XmlElement, role: &str) -> Result<Locator> {
    Locator::from_xml(
        parent
            .required_child(role)?
            .first_child()
            .ok_or_else(|| ObjectStoreError::MissingElement {
                parent: role.to_string(),
                element: Locator::NODE_NAME.to_string(),
            })?,
    )
}

/// An association between two items that names its relationship type but is
/// not yet bound to the type's definition
///
/// This is the shape in which new relationships are requested; binding it
/// against a [`RelationshipConfigSet`](crate::model::RelationshipConfigSet)
/// produces a [`Relationship`](crate::model::Relationship).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    pub config_name: String,
    pub owner: Locator,
    pub dependent: Locator,
    /// User property values to set on the relationship
    pub properties: BTreeMap<String, String>,
}

impl Relation {
    pub fn new(config_name: impl Into<String>, owner: Locator, dependent: Locator) -> Self {
        Self {
            config_name: config_name.into(),
            owner,
            dependent,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

impl XmlComponent for Relation {
    const NODE_NAME: &'static str = "PSXRelation";

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attr("config", self.config_name.as_str())
            .with_child(locator_to_xml("Owner", &self.owner))
            .with_child(locator_to_xml("Dependent", &self.dependent))
            .with_child(properties_to_xml("Properties", "Property", &self.properties))
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        Ok(Self {
            config_name: node.required_attr("config")?.to_string(),
            owner: locator_from_xml(node, "Owner")?,
            dependent: locator_from_xml(node, "Dependent")?,
            properties: match node.child("Properties") {
                Some(props) => properties_from_xml(props, "Property")?,
                None => BTreeMap::new(),
            },
        })
    }
}

impl Validate for Relation {
    fn validate(&self, cx: &mut ValidationContext) {
        if self.config_name.trim().is_empty() {
            cx.error("MISSING_CONFIG", "relation does not name a relationship type");
        }
        if self.owner.same_item(&self.dependent) {
            cx.warning(
                "SELF_RELATION",
                format!("item {} is related to itself", self.owner.id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_xml() {
        let pinned = Locator::with_revision(301, 4);
        let parsed = Locator::from_xml_str(&pinned.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, pinned);

        let current = Locator::from_xml_str(r#"<PSXLocator id="301"/>"#).unwrap();
        assert_eq!(current.revision, None);
        assert!(current.same_item(&pinned));
        assert_eq!(pinned.to_string(), "301:4");
    }

    #[test]
    fn test_locator_rejects_negative_id() {
        assert!(Locator::from_xml_str(r#"<PSXLocator id="-5"/>"#).is_err());
    }

    #[test]
    fn test_relation_xml_round_trip() {
        let relation =
            Relation::new("ActiveAssembly", Locator::with_revision(1, 2), Locator::new(7))
                .with_property("sort_rank", "3");
        let parsed = Relation::from_xml_str(&relation.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, relation);
    }

    #[test]
    fn test_missing_owner() {
        let xml =
            r#"<PSXRelation config="X"><Dependent><PSXLocator id="2"/></Dependent></PSXRelation>"#;
        assert!(matches!(
            Relation::from_xml_str(xml),
            Err(ObjectStoreError::MissingElement { .. })
        ));
    }

    #[test]
    fn test_self_relation_warns() {
        let relation =
            Relation::new("NewCopy", Locator::with_revision(5, 1), Locator::with_revision(5, 2));

        let mut cx = ValidationContext::new();
        relation.validate(&mut cx);
        assert!(cx.has_code("SELF_RELATION"));
    }
}
