//! Application access control lists

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::{ObjectStoreError, Result};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{flag_text, parse_flag, XmlComponent, XmlElement};

bitflags! {
    /// Rights granted by an ACL entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct AccessLevel: u32 {
        const DATA_QUERY = 0x0001;
        const DATA_CREATE = 0x0002;
        const DATA_UPDATE = 0x0004;
        const DATA_DELETE = 0x0008;
        const DESIGN_READ = 0x0100;
        const DESIGN_UPDATE = 0x0200;
        const DESIGN_DELETE = 0x0400;
        const DESIGN_MODIFY_ACL = 0x0800;

        const DATA_FULL = Self::DATA_QUERY.bits()
            | Self::DATA_CREATE.bits()
            | Self::DATA_UPDATE.bits()
            | Self::DATA_DELETE.bits();
        const DESIGN_FULL = Self::DESIGN_READ.bits()
            | Self::DESIGN_UPDATE.bits()
            | Self::DESIGN_DELETE.bits()
            | Self::DESIGN_MODIFY_ACL.bits();
    }
}

/// Attribute names on `<applicationAccessLevel>`
const ACCESS_ATTRIBUTES: [(AccessLevel, &str); 8] = [
    (AccessLevel::DATA_QUERY, "dataQuery"),
    (AccessLevel::DATA_CREATE, "dataCreate"),
    (AccessLevel::DATA_UPDATE, "dataUpdate"),
    (AccessLevel::DATA_DELETE, "dataDelete"),
    (AccessLevel::DESIGN_READ, "designRead"),
    (AccessLevel::DESIGN_UPDATE, "designUpdate"),
    (AccessLevel::DESIGN_DELETE, "designDelete"),
    (AccessLevel::DESIGN_MODIFY_ACL, "modifyAcl"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryType {
    User,
    Role,
    Group,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            "group" => Ok(Self::Group),
            _ => Err(ObjectStoreError::invalid("type", s, "expected user, role or group")),
        }
    }
}

/// How rights combine when a caller matches several entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MultiMembership {
    /// Union of every matching entry
    #[default]
    Merged,
    /// The single matching entry with the most rights
    Maximum,
}

impl MultiMembership {
    fn as_str(self) -> &'static str {
        match self {
            Self::Merged => "merged",
            Self::Maximum => "maximum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AclEntry {
    name: String,
    entry_type: EntryType,
    pub access: AccessLevel,
}

impl AclEntry {
    pub fn new(
        name: impl Into<String>,
        entry_type: EntryType,
        access: AccessLevel,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ObjectStoreError::invalid("name", &name, "must not be empty"));
        }
        Ok(Self {
            name,
            entry_type,
            access,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn has_full_access(&self) -> bool {
        self.access.contains(AccessLevel::all())
    }

    fn same_principal(&self, other: &AclEntry) -> bool {
        self.entry_type == other.entry_type && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl XmlComponent for AclEntry {
    const NODE_NAME: &'static str = "PSXAclEntry";

    fn to_xml(&self) -> XmlElement {
        let mut level = XmlElement::new("applicationAccessLevel");
        for (flag, attr) in ACCESS_ATTRIBUTES {
            level.set_attr(attr, flag_text(self.access.contains(flag)));
        }
        XmlElement::new(Self::NODE_NAME)
            .with_attr("type", self.entry_type.as_str())
            .with_child(XmlElement::text_node("name", self.name.as_str()))
            .with_child(level)
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let entry_type = node.required_attr("type")?.parse()?;
        let mut access = AccessLevel::empty();
        if let Some(level) = node.child("applicationAccessLevel") {
            for (flag, attr) in ACCESS_ATTRIBUTES {
                if let Some(value) = level.attr(attr) {
                    access.set(flag, parse_flag(attr, value)?);
                }
            }
        }
        Self::new(node.required_child_text("name")?, entry_type, access)
    }
}

/// Access control list of an application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Acl {
    entries: Vec<AclEntry>,
    pub multi_membership: MultiMembership,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    /// Add an entry; the same principal may not appear twice
    pub fn add_entry(&mut self, entry: AclEntry) -> Result<()> {
        if self.entries.iter().any(|e| e.same_principal(&entry)) {
            return Err(ObjectStoreError::Duplicate {
                kind: "ACL entry",
                name: entry.name,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove_entry(&mut self, name: &str, entry_type: EntryType) -> Option<AclEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.entry_type == entry_type && e.name.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index))
    }

    pub fn entry(&self, name: &str, entry_type: EntryType) -> Option<&AclEntry> {
        self.entries
            .iter()
            .find(|e| e.entry_type == entry_type && e.name.eq_ignore_ascii_case(name))
    }

    pub fn has_full_access_entry(&self) -> bool {
        self.entries.iter().any(AclEntry::has_full_access)
    }

    /// Rights of a caller matching the given principals
    pub fn effective_access(&self, principals: &[(EntryType, &str)]) -> AccessLevel {
        let matching = self.entries.iter().filter(|e| {
            principals
                .iter()
                .any(|(t, n)| e.entry_type == *t && e.name.eq_ignore_ascii_case(n))
        });
        match self.multi_membership {
            MultiMembership::Merged => matching.fold(AccessLevel::empty(), |acc, e| acc | e.access),
            MultiMembership::Maximum => matching
                .map(|e| e.access)
                .max_by_key(|a| a.bits().count_ones())
                .unwrap_or(AccessLevel::empty()),
        }
    }
}

impl XmlComponent for Acl {
    const NODE_NAME: &'static str = "PSXAcl";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_attr("multiMembershipBehavior", self.multi_membership.as_str());
        for entry in &self.entries {
            node.push(entry.to_xml());
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let multi_membership = match node.attr("multiMembershipBehavior") {
            None | Some("merged") => MultiMembership::Merged,
            Some("maximum") => MultiMembership::Maximum,
            Some(other) => {
                return Err(ObjectStoreError::invalid(
                    "multiMembershipBehavior",
                    other,
                    "expected merged or maximum",
                ))
            }
        };
        let mut acl = Self {
            entries: Vec::new(),
            multi_membership,
        };
        for entry in node.children_named(AclEntry::NODE_NAME) {
            acl.add_entry(AclEntry::from_xml(entry)?)?;
        }
        Ok(acl)
    }
}

impl Validate for Acl {
    fn validate(&self, cx: &mut ValidationContext) {
        if !self.has_full_access_entry() {
            cx.error(
                "NO_FULL_ACCESS",
                "at least one entry must hold every data and design right, including modify ACL",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AclEntry {
        AclEntry::new("Admin", EntryType::Role, AccessLevel::all()).unwrap()
    }

    #[test]
    fn test_design_full_requires_modify_acl() {
        let entry = AclEntry::new(
            "Designer",
            EntryType::Role,
            AccessLevel::DATA_FULL
                | AccessLevel::DESIGN_READ
                | AccessLevel::DESIGN_UPDATE
                | AccessLevel::DESIGN_DELETE,
        )
        .unwrap();
        assert!(!entry.has_full_access());
        assert!(admin().has_full_access());
    }

    #[test]
    fn test_duplicate_principal_rejected() {
        let mut acl = Acl::new();
        acl.add_entry(admin()).unwrap();
        let again = AclEntry::new("ADMIN", EntryType::Role, AccessLevel::DATA_QUERY).unwrap();
        assert!(acl.add_entry(again).is_err());
        let user = AclEntry::new("admin", EntryType::User, AccessLevel::DATA_QUERY).unwrap();
        assert!(acl.add_entry(user).is_ok());
    }

    #[test]
    fn test_effective_access_by_membership() {
        let mut acl = Acl::new();
        let editor_access = AccessLevel::DATA_UPDATE | AccessLevel::DATA_CREATE;
        acl.add_entry(AclEntry::new("editor", EntryType::Role, editor_access).unwrap())
            .unwrap();

        acl.add_entry(AclEntry::new("jane", EntryType::User, AccessLevel::DATA_QUERY).unwrap())
            .unwrap();
        let principals = [(EntryType::User, "jane"), (EntryType::Role, "editor")];

        assert_eq!(
            acl.effective_access(&principals),
            AccessLevel::DATA_QUERY | AccessLevel::DATA_UPDATE | AccessLevel::DATA_CREATE
        );
        acl.multi_membership = MultiMembership::Maximum;
        assert_eq!(
            acl.effective_access(&principals),
            AccessLevel::DATA_UPDATE | AccessLevel::DATA_CREATE
        );
        assert_eq!(acl.effective_access(&[]), AccessLevel::empty());
    }

    #[test]
    fn test_validation_requires_full_access() {
        let mut acl = Acl::new();
        let cx = crate::validation::validate(&acl, &Default::default());
        assert!(cx.has_code("NO_FULL_ACCESS"));

        acl.add_entry(admin()).unwrap();
        let cx = crate::validation::validate(&acl, &Default::default());
        assert!(!cx.has_errors());
    }

    #[test]
    fn test_xml_round_trip() {
        let mut acl = Acl::new();
        acl.multi_membership = MultiMembership::Maximum;
        acl.add_entry(admin()).unwrap();
        acl.add_entry(AclEntry::new("Default", EntryType::User, AccessLevel::DATA_QUERY).unwrap())
            .unwrap();
        let xml = acl.to_xml_string().unwrap();
        assert!(xml.contains(r#"modifyAcl="yes""#));
        assert_eq!(Acl::from_xml_str(&xml).unwrap(), acl);
    }

    #[test]
    fn test_unknown_entry_type() {
        let xml = r#"<PSXAclEntry type="robot"><name>x</name></PSXAclEntry>"#;
        assert!(AclEntry::from_xml_str(xml).is_err());
    }
}
