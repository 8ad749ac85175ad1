//! Revision history of an application

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use std::fmt;

use crate::error::{ObjectStoreError, Result};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{parse_number, XmlComponent, XmlElement};

/// One recorded change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionEntry {
    pub agent: String,
    pub description: String,
    /// UTC, whole seconds
    pub time: DateTime<Utc>,
    pub major: u32,
    pub minor: u32,
}

impl RevisionEntry {
    pub fn new(
        agent: impl Into<String>,
        description: impl Into<String>,
        major: u32,
        minor: u32,
    ) -> Self {
        Self {
            agent: agent.into(),
            description: description.into(),
            time: Utc::now().trunc_subsecs(0),
            major,
            minor,
        }
    }

    pub fn version(&self) -> (u32, u32) {
        (self.major, self.minor)
    }

    pub fn version_string(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for RevisionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} at {}", self.version_string(), self.agent, self.time.to_rfc3339())
    }
}

impl XmlComponent for RevisionEntry {
    const NODE_NAME: &'static str = "PSXRevisionEntry";

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attr("majorVersion", self.major.to_string())
            .with_attr("minorVersion", self.minor.to_string())
            .with_child(XmlElement::text_node("agent", self.agent.as_str()))
            .with_child(XmlElement::text_node("description", self.description.as_str()))
            .with_child(XmlElement::text_node(
                "time",
                self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            ))
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let time_text = node.required_child_text("time")?;
        let time = DateTime::parse_from_rfc3339(time_text.trim())
            .map_err(|e| ObjectStoreError::invalid("time", time_text, e.to_string()))?
            .with_timezone(&Utc);
        Ok(Self {
            agent: node.required_child_text("agent")?.to_string(),
            description: node.child_text("description").unwrap_or_default().to_string(),
            time,
            major: parse_number("majorVersion", node.required_attr("majorVersion")?)?,
            minor: parse_number("minorVersion", node.required_attr("minorVersion")?)?,
        })
    }
}

/// Ordered list of revisions, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RevisionHistory {
    entries: Vec<RevisionEntry>,
}

impl RevisionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RevisionEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&RevisionEntry> {
        self.entries.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a change as the next minor version (1.0 when empty)
    ///
    /// Fails when the latest minor version is already `u32::MAX`.
    pub fn add_revision(&mut self, agent: &str, description: &str) -> Result<&RevisionEntry> {
        let (major, minor) = match self.latest() {
            Some(last) => (last.major, bump("minorVersion", last.minor)?),
            None => (1, 0),
        };
        Ok(self.push(RevisionEntry::new(agent, description, major, minor)))
    }

    /// Record a change as the next major version
    pub fn add_major_revision(
        &mut self,
        agent: &str,
        description: &str,
    ) -> Result<&RevisionEntry> {
        let major = match self.latest() {
            Some(last) => bump("majorVersion", last.major)?,
            None => 1,
        };
        Ok(self.push(RevisionEntry::new(agent, description, major, 0)))
    }

    fn push(&mut self, entry: RevisionEntry) -> &RevisionEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }
}

fn bump(field: &str, version: u32) -> Result<u32> {
    version
        .checked_add(1)
        .ok_or_else(|| ObjectStoreError::invalid(field, version, "no next version"))
}

impl XmlComponent for RevisionHistory {
    const NODE_NAME: &'static str = "PSXRevisionHistory";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME);
        for entry in &self.entries {
            node.push(entry.to_xml());
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let entries = node
            .children_named(RevisionEntry::NODE_NAME)
            .map(RevisionEntry::from_xml)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

impl Validate for RevisionHistory {
    fn validate(&self, cx: &mut ValidationContext) {
        for (index, pair) in self.entries.windows(2).enumerate() {
            if pair[1].version() <= pair[0].version() {
                cx.error(
                    "VERSION_NOT_INCREASING",
                    format!(
                        "revision {} at position {} does not follow {}",
                        pair[1].version_string(),
                        index + 1,
                        pair[0].version_string()
                    ),
                );
            }
            if pair[1].time < pair[0].time {
                cx.warning(
                    "TIME_NOT_INCREASING",
                    format!("revision {} is older than its predecessor", pair[1].version_string()),
                );
            }
        }
        for entry in &self.entries {
            if entry.agent.trim().is_empty() {
                cx.error(
                    "MISSING_AGENT",
                    format!("revision {} has no agent", entry.version_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_version_bumps() {
        let mut history = RevisionHistory::new();
        assert_eq!(history.add_revision("jane", "created").unwrap().version(), (1, 0));
        assert_eq!(history.add_revision("jane", "tweak").unwrap().version(), (1, 1));
        assert_eq!(history.add_major_revision("bob", "rework").unwrap().version(), (2, 0));
        assert_eq!(history.add_revision("bob", "fix").unwrap().version(), (2, 1));
        assert_eq!(history.entries().len(), 4);
    }

    #[test]
    fn test_version_bump_at_limit() {
        let xml = r#"<PSXRevisionHistory>
            <PSXRevisionEntry majorVersion="4294967295" minorVersion="4294967295">
                <agent>admin</agent>
                <time>2024-03-01T12:00:00Z</time>
            </PSXRevisionEntry>
        </PSXRevisionHistory>"#;
        let mut history = RevisionHistory::from_xml_str(xml).unwrap();
        assert!(matches!(
            history.add_revision("jane", "tweak"),
            Err(ObjectStoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            history.add_major_revision("jane", "rework"),
            Err(ObjectStoreError::InvalidValue { .. })
        ));
        // a failed bump records nothing
        assert_eq!(history.entries().len(), 1);
    }

    #[test]
    fn test_non_increasing_versions_rejected() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = |major, minor| RevisionEntry {
            agent: "jane".into(),
            description: String::new(),
            time,
            major,
            minor,
        };
        let history = RevisionHistory {
            entries: vec![entry(1, 0), entry(1, 2), entry(1, 2)],
        };
        let cx = crate::validation::validate(&history, &Default::default());
        assert!(cx.has_code("VERSION_NOT_INCREASING"));
        assert_eq!(cx.error_count(), 1);
    }

    #[test]
    fn test_xml_round_trip() {
        let mut history = RevisionHistory::new();
        history.add_revision("jane", "created").unwrap();
        history.add_major_revision("bob", "new layout & flow").unwrap();
        let xml = history.to_xml_string().unwrap();
        assert_eq!(RevisionHistory::from_xml_str(&xml).unwrap(), history);
    }

    #[test]
    fn test_parse_time_as_utc() {
        let xml = r#"<PSXRevisionEntry majorVersion="3" minorVersion="1">
            <agent>admin</agent>
            <time>2024-03-01T14:00:00+02:00</time>
        </PSXRevisionEntry>"#;
        let entry = RevisionEntry::from_xml_str(xml).unwrap();
        assert_eq!(entry.time, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(entry.version_string(), "3.1");
        assert!(entry.description.is_empty());
    }
}
