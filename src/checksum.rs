//! Component fingerprints
//!
//! A fingerprint is the SHA-256 of a component's canonical serialization,
//! so two components share a fingerprint exactly when they serialize to the
//! same compact XML. Formatting of the source file does not matter.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::Result;
use crate::xml::{write_document, WriteOptions, XmlComponent, XmlElement};

/// Hex-encoded SHA-256 of a canonical serialization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    pub fn of_element(element: &XmlElement) -> Result<Self> {
        let canonical = write_document(element, &WriteOptions::canonical())?;
        Ok(Self::from_bytes(canonical.as_bytes()))
    }

    pub fn of<C: XmlComponent>(component: &C) -> Result<Self> {
        Self::of_element(&component.to_xml())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for display
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }

    pub fn verify<C: XmlComponent>(&self, component: &C) -> Result<bool> {
        Ok(Self::of(component)? == *self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogOptions, Logger};
    use crate::xml::parse_document;

    #[test]
    fn test_fingerprint_ignores_formatting() {
        let pretty = "<PSXLogger>\n  <logErrors>yes</logErrors>\n</PSXLogger>";
        let compact = "<PSXLogger><logErrors>yes</logErrors></PSXLogger>";
        let a = Fingerprint::of_element(&parse_document(pretty).unwrap()).unwrap();
        let b = Fingerprint::of_element(&parse_document(compact).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut logger = Logger::default();
        let before = Fingerprint::of(&logger).unwrap();
        assert!(before.verify(&logger).unwrap());

        logger.enable(LogOptions::EXECUTION_PLAN);
        assert_ne!(Fingerprint::of(&logger).unwrap(), before);
        assert!(!before.verify(&logger).unwrap());
    }
}
