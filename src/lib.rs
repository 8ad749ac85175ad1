//! Rhythmyx Object Store
//!
//! Design-time model of the objects a content server application is built
//! from: applications and their data sets, request routing, ACLs, logging,
//! tracing, notification, search and content relationships.
//!
//! ## Features
//!
//! - **XML Persistence**: every component reads and writes its own `PSX*` element
//! - **Validation**: recursive checks that report every issue with its component path
//! - **Typed Option Sets**: logging, tracing and notification categories are bit flags
//! - **Fingerprints**: SHA256 of the canonical serialization
//!
//! ## Component Tree
//!
//! ```text
//! PSXApplication
//! ├── PSXAcl
//! ├── PSXApplicationEncryption
//! ├── PSXLogger
//! ├── PSXTraceInfo
//! ├── PSXErrorWebPages
//! ├── PSXNotifier
//! │   └── PSXRecipient*
//! ├── PSXDataSet*
//! │   ├── PSXRequestor
//! │   │   ├── SelectionCriteria/PSXConditional*
//! │   │   └── ValidationRules/PSXConditional*
//! │   └── PSXResultPageSet/PSXResultPage*
//! └── PSXRevisionHistory
//!
//! PSXRelationshipConfigSet, PSXRelation, PSXRelationship, PSXSearchConfig
//! ```

pub mod checksum;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod validation;
pub mod xml;

pub use checksum::Fingerprint;
pub use config::ObjectStoreConfig;
pub use document::ObjectDocument;
pub use error::{ObjectStoreError, Result};
pub use validation::{Validate, ValidationContext, ValidationIssue, ValidationReport};
pub use xml::{XmlComponent, XmlElement};
