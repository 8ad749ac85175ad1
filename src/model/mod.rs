//! Object-store components
//!
//! Each component owns its fields, checks them in its setters, converts
//! itself to and from its `PSX*` element, and re-checks everything in
//! [`Validate`](crate::validation::Validate).

pub mod acl;
pub mod application;
pub mod conditional;
pub mod data_set;
pub mod extension;
pub mod function_call;
pub mod logger;
pub mod notifier;
pub mod recipient;
pub mod relation;
pub mod relationship;
pub mod relationship_config;
pub mod replacement;
pub mod requestor;
pub mod result_page;
pub mod revision;
pub mod search_config;
pub mod trace_info;

pub use acl::{AccessLevel, Acl, AclEntry, EntryType, MultiMembership};
pub use application::{Application, ApplicationType, Encryption, ErrorWebPages};
pub use conditional::{Conditional, Joiner, Operator};
pub use data_set::DataSet;
pub use extension::{ExtensionCall, ExtensionCallSet};
pub use function_call::FunctionCall;
pub use logger::{LogOptions, Logger};
pub use notifier::{Notifier, NotifierProvider};
pub use recipient::{NotifyOptions, Recipient};
pub use relation::{Locator, Relation};
pub use relationship::Relationship;
pub use relationship_config::{
    ConfigOptions, ConfigType, RelationshipCategory, RelationshipConfig, RelationshipConfigSet,
};
pub use replacement::ReplacementValue;
pub use requestor::Requestor;
pub use result_page::ResultPage;
pub use revision::{RevisionEntry, RevisionHistory};
pub use search_config::SearchConfig;
pub use trace_info::{TraceChange, TraceFlags, TraceInfo, TraceListener};

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ObjectStoreError, Result};

/// `type/subtype` in lower case, with `*` allowed as the whole subtype
pub(crate) static MIME_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][\w.+-]*/([a-z0-9][\w.+-]*|\*)$").unwrap());

/// Non-blank text of at most `max_len` characters
pub(crate) fn require_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ObjectStoreError::invalid(field, value, "must not be empty"));
    }
    if value.chars().count() > max_len {
        return Err(ObjectStoreError::invalid(
            field,
            value,
            format!("must be at most {} characters", max_len),
        ));
    }
    Ok(())
}

/// MIME types compare case-insensitively, so the check runs on a lowered copy
pub(crate) fn check_mime_type(field: &str, mime: &str) -> Result<()> {
    if MIME_TYPE.is_match(&mime.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(ObjectStoreError::invalid(field, mime, "expected 'type/subtype'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_boundaries() {
        assert!(require_text("f", "abc", 3).is_ok());
        assert!(require_text("f", "abcd", 3).is_err());
        assert!(require_text("f", "   ", 3).is_err());
        // characters, not bytes
        assert!(require_text("f", "äöü", 3).is_ok());
    }

    #[test]
    fn test_mime_type_shape() {
        assert!(check_mime_type("m", "text/html").is_ok());
        assert!(check_mime_type("m", "Application/XHTML+XML").is_ok());
        assert!(check_mime_type("m", "text/*").is_ok());
        assert!(check_mime_type("m", "html").is_err());
        assert!(check_mime_type("m", "*/*").is_err());
        assert!(check_mime_type("m", "text/ht*ml").is_err());
        assert!(check_mime_type("m", "text/html; charset=utf-8").is_err());
    }

    #[test]
    fn test_mime_type_agrees_across_components() {
        let mut requestor = Requestor::new("page").unwrap();
        let mut search = SearchConfig::default();
        for mime in ["Text/HTML", "application/pdf", "text/*"] {
            assert!(requestor.set_mime_property("ext", mime).is_ok(), "{}", mime);
            assert!(search.set_text_converter(mime, "com.example.Converter").is_ok(), "{}", mime);
        }
        for mime in ["html", "text/", "/plain"] {
            assert!(requestor.set_mime_property("ext", mime).is_err(), "{}", mime);
            assert!(search.set_text_converter(mime, "com.example.Converter").is_err(), "{}", mime);
        }
    }
}
