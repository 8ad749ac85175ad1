//! Documents of any supported component type
//!
//! The CLI works on files without knowing in advance what they hold.
//! [`ObjectDocument::parse`] picks the component from the root element name.

use std::path::Path;

use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, warn};

use crate::checksum::Fingerprint;
use crate::config::ValidationConfig;
use crate::error::{ObjectStoreError, Result};
use crate::model::*;
use crate::validation::{Severity, Validate, ValidationContext, ValidationIssue, ValidationReport};
use crate::xml::{parse_document, write_document, WriteOptions, XmlComponent, XmlElement};

macro_rules! object_documents {
    ($($variant:ident),+ $(,)?) => {
        /// A parsed top-level component
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum ObjectDocument {
            $($variant($variant),)+
        }

        impl ObjectDocument {
            /// Root element names this type can parse
            pub const NODE_NAMES: &'static [&'static str] = &[$($variant::NODE_NAME,)+];

            /// Build the component named by the root element of `node`
            pub fn from_xml(node: &XmlElement) -> Result<Self> {
                $(
                    if node.name == $variant::NODE_NAME {
                        return Ok(Self::$variant($variant::from_xml(node)?));
                    }
                )+
                Err(ObjectStoreError::unknown_node(
                    Self::NODE_NAMES.join(" | "),
                    node.name.as_str(),
                ))
            }

            pub fn node_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $variant::NODE_NAME,)+
                }
            }

            pub fn to_xml(&self) -> XmlElement {
                match self {
                    $(Self::$variant(component) => component.to_xml(),)+
                }
            }
        }

        impl Validate for ObjectDocument {
            fn validate(&self, cx: &mut ValidationContext) {
                match self {
                    $(Self::$variant(component) => {
                        cx.validate_child($variant::NODE_NAME, component)
                    })+
                }
            }
        }

        $(
            impl From<$variant> for ObjectDocument {
                fn from(component: $variant) -> Self {
                    Self::$variant(component)
                }
            }
        )+
    };
}

object_documents!(
    Application,
    Acl,
    Conditional,
    DataSet,
    ExtensionCallSet,
    FunctionCall,
    Logger,
    Notifier,
    Recipient,
    Relation,
    Relationship,
    RelationshipConfig,
    RelationshipConfigSet,
    Requestor,
    ResultPage,
    RevisionHistory,
    SearchConfig,
    TraceInfo,
);

impl ObjectDocument {
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_xml(&parse_document(input)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading document");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn to_xml_string(&self, options: &WriteOptions) -> Result<String> {
        write_document(&self.to_xml(), options)
    }

    /// Fingerprint of the canonical serialization
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        Fingerprint::of_element(&self.to_xml())
    }

    pub fn as_application(&self) -> Option<&Application> {
        match self {
            Self::Application(app) => Some(app),
            _ => None,
        }
    }
}

/// Parse and validate every `*.xml` file below `dir`
///
/// Files that fail to parse are reported with a single `PARSE_ERROR` issue.
pub fn validate_tree(dir: &Path, config: &ValidationConfig) -> Vec<ValidationReport> {
    let mut reports = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "xml").unwrap_or(false))
    {
        let path = entry.path();
        let subject = path
            .strip_prefix(dir)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());

        let report = match ObjectDocument::from_file(path) {
            Ok(document) => crate::validation::validate(&document, config).into_report(subject),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not parse document");
                ValidationReport {
                    subject,
                    errors: vec![ValidationIssue {
                        severity: Severity::Error,
                        code: "PARSE_ERROR",
                        path: String::new(),
                        message: e.to_string(),
                    }],
                    warnings: Vec::new(),
                }
            }
        };
        reports.push(report);
    }

    reports
}

/// One line of a document diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Removed,
    Added,
    Unchanged,
}

/// Line diff of two documents after normalizing both to pretty XML
pub fn diff_documents(old: &ObjectDocument, new: &ObjectDocument) -> Result<Vec<DiffLine>> {
    let options = WriteOptions {
        include_declaration: false,
        ..WriteOptions::default()
    };
    let old_text = old.to_xml_string(&options)?;
    let new_text = new.to_xml_string(&options)?;

    let diff = TextDiff::from_lines(&old_text, &new_text);
    let lines = diff
        .iter_all_changes()
        .map(|change| DiffLine {
            tag: match change.tag() {
                ChangeTag::Delete => DiffTag::Removed,
                ChangeTag::Insert => DiffTag::Added,
                ChangeTag::Equal => DiffTag::Unchanged,
            },
            line: change.value().trim_end_matches('\n').to_string(),
        })
        .collect();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_on_root_name() {
        let doc =
            ObjectDocument::parse(r#"<PSXLogger><logErrors>yes</logErrors></PSXLogger>"#).unwrap();

        assert_eq!(doc.node_name(), "PSXLogger");
        assert!(matches!(doc, ObjectDocument::Logger(_)));
        assert!(doc.as_application().is_none());
    }

    #[test]
    fn test_unknown_root() {
        let err = ObjectDocument::parse("<PSXWidget/>").unwrap_err();
        match err {
            ObjectStoreError::UnknownNodeType { found, expected } => {
                assert_eq!(found, "PSXWidget");
                assert!(expected.contains("PSXApplication"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_is_rooted_at_node_name() {
        let doc = ObjectDocument::from(Acl::new());
        let cx = crate::validation::validate(&doc, &Default::default());
        assert_eq!(cx.issues()[0].path, "PSXAcl");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.xml");
        let trace = TraceInfo::default();
        std::fs::write(&path, trace.to_xml_string().unwrap()).unwrap();
        assert_eq!(ObjectDocument::from_file(&path).unwrap(), ObjectDocument::TraceInfo(trace));
        assert!(ObjectDocument::from_file(dir.path().join("missing.xml")).is_err());
    }

    #[test]
    fn test_validate_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("acl.xml"), "<PSXAcl/>").unwrap();
        std::fs::write(dir.path().join("nested/broken.xml"), "<PSXLogger>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let reports = validate_tree(dir.path(), &Default::default());
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].subject, "acl.xml");
        assert_eq!(reports[0].errors[0].code, "NO_FULL_ACCESS");
        assert_eq!(reports[1].errors[0].code, "PARSE_ERROR");
    }

    #[test]
    fn test_diff_documents() {
        let mut trace = TraceInfo::default();
        let old = ObjectDocument::from(trace.clone());
        trace.set_enabled(true);
        let new = ObjectDocument::from(trace);

        let diff = diff_documents(&old, &new).unwrap();
        let removed: Vec<_> = diff.iter().filter(|l| l.tag == DiffTag::Removed).collect();
        let added: Vec<_> = diff.iter().filter(|l| l.tag == DiffTag::Added).collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(added.len(), 1);
        assert!(added[0].line.contains(r#"traceEnabled="yes""#));

        let same = diff_documents(&old, &old).unwrap();
        assert!(same.iter().all(|l| l.tag == DiffTag::Unchanged));
    }
}
