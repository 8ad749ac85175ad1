//! Component validation
//!
//! Validation never fails fast by returning an error. Each component walks
//! its own fields and its children, recording issues into a shared
//! [`ValidationContext`]. The context tracks where in the component tree an
//! issue was found so reports read like `PSXApplication/PSXDataSet[0]/PSXRequestor`.

use serde::Serialize;
use tracing::debug;

use crate::config::ValidationConfig;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    /// Component path, e.g. `PSXApplication/PSXAcl`
    pub path: String,
    pub message: String,
}

/// Implemented by every component that can check its own state
pub trait Validate {
    fn validate(&self, cx: &mut ValidationContext);
}

/// Collects issues during a recursive validation pass
#[derive(Debug, Default)]
pub struct ValidationContext {
    config: ValidationConfig,
    parents: Vec<String>,
    issues: Vec<ValidationIssue>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn push_parent(&mut self, name: impl Into<String>) {
        self.parents.push(name.into());
    }

    pub fn pop_parent(&mut self) {
        self.parents.pop();
    }

    /// Run `f` with `name` pushed onto the component path
    pub fn scoped<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_parent(name);
        f(self);
        self.pop_parent();
    }

    /// Validate a child component under `name`
    pub fn validate_child<V: Validate + ?Sized>(&mut self, name: impl Into<String>, child: &V) {
        self.scoped(name, |cx| child.validate(cx));
    }

    pub fn path(&self) -> String {
        self.parents.join("/")
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>) {
        self.record(Severity::Error, code, message.into());
    }

    pub fn warning(&mut self, code: &'static str, message: impl Into<String>) {
        let severity = if self.config.warnings_as_errors {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.record(severity, code, message.into());
    }

    /// Whether recording has stopped because of `stop_on_first_error`
    pub fn is_halted(&self) -> bool {
        self.config.stop_on_first_error && self.error_count() > 0
    }

    fn record(&mut self, severity: Severity, code: &'static str, message: String) {
        if self.is_halted() {
            return;
        }
        let path = self.path();
        debug!(%path, code, ?severity, "{message}");
        self.issues.push(ValidationIssue {
            severity,
            code,
            path,
            message,
        });
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn into_report(self, subject: impl Into<String>) -> ValidationReport {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);
        ValidationReport {
            subject: subject.into(),
            errors,
            warnings,
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub subject: String,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate `component` with a fresh context
pub fn validate<V: Validate + ?Sized>(
    component: &V,
    config: &ValidationConfig,
) -> ValidationContext {

    let mut cx = ValidationContext::with_config(config.clone());
    component.validate(&mut cx);
    cx
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Validate for Broken {
        fn validate(&self, cx: &mut ValidationContext) {
            cx.warning("W1", "first");
            cx.scoped("Child", |cx| cx.error("E1", "nested"));
            cx.error("E2", "second");
        }
    }

    #[test]
    fn test_paths_and_partition() {
        let mut cx = ValidationContext::new();
        cx.validate_child("Root", &Broken);
        assert_eq!(cx.issues()[1].path, "Root/Child");
        assert_eq!(cx.error_count(), 2);

        let report = cx.into_report("doc");
        assert!(!report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.errors[0].code, "E1");
    }

    #[test]
    fn test_warnings_as_errors() {
        let config = ValidationConfig {
            warnings_as_errors: true,
            stop_on_first_error: false,
        };
        let cx = validate(&Broken, &config);
        assert_eq!(cx.error_count(), 3);
    }

    #[test]
    fn test_stop_on_first_error() {
        let config = ValidationConfig {
            warnings_as_errors: false,
            stop_on_first_error: true,
        };
        let cx = validate(&Broken, &config);
        assert_eq!(cx.issues().len(), 2);
        assert!(cx.is_halted());
    }
}
