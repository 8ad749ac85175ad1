//! Applications
//!
//! An application is the unit of deployment on the server. It owns the
//! request root every data set hangs off, the ACL guarding it, runtime
//! limits, and the logging/trace/notification settings used while it runs.
//!
//! ```
//! use rx_objectstore::model::{Application, DataSet, Requestor};
//!
//! let mut app = Application::new("Articles", "articles").unwrap();
//! let data_set = DataSet::new("list").unwrap().with_requestor(Requestor::new("list").unwrap());
//! app.add_data_set(data_set).unwrap();
//! assert!(app.find_duplicate_request_pages().is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{ObjectStoreError, Result};
use crate::model::acl::{AccessLevel, Acl, AclEntry, EntryType};
use crate::model::data_set::DataSet;
use crate::model::logger::Logger;
use crate::model::notifier::Notifier;
use crate::model::require_text;
use crate::model::revision::RevisionHistory;
use crate::model::trace_info::TraceInfo;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{
    attr_flag, flag_text, parse_flag, parse_non_negative, parse_number, properties_from_xml,
    properties_to_xml, XmlComponent, XmlElement,
};

static REQUEST_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.~/-]+$").unwrap());

/// Children of `<PSXApplication>` this module understands
const KNOWN_CHILDREN: &[&str] = &[
    "name",
    "description",
    "requestRoot",
    "defaultRequestPage",
    "PSXAcl",
    "PSXApplicationEncryption",
    "minThreads",
    "maxThreads",
    "maxRequestTime",
    "maxRequestsInQueue",
    "userSessionEnabled",
    "userSessionTimeout",
    "PSXLogger",
    "PSXTraceInfo",
    "PSXErrorWebPages",
    "PSXNotifier",
    "Roles",
    "PSXDataSet",
    "UserProperties",
    "PSXRevisionHistory",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ApplicationType {
    #[default]
    Normal,
    System,
}

impl ApplicationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationType {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "system" => Ok(Self::System),
            _ => Err(ObjectStoreError::invalid("appType", s, "expected normal or system")),
        }
    }
}

// =============================================================================
// Encryption
// =============================================================================

/// Transport security requirements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Encryption {
    pub require_ssl: bool,
    key_strength: u32,
}

impl Encryption {
    pub const KEY_STRENGTHS: [u32; 3] = [0, 40, 128];

    pub fn new(require_ssl: bool, key_strength: u32) -> Result<Self> {
        check_key_strength(key_strength)?;
        Ok(Self {
            require_ssl,
            key_strength,
        })
    }

    pub fn key_strength(&self) -> u32 {
        self.key_strength
    }

    pub fn set_key_strength(&mut self, key_strength: u32) -> Result<()> {
        check_key_strength(key_strength)?;
        self.key_strength = key_strength;
        Ok(())
    }
}

fn check_key_strength(key_strength: u32) -> Result<()> {
    if Encryption::KEY_STRENGTHS.contains(&key_strength) {
        Ok(())
    } else {
        Err(ObjectStoreError::invalid("keyStrength", key_strength, "expected 0, 40 or 128"))
    }
}

impl XmlComponent for Encryption {
    const NODE_NAME: &'static str = "PSXApplicationEncryption";

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attr("requireSSL", flag_text(self.require_ssl))
            .with_attr("keyStrength", self.key_strength.to_string())
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let key_strength = match node.attr("keyStrength") {
            Some(value) => parse_non_negative("keyStrength", value)?,
            None => 0,
        };
        Self::new(attr_flag(node, "requireSSL", false)?, key_strength)
    }
}

impl Validate for Encryption {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_key_strength(self.key_strength) {
            cx.error("INVALID_KEY_STRENGTH", e.to_string());
        }
        if self.key_strength > 0 && !self.require_ssl {
            cx.error(
                "SSL_REQUIRED",
                format!("a {}-bit key strength requires SSL", self.key_strength),
            );
        }
    }
}

// =============================================================================
// Error pages
// =============================================================================

/// Custom pages returned for server errors, keyed by error code
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ErrorWebPages {
    /// Return HTML rather than XML for unmapped errors
    pub return_html: bool,
    custom_errors: BTreeMap<String, String>,
}

impl ErrorWebPages {
    pub fn custom_errors(&self) -> &BTreeMap<String, String> {
        &self.custom_errors
    }

    pub fn set_custom_error(
        &mut self,
        code: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<()> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(ObjectStoreError::invalid("errorCode", &code, "must not be empty"));
        }
        self.custom_errors.insert(code, url.into());
        Ok(())
    }

    pub fn remove_custom_error(&mut self, code: &str) -> Option<String> {
        self.custom_errors.remove(code)
    }

    pub fn page_for(&self, code: &str) -> Option<&str> {
        self.custom_errors.get(code).map(String::as_str)
    }
}

impl XmlComponent for ErrorWebPages {
    const NODE_NAME: &'static str = "PSXErrorWebPages";

    fn to_xml(&self) -> XmlElement {
        let mut node =
            XmlElement::new(Self::NODE_NAME).with_attr("returnHtml", flag_text(self.return_html));
        for (code, url) in &self.custom_errors {
            node.push(
                XmlElement::new("PSXCustomError")
                    .with_attr("errorCode", code.as_str())
                    .with_attr("url", url.as_str()),
            );
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut pages = Self {
            return_html: attr_flag(node, "returnHtml", false)?,
            ..Default::default()
        };
        for error in node.children_named("PSXCustomError") {
            let code = error.required_attr("errorCode")?;
            if pages.custom_errors.contains_key(code) {
                return Err(ObjectStoreError::Duplicate {
                    kind: "custom error",
                    name: code.to_string(),
                });
            }
            pages.set_custom_error(code, error.required_attr("url")?)?;
        }
        Ok(pages)
    }
}

impl Validate for ErrorWebPages {
    fn validate(&self, cx: &mut ValidationContext) {
        for (code, url) in &self.custom_errors {
            if url.trim().is_empty() {
                cx.error("MISSING_ERROR_URL", format!("custom error '{}' has no URL", code));
            }
        }
    }
}

// =============================================================================
// Application
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Application {
    id: u32,
    name: String,
    pub description: String,
    request_root: String,
    pub default_request_page: String,
    pub enabled: bool,
    pub active: bool,
    pub hidden: bool,
    pub app_type: ApplicationType,
    pub acl: Acl,
    pub encryption: Encryption,
    min_threads: u32,
    max_threads: u32,
    /// Seconds
    pub max_request_time: u32,
    pub max_requests_in_queue: u32,
    pub user_session_enabled: bool,
    /// Seconds
    pub session_timeout: u32,
    pub logger: Logger,
    pub trace_info: TraceInfo,
    pub error_pages: ErrorWebPages,
    pub notifier: Option<Notifier>,
    roles: Vec<String>,
    data_sets: Vec<DataSet>,
    user_properties: BTreeMap<String, String>,
    revision_history: RevisionHistory,
}

impl Application {
    pub const MAX_NAME_LENGTH: usize = 50;
    pub const MAX_REQUEST_ROOT_LENGTH: usize = 255;

    /// A new, disabled application whose ACL grants full access to `Admin`
    pub fn new(name: impl Into<String>, request_root: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let request_root = request_root.into();
        check_name(&name)?;
        check_request_root(&request_root)?;

        let mut acl = Acl::new();
        acl.add_entry(AclEntry::new("Admin", EntryType::Role, AccessLevel::all())?)?;
        acl.add_entry(AclEntry::new("Default", EntryType::User, AccessLevel::DATA_QUERY)?)?;

        Ok(Self {
            id: 0,
            name,
            description: String::new(),
            request_root,
            default_request_page: String::new(),
            enabled: false,
            active: false,
            hidden: false,
            app_type: ApplicationType::Normal,
            acl,
            encryption: Encryption::default(),
            min_threads: 1,
            max_threads: 10,
            max_request_time: 60,
            max_requests_in_queue: 500,
            user_session_enabled: true,
            session_timeout: 1800,
            logger: Logger::default(),
            trace_info: TraceInfo::default(),
            error_pages: ErrorWebPages::default(),
            notifier: None,
            roles: Vec::new(),
            data_sets: Vec::new(),
            user_properties: BTreeMap::new(),
            revision_history: RevisionHistory::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        check_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn request_root(&self) -> &str {
        &self.request_root
    }

    pub fn set_request_root(&mut self, root: impl Into<String>) -> Result<()> {
        let root = root.into();
        check_request_root(&root)?;
        self.request_root = root;
        Ok(())
    }

    pub fn min_threads(&self) -> u32 {
        self.min_threads
    }

    pub fn set_min_threads(&mut self, threads: u32) {
        self.min_threads = threads;
    }

    pub fn max_threads(&self) -> u32 {
        self.max_threads
    }

    pub fn set_max_threads(&mut self, threads: u32) -> Result<()> {
        if threads == 0 {
            return Err(ObjectStoreError::invalid("maxThreads", threads, "must be at least 1"));
        }
        self.max_threads = threads;
        Ok(())
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn add_role(&mut self, role: impl Into<String>) -> Result<()> {
        let role = role.into();
        if role.trim().is_empty() {
            return Err(ObjectStoreError::invalid("role", &role, "must not be empty"));
        }
        if self.roles.iter().any(|r| r.eq_ignore_ascii_case(&role)) {
            return Err(ObjectStoreError::Duplicate { kind: "role", name: role });
        }
        self.roles.push(role);
        Ok(())
    }

    pub fn data_sets(&self) -> &[DataSet] {
        &self.data_sets
    }

    pub fn data_set(&self, name: &str) -> Option<&DataSet> {
        self.data_sets.iter().find(|d| d.name().eq_ignore_ascii_case(name))
    }

    pub fn data_set_mut(&mut self, name: &str) -> Option<&mut DataSet> {
        self.data_sets.iter_mut().find(|d| d.name().eq_ignore_ascii_case(name))
    }

    /// Add a data set; names are unique within an application
    pub fn add_data_set(&mut self, data_set: DataSet) -> Result<()> {
        if self.data_set(data_set.name()).is_some() {
            return Err(ObjectStoreError::Duplicate {
                kind: "data set",
                name: data_set.name().to_string(),
            });
        }
        self.data_sets.push(data_set);
        Ok(())
    }

    pub fn remove_data_set(&mut self, name: &str) -> Result<DataSet> {
        let index = self
            .data_sets
            .iter()
            .position(|d| d.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ObjectStoreError::NotFound {
                kind: "data set",
                name: name.to_string(),
            })?;
        Ok(self.data_sets.remove(index))
    }

    /// Index pairs of data sets that would answer the same request
    pub fn find_duplicate_request_pages(&self) -> Vec<(usize, usize)> {
        let mut duplicates = Vec::new();
        for (i, first) in self.data_sets.iter().enumerate() {
            for (j, second) in self.data_sets.iter().enumerate().skip(i + 1) {
                if first.conflicts_with(second) {
                    duplicates.push((i, j));
                }
            }
        }
        debug!(application = %self.name, count = duplicates.len(), "checked request pages");
        duplicates
    }

    pub fn user_properties(&self) -> &BTreeMap<String, String> {
        &self.user_properties
    }

    pub fn user_property(&self, name: &str) -> Option<&str> {
        self.user_properties.get(name).map(String::as_str)
    }

    pub fn set_user_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {

        let name = name.into();
        if name.trim().is_empty() {
            return Err(ObjectStoreError::invalid("user property", &name, "must not be empty"));
        }
        self.user_properties.insert(name, value.into());
        Ok(())
    }

    pub fn remove_user_property(&mut self, name: &str) -> Option<String> {
        self.user_properties.remove(name)
    }

    pub fn revision_history(&self) -> &RevisionHistory {
        &self.revision_history
    }

    pub fn revision_history_mut(&mut self) -> &mut RevisionHistory {
        &mut self.revision_history
    }
}

fn check_name(name: &str) -> Result<()> {
    require_text("application name", name, Application::MAX_NAME_LENGTH)
}

fn check_request_root(root: &str) -> Result<()> {
    require_text("request root", root, Application::MAX_REQUEST_ROOT_LENGTH)?;
    if !REQUEST_ROOT.is_match(root) {
        return Err(ObjectStoreError::invalid(
            "request root",
            root,
            "may only contain letters, digits and '_ . ~ / -'",
        ));
    }
    Ok(())
}

impl XmlComponent for Application {
    const NODE_NAME: &'static str = "PSXApplication";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_attr("id", self.id.to_string())
            .with_attr("active", flag_text(self.active))
            .with_attr("enabled", flag_text(self.enabled))
            .with_attr("hidden", flag_text(self.hidden))
            .with_attr("appType", self.app_type.as_str())
            .with_child(XmlElement::text_node("name", self.name.as_str()))
            .with_child(XmlElement::text_node("description", self.description.as_str()))
            .with_child(XmlElement::text_node("requestRoot", self.request_root.as_str()))
            .with_child(XmlElement::text_node(
                "defaultRequestPage",
                self.default_request_page.as_str(),
            ))
            .with_child(self.acl.to_xml())
            .with_child(self.encryption.to_xml())
            .with_child(XmlElement::text_node("minThreads", self.min_threads.to_string()))
            .with_child(XmlElement::text_node("maxThreads", self.max_threads.to_string()))
            .with_child(XmlElement::text_node("maxRequestTime", self.max_request_time.to_string()))
            .with_child(XmlElement::text_node(
                "maxRequestsInQueue",
                self.max_requests_in_queue.to_string(),
            ))
            .with_child(XmlElement::text_node(
                "userSessionEnabled",
                flag_text(self.user_session_enabled),
            ))
            .with_child(XmlElement::text_node(
                "userSessionTimeout",
                self.session_timeout.to_string(),
            ))
            .with_child(self.logger.to_xml())
            .with_child(self.trace_info.to_xml())
            .with_child(self.error_pages.to_xml());

        if let Some(notifier) = &self.notifier {
            node.push(notifier.to_xml());
        }
        let mut roles = XmlElement::new("Roles");
        for role in &self.roles {
            roles.push(XmlElement::text_node("Role", role.as_str()));
        }
        node.push(roles);
        for data_set in &self.data_sets {
            node.push(data_set.to_xml());
        }
        node.push(properties_to_xml("UserProperties", "Property", &self.user_properties));
        node.push(self.revision_history.to_xml());
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        for child in &node.children {
            if !KNOWN_CHILDREN.contains(&child.name.as_str()) {
                warn!(element = %child.name, "ignoring unknown element in <PSXApplication>");
            }
        }

        let mut app = Self::new(
            node.required_child_text("name")?,
            node.required_child_text("requestRoot")?,
        )?;
        if let Some(id) = node.attr("id") {
            app.id = parse_number("id", id)?;
        }
        app.active = attr_flag(node, "active", false)?;
        app.enabled = attr_flag(node, "enabled", false)?;
        app.hidden = attr_flag(node, "hidden", false)?;
        if let Some(app_type) = node.attr("appType") {
            app.app_type = app_type.parse()?;
        }
        app.description = node.child_text("description").unwrap_or_default().to_string();
        app.default_request_page = node
            .child_text("defaultRequestPage")
            .unwrap_or_default()
            .to_string();

        app.acl = Acl::from_xml(node.required_child(Acl::NODE_NAME)?)?;
        if let Some(encryption) = node.child(Encryption::NODE_NAME) {
            app.encryption = Encryption::from_xml(encryption)?;
        }

        if let Some(value) = node.child_text("minThreads") {
            app.min_threads = parse_non_negative("minThreads", value)?;
        }
        if let Some(value) = node.child_text("maxThreads") {
            app.set_max_threads(parse_non_negative("maxThreads", value)?)?;
        }
        if let Some(value) = node.child_text("maxRequestTime") {
            app.max_request_time = parse_non_negative("maxRequestTime", value)?;
        }
        if let Some(value) = node.child_text("maxRequestsInQueue") {
            app.max_requests_in_queue = parse_non_negative("maxRequestsInQueue", value)?;
        }
        if let Some(value) = node.child_text("userSessionEnabled") {
            app.user_session_enabled = parse_flag("userSessionEnabled", value)?;
        }
        if let Some(value) = node.child_text("userSessionTimeout") {
            app.session_timeout = parse_non_negative("userSessionTimeout", value)?;
        }

        if let Some(logger) = node.child(Logger::NODE_NAME) {
            app.logger = Logger::from_xml(logger)?;
        }
        if let Some(trace) = node.child(TraceInfo::NODE_NAME) {
            app.trace_info = TraceInfo::from_xml(trace)?;
        }
        if let Some(pages) = node.child(ErrorWebPages::NODE_NAME) {
            app.error_pages = ErrorWebPages::from_xml(pages)?;
        }
        app.notifier = node
            .child(Notifier::NODE_NAME)
            .map(Notifier::from_xml)
            .transpose()?;

        if let Some(roles) = node.child("Roles") {
            for role in roles.children_named("Role") {
                app.add_role(role.text.as_str())?;
            }
        }
        for data_set in node.children_named(DataSet::NODE_NAME) {
            app.add_data_set(DataSet::from_xml(data_set)?)?;
        }
        if let Some(properties) = node.child("UserProperties") {
            app.user_properties = properties_from_xml(properties, "Property")?;
        }
        if let Some(history) = node.child(RevisionHistory::NODE_NAME) {
            app.revision_history = RevisionHistory::from_xml(history)?;
        }

        debug!(application = %app.name, data_sets = app.data_sets.len(), "loaded application");
        Ok(app)
    }
}

impl Validate for Application {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_name(&self.name) {
            cx.error("INVALID_NAME", e.to_string());
        }
        if let Err(e) = check_request_root(&self.request_root) {
            cx.error("INVALID_REQUEST_ROOT", e.to_string());
        }
        if self.max_threads == 0 {
            cx.error("INVALID_THREADS", "maximum threads must be at least 1");
        }
        if self.min_threads > self.max_threads {
            cx.error(
                "THREAD_RANGE",
                format!(
                    "minimum threads ({}) exceeds maximum threads ({})",
                    self.min_threads, self.max_threads
                ),
            );
        }
        if self.user_session_enabled && self.session_timeout == 0 {
            cx.error("SESSION_TIMEOUT", "sessions are enabled with a zero timeout");
        }
        if !self.default_request_page.is_empty()
            && !self.data_sets.iter().any(|d| {
                d.requestor
                    .as_ref()
                    .is_some_and(|r| r.matches_page(&self.default_request_page))
            })
        {
            cx.warning(
                "UNKNOWN_DEFAULT_PAGE",
                format!("no data set serves default page '{}'", self.default_request_page),
            );
        }

        cx.validate_child(Acl::NODE_NAME, &self.acl);
        cx.validate_child(Encryption::NODE_NAME, &self.encryption);
        cx.validate_child(Logger::NODE_NAME, &self.logger);
        cx.validate_child(TraceInfo::NODE_NAME, &self.trace_info);
        cx.validate_child(ErrorWebPages::NODE_NAME, &self.error_pages);
        if let Some(notifier) = &self.notifier {
            cx.validate_child(Notifier::NODE_NAME, notifier);
        }
        for (i, data_set) in self.data_sets.iter().enumerate() {
            cx.validate_child(format!("PSXDataSet[{}]", i), data_set);
        }
        cx.validate_child(RevisionHistory::NODE_NAME, &self.revision_history);

        for (i, j) in self.find_duplicate_request_pages() {
            let page = self.data_sets[i]
                .requestor
                .as_ref()
                .map(|r| r.request_page())
                .unwrap_or_default();
            cx.error(
                "DUPLICATE_REQUEST_PAGE",
                format!(
                    "data sets '{}' and '{}' both answer request page '{}'",
                    self.data_sets[i].name(),
                    self.data_sets[j].name(),
                    page
                ),
            );
        }
    }
}
