//! Request tracing settings
//!
//! Trace categories are persisted as a single hex mask in
//! `traceOptionsFlag`. Components that cache trace decisions register a
//! [`TraceListener`] and are told whenever the effective settings change.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;
use tracing::debug;

use crate::error::{ObjectStoreError, Result};
use crate::validation::{Validate, ValidationContext};
use crate::xml::{attr_flag, flag_text, parse_number, XmlComponent, XmlElement};

bitflags! {
    /// Diagnostic trace categories
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct TraceFlags: u32 {
        const BASIC_REQUEST_INFO = 0x0000_0001;
        const INITIAL_HTTP_HEADERS = 0x0000_0002;
        const INITIAL_COOKIES = 0x0000_0004;
        const INITIAL_HTML_PARAMS = 0x0000_0008;
        const RESOURCE_HANDLER = 0x0000_0010;
        const APP_HANDLER_PROC = 0x0000_0020;
        const APP_SECURITY = 0x0000_0040;
        const POST_PREPROC_HTML_PARAMS = 0x0000_0080;
        const CONDITIONAL_EVAL = 0x0000_0100;
        const MAPPER = 0x0000_0200;
        const SESSION = 0x0000_0400;
        const FILE_INFO = 0x0000_0800;
        const EXIT_PROC = 0x0000_1000;
        const EXIT_EXEC = 0x0000_2000;
        const POST_EXIT_XML = 0x0000_4000;
        const POST_EXIT_CGI = 0x0000_8000;
        const OUTPUT_CONV = 0x0001_0000;
        const RESULT_SET = 0x0002_0000;
    }
}

/// What changed in a [`TraceInfo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceChange {
    pub enabled: bool,
    pub previous: TraceFlags,
    pub current: TraceFlags,
}

/// Notified after every effective change to a [`TraceInfo`]
pub trait TraceListener: Send + Sync {
    fn trace_changed(&self, change: &TraceChange);
}

#[derive(Clone)]
pub struct TraceInfo {
    enabled: bool,
    flags: TraceFlags,
    column_width: u32,
    timestamp_only: bool,
    listeners: Vec<Arc<dyn TraceListener>>,
}

impl TraceInfo {
    pub const MIN_COLUMN_WIDTH: u32 = 40;
    pub const MAX_COLUMN_WIDTH: u32 = 250;
    pub const DEFAULT_COLUMN_WIDTH: u32 = 80;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn TraceListener>) {
        self.listeners.push(listener);
    }

    /// Remove a listener previously added (compared by identity)
    pub fn remove_listener(&mut self, listener: &Arc<dyn TraceListener>) {
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        let previous = self.flags;
        if self.enabled != enabled {
            self.enabled = enabled;
            self.notify(previous);
        }
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    pub fn is_flag_set(&self, flag: TraceFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Turn categories on or off, leaving all others alone
    pub fn set_flag(&mut self, flag: TraceFlags, on: bool) {
        let previous = self.flags;
        self.flags.set(flag, on);
        if self.flags != previous {
            self.notify(previous);
        }
    }

    pub fn set_flags(&mut self, flags: TraceFlags) {
        let previous = self.flags;
        self.flags = flags;
        if self.flags != previous {
            self.notify(previous);
        }
    }

    /// Whether `flag` is traced right now (tracing on and category set)
    pub fn is_tracing(&self, flag: TraceFlags) -> bool {
        self.enabled && self.flags.contains(flag)
    }

    pub fn column_width(&self) -> u32 {
        self.column_width
    }

    pub fn set_column_width(&mut self, width: u32) -> Result<()> {
        check_column_width(width)?;
        self.column_width = width;
        Ok(())
    }

    pub fn is_timestamp_only(&self) -> bool {
        self.timestamp_only
    }

    pub fn set_timestamp_only(&mut self, timestamp_only: bool) {
        self.timestamp_only = timestamp_only;
    }

    fn notify(&self, previous: TraceFlags) {
        let change = TraceChange {
            enabled: self.enabled,
            previous,
            current: self.flags,
        };
        debug!(listeners = self.listeners.len(), ?change, "trace settings changed");
        for listener in &self.listeners {
            listener.trace_changed(&change);
        }
    }
}

fn check_column_width(width: u32) -> Result<()> {
    if (TraceInfo::MIN_COLUMN_WIDTH..=TraceInfo::MAX_COLUMN_WIDTH).contains(&width) {
        Ok(())
    } else {
        Err(ObjectStoreError::invalid(
            "traceOutputColumnWidth",
            width,
            format!(
                "must be between {} and {}",
                TraceInfo::MIN_COLUMN_WIDTH,
                TraceInfo::MAX_COLUMN_WIDTH
            ),
        ))
    }
}

impl Default for TraceInfo {
    fn default() -> Self {
        Self {
            enabled: false,
            flags: TraceFlags::BASIC_REQUEST_INFO,
            column_width: Self::DEFAULT_COLUMN_WIDTH,
            timestamp_only: false,
            listeners: Vec::new(),
        }
    }
}

impl fmt::Debug for TraceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceInfo")
            .field("enabled", &self.enabled)
            .field("flags", &self.flags)
            .field("column_width", &self.column_width)
            .field("timestamp_only", &self.timestamp_only)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// Listeners are runtime wiring, not part of the value.
impl PartialEq for TraceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.flags == other.flags
            && self.column_width == other.column_width
            && self.timestamp_only == other.timestamp_only
    }
}

impl Eq for TraceInfo {}

impl Hash for TraceInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.enabled.hash(state);
        self.flags.hash(state);
        self.column_width.hash(state);
        self.timestamp_only.hash(state);
    }
}

impl XmlComponent for TraceInfo {
    const NODE_NAME: &'static str = "PSXTraceInfo";

    fn to_xml(&self) -> XmlElement {
        XmlElement::new(Self::NODE_NAME)
            .with_attr("traceEnabled", flag_text(self.enabled))
            .with_attr("traceOptionsFlag", format!("0x{:x}", self.flags.bits()))
            .with_attr("traceOutputColumnWidth", self.column_width.to_string())
            .with_attr("traceTimestampOnly", flag_text(self.timestamp_only))
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut info = Self {
            enabled: attr_flag(node, "traceEnabled", false)?,
            timestamp_only: attr_flag(node, "traceTimestampOnly", false)?,
            ..Default::default()
        };
        if let Some(value) = node.attr("traceOptionsFlag") {
            info.flags = parse_trace_mask(value)?;
        }
        if let Some(value) = node.attr("traceOutputColumnWidth") {
            info.set_column_width(parse_number("traceOutputColumnWidth", value)?)?;
        }
        Ok(info)
    }
}

/// Parse a hex (`0x1f`) or decimal mask, rejecting unknown bits
fn parse_trace_mask(value: &str) -> Result<TraceFlags> {
    let trimmed = value.trim();
    let bits = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map_err(|e| ObjectStoreError::invalid("traceOptionsFlag", value, e.to_string()))?,
        None => parse_number("traceOptionsFlag", trimmed)?,
    };
    TraceFlags::from_bits(bits).ok_or_else(|| {
        ObjectStoreError::invalid("traceOptionsFlag", value, "contains unknown trace categories")
    })
}

impl Validate for TraceInfo {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_column_width(self.column_width) {
            cx.error("INVALID_COLUMN_WIDTH", e.to_string());
        }
        if self.enabled && self.flags.is_empty() {
            cx.warning("NOTHING_TRACED", "tracing is enabled but no categories are selected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<TraceChange>>,
    }

    impl TraceListener for Recorder {
        fn trace_changed(&self, change: &TraceChange) {
            self.changes.lock().unwrap().push(*change);
        }
    }

    #[test]
    fn test_listener_notified_once_per_change() {
        let recorder = Arc::new(Recorder::default());
        let mut info = TraceInfo::new();
        info.add_listener(recorder.clone());

        info.set_enabled(true);
        info.set_enabled(true);
        info.set_flag(TraceFlags::MAPPER, true);
        info.set_flag(TraceFlags::MAPPER, true);
        info.set_flag(TraceFlags::SESSION, false);

        let changes = recorder.changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes[1].enabled);
        assert_eq!(changes[1].previous, TraceFlags::BASIC_REQUEST_INFO);
        assert_eq!(
            changes[1].current,
            TraceFlags::BASIC_REQUEST_INFO | TraceFlags::MAPPER
        );
    }

    #[test]
    fn test_removed_listener_is_silent() {
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn TraceListener> = recorder.clone();
        let mut info = TraceInfo::new();
        info.add_listener(listener.clone());
        info.remove_listener(&listener);
        info.set_enabled(true);
        assert!(recorder.changes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_flags_are_independent() {
        let mut info = TraceInfo::new();
        info.set_flags(TraceFlags::empty());
        info.set_flag(TraceFlags::EXIT_EXEC, true);
        info.set_flag(TraceFlags::RESULT_SET, true);
        info.set_flag(TraceFlags::EXIT_EXEC, false);
        assert_eq!(info.flags(), TraceFlags::RESULT_SET);
        assert!(!info.is_tracing(TraceFlags::RESULT_SET));
        info.set_enabled(true);
        assert!(info.is_tracing(TraceFlags::RESULT_SET));
    }

    #[test]
    fn test_column_width_bounds() {
        let mut info = TraceInfo::new();
        assert!(info.set_column_width(39).is_err());
        assert!(info.set_column_width(40).is_ok());
        assert!(info.set_column_width(250).is_ok());
        assert!(info.set_column_width(251).is_err());
    }

    #[test]
    fn test_xml_round_trip_ignores_listeners() {
        let mut info = TraceInfo::new();
        info.add_listener(Arc::new(Recorder::default()));
        info.set_enabled(true);
        info.set_flags(TraceFlags::MAPPER | TraceFlags::OUTPUT_CONV);
        info.set_column_width(120).unwrap();

        let xml = info.to_xml_string().unwrap();
        assert!(xml.contains(r#"traceOptionsFlag="0x10200""#));
        assert_eq!(TraceInfo::from_xml_str(&xml).unwrap(), info);
    }

    #[test]
    fn test_mask_parsing() {
        assert_eq!(
            parse_trace_mask("0x3").unwrap(),
            TraceFlags::BASIC_REQUEST_INFO | TraceFlags::INITIAL_HTTP_HEADERS
        );

        assert_eq!(parse_trace_mask("8").unwrap(), TraceFlags::INITIAL_HTML_PARAMS);
        assert!(parse_trace_mask("0x80000000").is_err());
        assert!(parse_trace_mask("zz").is_err());
    }
}
