//! Notification recipients
//!
//! A recipient is an e-mail address plus the events it wants to hear about.
//! Error notifications can be throttled either by count (notify after N
//! errors) or by time (notify at most every N minutes), never both.

use std::sync::LazyLock;

use bitflags::bitflags;
use regex::Regex;

use crate::error::{ObjectStoreError, Result};
use crate::model::require_text;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{child_flag, flag_text, parse_non_negative, XmlComponent, XmlElement};

static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap());

bitflags! {
    /// Events a recipient is notified of
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct NotifyOptions: u32 {
        const SEND_APP_START_STOP = 1 << 0;
        const SEND_SERVER_START_STOP = 1 << 1;
        const SEND_ERRORS = 1 << 2;
        const ERROR_THRESHOLD_BY_COUNT = 1 << 3;
        const ERROR_THRESHOLD_BY_TIME = 1 << 4;
    }
}

const NOTIFY_ELEMENTS: [(NotifyOptions, &str); 5] = [
    (NotifyOptions::SEND_APP_START_STOP, "sendAppStartStop"),
    (NotifyOptions::SEND_SERVER_START_STOP, "sendAppServerStartStop"),
    (NotifyOptions::SEND_ERRORS, "sendErrors"),
    (NotifyOptions::ERROR_THRESHOLD_BY_COUNT, "errorThresholdByCount"),
    (NotifyOptions::ERROR_THRESHOLD_BY_TIME, "errorThresholdByTime"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recipient {
    name: String,
    options: NotifyOptions,
    error_threshold_count: u32,
    error_threshold_minutes: u32,
}

impl Recipient {
    pub const MAX_NAME_LENGTH: usize = 255;

    /// A recipient of error notifications only
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        check_address(&address)?;
        Ok(Self {
            name: address,
            options: NotifyOptions::SEND_ERRORS,
            error_threshold_count: 0,
            error_threshold_minutes: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        check_address(&address)?;
        self.name = address;
        Ok(())
    }

    pub fn options(&self) -> NotifyOptions {
        self.options
    }

    pub fn is_enabled(&self, option: NotifyOptions) -> bool {
        self.options.contains(option)
    }

    pub fn set_enabled(&mut self, option: NotifyOptions, enabled: bool) {
        self.options.set(option, enabled);
    }

    pub fn error_threshold_count(&self) -> u32 {
        self.error_threshold_count
    }

    /// Notify once every `count` errors
    pub fn set_error_threshold_count(&mut self, count: u32) {
        self.error_threshold_count = count;
    }

    pub fn error_threshold_minutes(&self) -> u32 {
        self.error_threshold_minutes
    }

    /// Notify at most once every `minutes`
    pub fn set_error_threshold_minutes(&mut self, minutes: u32) {
        self.error_threshold_minutes = minutes;
    }

    /// Throttle error notifications by count, clearing any time threshold
    pub fn throttle_by_count(&mut self, count: u32) {
        self.options.remove(NotifyOptions::ERROR_THRESHOLD_BY_TIME);
        self.options.insert(NotifyOptions::ERROR_THRESHOLD_BY_COUNT);
        self.error_threshold_count = count;
    }

    /// Throttle error notifications by time, clearing any count threshold
    pub fn throttle_by_time(&mut self, minutes: u32) {
        self.options.remove(NotifyOptions::ERROR_THRESHOLD_BY_COUNT);
        self.options.insert(NotifyOptions::ERROR_THRESHOLD_BY_TIME);
        self.error_threshold_minutes = minutes;
    }
}

fn check_address(address: &str) -> Result<()> {
    require_text("recipient", address, Recipient::MAX_NAME_LENGTH)?;
    if !ADDRESS.is_match(address) {
        return Err(ObjectStoreError::invalid(
            "recipient",
            address,
            "not an e-mail address",
        ));
    }
    Ok(())
}

impl XmlComponent for Recipient {
    const NODE_NAME: &'static str = "PSXRecipient";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_child(XmlElement::text_node("name", self.name.as_str()));
        for (flag, element) in NOTIFY_ELEMENTS {
            node.push(XmlElement::text_node(element, flag_text(self.is_enabled(flag))));
        }
        node.push(XmlElement::text_node(
            "errorThresholdCount",
            self.error_threshold_count.to_string(),
        ));
        node.push(XmlElement::text_node(
            "errorThresholdInterval",
            self.error_threshold_minutes.to_string(),
        ));
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut recipient = Self::new(node.required_child_text("name")?)?;

        let mut options = NotifyOptions::empty();
        for (flag, element) in NOTIFY_ELEMENTS {
            options.set(flag, child_flag(node, element)?);
        }
        recipient.options = options;

        if let Some(count) = node.child_text("errorThresholdCount") {
            recipient.error_threshold_count = parse_non_negative("errorThresholdCount", count)?;
        }
        if let Some(minutes) = node.child_text("errorThresholdInterval") {
            recipient.error_threshold_minutes =
                parse_non_negative("errorThresholdInterval", minutes)?;

        }
        Ok(recipient)
    }
}

impl Validate for Recipient {
    fn validate(&self, cx: &mut ValidationContext) {
        if let Err(e) = check_address(&self.name) {
            cx.error("INVALID_RECIPIENT", e.to_string());
        }

        let by_count = self.is_enabled(NotifyOptions::ERROR_THRESHOLD_BY_COUNT);
        let by_time = self.is_enabled(NotifyOptions::ERROR_THRESHOLD_BY_TIME);
        if by_count && by_time {
            cx.error(
                "CONFLICTING_THRESHOLDS",
                "error threshold can be by count or by time, not both",
            );
        }
        if by_count && self.error_threshold_count == 0 {
            cx.error("INVALID_THRESHOLD", "error threshold count must be at least 1");
        }
        if by_time && self.error_threshold_minutes == 0 {
            cx.error("INVALID_THRESHOLD", "error threshold interval must be at least 1 minute");
        }
        if (by_count || by_time) && !self.is_enabled(NotifyOptions::SEND_ERRORS) {
            cx.warning(
                "UNUSED_THRESHOLD",
                format!("{} has an error threshold but does not receive errors", self.name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(Recipient::new("ops@example.com").is_ok());
        assert!(Recipient::new("").is_err());
        assert!(Recipient::new("not an address").is_err());
        assert!(Recipient::new(format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_throttle_modes_are_exclusive() {
        let mut r = Recipient::new("ops@example.com").unwrap();
        r.throttle_by_count(5);
        r.throttle_by_time(10);
        assert!(r.is_enabled(NotifyOptions::ERROR_THRESHOLD_BY_TIME));
        assert!(!r.is_enabled(NotifyOptions::ERROR_THRESHOLD_BY_COUNT));
        assert_eq!(r.error_threshold_count(), 5);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut r = Recipient::new("ops@example.com").unwrap();
        r.set_enabled(NotifyOptions::SEND_APP_START_STOP, true);
        r.set_enabled(NotifyOptions::SEND_APP_START_STOP, true);
        assert_eq!(
            r.options(),
            NotifyOptions::SEND_ERRORS | NotifyOptions::SEND_APP_START_STOP
        );
        r.set_enabled(NotifyOptions::SEND_ERRORS, false);
        assert_eq!(r.options(), NotifyOptions::SEND_APP_START_STOP);
    }

    #[test]
    fn test_xml_round_trip() {
        let mut r = Recipient::new("ops@example.com").unwrap();
        r.set_enabled(NotifyOptions::SEND_SERVER_START_STOP, true);
        r.throttle_by_count(25);
        let parsed = Recipient::from_xml_str(&r.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let xml = r#"<PSXRecipient>
            <name>ops@example.com</name>
            <sendErrors>yes</sendErrors>
            <errorThresholdByCount>yes</errorThresholdByCount>
            <errorThresholdCount>-3</errorThresholdCount>
        </PSXRecipient>"#;
        let err = Recipient::from_xml_str(xml).unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
    }

    #[test]
    fn test_validation_rules() {
        let mut r = Recipient::new("ops@example.com").unwrap();
        r.set_enabled(NotifyOptions::ERROR_THRESHOLD_BY_COUNT, true);
        r.set_enabled(NotifyOptions::ERROR_THRESHOLD_BY_TIME, true);
        r.set_enabled(NotifyOptions::SEND_ERRORS, false);

        let mut cx = ValidationContext::new();
        r.validate(&mut cx);
        assert!(cx.has_code("CONFLICTING_THRESHOLDS"));
        assert!(cx.has_code("INVALID_THRESHOLD"));
        assert!(cx.has_code("UNUSED_THRESHOLD"));

        let mut ok = Recipient::new("ops@example.com").unwrap();
        ok.throttle_by_time(15);
        let mut cx = ValidationContext::new();
        ok.validate(&mut cx);
        assert!(cx.issues().is_empty());
    }
}
