//! Application logging settings
//!
//! Each log category is persisted as its own yes/no element:
//!
//! ```xml
//! <PSXLogger>
//!   <logErrors>yes</logErrors>
//!   <logServerStartStop>no</logServerStartStop>
//!   ...
//! </PSXLogger>
//! ```

use bitflags::bitflags;

use crate::error::Result;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{child_flag, flag_text, XmlComponent, XmlElement};

bitflags! {
    /// Enabled log categories
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct LogOptions: u32 {
        const ERRORS = 1 << 0;
        const SERVER_START_STOP = 1 << 1;
        const APP_START_STOP = 1 << 2;
        const APP_STATISTICS = 1 << 3;
        const EXECUTION_PLAN = 1 << 4;
        const BASIC_USER_ACTIVITY = 1 << 5;
        const DETAILED_USER_ACTIVITY = 1 << 6;
        const FULL_USER_ACTIVITY = 1 << 7;
        const MULTIPLE_HANDLERS = 1 << 8;
    }
}

/// Element name of each category, in document order
const LOG_ELEMENTS: [(LogOptions, &str); 9] = [
    (LogOptions::ERRORS, "logErrors"),
    (LogOptions::SERVER_START_STOP, "logServerStartStop"),
    (LogOptions::APP_START_STOP, "logAppStartStop"),
    (LogOptions::APP_STATISTICS, "logAppStatistics"),
    (LogOptions::EXECUTION_PLAN, "logExecutionPlan"),
    (LogOptions::BASIC_USER_ACTIVITY, "logBasicUserActivity"),
    (LogOptions::DETAILED_USER_ACTIVITY, "logDetailedUserActivity"),
    (LogOptions::FULL_USER_ACTIVITY, "logFullUserActivity"),
    (LogOptions::MULTIPLE_HANDLERS, "logMultipleHandlers"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Logger {
    options: LogOptions,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            options: LogOptions::ERRORS,
        }
    }
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LogOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> LogOptions {
        self.options
    }

    pub fn is_enabled(&self, option: LogOptions) -> bool {
        self.options.contains(option)
    }

    /// Turn the given categories on or off, leaving all others alone
    pub fn set_enabled(&mut self, option: LogOptions, enabled: bool) {
        self.options.set(option, enabled);
    }

    pub fn enable(&mut self, option: LogOptions) {
        self.set_enabled(option, true);
    }

    pub fn disable(&mut self, option: LogOptions) {
        self.set_enabled(option, false);
    }

    pub fn is_errors_enabled(&self) -> bool {
        self.is_enabled(LogOptions::ERRORS)
    }

    pub fn is_user_activity_enabled(&self) -> bool {
        self.options.intersects(
            LogOptions::BASIC_USER_ACTIVITY
                | LogOptions::DETAILED_USER_ACTIVITY
                | LogOptions::FULL_USER_ACTIVITY,
        )
    }
}

impl XmlComponent for Logger {
    const NODE_NAME: &'static str = "PSXLogger";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME);
        for (flag, element) in LOG_ELEMENTS {
            node.push(XmlElement::text_node(element, flag_text(self.is_enabled(flag))));
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        let mut options = LogOptions::empty();
        for (flag, element) in LOG_ELEMENTS {
            options.set(flag, child_flag(node, element)?);
        }
        Ok(Self { options })
    }
}

impl Validate for Logger {
    fn validate(&self, cx: &mut ValidationContext) {
        if self.is_enabled(LogOptions::FULL_USER_ACTIVITY)
            || self.is_enabled(LogOptions::DETAILED_USER_ACTIVITY)
        {
            cx.warning(
                "VERBOSE_LOGGING",
                "detailed or full user activity logging slows request processing",
            );
        }
        if self.is_enabled(LogOptions::EXECUTION_PLAN) {
            cx.warning(
                "VERBOSE_LOGGING",
                "execution plan logging writes an entry for every request",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logs_errors_only() {
        let logger = Logger::default();
        assert!(logger.is_errors_enabled());
        assert_eq!(logger.options(), LogOptions::ERRORS);
    }

    #[test]
    fn test_flags_are_independent_and_idempotent() {
        for (flag, _) in LOG_ELEMENTS {
            let mut logger = Logger::with_options(LogOptions::empty());
            logger.enable(flag);
            logger.enable(flag);
            assert_eq!(logger.options(), flag);

            let mut logger = Logger::with_options(LogOptions::all());
            logger.disable(flag);
            logger.disable(flag);
            assert_eq!(logger.options(), LogOptions::all() - flag);
        }
    }

    #[test]
    fn test_xml_round_trip() {
        let logger = Logger::with_options(
            LogOptions::ERRORS | LogOptions::APP_STATISTICS | LogOptions::MULTIPLE_HANDLERS,
        );
        let xml = logger.to_xml_string().unwrap();
        assert!(xml.contains("<logAppStatistics>yes</logAppStatistics>"));
        assert!(xml.contains("<logExecutionPlan>no</logExecutionPlan>"));
        assert_eq!(Logger::from_xml_str(&xml).unwrap(), logger);
    }

    #[test]
    fn test_missing_elements_are_off() {
        let xml = "<PSXLogger><logAppStartStop>yes</logAppStartStop></PSXLogger>";
        let logger = Logger::from_xml_str(xml).unwrap();
        assert_eq!(logger.options(), LogOptions::APP_START_STOP);
    }

    #[test]
    fn test_bad_flag_value() {
        let xml = "<PSXLogger><logErrors>sometimes</logErrors></PSXLogger>";
        assert!(Logger::from_xml_str(xml).is_err());

    }

    #[test]
    fn test_verbose_logging_warns() {
        let mut cx = ValidationContext::new();
        Logger::with_options(LogOptions::FULL_USER_ACTIVITY).validate(&mut cx);
        assert!(cx.has_code("VERBOSE_LOGGING"));
        assert!(!cx.has_errors());
    }
}
