//! Application notifier: where and to whom notifications are mailed

use crate::error::{ObjectStoreError, Result};
use crate::model::recipient::Recipient;
use crate::validation::{Validate, ValidationContext};
use crate::xml::{XmlComponent, XmlElement};

/// Mail transport used by the notifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NotifierProvider {
    #[default]
    Smtp,
}

impl NotifierProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smtp => "SMTP",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Notifier {
    pub provider: NotifierProvider,
    /// Mail server host
    pub server: String,
    /// Sender address
    pub from: String,
    recipients: Vec<Recipient>,
}

impl Notifier {
    pub fn new(server: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn recipients_mut(&mut self) -> &mut Vec<Recipient> {
        &mut self.recipients
    }

    pub fn add_recipient(&mut self, recipient: Recipient) {
        self.recipients.push(recipient);
    }
}

impl XmlComponent for Notifier {
    const NODE_NAME: &'static str = "PSXNotifier";

    fn to_xml(&self) -> XmlElement {
        let mut node = XmlElement::new(Self::NODE_NAME)
            .with_child(XmlElement::text_node("providerType", self.provider.as_str()))
            .with_child(XmlElement::text_node("server", self.server.as_str()))
            .with_child(XmlElement::text_node("from", self.from.as_str()));
        for recipient in &self.recipients {
            node.push(recipient.to_xml());
        }
        node
    }

    fn from_xml(node: &XmlElement) -> Result<Self> {
        node.expect_name(Self::NODE_NAME)?;
        if let Some(provider) = node.child_text("providerType") {
            if !provider.eq_ignore_ascii_case("SMTP") {
                return Err(ObjectStoreError::invalid(
                    "providerType",
                    provider,
                    "only SMTP is supported",
                ));
            }
        }
        Ok(Self {
            provider: NotifierProvider::Smtp,
            server: node.child_text("server").unwrap_or_default().to_string(),
            from: node.child_text("from").unwrap_or_default().to_string(),
            recipients: node
                .children_named(Recipient::NODE_NAME)
                .map(Recipient::from_xml)
                .collect::<Result<_>>()?,
        })
    }
}

impl Validate for Notifier {
    fn validate(&self, cx: &mut ValidationContext) {
        if !self.recipients.is_empty() && self.server.trim().is_empty() {
            cx.error("MISSING_MAIL_SERVER", "recipients are defined but no mail server is set");
        }
        if !self.recipients.is_empty() && self.from.trim().is_empty() {
            cx.warning("MISSING_SENDER", "no sender address; the server default is used");
        }
        for (i, recipient) in self.recipients.iter().enumerate() {
            cx.validate_child(format!("PSXRecipient[{}]", i), recipient);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_round_trip() {
        let mut notifier = Notifier::new("mail.example.com", "rx@example.com");
        notifier.add_recipient(Recipient::new("a@example.com").unwrap());
        notifier.add_recipient(Recipient::new("b@example.com").unwrap());
        let parsed = Notifier::from_xml_str(&notifier.to_xml_string().unwrap()).unwrap();
        assert_eq!(parsed, notifier);
        assert_eq!(parsed.recipients()[1].name(), "b@example.com");
    }

    #[test]
    fn test_recipients_need_a_server() {
        let mut notifier = Notifier::default();
        notifier.add_recipient(Recipient::new("a@example.com").unwrap());
        let mut cx = ValidationContext::new();
        notifier.validate(&mut cx);
        assert!(cx.has_code("MISSING_MAIL_SERVER"));
    }

    #[test]
    fn test_unknown_provider() {
        let xml = "<PSXNotifier><providerType>X400</providerType></PSXNotifier>";
        assert!(Notifier::from_xml_str(xml).is_err());
    }
}
