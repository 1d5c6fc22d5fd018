//! Email-to-SMS channel.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;

use crate::data::models::NotificationEvent;

use super::carriers::sms_address;
use super::mail::{MailMessage, MailTransport};
use super::notifier::{DeliveryReport, NotificationChannel};

pub const SMS_SUBJECT: &str = "MiLB Alert";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRecipient {
    pub phone_number: String,
    pub carrier: String,
}

pub struct SmsGateway {
    transport: Arc<dyn MailTransport>,
    from: String,
    recipients: Vec<SmsRecipient>,
    default_domain: String,
}

impl SmsGateway {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        from: &str,
        recipients: Vec<SmsRecipient>,
        default_domain: &str,
    ) -> Self {
        Self {
            transport,
            from: from.to_string(),
            recipients,
            default_domain: default_domain.to_string(),
        }
    }

    /// One mail per recipient, addressed to the carrier gateway.
    pub fn messages_for(&self, event: &NotificationEvent) -> Vec<MailMessage> {
        let text = event.message_body();
        self.recipients
            .iter()
            .map(|r| MailMessage {
                from: self.from.clone(),
                to: sms_address(&r.phone_number, &r.carrier, &self.default_domain),
                subject: SMS_SUBJECT.to_string(),
                text: text.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for SmsGateway {
    fn name(&self) -> &str {
        "sms"
    }

    async fn deliver(&self, event: &NotificationEvent) -> DeliveryReport {
        let messages = self.messages_for(event);
        let sends = messages.iter().map(|message| async move {
            let result = self.transport.send(message).await;
            (message.to.clone(), result)
        });
        DeliveryReport::from_results(self.name(), join_all(sends).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{GameId, PlayerIdentity};
    use crate::notify::NotifyError;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<MailMessage>>,
        reject_to: Option<String>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, message: &MailMessage) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.clone());
            if self.reject_to.as_deref() == Some(message.to.as_str()) {
                return Err(NotifyError::Rejected {
                    endpoint: "smtp".into(),
                    status_code: 550,
                });
            }
            Ok(())
        }
    }

    fn recipients() -> Vec<SmsRecipient> {
        serde_json::from_str(
            r#"[{"phoneNumber":"1234567890","carrier":"verizon"},
                {"phoneNumber":"555-000-1111","carrier":"att"},
                {"phoneNumber":"2223334444","carrier":"unknown-mobile"}]"#,
        )
        .unwrap()
    }

    fn event() -> NotificationEvent {
        NotificationEvent::new(
            GameId::new("123"),
            &PlayerIdentity {
                id: "1".into(),
                name: "John Smith".into(),
            },
            "B @ A".into(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_sends_to_every_recipient_despite_failure() {
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
            reject_to: Some("5550001111@txt.att.net".into()),
        });
        let gateway = SmsGateway::new(
            transport.clone(),
            "MiLB Watcher <w@example.com>",
            recipients(),
            "fallback.example.net",
        );

        let report = gateway.deliver(&event()).await;

        let sent = transport.sent.lock().unwrap();
        let mut to: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        to.sort();
        assert_eq!(
            to,
            vec![
                "1234567890@vtext.com",
                "2223334444@fallback.example.net",
                "5550001111@txt.att.net",
            ]
        );
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, "5550001111@txt.att.net");
    }

    #[test]
    fn test_message_content() {
        let gateway = SmsGateway::new(
            Arc::new(RecordingTransport::default()),
            "MiLB Watcher",
            recipients(),
            "vtext.com",
        );
        let messages = gateway.messages_for(&event());
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.subject == SMS_SUBJECT));
        assert_eq!(messages[0].text, "John Smith has entered the game! (B @ A)");
    }
}
