//! Topic dispatch
//!
//! One consumer loop per topic, all sharing the broker channel and the mail
//! transport. Handler failure (bad payload, transport error) drops the
//! message; the broker client logs and rejects without requeue.

use std::sync::Arc;

use anyhow::Context;

use broker::Broker;
use shared::events::{topics, PaymentEvent, ProductCreatedEvent, UserCreatedEvent};

use crate::templates::{self, Email};
use crate::transport::Mailer;

/// Render the email for one delivery
///
/// Pure except for deserialization, so routing and rendering are testable
/// without a broker. Returns the recipient alongside the rendered mail.
fn render(topic: &str, payload: &[u8]) -> anyhow::Result<(String, Email)> {
    let rendered = match topic {
        topics::USER_CREATED => {
            let event: UserCreatedEvent =
                serde_json::from_slice(payload).context("malformed user-created payload")?;
            (event.email.clone(), templates::user_registered(&event))
        }
        topics::PAYMENT_INITIATED => {
            let event: PaymentEvent =
                serde_json::from_slice(payload).context("malformed payment payload")?;
            (event.email.clone(), templates::payment_initiated(&event))
        }
        topics::PAYMENT_COMPLETED => {
            let event: PaymentEvent =
                serde_json::from_slice(payload).context("malformed payment payload")?;
            (event.email.clone(), templates::payment_completed(&event))
        }
        topics::PAYMENT_FAILED => {
            let event: PaymentEvent =
                serde_json::from_slice(payload).context("malformed payment payload")?;
            (event.email.clone(), templates::payment_failed(&event))
        }
        topics::PRODUCT_CREATED => {
            let event: ProductCreatedEvent =
                serde_json::from_slice(payload).context("malformed product payload")?;
            (event.email.clone(), templates::product_created(&event))
        }
        other => anyhow::bail!("no handler bound for topic {other}"),
    };
    Ok(rendered)
}

/// Process one delivery end to end
pub async fn handle_message(
    mailer: &dyn Mailer,
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<()> {
    let (to, email) = render(topic, payload)?;
    mailer
        .send(&to, &email.subject, &email.text, &email.html)
        .await
        .context("mail transport failed")?;
    tracing::info!(topic, to = %to, subject = %email.subject, "notification sent");
    Ok(())
}

/// Bind one consumer loop per known topic
///
/// The returned handles run until aborted; each loop resubscribes on broker
/// failure independently of the others.
pub fn run(broker: &Arc<Broker>, mailer: Arc<dyn Mailer>) -> Vec<tokio::task::JoinHandle<()>> {
    topics::ALL
        .iter()
        .map(|&topic| {
            let mailer = Arc::clone(&mailer);
            broker.subscribe(topic, move |payload| {
                let mailer = Arc::clone(&mailer);
                async move { handle_message(mailer.as_ref(), topic, &payload).await }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use rust_decimal::Decimal;
    use shared::Currency;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            to: &str,
            subject: &str,
            _text: &str,
            _html: &str,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn payment_payload() -> Vec<u8> {
        serde_json::to_vec(&PaymentEvent {
            payment_id: "p1".into(),
            order_id: "o1".into(),
            amount: Decimal::from(570),
            currency: Currency::Pkr,
            email: "alice@example.com".into(),
            username: "alice".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn payment_completed_mails_the_customer() {
        let mailer = RecordingMailer::default();
        handle_message(&mailer, topics::PAYMENT_COMPLETED, &payment_payload())
            .await
            .unwrap();
        assert_eq!(
            mailer.sent.lock().unwrap().as_slice(),
            &[("alice@example.com".to_string(), "Payment Successful".to_string())]
        );
    }

    #[tokio::test]
    async fn each_topic_routes_to_its_template() {
        let mailer = RecordingMailer::default();
        let user = serde_json::to_vec(&UserCreatedEvent {
            email: "u@example.com".into(),
            username: "u".into(),
        })
        .unwrap();
        let product = serde_json::to_vec(&ProductCreatedEvent {
            product_id: "prod-1".into(),
            title: "Widget".into(),
            email: "u@example.com".into(),
            username: "u".into(),
        })
        .unwrap();

        handle_message(&mailer, topics::USER_CREATED, &user)
            .await
            .unwrap();
        handle_message(&mailer, topics::PAYMENT_INITIATED, &payment_payload())
            .await
            .unwrap();
        handle_message(&mailer, topics::PAYMENT_FAILED, &payment_payload())
            .await
            .unwrap();
        handle_message(&mailer, topics::PRODUCT_CREATED, &product)
            .await
            .unwrap();

        let subjects: Vec<String> = mailer
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        assert_eq!(
            subjects,
            vec![
                "Welcome to Our Service",
                "Payment Initiated",
                "Payment Failed",
                "New Product Launched"
            ]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error_and_sends_nothing() {
        let mailer = RecordingMailer::default();
        let err = handle_message(&mailer, topics::PAYMENT_COMPLETED, b"not json").await;
        assert!(err.is_err());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_is_an_error() {
        let mailer = RecordingMailer::default();
        let err = handle_message(&mailer, "NOPE.TOPIC", &payment_payload()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        let err = handle_message(&mailer, topics::PAYMENT_COMPLETED, &payment_payload()).await;
        assert!(err.is_err());
    }
}
