//! Mail transport
//!
//! The [`Mailer`] trait is the seam between rendering and delivery; the SES
//! implementation is the production transport and tests substitute a
//! recording fake.

use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;

/// Outbound mail seam
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> anyhow::Result<()>;
}

/// SES transport
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> anyhow::Result<()> {
        let subject = Content::builder().data(subject).build()?;
        let body = Body::builder()
            .text(Content::builder().data(text).build()?)
            .html(Content::builder().data(html).build()?)
            .build();
        let message = Message::builder().subject(subject).body(body).build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;

        tracing::info!(to = to, "Email sent");
        Ok(())
    }
}
