//! Email templates
//!
//! Pure renderers from event payloads to subject + plain-text + HTML, kept
//! free of transport concerns so they are testable without a mail server.

use shared::events::{PaymentEvent, ProductCreatedEvent, UserCreatedEvent};

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Shared card layout around a header and body
fn wrap(header: &str, header_style: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 20px auto; border: 1px solid #ddd; border-radius: 10px; overflow: hidden;">
  <div style="{header_style} padding: 20px; text-align: center;">
    <h1 style="margin: 0;">{header}</h1>
  </div>
  <div style="padding: 20px;">
    {body}
  </div>
  <div style="background-color: #f4f4f4; padding: 10px; text-align: center; font-size: 12px; color: #777;">
    <p>Best regards,<br/><strong>The Team</strong></p>
  </div>
</div>"#
    )
}

const HEADER_NEUTRAL: &str = "background-color: #f4f4f4; color: #5a2d82;";
const HEADER_SUCCESS: &str = "background-color: #28a745; color: white;";
const HEADER_FAILURE: &str = "background-color: #dc3545; color: white;";

pub fn user_registered(event: &UserCreatedEvent) -> Email {
    let body = format!(
        "<p>Dear {},</p>\
         <p>Thank you for registering with us. We're excited to have you on board!</p>\
         <p>We are committed to providing you with the best service possible.</p>",
        event.username
    );
    Email {
        subject: "Welcome to Our Service".into(),
        text: "Thank you for registering with us!".into(),
        html: wrap("Welcome to Our Service!", HEADER_NEUTRAL, &body),
    }
}

pub fn payment_initiated(event: &PaymentEvent) -> Email {
    let body = format!(
        "<p>Dear {},</p>\
         <p>Your payment of <strong>{} {}</strong> for order ID: <strong>{}</strong> has been initiated.</p>\
         <p>We will notify you once the payment is completed.</p>",
        event.username, event.currency, event.amount, event.order_id
    );
    Email {
        subject: "Payment Initiated".into(),
        text: "Your payment is being processed".into(),
        html: wrap("Payment Initiated", HEADER_NEUTRAL, &body),
    }
}

pub fn payment_completed(event: &PaymentEvent) -> Email {
    let body = format!(
        "<p>Dear {},</p>\
         <p>We have received your payment of <strong>{} {}</strong> for order ID: <strong>{}</strong>.</p>\
         <p>Thank you for your purchase!</p>",
        event.username, event.currency, event.amount, event.order_id
    );
    Email {
        subject: "Payment Successful".into(),
        text: "We have received your payment".into(),
        html: wrap("Payment Successful!", HEADER_SUCCESS, &body),
    }
}

pub fn payment_failed(event: &PaymentEvent) -> Email {
    let body = format!(
        "<p>Dear {},</p>\
         <p>Unfortunately, your payment for order ID: <strong>{}</strong> has failed.</p>\
         <p>Please try again or contact our support team if the issue persists.</p>",
        event.username, event.order_id
    );
    Email {
        subject: "Payment Failed".into(),
        text: "Your payment could not be processed".into(),
        html: wrap("Payment Failed", HEADER_FAILURE, &body),
    }
}

pub fn product_created(event: &ProductCreatedEvent) -> Email {
    let body = format!(
        "<p>Dear {},</p>\
         <p>A new product has just been launched: <strong>{}</strong>. \
         Check it out and enjoy exclusive launch offers!</p>\
         <p><a href=\"http://localhost:3000/products/{}\" style=\"display: inline-block; \
         background-color: #5a2d82; color: white; padding: 10px 20px; text-decoration: none; \
         border-radius: 5px;\">View Product</a></p>",
        event.username, event.title, event.product_id
    );
    Email {
        subject: "New Product Launched".into(),
        text: "Check out our latest product".into(),
        html: wrap("New Product Available!", HEADER_NEUTRAL, &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::Currency;

    fn payment_event() -> PaymentEvent {
        PaymentEvent {
            payment_id: "p1".into(),
            order_id: "o1".into(),
            amount: Decimal::new(57000, 2),
            currency: Currency::Pkr,
            email: "a@b.c".into(),
            username: "alice".into(),
        }
    }

    #[test]
    fn payment_templates_carry_amount_and_order() {
        let event = payment_event();
        for email in [payment_initiated(&event), payment_completed(&event)] {
            assert!(email.html.contains("PKR 570.00"), "{}", email.subject);
            assert!(email.html.contains("o1"));
            assert!(email.html.contains("alice"));
        }
    }

    #[test]
    fn failure_template_names_the_order() {
        let email = payment_failed(&payment_event());
        assert!(email.html.contains("o1"));
        assert!(email.html.contains("alice"));
        assert_eq!(email.subject, "Payment Failed");
    }

    #[test]
    fn welcome_addresses_the_user() {
        let email = user_registered(&UserCreatedEvent {
            email: "a@b.c".into(),
            username: "alice".into(),
        });
        assert!(email.html.contains("Dear alice"));
        assert!(!email.text.is_empty());
    }

    #[test]
    fn product_template_links_the_product() {
        let email = product_created(&ProductCreatedEvent {
            product_id: "prod-9".into(),
            title: "Widget".into(),
            email: "a@b.c".into(),
            username: "alice".into(),
        });
        assert!(email.html.contains("/products/prod-9"));
        assert!(email.html.contains("Widget"));
    }
}
