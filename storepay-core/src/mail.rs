//! Order confirmation emails.
//!
//! [`Mailer`] is the delivery seam; [`SmtpMailer`] is the production
//! implementation over lettre's async SMTP transport.

use crate::config::{MailConfig, SmtpSecurity};
use crate::events::OrderConfirmation;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mailbox {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP delivery did not finish in time")]
    Timeout,
}

impl MailError {
    /// Failures that another attempt will not fix.
    pub fn is_permanent(&self) -> bool {
        match self {
            MailError::InvalidAddress { .. } | MailError::Build(_) => true,
            MailError::Smtp(e) => e.is_permanent(),
            MailError::Timeout => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|source| MailError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    /// Bound on a whole delivery; lettre's own timeout is per command.
    deadline: Duration,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from = parse_mailbox(&config.from)?;
        let mut builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        };
        if let Some(port) = config.smtp_port {
            builder = builder.port(port);
        }
        if let Some((username, password)) = &config.credentials {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.timeout(Some(config.timeout)).build(),
            from,
            deadline: config.timeout * 4,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&mail.to)?)
            .subject(mail.subject)
            .multipart(MultiPart::alternative_plain_html(mail.text, mail.html))?;
        tokio::time::timeout(self.deadline, self.transport.send(message))
            .await
            .map_err(|_| MailError::Timeout)??;
        Ok(())
    }
}

fn money(amount: Decimal, currency: &str) -> String {
    format!("{} {currency}", amount.round_dp(2))
}

/// Render the confirmation sent once an order exists for a payment.
pub fn render_confirmation(confirmation: &OrderConfirmation) -> OutgoingMail {
    let currency = confirmation.currency.as_str();
    let mut text = format!(
        "Thank you for shopping with us. Your payment has been received.\n\n\
         Order reference: {}\n\n",
        confirmation.reference
    );
    let mut rows = String::new();

    for item in &confirmation.items {
        let name = item.name.as_deref().unwrap_or(&item.product_id);
        let line_total = item
            .unit_price
            .checked_mul(Decimal::from(item.quantity))
            .map(|total| money(total, currency))
            .unwrap_or_default();
        let _ = writeln!(
            text,
            "{name} x{} @ {} = {line_total}",
            item.quantity,
            money(item.unit_price, currency),
        );
        let _ = write!(
            rows,
            "<tr><td>{}</td><td align=\"center\">{}</td><td align=\"right\">{}</td><td align=\"right\">{line_total}</td></tr>",
            html_escape::encode_text(name),
            item.quantity,
            money(item.unit_price, currency),
        );
    }
    if rows.is_empty() {
        rows.push_str("<tr><td colspan=\"4\">No items found</td></tr>");
    }

    let total = money(confirmation.amount, currency);
    let _ = write!(text, "\nTotal paid: {total}\n");

    let html = format!(
        "<h2>Order Confirmation</h2>\
         <p>Thank you for shopping with us. Your payment has been received.</p>\
         <p><strong>Order reference:</strong> {}</p>\
         <table>\
         <thead><tr><th align=\"left\">Product</th><th>Qty</th><th align=\"right\">Price</th><th align=\"right\">Total</th></tr></thead>\
         <tbody>{rows}</tbody>\
         </table>\
         <p><strong>Total paid:</strong> {total}</p>",
        html_escape::encode_text(&confirmation.reference)
    );

    OutgoingMail {
        to: confirmation.recipient.clone(),
        subject: format!("Order Confirmation - Ref {}", confirmation.reference),
        text,
        html,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::payment_records::CartLine;
    use uuid::Uuid;

    fn confirmation() -> OrderConfirmation {
        OrderConfirmation {
            reference: "REF_1".to_string(),
            order_id: Uuid::nil(),
            recipient: "buyer@example.com".to_string(),
            amount: Decimal::from(2500),
            currency: "NGN".to_string(),
            items: vec![
                CartLine {
                    product_id: "wig-01".to_string(),
                    variant_id: None,
                    quantity: 2,
                    unit_price: Decimal::from(1000),
                    name: Some("Bone <straight>".to_string()),
                },
                CartLine {
                    product_id: "cap-02".to_string(),
                    variant_id: None,
                    quantity: 1,
                    unit_price: Decimal::new(50000, 2),
                    name: None,
                },
            ],
        }
    }

    #[test]
    fn confirmation_lists_items_and_total() {
        let mail = render_confirmation(&confirmation());

        assert_eq!(mail.to, "buyer@example.com");
        assert_eq!(mail.subject, "Order Confirmation - Ref REF_1");
        assert!(mail.text.contains("Bone <straight> x2 @ 1000 NGN = 2000 NGN"));
        assert!(mail.text.contains("cap-02 x1 @ 500.00 NGN = 500.00 NGN"));
        assert!(mail.text.contains("Total paid: 2500 NGN"));
        assert!(mail.html.contains("Bone &lt;straight&gt;"));
        assert!(!mail.html.contains("<straight>"));
    }

    #[test]
    fn empty_item_list_renders_placeholder() {
        let mail = render_confirmation(&OrderConfirmation {
            items: vec![],
            ..confirmation()
        });
        assert!(mail.html.contains("No items found"));
    }

    #[test]
    fn bad_sender_is_rejected_at_startup() {
        let config = MailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: Some(1025),
            security: SmtpSecurity::None,
            credentials: None,
            from: "not a mailbox".to_string(),
            timeout: std::time::Duration::from_secs(5),
            max_attempts: 3,
        };
        let err = SmtpMailer::new(&config).err().unwrap();
        assert!(matches!(err, MailError::InvalidAddress { .. }));
        assert!(err.is_permanent());
    }
}
