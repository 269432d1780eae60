//! Outgoing mail settings for order confirmations.

use std::time::Duration;

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Tls,
    /// Plain connection upgraded with STARTTLS, usually port 587.
    StartTls,
    /// No encryption. Only for local relays and test servers.
    None,
}

#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    /// Defaults to the well-known port for `security`.
    pub smtp_port: Option<u16>,
    pub security: SmtpSecurity,
    pub credentials: Option<(String, String)>,
    /// Sender mailbox, e.g. `Storefront <orders@example.com>`.
    pub from: String,
    pub timeout: Duration,
    /// Delivery attempts per confirmation before it is given up.
    pub max_attempts: u32,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("security", &self.security)
            .field(
                "credentials",
                &self.credentials.as_ref().map(|(user, _)| (user, "<redacted>")),
            )
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}
