//! Server configuration.

use std::net::SocketAddr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen: SocketAddr,
    /// Storefront base URL; gateway callbacks redirect here.
    pub frontend_url: url::Url,
}

impl ServerConfig {
    /// Gateway redirect target after checkout.
    ///
    /// `{frontend}/payment/callback?fallback={urlencoded frontend/payment/verify}`
    pub fn payment_callback_url(&self) -> String {
        let base = self.frontend_url.as_str().trim_end_matches('/');
        let fallback = format!("{base}/payment/verify");
        format!(
            "{base}/payment/callback?fallback={}",
            urlencoding::encode(&fallback)
        )
    }
}
