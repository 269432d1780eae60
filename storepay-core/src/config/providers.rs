//! Payment provider credentials.

#[derive(Clone)]
pub struct PaystackConfig {
    /// Secret key; authenticates API calls and signs webhooks.
    pub secret_key: String,
    pub base_url: url::Url,
}

#[derive(Clone)]
pub struct MonnifyConfig {
    pub api_key: String,
    /// Client secret; used for login and to sign webhooks.
    pub secret_key: String,
    pub contract_code: String,
    pub base_url: url::Url,
}

impl std::fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl std::fmt::Debug for MonnifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonnifyConfig")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("contract_code", &self.contract_code)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
