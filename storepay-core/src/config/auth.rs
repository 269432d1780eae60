//! Caller authentication configuration.

/// Secret used to validate HS256 bearer tokens issued by the auth service.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Box<[u8]>,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}
