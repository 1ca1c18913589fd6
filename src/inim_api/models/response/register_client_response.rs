use serde::Deserialize;
use std::time::{Duration, SystemTime};

#[derive(Deserialize, Debug, Clone)]
pub struct RegisterClientResponse {
    #[serde(rename = "Token")]
    pub token: String,
    /// Token lifetime in seconds.
    #[serde(rename = "TTL", default)]
    pub ttl: u64,
}

/// A token together with the moment it stops being usable.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: SystemTime,
}

impl AuthToken {
    pub fn from_response(response: RegisterClientResponse, issued_at: SystemTime) -> Self {
        Self {
            token: response.token,
            expires_at: issued_at + Duration::from_secs(response.ttl),
        }
    }

    /// Check if the token is expired (with a 30s buffer)
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now + Duration::from_secs(30) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}
