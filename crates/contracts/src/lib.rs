use serde::{Deserialize, Serialize};

/// Durable role classification for a user. The durable value is
/// authoritative over any role claim carried in an authentication token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "ADMIN" => Some(UserRole::Admin),
            "USER" => Some(UserRole::User),
            _ => None,
        }
    }
}

/// Response envelope produced by business operations. Audit logging strips
/// the envelope and records only the `body` field, so transport framing
/// never shows up in audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply<T> {
    pub status: u16,
    pub body: T,
}

impl<T> Reply<T> {
    pub fn ok(body: T) -> Self {
        Self { status: 200, body }
    }
}
