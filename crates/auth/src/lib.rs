use std::time::Duration;

use http::HeaderMap;
use http::header;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value;
use taskboard_contracts::UserRole;

/// Authenticated caller as asserted by the bearer token. `role_claim` is
/// whatever the token was issued with; admin routes never trust it and
/// re-validate against the durable store, since privilege may have been
/// revoked after issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role_claim: Option<UserRole>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub clock_skew: Duration,
    pub user_id_claim: String,
    pub role_claim: String,
}

#[derive(Debug, Clone)]
pub struct AuthError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuthError {}

#[derive(Clone)]
pub struct JwtAuthenticator {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl JwtAuthenticator {
    pub fn new(config: JwtConfig) -> Result<Self, AuthError> {
        if config.secret.trim().is_empty() {
            return Err(AuthError {
                code: "ERR_INVALID_CONFIG",
                message: "jwt secret must be non-empty".to_string(),
            });
        }

        if config.user_id_claim.trim().is_empty() {
            return Err(AuthError {
                code: "ERR_INVALID_CONFIG",
                message: "jwt user_id_claim must be non-empty".to_string(),
            });
        }

        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            config,
            decoding_key,
        })
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.clock_skew.as_secs();

        let decoded =
            decode::<Value>(&token, &self.decoding_key, &validation).map_err(|_| AuthError {
                code: "ERR_AUTH_INVALID",
                message: "JWT validation failed".to_string(),
            })?;

        let claims = decoded.claims;

        let user_id = claim_user_id(&claims, &self.config.user_id_claim)?;

        let role_claim = claims
            .get(&self.config.role_claim)
            .and_then(|v| v.as_str())
            .and_then(UserRole::parse);

        Ok(Principal {
            user_id,
            role_claim,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError {
            code: "ERR_AUTH_REQUIRED",
            message: "missing Authorization header".to_string(),
        })?;

    let token = authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .ok_or_else(|| AuthError {
            code: "ERR_AUTH_INVALID",
            message: "Authorization must be a Bearer token".to_string(),
        })?;

    if token.trim().is_empty() {
        return Err(AuthError {
            code: "ERR_AUTH_INVALID",
            message: "Bearer token is empty".to_string(),
        });
    }

    Ok(token.to_string())
}

// Tokens minted by the upstream issuer carry the user id either as a JSON
// number or as a stringified number; accept both.
fn claim_user_id(claims: &Value, claim: &str) -> Result<i64, AuthError> {
    let value = claims.get(claim).ok_or_else(|| AuthError {
        code: "ERR_AUTH_INVALID",
        message: format!("required claim `{}` is missing", claim),
    })?;

    let user_id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    user_id.ok_or_else(|| AuthError {
        code: "ERR_AUTH_INVALID",
        message: format!("claim `{}` must be a numeric user id", claim),
    })
}
