use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use taskboard_audit::AuditScope;
use ulid::Ulid;

use crate::config::AuthMode;
use crate::http::{ApiError, AppState, json_error};

/// Identity attached to the request by the authentication stage, carried
/// through the pipeline as a request extension. `user_id` stays `None`
/// when local mode receives no usable identity header; the access gate
/// then fails closed.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub user_id: Option<i64>,
    pub request_uri: String,
    pub request_id: String,
}

impl RequestScope {
    pub fn audit_scope(&self) -> AuditScope {
        AuditScope {
            user_id: self.user_id,
            request_uri: self.request_uri.clone(),
        }
    }
}

pub async fn attach_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = extract_request_id(request.headers());
    let request_uri = request.uri().path().to_string();

    let user_id = match state.config.auth_mode {
        AuthMode::Local => {
            if let Err(err) = validate_local_auth_shared_secret(
                request.headers(),
                state.config.local_auth_shared_secret.as_deref(),
            ) {
                return err.into_response();
            }
            extract_local_user_id(request.headers())
        }
        AuthMode::Jwt => {
            let Some(auth) = state.jwt.as_ref() else {
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ERR_INTERNAL",
                    "jwt authenticator is not initialized".to_string(),
                )
                .into_response();
            };

            match auth.authenticate(request.headers()) {
                Ok(principal) => Some(principal.user_id),
                Err(err) => {
                    return json_error(StatusCode::UNAUTHORIZED, err.code, err.message)
                        .into_response();
                }
            }
        }
    };

    request.extensions_mut().insert(RequestScope {
        user_id,
        request_uri,
        request_id,
    });

    next.run(request).await
}

fn validate_local_auth_shared_secret(
    headers: &HeaderMap,
    expected_secret: Option<&str>,
) -> Result<(), ApiError> {
    let Some(expected_secret) = expected_secret else {
        return Ok(());
    };

    let provided_secret = headers
        .get("x-taskboard-local-auth-secret")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "ERR_AUTH_REQUIRED",
                "missing local auth secret".to_string(),
            )
        })?;

    if provided_secret != expected_secret {
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "ERR_AUTH_INVALID",
            "invalid local auth secret".to_string(),
        ));
    }

    Ok(())
}

fn extract_local_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get("x-taskboard-user-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<i64>().ok())
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-taskboard-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let mut out = String::with_capacity(raw.len().min(MAX_LEN));

    for ch in raw.chars() {
        if out.len() >= MAX_LEN {
            break;
        }
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        }
    }

    (!out.is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_user_id_requires_a_numeric_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_local_user_id(&headers), None);

        headers.insert("x-taskboard-user-id", "42".parse().unwrap());
        assert_eq!(extract_local_user_id(&headers), Some(42));

        headers.insert("x-taskboard-user-id", "not-a-number".parse().unwrap());
        assert_eq!(extract_local_user_id(&headers), None);
    }

    #[test]
    fn request_ids_are_sanitized() {
        assert_eq!(
            sanitize_request_id("req-1_2.3").as_deref(),
            Some("req-1_2.3")
        );
        assert_eq!(sanitize_request_id("a b;c").as_deref(), Some("abc"));
        assert_eq!(sanitize_request_id(";;"), None);

        let long = "x".repeat(100);
        assert_eq!(sanitize_request_id(&long).unwrap().len(), 64);
    }

    #[test]
    fn shared_secret_is_enforced_when_configured() {
        let mut headers = HeaderMap::new();
        assert!(validate_local_auth_shared_secret(&headers, None).is_ok());

        let (status, _) = validate_local_auth_shared_secret(&headers, Some("s3cret")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        headers.insert("x-taskboard-local-auth-secret", "wrong".parse().unwrap());
        assert!(validate_local_auth_shared_secret(&headers, Some("s3cret")).is_err());

        headers.insert("x-taskboard-local-auth-secret", "s3cret".parse().unwrap());
        assert!(validate_local_auth_shared_secret(&headers, Some("s3cret")).is_ok());
    }
}
