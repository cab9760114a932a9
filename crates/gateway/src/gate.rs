use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::backend::Backend;
use crate::http::{AppState, json_error};
use crate::identity::RequestScope;
use crate::metrics;

/// Fixed user-facing denial message; the error-translation boundary adds
/// nothing beyond the status code.
pub const DENIED_MESSAGE: &str =
    "administrator privilege required; sign in with an administrator account";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDenial {
    pub code: &'static str,
    pub message: String,
}

/// Pre-dispatch privilege check for admin routes. The lookup always goes
/// to the durable store: a token may still claim ADMIN after the role was
/// revoked, and this gate exists to close exactly that window. Absent
/// identity fails closed.
pub async fn authorize(backend: &Backend, user_id: Option<i64>) -> Result<(), GateDenial> {
    let Some(user_id) = user_id else {
        tracing::warn!("admin_gate.identity_missing");
        return Err(GateDenial {
            code: "ERR_IDENTITY_MISSING",
            message: DENIED_MESSAGE.to_string(),
        });
    };

    match backend.is_administrator(user_id).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            // Expected security outcome, not an internal error.
            tracing::info!(user_id, "admin_gate.denied");
            Err(GateDenial {
                code: "ERR_ADMIN_REQUIRED",
                message: DENIED_MESSAGE.to_string(),
            })
        }
        Err(err) => {
            tracing::error!(user_id, error = %err, "admin_gate.oracle_unavailable");
            Err(GateDenial {
                code: "ERR_STORE_UNAVAILABLE",
                message: "privilege lookup unavailable".to_string(),
            })
        }
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user_id = request
        .extensions()
        .get::<RequestScope>()
        .and_then(|scope| scope.user_id);

    match authorize(&state.backend, user_id).await {
        Ok(()) => next.run(request).await,
        Err(denial) => {
            metrics::observe_admin_denial(denial.code);
            let status = if denial.code == "ERR_STORE_UNAVAILABLE" {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::FORBIDDEN
            };
            json_error(status, denial.code, denial.message).into_response()
        }
    }
}
