use std::collections::BTreeMap;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use serde::Serialize;
use taskboard_auth::JwtAuthenticator;

use crate::backend::Backend;
use crate::config::{AuthMode, GatewayConfig, StartupError};
use crate::{gate, identity, metrics};

mod admin;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub backend: Backend,
    pub jwt: Option<JwtAuthenticator>,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn router(config: GatewayConfig) -> Result<Router, StartupError> {
    let backend = Backend::from_config(&config).await?;
    router_with_backend(config, backend)
}

/// Builds the router over an already-constructed backend. Split out so
/// tests can run against a seeded in-memory backend.
pub fn router_with_backend(
    config: GatewayConfig,
    backend: Backend,
) -> Result<Router, StartupError> {
    let jwt = match config.auth_mode {
        AuthMode::Jwt => {
            let jwt_config = config.jwt.clone().ok_or_else(|| StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "jwt auth mode requires jwt config".to_string(),
            })?;

            Some(JwtAuthenticator::new(jwt_config).map_err(|err| StartupError {
                code: "ERR_INVALID_CONFIG",
                message: err.to_string(),
            })?)
        }
        AuthMode::Local => None,
    };

    let state = AppState {
        config,
        backend,
        jwt,
    };

    // Identity runs first (outermost route layer), then the access gate;
    // denied requests never reach an audited handler.
    let admin_routes = Router::new()
        .route("/admin/comments/{comment_id}", delete(admin::delete_comment))
        .route("/admin/users/{user_id}", patch(admin::change_user_role))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate::require_admin,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity::attach_identity,
        ));

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_exposition))
        .merge(admin_routes)
        // route_layer so the matched route template is available as the
        // metric label instead of the raw (unbounded) request path.
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state))
}

async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    metrics::observe_http_request(&route, method.as_str(), response.status().as_u16());
    response
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();

    let store_ready = state.backend.ping().await.is_ok();
    checks.insert("store", store_ready);

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics_exposition() -> Response {
    match metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

pub(crate) fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
        }),
    )
}
