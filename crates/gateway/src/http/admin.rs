use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use taskboard_audit::codec;
use taskboard_contracts::{Reply, UserRole};
use taskboard_store::StoreError;

use super::{ApiError, AppState, json_error};
use crate::identity::RequestScope;
use crate::metrics;

#[derive(Debug, Serialize)]
pub(super) struct CommentDeletedResponse {
    comment_id: i64,
    deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RoleChangeRequest {
    role: String,
}

#[derive(Debug, Serialize)]
pub(super) struct RoleChangedResponse {
    user_id: i64,
    role: UserRole,
}

#[derive(Debug)]
enum AdminOpError {
    InvalidRequest(String),
    Store(StoreError),
}

impl std::fmt::Display for AdminOpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminOpError::InvalidRequest(message) => write!(f, "{}", message),
            AdminOpError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl From<StoreError> for AdminOpError {
    fn from(value: StoreError) -> Self {
        AdminOpError::Store(value)
    }
}

fn admin_error_response(err: &AdminOpError) -> ApiError {
    match err {
        AdminOpError::InvalidRequest(message) => json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_REQUEST",
            message.clone(),
        ),
        AdminOpError::Store(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "ERR_STORE_UNAVAILABLE",
            "durable store unavailable".to_string(),
        ),
    }
}

pub(super) async fn delete_comment(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(comment_id): Path<i64>,
) -> Result<Json<CommentDeletedResponse>, ApiError> {
    let audit_scope = scope.audit_scope();

    let result = taskboard_audit::wrap(
        "delete_comment",
        Some(&audit_scope),
        &[codec::serialize(&comment_id)],
        async {
            let deleted = state.backend.delete_comment(comment_id).await?;
            tracing::info!(
                request_id = %scope.request_id,
                comment_id,
                deleted,
                "gateway.delete_comment"
            );
            Ok::<_, AdminOpError>(Reply::ok(CommentDeletedResponse {
                comment_id,
                deleted,
            }))
        },
    )
    .await;

    match result {
        Ok(reply) => {
            metrics::observe_audited_call("delete_comment", "ok");
            Ok(Json(reply.body))
        }
        Err(err) => {
            metrics::observe_audited_call("delete_comment", "error");
            Err(admin_error_response(&err))
        }
    }
}

pub(super) async fn change_user_role(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(user_id): Path<i64>,
    req: Result<Json<RoleChangeRequest>, JsonRejection>,
) -> Result<Json<RoleChangedResponse>, ApiError> {
    let Json(req) = req.map_err(|rejection| {
        json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_REQUEST",
            rejection.body_text(),
        )
    })?;

    let audit_scope = scope.audit_scope();

    let result = taskboard_audit::wrap(
        "change_user_role",
        Some(&audit_scope),
        &[codec::serialize(&user_id), codec::serialize(&req)],
        async {
            let role = UserRole::parse(&req.role).ok_or_else(|| {
                AdminOpError::InvalidRequest(format!("unknown role `{}`", req.role))
            })?;

            let updated = state.backend.update_user_role(user_id, role).await?;
            if !updated {
                return Err(AdminOpError::InvalidRequest("user not found".to_string()));
            }

            tracing::info!(
                request_id = %scope.request_id,
                user_id,
                role = role.as_str(),
                "gateway.change_user_role"
            );
            Ok(Reply::ok(RoleChangedResponse { user_id, role }))
        },
    )
    .await;

    match result {
        Ok(reply) => {
            metrics::observe_audited_call("change_user_role", "ok");
            Ok(Json(reply.body))
        }
        Err(err) => {
            metrics::observe_audited_call("change_user_role", "error");
            Err(admin_error_response(&err))
        }
    }
}
