use std::fmt::Display;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

pub mod codec;

/// Request-scoped context captured by the identity middleware and handed to
/// [`wrap`]. `user_id` is `None` when the upstream authentication stage did
/// not attach an identity; the audit record then marks the caller as
/// absent instead of failing the call.
#[derive(Debug, Clone)]
pub struct AuditScope {
    pub user_id: Option<i64>,
    pub request_uri: String,
}

pub fn unix_epoch_ms_now() -> i64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    duration.as_millis().min(i64::MAX as u128) as i64
}

/// Runs `invoke` under audit logging. Exactly one entry-phase record is
/// emitted before the operation starts; the terminal record is either an
/// exit-phase record (serialized response with the `body` envelope field
/// extracted) or an error-phase record (message only), never both. The
/// result or error passes through unchanged; the wrapper only observes.
///
/// A missing scope is logged as a warning and does not block the call;
/// the record is still emitted with identity and URI marked absent.
pub async fn wrap<T, E, F>(
    op_name: &str,
    scope: Option<&AuditScope>,
    args: &[String],
    invoke: F,
) -> Result<T, E>
where
    T: Serialize,
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let (user_id, request_uri) = match scope {
        Some(scope) => (scope.user_id, scope.request_uri.as_str()),
        None => {
            tracing::warn!(op = op_name, "admin_audit.missing_scope");
            (None, "-")
        }
    };

    let caller = match user_id {
        Some(id) => id.to_string(),
        None => "-".to_string(),
    };
    let request_body = codec::serialize_args(args);

    // Emitted before the operation runs so a crash inside it still leaves
    // a record of what was attempted.
    tracing::info!(
        op = op_name,
        uri = %request_uri,
        at_epoch_ms = unix_epoch_ms_now(),
        user_id = %caller,
        args = %request_body,
        "admin_audit.enter"
    );

    match invoke.await {
        Ok(result) => {
            let serialized = codec::serialize(&result);
            let response_body = codec::extract_field(&serialized, "body");
            tracing::info!(
                op = op_name,
                uri = %request_uri,
                response = %response_body,
                "admin_audit.exit"
            );
            Ok(result)
        }
        Err(err) => {
            tracing::error!(
                op = op_name,
                uri = %request_uri,
                error = %err,
                "admin_audit.error"
            );
            Err(err)
        }
    }
}
