//! Management-role gate for the resource endpoints
//!
//! Session handling lives upstream; the gateway forwards the authenticated
//! user id in the `x-user-id` header. This middleware loads that user and
//! admits only active management accounts. Everything else, including a
//! missing or unknown id, is a 403 with the standard error envelope and no
//! state change.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;
use tutorium_common::store::models::{Role, User};
use tutorium_common::store::{collections, decode};

use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated management user, inserted into request extensions for
/// handlers that need the requester id
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
}

/// Middleware admitting only active management users
pub async fn require_management(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(user_id) = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return Err(AuthError::Forbidden);
    };

    let user = state
        .store
        .find_by_id(collections::USERS, &user_id)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .and_then(decode::<User>);

    match user {
        Some(user) if user.active && user.role == Role::Management => {
            request.extensions_mut().insert(Caller { user_id });
            Ok(next.run(request).await)
        }
        _ => {
            warn!("Rejected non-management caller {}", user_id);
            Err(AuthError::Forbidden)
        }
    }
}

/// Role gate errors for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    Forbidden,
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Management role required".to_string(),
            ),
            AuthError::Internal(msg) => {
                warn!("Role check failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
