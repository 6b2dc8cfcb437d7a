use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors of the login flow and of the gate in front of protected routes.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("authorization required")]
    Unauthenticated,

    #[error("not allowed for this user")]
    Forbidden,

    #[error("callback is missing the authorization code")]
    MissingCode,

    #[error("identity provider rejected the authorization code ({0})")]
    Rejected(reqwest::StatusCode),

    #[error("identity is missing the '{0}' claim")]
    MissingClaim(String),

    #[error("identity provider request failed: {0}")]
    Provider(#[from] reqwest::Error),

    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("invalid identity provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Whether the caller should be sent through the login flow again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthenticated
                | AuthError::MissingCode
                | AuthError::Rejected(_)
                | AuthError::MissingClaim(_)
        )
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_unauthorized() {
            tracing::info!("rejecting unauthenticated request: {self}");
            let body = Json(ErrorBody {
                error: "Authorization required",
            });
            return (StatusCode::UNAUTHORIZED, body).into_response();
        }

        if let AuthError::Forbidden = self {
            let body = Json(ErrorBody { error: "Forbidden" });
            return (StatusCode::FORBIDDEN, body).into_response();
        }

        tracing::error!("authentication failed: {self}");
        let body = Json(ErrorBody {
            error: "Authentication failed",
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
