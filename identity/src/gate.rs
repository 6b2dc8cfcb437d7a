//! Middleware guarding routes that need a logged-in user.

use crate::error::AuthError;
use crate::metrics_defs::GATE_REJECTED;
use crate::session::current_identity;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Rejects the request with 401 unless the session carries an identity.
/// Downstream handlers read the identity from the request extensions.
pub async fn require_identity(session: Session, mut request: Request, next: Next) -> Response {
    match current_identity(&session).await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => {
            shared::counter!(GATE_REJECTED, "route" => "api").increment(1);
            AuthError::Unauthenticated.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Browser-facing variant: anonymous users are sent through the login flow
/// and brought back to the page they asked for.
pub async fn require_identity_or_login(
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match current_identity(&session).await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => {
            shared::counter!(GATE_REJECTED, "route" => "page").increment(1);
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            let location = url::form_urlencoded::Serializer::new(String::from("/login?"))
                .append_pair("state", target)
                .finish();
            Redirect::to(&location).into_response()
        }
        Err(e) => e.into_response(),
    }
}
