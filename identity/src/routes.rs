use crate::IdentityState;
use crate::error::AuthError;
use crate::gate::{require_identity, require_identity_or_login};
use crate::metrics_defs::{LOGIN_FAILED, LOGIN_SUCCEEDED};
use crate::session::{
    Identity, SessionLayer, clear, clear_token_cookie, establish, token_cookie,
};
use crate::user_store::UserStoreError;
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::header::SET_COOKIE,
    middleware,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;

#[derive(Deserialize, Debug, Default)]
struct LoginParams {
    state: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

/// Login flow, the dashboard, and the per-user data routes, all sharing the
/// session layer.
pub fn router(state: IdentityState, sessions: SessionLayer) -> Router {
    let api = Router::new()
        .route("/api/ond-pairs", get(ond_pairs))
        .route("/ond-pairs", get(ond_pairs))
        .route("/api/ond-pairs/all", get(all_ond_pairs))
        .route_layer(middleware::from_fn(require_identity));

    let pages = Router::new()
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(require_identity_or_login));

    Router::new()
        .route("/login", get(login))
        .route("/postlogin", get(postlogin))
        .route("/logout", get(logout))
        .route("/postlogout", get(postlogout))
        .merge(api)
        .merge(pages)
        .layer(sessions)
        .with_state(state)
}

async fn login(State(state): State<IdentityState>, Query(params): Query<LoginParams>) -> Redirect {
    Redirect::to(state.provider.login_url(params.state.as_deref()).as_str())
}

async fn postlogin(
    State(state): State<IdentityState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthError> {
    let code = params.code.as_deref().filter(|code| !code.is_empty());
    let outcome = match code {
        Some(code) => state.provider.exchange_code(code).await,
        None => Err(AuthError::MissingCode),
    };

    let authenticated = match outcome {
        Ok(authenticated) => authenticated,
        Err(e) => {
            shared::counter!(LOGIN_FAILED).increment(1);
            clear(&session).await?;
            return Err(e);
        }
    };

    establish(&session, &authenticated.identity).await?;
    shared::counter!(LOGIN_SUCCEEDED).increment(1);
    tracing::info!(username = %authenticated.identity.username, "user logged in");

    let target = params
        .state
        .as_deref()
        .filter(|path| is_local_path(path))
        .unwrap_or(&state.settings.post_login_redirect);
    let cookie = token_cookie(&authenticated.access_token, state.settings.secure_cookies);
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(target)).into_response())
}

async fn logout(State(state): State<IdentityState>, session: Session) -> Result<Response, AuthError> {
    clear(&session).await?;
    let cookie = clear_token_cookie(state.settings.secure_cookies);
    let target = state.provider.logout_url();
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(target.as_str())).into_response())
}

async fn postlogout(
    State(state): State<IdentityState>,
    session: Session,
) -> Result<Response, AuthError> {
    clear(&session).await?;
    let cookie = clear_token_cookie(state.settings.secure_cookies);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Redirect::to(&state.settings.home_url),
    )
        .into_response())
}

async fn dashboard(Extension(identity): Extension<Identity>) -> Json<Value> {
    Json(json!({ "username": identity.username }))
}

async fn ond_pairs(
    State(state): State<IdentityState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, UserStoreError> {
    let item = state.users.get_item(&identity.lookup_key()).await?;
    Ok(Json(Value::Object(item.unwrap_or_default())))
}

/// Every user's item. Restricted to the configured admin users.
async fn all_ond_pairs(
    State(state): State<IdentityState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    if !state.settings.is_admin(&identity) {
        tracing::info!(username = %identity.username, "denied listing of all ond pairs");
        return AuthError::Forbidden.into_response();
    }
    match state.users.scan_items().await {
        Ok(items) => Json(Value::Array(items.into_iter().map(Value::Object).collect())).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Same-origin path only. Browsers drop tabs and newlines from URLs and treat
/// `\` like `/`, so any of those could turn the path into `//host`.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(|c| c.is_control() || c.is_whitespace())
}
