use axum::{
    Extension,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Serialize;
use tower_cookies::Cookies;

use crate::{
    error::Result,
    models::{session::RequestContext, user::AuthUser},
    response::{data_response, message_response},
    services::auth::{self as auth_service, end_browser_session, start_browser_session},
    state::AppState,
    validation::{
        auth::{SignInInput, SignUpInput},
        payload::ValidatedJson,
    },
};

/// The response payload for sign-up.
#[derive(Serialize)]
pub struct SignUpResponse<'a> {
    pub user: Option<&'a AuthUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// The provider wants the address confirmed before the first login.
    pub confirmation_required: bool,
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<SignInInput>,
) -> Result<Response> {
    tracing::info!("🔑 Login attempt");
    let session = auth_service::sign_in(state.auth.as_ref(), &payload).await?;
    start_browser_session(&cookies, &session, state.config.production);
    data_response(StatusCode::OK, &session.view())
}

/// Handles user registration.
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<SignUpInput>,
) -> Result<Response> {
    tracing::info!("📝 Sign-up attempt");
    let session = auth_service::sign_up(state.auth.as_ref(), &payload).await?;

    if let Some(session) = &session {
        start_browser_session(&cookies, session, state.config.production);
    }

    let body = SignUpResponse {
        user: session.as_ref().map(|s| &s.user),
        access_token: session.as_ref().map(|s| s.access_token.as_str()),
        expires_in: session.as_ref().map(|s| s.expires_in),
        confirmation_required: session.is_none(),
    };
    data_response(StatusCode::CREATED, &body)
}

/// Handles user logout. Always succeeds; the cookies are cleared regardless.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
) -> Result<Response> {
    let token = auth_service::presented_token(&headers, &cookies).map(|(token, _)| token);
    auth_service::sign_out(state.auth.as_ref(), token.as_ref()).await;
    end_browser_session(&cookies);
    message_response(StatusCode::OK, "Signed out")
}

/// The authenticated caller.
pub async fn me(Extension(ctx): Extension<RequestContext>) -> Result<Response> {
    data_response(StatusCode::OK, &ctx.user)
}
