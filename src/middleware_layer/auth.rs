use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    services::auth::{self as auth_service, end_browser_session},
    state::AppState,
    views,
};

/// Where unauthenticated browsers are sent.
pub const LOGIN_PATH: &str = "/login";

/// Requires a session on API routes: 401 JSON when there is none.
///
/// On success the `RequestContext` is inserted into the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let ctx = auth_service::resolve_context(state.auth.as_ref(), request.headers(), &cookies)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Requires a session on page routes: redirects to the login page when there is none.
///
/// Resolved on every navigation; nothing is cached between requests.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service::resolve_context(state.auth.as_ref(), request.headers(), &cookies).await {
        Ok(Some(ctx)) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Ok(None) => {
            end_browser_session(&cookies);
            Redirect::to(LOGIN_PATH).into_response()
        }
        Err(e) => views::layout::error_page(&e),
    }
}
