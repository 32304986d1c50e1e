use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    crypto::csrf::{CSRF_HEADER, verify_submitted},
    error::AppError,
    models::session::{CredentialSource, RequestContext},
};

/// Verifies the double-submit CSRF token on cookie-authenticated API writes.
///
/// Runs after `require_auth`. Bearer callers carry no ambient credentials
/// and are let through.
pub async fn verify_csrf(cookies: Cookies, req: Request, next: Next) -> Response {
    if req.method() == Method::GET || req.method() == Method::HEAD || req.method() == Method::OPTIONS {
        tracing::debug!("✅ CSRF exemption: {} request", req.method());
        return next.run(req).await;
    }

    let source = req.extensions().get::<RequestContext>().map(|ctx| ctx.source);
    if source == Some(CredentialSource::Bearer) {
        tracing::debug!("✅ CSRF exemption: bearer credentials");
        return next.run(req).await;
    }

    let submitted = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    if !verify_submitted(&cookies, submitted) {
        tracing::warn!("❌ CSRF: token missing or mismatched on {} {}", req.method(), req.uri().path());
        return AppError::Forbidden("CSRF token missing or invalid".to_string()).into_response();
    }

    next.run(req).await
}
