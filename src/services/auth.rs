use axum::http::{HeaderMap, header};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};

use crate::baas::AuthProvider;
use crate::crypto::csrf::{CSRF_COOKIE, csrf_cookie, generate_csrf_token};
use crate::error::Result;
use crate::models::session::{AccessToken, AuthSession, CredentialSource, RequestContext};
use crate::validation::auth::{SignInInput, SignUpInput};

/// Cookie carrying the auth provider's access token for browser sessions.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The token from `Authorization: Bearer ...`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<AccessToken> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(AccessToken::new(token))
}

/// The credentials presented with a request. A bearer header wins over the cookie.
pub fn presented_token(headers: &HeaderMap, cookies: &Cookies) -> Option<(AccessToken, CredentialSource)> {
    if let Some(token) = bearer_token(headers) {
        return Some((token, CredentialSource::Bearer));
    }

    cookies
        .get(ACCESS_TOKEN_COOKIE)
        .filter(|cookie| !cookie.value().is_empty())
        .map(|cookie| (AccessToken::new(cookie.value()), CredentialSource::Cookie))
}

/// Resolves the caller through the auth provider.
///
/// `Ok(None)` when no credentials were presented or the provider no longer
/// accepts them.
pub async fn resolve_context(
    auth: &dyn AuthProvider,
    headers: &HeaderMap,
    cookies: &Cookies,
) -> Result<Option<RequestContext>> {
    let Some((access_token, source)) = presented_token(headers, cookies) else {
        tracing::debug!("🔐 No credentials presented");
        return Ok(None);
    };

    match auth.get_user(&access_token).await? {
        Some(user) => {
            tracing::debug!("✅ Authenticated {} via {:?}", user.id, source);
            Ok(Some(RequestContext {
                user,
                access_token,
                source,
            }))
        }
        None => {
            tracing::warn!("❌ Auth provider rejected {:?} credentials", source);
            Ok(None)
        }
    }
}

pub async fn sign_in(auth: &dyn AuthProvider, input: &SignInInput) -> Result<AuthSession> {
    let session = auth.sign_in(&input.credentials()).await?;
    tracing::info!("✅ User signed in: {}", session.user.id);
    Ok(session)
}

/// Registers a user. `None` when the provider wants the address confirmed first.
pub async fn sign_up(auth: &dyn AuthProvider, input: &SignUpInput) -> Result<Option<AuthSession>> {
    let session = auth.sign_up(&input.credentials()).await?;
    match &session {
        Some(session) => tracing::info!("✅ User registered: {}", session.user.id),
        None => tracing::info!("📧 User registered, confirmation pending"),
    }
    Ok(session)
}

/// Invalidates the presented session. Provider failures are logged, never surfaced:
/// the local cookies are cleared either way.
pub async fn sign_out(auth: &dyn AuthProvider, token: Option<&AccessToken>) {
    let Some(token) = token else {
        return;
    };

    match auth.sign_out(token).await {
        Ok(()) => tracing::info!("👋 Session signed out"),
        Err(e) => tracing::warn!("⚠️ Sign-out at provider failed: {}", e),
    }
}

/// Creates the HttpOnly access-token cookie.
pub fn access_token_cookie(token: &AccessToken, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, token.as_str().to_string());
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs.max(0)));
    cookie.set_path("/");
    cookie
}

/// Stores a fresh session in the browser and rotates the CSRF token.
pub fn start_browser_session(cookies: &Cookies, session: &AuthSession, secure: bool) {
    cookies.add(access_token_cookie(
        &session.access_token,
        session.expires_in,
        secure,
    ));
    cookies.add(csrf_cookie(generate_csrf_token(), secure));
}

/// Removes the session cookies.
pub fn end_browser_session(cookies: &Cookies) {
    for name in [ACCESS_TOKEN_COOKIE, CSRF_COOKIE] {
        let mut cookie = Cookie::new(name, "");
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_tokens_are_parsed_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc.def"));
        assert_eq!(bearer_token(&headers).map(|t| t.as_str().to_string()).as_deref(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn access_cookie_is_http_only_with_token_lifetime() {
        let cookie = access_token_cookie(&AccessToken::new("t"), 3600, false);
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));
    }
}
