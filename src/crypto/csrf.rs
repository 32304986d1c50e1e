use subtle::ConstantTimeEq;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};

use crate::crypto::token::random_token;

/// Cookie carrying the double-submit CSRF token.
pub const CSRF_COOKIE: &str = "csrf_token";
/// Header API callers echo the token in.
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Hidden form field HTML forms echo the token in.
pub const CSRF_FIELD: &str = "_csrf";

/// Generates a new random CSRF token.
pub fn generate_csrf_token() -> String {
    random_token()
}

/// Builds the CSRF cookie. Readable by scripts so they can echo it.
pub fn csrf_cookie(token: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(CSRF_COOKIE, token);
    cookie.set_http_only(false);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie
}

/// Returns the current CSRF token, issuing a fresh cookie when there is none.
pub fn ensure_csrf_token(cookies: &Cookies, secure: bool) -> String {
    if let Some(existing) = cookies.get(CSRF_COOKIE) {
        if !existing.value().is_empty() {
            return existing.value().to_string();
        }
    }

    let token = generate_csrf_token();
    cookies.add(csrf_cookie(token.clone(), secure));
    tracing::debug!("🔐 Issued new CSRF cookie");
    token
}

/// Compares the cookie token with the submitted one in constant time.
pub fn tokens_match(cookie_token: &str, submitted: &str) -> bool {
    if cookie_token.is_empty() || submitted.is_empty() {
        return false;
    }
    cookie_token.as_bytes().ct_eq(submitted.as_bytes()).into()
}

/// Checks a submitted token against the request's CSRF cookie.
pub fn verify_submitted(cookies: &Cookies, submitted: Option<&str>) -> bool {
    match (cookies.get(CSRF_COOKIE), submitted) {
        (Some(cookie), Some(submitted)) => tokens_match(cookie.value(), submitted),
        _ => false,
    }
}
