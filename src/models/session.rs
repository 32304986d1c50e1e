use std::fmt;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::models::user::AuthUser;

/// An access token issued by the auth provider.
///
/// Wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// How the caller presented its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `Authorization: Bearer ...`. Not subject to CSRF checks.
    Bearer,
    /// The access-token cookie set at login.
    Cookie,
}

/// The authenticated principal for one request.
///
/// Inserted into the request extensions by the auth middleware and threaded
/// explicitly into every repository call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The caller.
    pub user: AuthUser,
    /// The caller's token, forwarded to the backend so its row-level policies apply too.
    pub access_token: AccessToken,
    /// Where the token came from.
    pub source: CredentialSource,
}

/// A session returned by a successful sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: AccessToken,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    pub user: AuthUser,
}

/// The JSON view of a session handed back to API callers.
#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    pub user: &'a AuthUser,
    pub access_token: &'a str,
    pub expires_in: i64,
}

impl AuthSession {
    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            user: &self.user,
            access_token: self.access_token.as_str(),
            expires_in: self.expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_redacted_in_debug_output() {
        let token = AccessToken::new("secret-value");
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
        assert_eq!(token.as_str(), "secret-value");
    }
}
