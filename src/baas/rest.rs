//! Supabase-compatible HTTP backend.
//!
//! Auth calls go to `{base}/auth/v1`, row calls to `{base}/rest/v1/{table}`
//! using PostgREST's query syntax (`column=eq.value`, `order=column.desc`).
//! The caller's access token is forwarded on row calls so the backend's
//! row-level policies apply in addition to the service's own owner filter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroizing;

use crate::baas::{AuthProvider, Credentials, Document, Query, Store};
use crate::error::{AppError, Result};
use crate::models::session::{AccessToken, AuthSession};
use crate::models::user::AuthUser;

/// Token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Client for a hosted auth + PostgREST backend.
#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: Zeroizing<String>,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    user: AuthUser,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        AuthSession {
            access_token: AccessToken::new(token.access_token),
            expires_in: token.expires_in,
            user: token.user,
        }
    }
}

impl RestBackend {
    /// Creates a client with the given per-request timeout.
    pub fn new(base_url: &str, anon_key: Zeroizing<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    fn rows_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: String, token: Option<&AccessToken>) -> RequestBuilder {
        let bearer = token.map_or(self.anon_key.as_str(), AccessToken::as_str);
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer)
    }

    fn rows_request(&self, method: Method, token: &AccessToken, query: &Query) -> RequestBuilder {
        self.request(method, self.rows_url(query.table), Some(token))
            .query(&filter_params(query))
    }
}

/// PostgREST filter parameters for a query.
pub fn filter_params(query: &Query) -> Vec<(String, String)> {
    query
        .filters
        .iter()
        .map(|filter| (filter.column.to_string(), format!("eq.{}", filter.value)))
        .collect()
}

/// PostgREST `order` parameter value for a query, if it is ordered.
pub fn order_param(query: &Query) -> Option<String> {
    query.order.map(|order| {
        format!(
            "{}.{}",
            order.column,
            if order.ascending { "asc" } else { "desc" }
        )
    })
}

/// Total row count from a `Content-Range` header such as `0-24/25` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Best-effort human message from an upstream error body.
async fn upstream_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| body.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(text)
}

async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::warn!("❌ Backend rejected the access token ({})", status);
        return Err(AppError::Unauthorized);
    }

    Err(AppError::UpstreamStatus {
        status: status.as_u16(),
        message: upstream_message(response).await,
    })
}

#[async_trait]
impl Store for RestBackend {
    async fn select(&self, token: &AccessToken, query: &Query) -> Result<Vec<Document>> {
        let mut request = self
            .rows_request(Method::GET, token, query)
            .query(&[("select", "*")]);
        if let Some(order) = order_param(query) {
            request = request.query(&[("order", order)]);
        }

        let response = expect_success(request.send().await?).await?;
        Ok(response.json::<Vec<Document>>().await?)
    }

    async fn insert(&self, token: &AccessToken, table: &'static str, row: Document) -> Result<Document> {
        let response = self
            .request(Method::POST, self.rows_url(table), Some(token))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;

        let mut rows = expect_success(response).await?.json::<Vec<Document>>().await?;
        rows.pop()
            .ok_or_else(|| AppError::Internal(format!("Insert into {} returned no row", table)))
    }

    async fn update(&self, token: &AccessToken, query: &Query, patch: Document) -> Result<Vec<Document>> {
        let response = self
            .rows_request(Method::PATCH, token, query)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        Ok(expect_success(response).await?.json::<Vec<Document>>().await?)
    }

    async fn delete(&self, token: &AccessToken, query: &Query) -> Result<Vec<Document>> {
        let response = self
            .rows_request(Method::DELETE, token, query)
            .header("Prefer", "return=representation")
            .send()
            .await?;

        Ok(expect_success(response).await?.json::<Vec<Document>>().await?)
    }

    async fn count(&self, token: &AccessToken, query: &Query) -> Result<u64> {
        let response = self
            .rows_request(Method::HEAD, token, query)
            .query(&[("select", "*")])
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let response = expect_success(response).await?;
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| AppError::Internal("Count response without Content-Range".to_string()))
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>> {
        let response = self
            .request(Method::GET, self.auth_url("user"), Some(token))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!("Auth provider does not recognise the token");
                Ok(None)
            }
            _ => {
                let response = expect_success(response).await?;
                Ok(Some(response.json::<AuthUser>().await?))
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession> {
        let response = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant {
                email: &credentials.email,
                password: credentials.password.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AppError::Authentication(upstream_message(response).await));
        }

        let token = expect_success(response).await?.json::<TokenResponse>().await?;
        Ok(token.into())
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<AuthSession>> {
        let response = self
            .request(Method::POST, self.auth_url("signup"), None)
            .json(&PasswordGrant {
                email: &credentials.email,
                password: credentials.password.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AppError::Validation(upstream_message(response).await));
        }

        let body = expect_success(response).await?.json::<Value>().await?;
        if body.get("access_token").is_none() {
            tracing::info!("📧 Sign-up accepted, confirmation pending");
            return Ok(None);
        }

        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Internal(format!("Malformed sign-up session: {}", e)))?;
        Ok(Some(token.into()))
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<()> {
        let response = self
            .request(Method::POST, self.auth_url("logout"), Some(token))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            _ => expect_success(response).await.map(|_| ()),
        }
    }
}
