//! Typed client for the REST surface, with per-key caching.
//!
//! [`EntityHooks`] mirrors what a page needs from one entity: a cached list
//! and cached single rows that only change on an explicit refresh, plus
//! mutations that report failures with the server's own message.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::csrf::CSRF_HEADER;
use crate::entities::Entity;
use crate::models::record::Record;
use crate::models::session::AccessToken;

pub const FETCH_FAILED: &str = "Failed to fetch";
pub const CREATE_FAILED: &str = "Failed to create";
pub const UPDATE_FAILED: &str = "Failed to update";
pub const DELETE_FAILED: &str = "Failed to delete";

/// A rejected client operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    /// HTTP status, `None` when the request never got an answer.
    pub status: Option<u16>,
    /// The server's `message`, or the operation's generic fallback.
    pub message: String,
}

impl ClientError {
    fn transport(fallback: &str, err: reqwest::Error) -> Self {
        tracing::debug!("❌ Request failed before a response: {}", err);
        Self {
            status: None,
            message: fallback.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: Option<String>,
}

#[derive(Serialize)]
struct SignInBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SignInData {
    access_token: String,
}

/// HTTP client for the `/api` surface.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer: Option<AccessToken>,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    /// Uses a preconfigured client, e.g. one with a cookie store.
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: None,
            csrf_token: None,
        }
    }

    /// Authenticates every request with a bearer token.
    pub fn with_bearer(mut self, token: AccessToken) -> Self {
        self.bearer = Some(token);
        self
    }

    /// Echoes a CSRF token on every request, for cookie sessions.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Exchanges credentials for a bearer-authenticated client.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<ApiClient, ClientError> {
        let session: SignInData = self
            .send(
                Method::POST,
                "/api/auth/login",
                Some(&SignInBody { email, password }),
                "Failed to sign in",
            )
            .await?;
        Ok(self.clone().with_bearer(AccessToken::new(session.access_token)))
    }

    /// Sends a request and unwraps the `{"data": ...}` envelope.
    pub async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        fallback: &str,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));

        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token.as_str());
        }
        if let Some(csrf) = &self.csrf_token {
            request = request.header(CSRF_HEADER, csrf);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::transport(fallback, e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(fallback, e))?;

        if !status.is_success() {
            return Err(error_from_body(status, &bytes, fallback));
        }

        sonic_rs::from_slice::<Envelope<T>>(&bytes)
            .map(|envelope| envelope.data)
            .map_err(|e| {
                tracing::debug!("❌ Unexpected response body: {}", e);
                ClientError {
                    status: Some(status.as_u16()),
                    message: fallback.to_string(),
                }
            })
    }
}

/// Error for a non-success response: the body's `message`, else `fallback`.
pub fn error_from_body(status: StatusCode, body: &[u8], fallback: &str) -> ClientError {
    let message = sonic_rs::from_slice::<ErrorMessage>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    ClientError {
        status: Some(status.as_u16()),
        message,
    }
}

#[derive(Clone)]
enum Cached {
    List(Vec<Record>),
    One(Record),
}

/// Counts an in-flight operation for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Data access for one entity over [`ApiClient`].
pub struct EntityHooks<E: Entity> {
    client: ApiClient,
    cache: Mutex<HashMap<String, Cached>>,
    fetching: AtomicUsize,
    mutating: AtomicUsize,
    _entity: PhantomData<E>,
}

impl<E: Entity> EntityHooks<E> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
            fetching: AtomicUsize::new(0),
            mutating: AtomicUsize::new(0),
            _entity: PhantomData,
        }
    }

    fn collection_path() -> String {
        format!("/api/{}", E::TABLE)
    }

    fn item_path(id: Uuid) -> String {
        format!("/api/{}/{}", E::TABLE, id)
    }

    fn cached(&self, key: &str) -> Option<Cached> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: String, value: Cached) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn invalidate(&self, key: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Whether a list or single-row fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.fetching.load(Ordering::SeqCst) > 0
    }

    /// Whether a create, update or delete is in flight.
    pub fn is_mutating(&self) -> bool {
        self.mutating.load(Ordering::SeqCst) > 0
    }

    /// The caller's rows, newest first. Served from cache after the first fetch.
    pub async fn list(&self) -> Result<Vec<Record>, ClientError> {
        let key = Self::collection_path();
        if let Some(Cached::List(records)) = self.cached(&key) {
            return Ok(records);
        }

        let _loading = InFlight::start(&self.fetching);
        let records: Vec<Record> = self
            .client
            .send::<(), _>(Method::GET, &key, None, FETCH_FAILED)
            .await?;
        self.store(key, Cached::List(records.clone()));
        Ok(records)
    }

    /// Drops the cached list and fetches it again.
    pub async fn refresh(&self) -> Result<Vec<Record>, ClientError> {
        self.invalidate(&Self::collection_path());
        self.list().await
    }

    /// One row. With no id, resolves to `None` without a request.
    pub async fn get(&self, id: Option<Uuid>) -> Result<Option<Record>, ClientError> {
        let Some(id) = id else {
            return Ok(None);
        };

        let key = Self::item_path(id);
        if let Some(Cached::One(record)) = self.cached(&key) {
            return Ok(Some(record));
        }

        let _loading = InFlight::start(&self.fetching);
        let record: Record = self
            .client
            .send::<(), _>(Method::GET, &key, None, FETCH_FAILED)
            .await?;
        self.store(key, Cached::One(record.clone()));
        Ok(Some(record))
    }

    /// Drops one cached row and fetches it again.
    pub async fn refresh_one(&self, id: Uuid) -> Result<Option<Record>, ClientError> {
        self.invalidate(&Self::item_path(id));
        self.get(Some(id)).await
    }

    /// Creates a row. Cached data is left as is until refreshed.
    pub async fn create(&self, payload: &E::Create) -> Result<Record, ClientError> {
        let _mutating = InFlight::start(&self.mutating);
        self.client
            .send(Method::POST, &Self::collection_path(), Some(payload), CREATE_FAILED)
            .await
    }

    pub async fn update(&self, id: Uuid, patch: &E::Update) -> Result<Record, ClientError> {
        let _mutating = InFlight::start(&self.mutating);
        self.client
            .send(Method::PATCH, &Self::item_path(id), Some(patch), UPDATE_FAILED)
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<Record, ClientError> {
        let _mutating = InFlight::start(&self.mutating);
        self.client
            .send::<(), _>(Method::DELETE, &Self::item_path(id), None, DELETE_FAILED)
            .await
    }
}
