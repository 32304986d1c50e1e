//! In-process store and auth provider.
//!
//! Used for local development (`STORE_BACKEND=memory`) and by the test
//! suites. Semantics follow the hosted backend: filters are ANDed equality
//! checks, ordering is applied after filtering, deletes return what they
//! removed.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::baas::{AuthProvider, Credentials, Document, Query, Store};
use crate::crypto::token::{random_salt, random_token};
use crate::error::{AppError, Result};
use crate::models::session::{AccessToken, AuthSession};
use crate::models::user::AuthUser;

/// Lifetime of tokens issued by [`MemoryAuth`].
pub const MEMORY_TOKEN_TTL_SECS: i64 = 3600;

/// A store holding every table in a map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<&'static str, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows in a table regardless of owner.
    pub async fn row_count(&self, table: &'static str) -> usize {
        self.tables.read().await.get(table).map_or(0, Vec::len)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, _token: &AccessToken, query: &Query) -> Result<Vec<Document>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Document> = tables
            .get(query.table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(order.column), b.get(order.column));
                if order.ascending { ordering } else { ordering.reverse() }
            });
        }

        Ok(rows)
    }

    async fn insert(&self, _token: &AccessToken, table: &'static str, row: Document) -> Result<Document> {
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, _token: &AccessToken, query: &Query, patch: Document) -> Result<Vec<Document>> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(query.table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, _token: &AccessToken, query: &Query) -> Result<Vec<Document>> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(query.table) else {
            return Ok(Vec::new());
        };

        let (removed, kept): (Vec<Document>, Vec<Document>) =
            rows.drain(..).partition(|row| query.matches(row));
        *rows = kept;
        Ok(removed)
    }

    async fn count(&self, _token: &AccessToken, query: &Query) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(query.table)
            .map_or(0, |rows| rows.iter().filter(|row| query.matches(row)).count() as u64))
    }
}

struct StoredUser {
    user: AuthUser,
    password_hash: String,
}

struct IssuedToken {
    user: AuthUser,
    expires_at: DateTime<Utc>,
}

/// An auth provider keeping users and issued tokens in memory.
///
/// Tokens stop resolving once their lifetime has passed; expired entries are
/// dropped when they are looked up or when a new token is issued.
#[derive(Clone)]
pub struct MemoryAuth {
    users: Arc<RwLock<HashMap<String, StoredUser>>>,
    sessions: Arc<RwLock<HashMap<String, IssuedToken>>>,
    token_ttl_secs: i64,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::with_token_ttl(MEMORY_TOKEN_TTL_SECS)
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose tokens live for `secs` seconds.
    pub fn with_token_ttl(secs: i64) -> Self {
        Self {
            users: Arc::default(),
            sessions: Arc::default(),
            token_ttl_secs: secs,
        }
    }

    async fn issue_session(&self, user: AuthUser) -> AuthSession {
        let token = random_token();
        let now = Utc::now();
        let issued = IssuedToken {
            user: user.clone(),
            expires_at: now + TimeDelta::seconds(self.token_ttl_secs),
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, issued| issued.expires_at > now);
        sessions.insert(token.clone(), issued);

        AuthSession {
            access_token: AccessToken::new(token),
            expires_in: self.token_ttl_secs,
            user,
        }
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&random_salt())
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>> {
        let lookup = {
            let sessions = self.sessions.read().await;
            sessions
                .get(token.as_str())
                .map(|issued| (issued.expires_at > Utc::now(), issued.user.clone()))
        };

        match lookup {
            Some((true, user)) => Ok(Some(user)),
            Some((false, _)) => {
                self.sessions.write().await.remove(token.as_str());
                tracing::debug!("⏰ Memory auth token expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession> {
        let email = normalize_email(&credentials.email);
        let user = {
            let users = self.users.read().await;
            let stored = users
                .get(&email)
                .ok_or_else(|| AppError::Authentication("Invalid login credentials".to_string()))?;

            if !verify_password(credentials.password.as_str(), &stored.password_hash)? {
                return Err(AppError::Authentication(
                    "Invalid login credentials".to_string(),
                ));
            }
            stored.user.clone()
        };

        tracing::debug!("✅ Memory auth signed in user: {}", user.id);
        Ok(self.issue_session(user).await)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<AuthSession>> {
        let email = normalize_email(&credentials.email);
        let password_hash = hash_password(credentials.password.as_str())?;

        let user = {
            let mut users = self.users.write().await;
            if users.contains_key(&email) {
                return Err(AppError::Validation("User already registered".to_string()));
            }
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: Some(email.clone()),
            };
            users.insert(
                email,
                StoredUser {
                    user: user.clone(),
                    password_hash,
                },
            );
            user
        };

        tracing::info!("✅ Memory auth registered user: {}", user.id);
        Ok(Some(self.issue_session(user).await))
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<()> {
        self.sessions.write().await.remove(token.as_str());
        Ok(())
    }
}
