use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::Result;
use crate::models::session::{AccessToken, AuthSession};
use crate::models::user::AuthUser;

/// A row as exchanged with the store: a JSON object keyed by column.
pub type Document = Map<String, Value>;

/// An equality predicate on a uuid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Uuid,
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

/// A table-scoped query: equality filters combined with AND, plus ordering.
///
/// Column and table names are `'static` so they can only come from entity
/// descriptors, never from request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: &'static str,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn eq(mut self, column: &'static str, value: Uuid) -> Self {
        self.filters.push(Filter { column, value });
        self
    }

    pub fn order(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = Some(Order { column, ascending });
        self
    }

    /// Whether a document satisfies every filter.
    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|filter| {
            document
                .get(filter.column)
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())
                == Some(filter.value)
        })
    }
}

/// Email and password as submitted to the auth provider.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: Zeroizing<String>,
}

/// Table-scoped row access on the backend-as-a-service.
///
/// Implementations apply the filters they are given and nothing else; owner
/// scoping is added by `repositories::owned`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching the query, in the requested order.
    async fn select(&self, token: &AccessToken, query: &Query) -> Result<Vec<Document>>;

    /// Inserts one row and returns it as stored.
    async fn insert(&self, token: &AccessToken, table: &'static str, row: Document) -> Result<Document>;

    /// Applies `patch` to every matching row and returns the updated rows.
    async fn update(&self, token: &AccessToken, query: &Query, patch: Document) -> Result<Vec<Document>>;

    /// Deletes every matching row and returns the deleted rows.
    async fn delete(&self, token: &AccessToken, query: &Query) -> Result<Vec<Document>>;

    /// Exact number of matching rows.
    async fn count(&self, token: &AccessToken, query: &Query) -> Result<u64>;

    /// Exactly one matching row, or `None`.
    async fn single(&self, token: &AccessToken, query: &Query) -> Result<Option<Document>> {
        let mut rows = self.select(token, query).await?;
        if rows.len() == 1 {
            Ok(rows.pop())
        } else {
            Ok(None)
        }
    }
}

/// Session lookup and credential exchange on the backend-as-a-service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The user behind a token, `None` when the token is unknown or expired.
    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>>;

    /// Exchanges credentials for a session.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession>;

    /// Registers a user. `None` when the provider requires confirmation first.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<AuthSession>>;

    /// Invalidates a session.
    async fn sign_out(&self, token: &AccessToken) -> Result<()>;
}
