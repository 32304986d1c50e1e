use std::marker::PhantomData;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::baas::{Document, Query, Store};
use crate::entities::Entity;
use crate::error::{AppError, Result};
use crate::models::record::{RESERVED_COLUMNS, Record};
use crate::models::session::RequestContext;

const OWNER_COLUMN: &str = "user_id";

/// The caller's rows of one entity.
///
/// Every query built here starts from `user_id = caller`, so a row owned by
/// someone else is indistinguishable from a missing one.
pub struct OwnedRepository<'a, E: Entity> {
    store: &'a dyn Store,
    ctx: &'a RequestContext,
    _entity: PhantomData<E>,
}

/// Rows of `table` owned by the caller.
pub fn owned_query(table: &'static str, ctx: &RequestContext) -> Query {
    Query::from(table).eq(OWNER_COLUMN, ctx.user.id)
}

/// Number of rows of `table` owned by the caller.
pub async fn count_owned(store: &dyn Store, ctx: &RequestContext, table: &'static str) -> Result<u64> {
    store.count(&ctx.access_token, &owned_query(table, ctx)).await
}

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Serializes a payload into a document, dropping service-owned columns.
fn payload_document<T: Serialize>(payload: &T) -> Result<Document> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(mut document)) => {
            for column in RESERVED_COLUMNS {
                document.remove(column);
            }
            Ok(document)
        }
        Ok(other) => Err(AppError::Internal(format!(
            "Payload serialized to a non-object: {}",
            other
        ))),
        Err(e) => Err(AppError::Internal(format!("Payload serialization failed: {}", e))),
    }
}

impl<'a, E: Entity> OwnedRepository<'a, E> {
    pub fn new(store: &'a dyn Store, ctx: &'a RequestContext) -> Self {
        Self {
            store,
            ctx,
            _entity: PhantomData,
        }
    }

    fn scoped(&self) -> Query {
        owned_query(E::TABLE, self.ctx)
    }

    fn scoped_row(&self, id: Uuid) -> Query {
        self.scoped().eq("id", id)
    }

    /// The caller's rows, newest first.
    pub async fn list(&self) -> Result<Vec<Record>> {
        let query = self.scoped().order("created_at", false);
        let rows = self.store.select(&self.ctx.access_token, &query).await?;
        tracing::debug!("📋 Listed {} {} for {}", rows.len(), E::TABLE, self.ctx.user.id);
        rows.into_iter().map(Record::try_from).collect()
    }

    /// One of the caller's rows.
    pub async fn find(&self, id: Uuid) -> Result<Record> {
        self.store
            .single(&self.ctx.access_token, &self.scoped_row(id))
            .await?
            .ok_or(AppError::NotFound)
            .and_then(Record::try_from)
    }

    /// Inserts a row owned by the caller.
    pub async fn create(&self, payload: &E::Create) -> Result<Record> {
        let mut row = payload_document(payload)?;
        let now = timestamp();
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        row.insert(OWNER_COLUMN.to_string(), Value::String(self.ctx.user.id.to_string()));
        row.insert("created_at".to_string(), now.clone());
        row.insert("updated_at".to_string(), now);

        let stored = self.store.insert(&self.ctx.access_token, E::TABLE, row).await?;
        let record = Record::try_from(stored)?;
        tracing::info!("✅ Created {} {} for {}", E::LABEL, record.id, self.ctx.user.id);
        Ok(record)
    }

    /// Applies a partial update. An empty patch returns the row unchanged.
    pub async fn update(&self, id: Uuid, patch: &E::Update) -> Result<Record> {
        let mut changes = payload_document(patch)?;
        if changes.is_empty() {
            return self.find(id).await;
        }
        changes.insert("updated_at".to_string(), timestamp());

        let mut rows = self
            .store
            .update(&self.ctx.access_token, &self.scoped_row(id), changes)
            .await?;
        let record = rows.pop().ok_or(AppError::NotFound).and_then(Record::try_from)?;
        tracing::info!("✅ Updated {} {}", E::LABEL, record.id);
        Ok(record)
    }

    /// Deletes one of the caller's rows and returns it.
    pub async fn delete(&self, id: Uuid) -> Result<Record> {
        let mut rows = self
            .store
            .delete(&self.ctx.access_token, &self.scoped_row(id))
            .await?;
        let record = rows.pop().ok_or(AppError::NotFound).and_then(Record::try_from)?;
        tracing::info!("🗑️ Deleted {} {}", E::LABEL, record.id);
        Ok(record)
    }

    pub async fn count(&self) -> Result<u64> {
        count_owned(self.store, self.ctx, E::TABLE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baas::memory::MemoryStore;
    use crate::entities::server::{CreateServer, Server, UpdateServer};
    use crate::models::session::{AccessToken, CredentialSource};
    use crate::models::user::AuthUser;

    fn ctx() -> RequestContext {
        RequestContext {
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
            },
            access_token: AccessToken::new("token"),
            source: CredentialSource::Bearer,
        }
    }

    fn named(name: &str) -> CreateServer {
        CreateServer {
            name: Some(name.to_string()),
            description: None,
        }
    }

    #[tokio::test]
    async fn rows_of_other_owners_are_invisible() {
        let store = MemoryStore::new();
        let alice = ctx();
        let bob = ctx();

        let alices = OwnedRepository::<Server>::new(&store, &alice);
        let bobs = OwnedRepository::<Server>::new(&store, &bob);

        let record = alices.create(&named("Alpha")).await.unwrap();
        assert_eq!(record.user_id, alice.user.id);

        assert!(matches!(bobs.find(record.id).await, Err(AppError::NotFound)));
        assert!(matches!(
            bobs.update(record.id, &UpdateServer { name: Some("x".into()), description: None }).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(bobs.delete(record.id).await, Err(AppError::NotFound)));
        assert!(bobs.list().await.unwrap().is_empty());
        assert_eq!(bobs.count().await.unwrap(), 0);

        assert_eq!(alices.find(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn empty_patch_leaves_the_row_alone() {
        let store = MemoryStore::new();
        let owner = ctx();
        let repo = OwnedRepository::<Server>::new(&store, &owner);

        let record = repo.create(&named("Alpha")).await.unwrap();
        let unchanged = repo.update(record.id, &UpdateServer::default()).await.unwrap();
        assert_eq!(unchanged, record);

        let renamed = repo
            .update(record.id, &UpdateServer { name: Some("Beta".into()), description: None })
            .await
            .unwrap();
        assert_eq!(renamed.text("name").as_deref(), Some("Beta"));
        assert_eq!(renamed.created_at, record.created_at);
        assert!(renamed.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryStore::new();
        let owner = ctx();
        let repo = OwnedRepository::<Server>::new(&store, &owner);

        let first = repo.create(&named("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = repo.create(&named("second")).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn reserved_columns_are_stripped_from_payloads() {
        let document = payload_document(&serde_json::json!({
            "id": "x", "user_id": "y", "created_at": "z", "name": "kept"
        }))
        .unwrap();
        assert_eq!(document.len(), 1);
        assert_eq!(document["name"], "kept");
    }
}
