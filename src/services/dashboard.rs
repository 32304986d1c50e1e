use futures::future::try_join_all;

use crate::baas::Store;
use crate::entities::{ALL, EntityDescriptor};
use crate::error::Result;
use crate::models::session::RequestContext;
use crate::repositories::owned::count_owned;

/// One dashboard tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCount {
    pub entity: EntityDescriptor,
    pub count: u64,
}

/// The caller's row count for every entity, in navigation order.
pub async fn entity_counts(store: &dyn Store, ctx: &RequestContext) -> Result<Vec<EntityCount>> {
    let counts = try_join_all(ALL.iter().map(|entity| async move {
        let count = count_owned(store, ctx, entity.table).await?;
        Ok::<_, crate::error::AppError>(EntityCount {
            entity: *entity,
            count,
        })
    }))
    .await?;

    tracing::debug!("📊 Dashboard counts loaded for {}", ctx.user.id);
    Ok(counts)
}
