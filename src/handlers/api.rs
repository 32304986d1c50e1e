use axum::{
    Extension, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::get,
};
use uuid::Uuid;

use crate::{
    entities::Entity,
    error::{AppError, Result},
    models::session::RequestContext,
    repositories::owned::OwnedRepository,
    response::data_response,
    state::AppState,
    validation::payload::EntityJson,
};

/// Path ids that do not parse are reported like any other missing row.
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

/// Lists the caller's rows, newest first.
pub async fn list<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response> {
    let records = OwnedRepository::<E>::new(state.store.as_ref(), &ctx).list().await?;
    data_response(StatusCode::OK, &records)
}

/// Creates a row owned by the caller.
pub async fn create<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    EntityJson(payload): EntityJson<E::Create>,
) -> Result<Response> {
    let record = OwnedRepository::<E>::new(state.store.as_ref(), &ctx)
        .create(&payload)
        .await?;
    data_response(StatusCode::CREATED, &record)
}

pub async fn get_one<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let record = OwnedRepository::<E>::new(state.store.as_ref(), &ctx).find(id).await?;
    data_response(StatusCode::OK, &record)
}

/// Partially updates one of the caller's rows.
pub async fn update<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    EntityJson(patch): EntityJson<E::Update>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let record = OwnedRepository::<E>::new(state.store.as_ref(), &ctx)
        .update(id, &patch)
        .await?;
    data_response(StatusCode::OK, &record)
}

/// Deletes one of the caller's rows and echoes it back.
pub async fn delete<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let record = OwnedRepository::<E>::new(state.store.as_ref(), &ctx).delete(id).await?;
    data_response(StatusCode::OK, &record)
}

/// `/api/<table>` and `/api/<table>/{id}` for one entity.
pub fn entity_routes<E: Entity>() -> Router<AppState> {
    let collection = format!("/api/{}", E::TABLE);
    let item = format!("/api/{}/{{id}}", E::TABLE);

    Router::new()
        .route(&collection, get(list::<E>).post(create::<E>))
        .route(
            &item,
            get(get_one::<E>).patch(update::<E>).delete(delete::<E>),
        )
}
