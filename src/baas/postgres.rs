//! Row store talking to the backing Postgres database directly.
//!
//! Rows are exchanged as JSON: reads use `to_jsonb(t.*)`, writes go through
//! `jsonb_populate_record` so column types come from the table definition
//! rather than from this service.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde_json::Value;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use crate::baas::{Document, Query, Store};
use crate::error::{AppError, Result};
use crate::models::session::AccessToken;

/// A store backed by a deadpool-postgres pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Quotes an identifier after checking it is a plain lowercase name.
pub fn ident(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(format!("\"{}\"", name))
    } else {
        Err(AppError::Internal(format!("Invalid identifier: {:?}", name)))
    }
}

/// `WHERE` clause for the query's filters, numbering parameters from `first`.
fn where_clause(query: &Query, first: usize) -> Result<String> {
    if query.filters.is_empty() {
        return Ok(String::new());
    }

    let predicates = query
        .filters
        .iter()
        .enumerate()
        .map(|(i, filter)| Ok(format!("t.{} = ${}", ident(filter.column)?, first + i)))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(" WHERE {}", predicates.join(" AND ")))
}

pub fn select_sql(query: &Query) -> Result<String> {
    let mut sql = format!(
        "SELECT to_jsonb(t.*) AS row FROM {} AS t{}",
        ident(query.table)?,
        where_clause(query, 1)?
    );
    if let Some(order) = query.order {
        sql.push_str(&format!(
            " ORDER BY t.{} {}",
            ident(order.column)?,
            if order.ascending { "ASC" } else { "DESC" }
        ));
    }
    Ok(sql)
}

pub fn count_sql(query: &Query) -> Result<String> {
    Ok(format!(
        "SELECT COUNT(*) AS total FROM {} AS t{}",
        ident(query.table)?,
        where_clause(query, 1)?
    ))
}

pub fn insert_sql(table: &str, columns: &[&str]) -> Result<String> {
    let table = ident(table)?;
    let columns = columns
        .iter()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "INSERT INTO {table} AS t ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING to_jsonb(t.*) AS row"
    ))
}

/// The patch travels as `$1`; filters follow from `$2`.
pub fn update_sql(query: &Query, columns: &[&str]) -> Result<String> {
    let table = ident(query.table)?;
    let assignments = columns
        .iter()
        .map(|c| {
            let column = ident(c)?;
            Ok(format!(
                "{column} = (jsonb_populate_record(NULL::{table}, $1)).{column}"
            ))
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "UPDATE {table} AS t SET {assignments}{} RETURNING to_jsonb(t.*) AS row",
        where_clause(query, 2)?
    ))
}

pub fn delete_sql(query: &Query) -> Result<String> {
    Ok(format!(
        "DELETE FROM {} AS t{} RETURNING to_jsonb(t.*) AS row",
        ident(query.table)?,
        where_clause(query, 1)?
    ))
}

fn filter_values(query: &Query) -> Vec<Uuid> {
    query.filters.iter().map(|filter| filter.value).collect()
}

fn into_documents(rows: Vec<tokio_postgres::Row>) -> Result<Vec<Document>> {
    rows.iter()
        .map(|row| match row.try_get::<_, Value>("row")? {
            Value::Object(document) => Ok(document),
            other => Err(AppError::Internal(format!(
                "Expected a JSON object row, got {}",
                other
            ))),
        })
        .collect()
}

#[async_trait]
impl Store for PostgresStore {
    async fn select(&self, _token: &AccessToken, query: &Query) -> Result<Vec<Document>> {
        let sql = select_sql(query)?;
        let values = filter_values(query);
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(&sql).await?;
        into_documents(client.query(&statement, &params).await?)
    }

    async fn insert(&self, _token: &AccessToken, table: &'static str, row: Document) -> Result<Document> {
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let sql = insert_sql(table, &columns)?;
        let payload = Value::Object(row.clone());

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(&sql).await?;
        let rows = client.query(&statement, &[&payload]).await?;

        into_documents(rows)?
            .pop()
            .ok_or_else(|| AppError::Internal(format!("Insert into {} returned no row", table)))
    }

    async fn update(&self, token: &AccessToken, query: &Query, patch: Document) -> Result<Vec<Document>> {
        if patch.is_empty() {
            return self.select(token, query).await;
        }

        let columns: Vec<&str> = patch.keys().map(String::as_str).collect();
        let sql = update_sql(query, &columns)?;
        let payload = Value::Object(patch.clone());
        let values = filter_values(query);

        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&payload];
        params.extend(values.iter().map(|v| v as &(dyn ToSql + Sync)));

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(&sql).await?;
        into_documents(client.query(&statement, &params).await?)
    }

    async fn delete(&self, _token: &AccessToken, query: &Query) -> Result<Vec<Document>> {
        let sql = delete_sql(query)?;
        let values = filter_values(query);
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(&sql).await?;
        into_documents(client.query(&statement, &params).await?)
    }

    async fn count(&self, _token: &AccessToken, query: &Query) -> Result<u64> {
        let sql = count_sql(query)?;
        let values = filter_values(query);
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        let client = self.pool.get().await?;
        let statement = client.prepare_cached(&sql).await?;
        let row = client.query_one(&statement, &params).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }
}
