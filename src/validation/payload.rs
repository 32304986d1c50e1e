use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use garde::Validate;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::entities::FieldSpec;
use crate::error::{AppError, Result};

/// One schema violation: where it happened and what is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Dotted field path; empty for problems with the body as a whole.
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Flattens a garde report into field issues, in report order.
pub fn issues_from_report(report: &garde::Report) -> Vec<FieldIssue> {
    report
        .iter()
        .map(|(path, error)| FieldIssue::new(path.to_string(), error.message().to_string()))
        .collect()
}

/// Runs the schema over an already-deserialized value.
pub fn check<T>(value: T) -> Result<T>
where
    T: Validate<Context = ()>,
{
    match value.validate() {
        Ok(()) => Ok(value),
        Err(report) => Err(AppError::InvalidPayload(issues_from_report(&report))),
    }
}

fn parse_body(body: &[u8]) -> Result<Value> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    sonic_rs::from_slice(body).map_err(invalid_body)
}

/// Parses a JSON body and validates it. An empty body counts as `{}`.
pub fn parse_and_validate<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate<Context = ()>,
{
    validate_value(parse_body(body)?)
}

/// Like [`parse_and_validate`], but top-level strings are trimmed first, the
/// same as submitted entity forms.
pub fn parse_trimmed_and_validate<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate<Context = ()>,
{
    let mut value = parse_body(body)?;
    trim_strings(&mut value);
    validate_value(value)
}

/// Validates a JSON value, e.g. one assembled from a submitted form.
pub fn validate_value<T>(value: Value) -> Result<T>
where
    T: DeserializeOwned + Validate<Context = ()>,
{
    let value: T = serde_json::from_value(value).map_err(invalid_body)?;
    check(value)
}

fn invalid_body(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidPayload(vec![FieldIssue::new("", format!("Invalid JSON body: {}", e))])
}

fn trim_strings(value: &mut Value) {
    if let Value::Object(object) = value {
        for field in object.values_mut() {
            if let Value::String(text) = field {
                let trimmed = text.trim();
                if trimmed.len() != text.len() {
                    *text = trimmed.to_string();
                }
            }
        }
    }
}

/// What a submitted form is for. It decides what a blank input means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormIntent {
    /// Blank inputs are absent, so optional fields stay unset.
    Create,
    /// Blank inputs are sent as `""`, which clears an optional field and
    /// fails the length rule of a required one.
    Update,
}

/// Turns submitted form fields into a JSON object for the entity's schema.
///
/// Only declared fields are kept, and values are trimmed.
pub fn form_to_value(
    form: &HashMap<String, String>,
    fields: &[FieldSpec],
    intent: FormIntent,
) -> Value {
    let mut object = Map::new();
    for field in fields {
        if let Some(raw) = form.get(field.name) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() || intent == FormIntent::Update {
                object.insert(field.name.to_string(), Value::String(trimmed.to_string()));
            }
        }
    }
    Value::Object(object)
}

async fn body_bytes<S: Send + Sync>(req: Request, state: &S) -> Result<Bytes> {
    Bytes::from_request(req, state)
        .await
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// JSON body extractor that rejects with field-level 400s.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate<Context = ()>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let body = body_bytes(req, state).await?;
        parse_and_validate(&body).map(ValidatedJson)
    }
}

/// Entity payload extractor: [`ValidatedJson`] with trimmed strings.
pub struct EntityJson<T>(pub T);

impl<S, T> FromRequest<S> for EntityJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate<Context = ()>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let body = body_bytes(req, state).await?;
        parse_trimmed_and_validate(&body).map(EntityJson)
    }
}
