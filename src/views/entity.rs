use std::collections::HashMap;

use axum::{
    Extension, Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_cookies::Cookies;

use crate::{
    crypto::csrf::{CSRF_FIELD, ensure_csrf_token, verify_submitted},
    entities::{Entity, FieldKind},
    error::AppError,
    handlers::api::parse_id,
    models::{record::Record, session::RequestContext},
    repositories::owned::OwnedRepository,
    state::AppState,
    validation::payload::{FieldIssue, FormIntent, form_to_value, validate_value},
    views::layout::{csrf_input, error_banner, error_page, html_escape, html_response, not_found_page, page},
};

type FormData = HashMap<String, String>;

/// Title of a record in lists and headings.
pub fn record_title<E: Entity>(record: &Record) -> String {
    record
        .text(E::TITLE_FIELD)
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| {
            let id = record.id.to_string();
            format!("{} #{}", E::LABEL, &id[..8])
        })
}

fn list_path<E: Entity>() -> String {
    format!("/{}", E::TABLE)
}

fn detail_path<E: Entity>(record: &Record) -> String {
    format!("/{}/{}", E::TABLE, record.id)
}

fn timestamp(record: &Record) -> String {
    record.created_at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn render_list<E: Entity>(records: &[Record]) -> String {
    let mut body = format!(
        r#"<header><h1>{plural}</h1><a class="button" href="/{table}/new">New {label}</a></header>"#,
        plural = html_escape(E::LABEL_PLURAL),
        table = E::TABLE,
        label = html_escape(E::LABEL),
    );

    if records.is_empty() {
        body.push_str(&format!(
            r#"<section class="empty"><p>No {plural} yet.</p><a href="/{table}/new">Create your first {label}</a></section>"#,
            plural = html_escape(&E::LABEL_PLURAL.to_lowercase()),
            table = E::TABLE,
            label = html_escape(&E::LABEL.to_lowercase()),
        ));
        return body;
    }

    body.push_str(r#"<ul class="cards">"#);
    for record in records {
        body.push_str(&format!(
            r#"<li><a href="{href}">{title}</a><time datetime="{iso}">{when}</time></li>"#,
            href = detail_path::<E>(record),
            title = html_escape(&record_title::<E>(record)),
            iso = record.created_at.to_rfc3339(),
            when = timestamp(record),
        ));
    }
    body.push_str("</ul>");
    body
}

fn render_detail<E: Entity>(record: &Record, csrf: &str) -> String {
    let mut fields = String::from("<dl>");
    for field in E::FIELDS {
        let value = record.text(field.name).unwrap_or_default();
        fields.push_str(&format!(
            "<dt>{}</dt><dd>{}</dd>",
            html_escape(field.label),
            html_escape(&value)
        ));
    }
    fields.push_str(&format!("<dt>Created</dt><dd>{}</dd></dl>", timestamp(record)));

    format!(
        r#"<header><h1>{title}</h1><a class="button" href="{href}/edit">Edit</a></header>
{fields}
<form method="post" action="{href}/delete">{csrf}<button type="submit" class="danger">Delete</button></form>
<p><a href="{list}">Back to {plural}</a></p>"#,
        title = html_escape(&record_title::<E>(record)),
        href = detail_path::<E>(record),
        fields = fields,
        csrf = csrf_input(csrf),
        list = list_path::<E>(),
        plural = html_escape(&E::LABEL_PLURAL.to_lowercase()),
    )
}

fn render_form<E: Entity>(
    heading: &str,
    action: &str,
    values: &FormData,
    issues: &[FieldIssue],
    banner: Option<&str>,
    csrf: &str,
) -> String {
    let mut inputs = String::new();
    for field in E::FIELDS {
        let value = values.get(field.name).map(String::as_str).unwrap_or_default();
        let required = if field.required { " required" } else { "" };
        let control = match field.kind {
            FieldKind::LongText => format!(
                r#"<textarea id="{name}" name="{name}"{required}>{value}</textarea>"#,
                name = field.name,
                required = required,
                value = html_escape(value),
            ),
            FieldKind::Text | FieldKind::Email => format!(
                r#"<input id="{name}" name="{name}" type="{kind}" value="{value}"{required}>"#,
                name = field.name,
                kind = if field.kind == FieldKind::Email { "email" } else { "text" },
                value = html_escape(value),
                required = required,
            ),
        };

        let messages: String = issues
            .iter()
            .filter(|issue| issue.path == field.name)
            .map(|issue| format!(r#"<small class="error">{}</small>"#, html_escape(&issue.message)))
            .collect();

        inputs.push_str(&format!(
            r#"<label for="{name}">{label}</label>{control}{messages}"#,
            name = field.name,
            label = html_escape(field.label),
            control = control,
            messages = messages,
        ));
    }

    format!(
        r#"<h1>{heading}</h1>{banner}<form method="post" action="{action}">{csrf}{inputs}<button type="submit">Save</button></form>
<p><a href="{list}">Cancel</a></p>"#,
        heading = html_escape(heading),
        banner = error_banner(banner),
        action = action,
        csrf = csrf_input(csrf),
        inputs = inputs,
        list = list_path::<E>(),
    )
}

fn record_values<E: Entity>(record: &Record) -> FormData {
    E::FIELDS
        .iter()
        .filter_map(|field| record.text(field.name).map(|value| (field.name.to_string(), value)))
        .collect()
}

fn csrf_rejected() -> Response {
    tracing::warn!("❌ CSRF: form token missing or mismatched");
    error_page(&AppError::Forbidden("CSRF token missing or invalid".to_string()))
}

/// Lists the caller's rows, newest first, with an empty state.
pub async fn list_page<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    match OwnedRepository::<E>::new(state.store.as_ref(), &ctx).list().await {
        Ok(records) => html_response(
            StatusCode::OK,
            page(E::LABEL_PLURAL, Some(&ctx.user), &render_list::<E>(&records)),
        ),
        Err(e) => error_page(&e),
    }
}

pub async fn detail_page<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    Path(id): Path<String>,
) -> Response {
    let record = match parse_id(&id) {
        Ok(id) => OwnedRepository::<E>::new(state.store.as_ref(), &ctx).find(id).await,
        Err(e) => Err(e),
    };

    match record {
        Ok(record) => {
            let csrf = ensure_csrf_token(&cookies, state.config.production);
            let title = record_title::<E>(&record);
            html_response(
                StatusCode::OK,
                page(&title, Some(&ctx.user), &render_detail::<E>(&record, &csrf)),
            )
        }
        Err(AppError::NotFound) => not_found_page(Some(&ctx.user)),
        Err(e) => error_page(&e),
    }
}

pub async fn new_page<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
) -> Response {
    let csrf = ensure_csrf_token(&cookies, state.config.production);
    let heading = format!("New {}", E::LABEL);
    let action = format!("/{}/new", E::TABLE);
    let form = render_form::<E>(&heading, &action, &FormData::new(), &[], None, &csrf);
    html_response(StatusCode::OK, page(&heading, Some(&ctx.user), &form))
}

/// Creates a row from the new-record form, then returns to the list.
pub async fn create_submit<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    Form(form): Form<FormData>,
) -> Response {
    if !verify_submitted(&cookies, form.get(CSRF_FIELD).map(String::as_str)) {
        return csrf_rejected();
    }

    let submitted = form_to_value(&form, E::FIELDS, FormIntent::Create);
    let result = match validate_value::<E::Create>(submitted) {
        Ok(payload) => {
            OwnedRepository::<E>::new(state.store.as_ref(), &ctx)
                .create(&payload)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Redirect::to(&list_path::<E>()).into_response(),
        Err(e @ (AppError::InvalidPayload(_) | AppError::Validation(_))) => {
            let csrf = ensure_csrf_token(&cookies, state.config.production);
            let heading = format!("New {}", E::LABEL);
            let action = format!("/{}/new", E::TABLE);
            let body = rejected_form::<E>(&heading, &action, &form, &e, &csrf);
            html_response(StatusCode::BAD_REQUEST, page(&heading, Some(&ctx.user), &body))
        }
        Err(e) => error_page(&e),
    }
}

fn rejected_form<E: Entity>(heading: &str, action: &str, form: &FormData, err: &AppError, csrf: &str) -> String {
    match err {
        AppError::InvalidPayload(issues) => render_form::<E>(
            heading,
            action,
            form,
            issues,
            Some("Please fix the highlighted fields."),
            csrf,
        ),
        other => render_form::<E>(heading, action, form, &[], Some(&other.public_message()), csrf),
    }
}

pub async fn edit_page<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    Path(id): Path<String>,
) -> Response {
    let record = match parse_id(&id) {
        Ok(id) => OwnedRepository::<E>::new(state.store.as_ref(), &ctx).find(id).await,
        Err(e) => Err(e),
    };

    match record {
        Ok(record) => {
            let csrf = ensure_csrf_token(&cookies, state.config.production);
            let heading = format!("Edit {}", record_title::<E>(&record));
            let action = format!("{}/edit", detail_path::<E>(&record));
            let form = render_form::<E>(&heading, &action, &record_values::<E>(&record), &[], None, &csrf);
            html_response(StatusCode::OK, page(&heading, Some(&ctx.user), &form))
        }
        Err(AppError::NotFound) => not_found_page(Some(&ctx.user)),
        Err(e) => error_page(&e),
    }
}

/// Applies the edit form, then returns to the detail page.
///
/// Blank inputs count as absent and leave the stored value untouched.
pub async fn edit_submit<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    Path(id): Path<String>,
    Form(form): Form<FormData>,
) -> Response {
    if !verify_submitted(&cookies, form.get(CSRF_FIELD).map(String::as_str)) {
        return csrf_rejected();
    }

    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(_) => return not_found_page(Some(&ctx.user)),
    };

    let submitted = form_to_value(&form, E::FIELDS, FormIntent::Update);
    let result = match validate_value::<E::Update>(submitted) {
        Ok(patch) => {
            OwnedRepository::<E>::new(state.store.as_ref(), &ctx)
                .update(id, &patch)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(record) => Redirect::to(&detail_path::<E>(&record)).into_response(),
        Err(AppError::NotFound) => not_found_page(Some(&ctx.user)),
        Err(e @ (AppError::InvalidPayload(_) | AppError::Validation(_))) => {
            let csrf = ensure_csrf_token(&cookies, state.config.production);
            let heading = format!("Edit {}", E::LABEL);
            let action = format!("/{}/{}/edit", E::TABLE, id);
            let body = rejected_form::<E>(&heading, &action, &form, &e, &csrf);
            html_response(StatusCode::BAD_REQUEST, page(&heading, Some(&ctx.user), &body))
        }
        Err(e) => error_page(&e),
    }
}

/// Deletes a row, then returns to the list.
pub async fn delete_submit<E: Entity>(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    Path(id): Path<String>,
    Form(form): Form<FormData>,
) -> Response {
    if !verify_submitted(&cookies, form.get(CSRF_FIELD).map(String::as_str)) {
        return csrf_rejected();
    }

    let result = match parse_id(&id) {
        Ok(id) => OwnedRepository::<E>::new(state.store.as_ref(), &ctx).delete(id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Redirect::to(&list_path::<E>()).into_response(),
        Err(AppError::NotFound) => not_found_page(Some(&ctx.user)),
        Err(e) => error_page(&e),
    }
}

/// The HTML pages for one entity.
pub fn entity_pages<E: Entity>() -> Router<AppState> {
    let table = E::TABLE;
    Router::new()
        .route(&format!("/{table}"), get(list_page::<E>))
        .route(&format!("/{table}/new"), get(new_page::<E>).post(create_submit::<E>))
        .route(&format!("/{table}/{{id}}"), get(detail_page::<E>))
        .route(
            &format!("/{table}/{{id}}/edit"),
            get(edit_page::<E>).post(edit_submit::<E>),
        )
        .route(&format!("/{table}/{{id}}/delete"), post(delete_submit::<E>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::server::Server;
    use chrono::Utc;
    use serde_json::{Map, Value};
    use uuid::Uuid;

    fn record(name: Option<&str>) -> Record {
        let mut fields = Map::new();
        if let Some(name) = name {
            fields.insert("name".into(), Value::String(name.into()));
        }
        Record {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            fields,
        }
    }

    #[test]
    fn untitled_records_fall_back_to_a_short_id() {
        let untitled = record(None);
        let title = record_title::<Server>(&untitled);
        assert!(title.starts_with("Server #"));
        assert_eq!(title.len(), "Server #".len() + 8);

        assert_eq!(record_title::<Server>(&record(Some("Alpha"))), "Alpha");
    }

    #[test]
    fn empty_list_shows_the_empty_state() {
        let html = render_list::<Server>(&[]);
        assert!(html.contains("No servers yet."));
        assert!(html.contains(r#"href="/servers/new""#));
    }

    #[test]
    fn form_values_are_escaped_and_issues_inlined() {
        let mut values = FormData::new();
        values.insert("name".into(), r#"<b>"x"</b>"#.into());
        let issues = [FieldIssue::new("name", "length is lower than 1")];

        let html = render_form::<Server>("New Server", "/servers/new", &values, &issues, Some("Fix it"), "tok");
        assert!(html.contains("&lt;b&gt;&quot;x&quot;&lt;/b&gt;"));
        assert!(html.contains("length is lower than 1"));
        assert!(html.contains(r#"name="_csrf" value="tok""#));
        assert!(html.contains(r#"<textarea id="description""#));
    }
}
