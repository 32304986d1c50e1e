use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{Redirect, Response},
};

use crate::{
    models::session::RequestContext,
    services::dashboard::{EntityCount, entity_counts},
    state::AppState,
    views::layout::{error_page, html_escape, html_response, page},
};

pub const DASHBOARD_PATH: &str = "/dashboard";

pub async fn root() -> Redirect {
    Redirect::to(DASHBOARD_PATH)
}

fn render_tiles(counts: &[EntityCount]) -> String {
    let tiles: String = counts
        .iter()
        .map(|tile| {
            format!(
                r#"<li><a href="{href}"><strong>{count}</strong><span>{label}</span></a></li>"#,
                href = tile.entity.href(),
                count = tile.count,
                label = html_escape(tile.entity.label_plural),
            )
        })
        .collect();
    format!(r#"<h1>Dashboard</h1><ul class="tiles">{}</ul>"#, tiles)
}

/// Per-entity counts of the caller's rows.
pub async fn dashboard_page(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    match entity_counts(state.store.as_ref(), &ctx).await {
        Ok(counts) => html_response(
            StatusCode::OK,
            page("Dashboard", Some(&ctx.user), &render_tiles(&counts)),
        ),
        Err(e) => error_page(&e),
    }
}
