use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, Uri, header},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    crypto::csrf::CSRF_HEADER,
    entities::{channel::Channel, message::Message, server::Server, user::UserProfile},
    error::{AppError, Result},
    handlers::{self, api::entity_routes},
    middleware_layer::{auth::require_auth, auth::require_session, csrf::verify_csrf},
    state::AppState,
    views::{self, entity::entity_pages},
};

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// CORS for the configured origins. Credentials are allowed, so the
/// wildcard origin is refused.
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let mut origins: Vec<HeaderValue> = Vec::with_capacity(config.cors_origins.len());
    for origin in &config.cors_origins {
        if origin.trim() == "*" {
            return Err(AppError::Internal(
                "CORS_ORIGINS cannot contain * while credentials are allowed".to_string(),
            ));
        }
        match HeaderValue::from_str(origin) {
            Ok(value) => origins.push(value),
            Err(_) => tracing::warn!("⚠️ Ignoring invalid CORS origin: {}", origin),
        }
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true)
        .expose_headers([HeaderName::from_static(CSRF_HEADER)])
        .max_age(Duration::from_secs(86400)))
}

/// Unknown paths: JSON under `/api`, the not-found page elsewhere.
async fn fallback(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        AppError::NotFound.into_response()
    } else {
        views::layout::not_found_page(None)
    }
}

/// Builds the full application router.
pub fn build_router(state: AppState) -> Result<Router> {
    let config = state.config.clone();
    let cors = cors_layer(&config)?;

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit_replenish_ms.max(1))
            .burst_size(config.rate_limit_burst.max(1))
            .use_headers()
            .finish()
            .ok_or_else(|| AppError::Internal("Invalid rate limit configuration".to_string()))?,
    );

    let auth_api = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .layer(GovernorLayer::new(governor_conf.clone()));

    let protected_api = Router::new()
        .merge(entity_routes::<Server>())
        .merge(entity_routes::<Channel>())
        .merge(entity_routes::<Message>())
        .merge(entity_routes::<UserProfile>())
        .route("/api/auth/me", get(handlers::auth::me))
        .route_layer(from_fn(verify_csrf))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .layer(GovernorLayer::new(governor_conf.clone()));

    let public_pages = Router::new()
        .route("/", get(views::dashboard::root))
        .route(
            "/login",
            get(views::auth::login_page).post(views::auth::login_submit),
        )
        .route(
            "/signup",
            get(views::auth::signup_page).post(views::auth::signup_submit),
        )
        .route(
            "/auth/signout",
            get(views::auth::signout).post(views::auth::signout),
        );

    let protected_pages = Router::new()
        .route("/dashboard", get(views::dashboard::dashboard_page))
        .merge(entity_pages::<Server>())
        .merge(entity_pages::<Channel>())
        .merge(entity_pages::<Message>())
        .merge(entity_pages::<UserProfile>())
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let app = Router::new()
        .merge(auth_api)
        .merge(protected_api)
        .merge(public_pages)
        .merge(protected_pages)
        .nest_service("/assets", ServeDir::new(&config.assets_dir))
        .fallback(fallback)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state);

    Ok(app)
}
