#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use forge_crud::baas::memory::{MemoryAuth, MemoryStore};
use forge_crud::config::Config;
use forge_crud::routes;
use forge_crud::state::AppState;
use serde_json::{Value, json};

pub const PASSWORD: &str = "correct-horse";

/// A running server on an ephemeral port, backed by the in-memory store.
pub struct TestContext {
    pub base_url: String,
    pub store: MemoryStore,
}

/// A signed-in API caller.
pub struct Caller {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let state = AppState::with_backends(
            Config::in_memory(),
            Arc::new(MemoryAuth::new()),
            Arc::new(store.clone()),
        );
        let app = routes::build_router(state).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A plain client without cookies.
    pub fn api_client() -> reqwest::Client {
        reqwest::Client::new()
    }

    /// A cookie-keeping client that does not follow redirects, like a browser
    /// whose navigations the test inspects one by one.
    pub fn browser() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    pub fn unique_email(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("{}_{}@example.com", prefix, nanos)
    }

    /// Registers a new user through the API and returns its bearer token.
    pub async fn sign_up(&self, prefix: &str) -> Caller {
        let email = Self::unique_email(prefix);
        let response = Self::api_client()
            .post(self.url("/api/auth/signup"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201, "sign-up failed");

        let body: Value = response.json().await.unwrap();
        Caller {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            email,
            token: body["data"]["access_token"].as_str().unwrap().to_string(),
        }
    }
}

/// Pulls the hidden CSRF value out of a rendered form.
pub fn csrf_from_html(html: &str) -> String {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker).expect("form has no CSRF field") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}
