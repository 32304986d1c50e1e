mod common;

use common::{TestContext, PASSWORD};
use forge_crud::client::{ApiClient, EntityHooks, CREATE_FAILED, FETCH_FAILED};
use forge_crud::entities::server::{CreateServer, Server, UpdateServer};
use forge_crud::models::session::AccessToken;
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn row(name: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": Uuid::new_v4(),
        "created_at": "2024-05-01T12:00:00Z",
        "updated_at": "2024-05-01T12:00:00Z",
        "name": name,
    })
}

fn hooks(server: &MockServer) -> EntityHooks<Server> {
    EntityHooks::new(ApiClient::new(&server.uri()).with_bearer(AccessToken::new("tok")))
}

#[tokio::test]
async fn list_is_cached_until_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/servers"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [row("Alpha")] })))
        .expect(2)
        .mount(&server)
        .await;

    let hooks = hooks(&server);
    let first = hooks.list().await.unwrap();
    let cached = hooks.list().await.unwrap();
    assert_eq!(first, cached);
    assert_eq!(first[0].text("name").as_deref(), Some("Alpha"));

    hooks.refresh().await.unwrap();
    assert!(!hooks.is_loading());
}

#[tokio::test]
async fn get_without_an_id_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(hooks(&server).get(None).await.unwrap(), None);
}

#[tokio::test]
async fn create_leaves_the_cached_list_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/servers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "data": row("Alpha") })))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = hooks(&server);
    assert!(hooks.list().await.unwrap().is_empty());

    let created = hooks
        .create(&CreateServer {
            name: Some("Alpha".into()),
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(created.text("name").as_deref(), Some("Alpha"));
    assert!(!hooks.is_mutating());

    assert!(hooks.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failures_carry_the_server_message_or_a_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/servers"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_payload",
            "message": "name: value is missing",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/servers"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let hooks = hooks(&server);

    let err = hooks.create(&CreateServer::default()).await.unwrap_err();
    assert_eq!(err.status, Some(400));
    assert_eq!(err.message, "name: value is missing");

    let err = hooks.list().await.unwrap_err();
    assert_eq!(err.status, Some(502));
    assert_eq!(err.message, FETCH_FAILED);
}

#[tokio::test]
async fn transport_failures_use_the_fallback() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let hooks: EntityHooks<Server> = EntityHooks::new(ApiClient::new(&uri));
    let err = hooks
        .create(&CreateServer {
            name: Some("Alpha".into()),
            description: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.status, None);
    assert_eq!(err.message, CREATE_FAILED);
}

#[tokio::test]
async fn hooks_drive_the_real_api() {
    let ctx = TestContext::new().await;
    let caller = ctx.sign_up("hooks").await;

    let client = ApiClient::new(&ctx.base_url)
        .sign_in(&caller.email, PASSWORD)
        .await
        .unwrap();
    let hooks: EntityHooks<Server> = EntityHooks::new(client);

    let created = hooks
        .create(&CreateServer {
            name: Some("Alpha".into()),
            description: Some("first".into()),
        })
        .await
        .unwrap();

    let fetched = hooks.get(Some(created.id)).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let updated = hooks
        .update(
            created.id,
            &UpdateServer {
                name: Some("Beta".into()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.text("name").as_deref(), Some("Beta"));
    assert_eq!(updated.text("description").as_deref(), Some("first"));

    assert_eq!(hooks.refresh().await.unwrap().len(), 1);

    hooks.delete(created.id).await.unwrap();
    let err = hooks.delete(created.id).await.unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(err.message, "Resource not found");
}
