mod common;

use common::{TestContext, PASSWORD, csrf_from_html};

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// The first record link in a rendered list page.
fn first_detail_path(list: &str, table: &str) -> String {
    let cards = &list[list.find(r#"<ul class="cards">"#).unwrap()..];
    let marker = format!(r#"href="/{}/"#, table);
    let start = cards.find(&marker).unwrap() + r#"href=""#.len();
    let end = cards[start..].find('"').unwrap() + start;
    cards[start..end].to_string()
}

/// Signs a browser in through the login form.
async fn signed_in_browser(ctx: &TestContext) -> reqwest::Client {
    let caller = ctx.sign_up("viewer").await;
    let browser = TestContext::browser();

    let form = browser.get(ctx.url("/login")).send().await.unwrap().text().await.unwrap();
    let csrf = csrf_from_html(&form);

    let response = browser
        .post(ctx.url("/login"))
        .form(&[
            ("_csrf", csrf.as_str()),
            ("email", caller.email.as_str()),
            ("password", PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(location(&response), "/dashboard");
    browser
}

#[tokio::test]
async fn protected_pages_redirect_to_login_without_a_session() {
    let ctx = TestContext::new().await;
    let browser = TestContext::browser();

    for path in ["/dashboard", "/servers", "/channels/new", "/messages/0b7e1f5c-0000-4000-8000-000000000000"] {
        let response = browser.get(ctx.url(path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 303, "{}", path);
        assert_eq!(location(&response), "/login");
    }

    let root = browser.get(ctx.url("/")).send().await.unwrap();
    assert_eq!(location(&root), "/dashboard");
}

#[tokio::test]
async fn login_form_reports_bad_credentials_inline() {
    let ctx = TestContext::new().await;
    let browser = TestContext::browser();

    let form = browser.get(ctx.url("/login")).send().await.unwrap().text().await.unwrap();
    let csrf = csrf_from_html(&form);

    let response = browser
        .post(ctx.url("/login"))
        .form(&[("_csrf", csrf.as_str()), ("email", "nobody@example.com"), ("password", "whatever")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let html = response.text().await.unwrap();
    assert!(html.contains("Invalid login credentials"));
    assert!(html.contains(r#"value="nobody@example.com""#));
}

#[tokio::test]
async fn forms_without_the_csrf_field_are_refused() {
    let ctx = TestContext::new().await;
    let browser = signed_in_browser(&ctx).await;

    let response = browser
        .post(ctx.url("/servers/new"))
        .form(&[("name", "Alpha")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(ctx.store.row_count("servers").await, 0);
}

#[tokio::test]
async fn create_edit_and_delete_through_the_pages() {
    let ctx = TestContext::new().await;
    let browser = signed_in_browser(&ctx).await;

    let empty = browser.get(ctx.url("/servers")).send().await.unwrap().text().await.unwrap();
    assert!(empty.contains("No servers yet."));

    let form = browser.get(ctx.url("/servers/new")).send().await.unwrap().text().await.unwrap();
    let csrf = csrf_from_html(&form);

    let invalid = browser
        .post(ctx.url("/servers/new"))
        .form(&[("_csrf", csrf.as_str()), ("name", "   "), ("description", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);
    assert!(invalid.text().await.unwrap().contains("Please fix the highlighted fields."));

    let created = browser
        .post(ctx.url("/servers/new"))
        .form(&[("_csrf", csrf.as_str()), ("name", "<Alpha>"), ("description", "")])
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 303);
    assert_eq!(location(&created), "/servers");

    let list = browser.get(ctx.url("/servers")).send().await.unwrap().text().await.unwrap();
    assert!(list.contains("&lt;Alpha&gt;"));
    let detail_path = first_detail_path(&list, "servers");
    assert_ne!(detail_path, "/servers/new");

    let detail = browser.get(ctx.url(&detail_path)).send().await.unwrap();
    assert_eq!(detail.status().as_u16(), 200);
    let detail_html = detail.text().await.unwrap();
    assert!(detail_html.contains(&format!(r#"href="{}/edit""#, detail_path)));

    let edited = browser
        .post(ctx.url(&format!("{}/edit", detail_path)))
        .form(&[("_csrf", csrf.as_str()), ("name", "Beta")])
        .send()
        .await
        .unwrap();
    assert_eq!(edited.status().as_u16(), 303);
    assert_eq!(location(&edited), detail_path);

    let after_edit = browser.get(ctx.url(&detail_path)).send().await.unwrap().text().await.unwrap();
    assert!(after_edit.contains("Beta"));

    let deleted = browser
        .post(ctx.url(&format!("{}/delete", detail_path)))
        .form(&[("_csrf", csrf.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 303);
    assert_eq!(location(&deleted), "/servers");

    let gone = browser.get(ctx.url(&detail_path)).send().await.unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn edit_form_can_clear_an_optional_field() {
    let ctx = TestContext::new().await;
    let browser = signed_in_browser(&ctx).await;

    let form = browser.get(ctx.url("/servers/new")).send().await.unwrap().text().await.unwrap();
    let csrf = csrf_from_html(&form);
    browser
        .post(ctx.url("/servers/new"))
        .form(&[("_csrf", csrf.as_str()), ("name", "Alpha"), ("description", "old text")])
        .send()
        .await
        .unwrap();

    let list = browser.get(ctx.url("/servers")).send().await.unwrap().text().await.unwrap();
    let detail_path = first_detail_path(&list, "servers");
    let before = browser.get(ctx.url(&detail_path)).send().await.unwrap().text().await.unwrap();
    assert!(before.contains("old text"));

    let blank_name = browser
        .post(ctx.url(&format!("{}/edit", detail_path)))
        .form(&[("_csrf", csrf.as_str()), ("name", " "), ("description", "")])
        .send()
        .await
        .unwrap();
    assert_eq!(blank_name.status().as_u16(), 400);

    let cleared = browser
        .post(ctx.url(&format!("{}/edit", detail_path)))
        .form(&[("_csrf", csrf.as_str()), ("name", "Alpha"), ("description", "")])
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status().as_u16(), 303);

    let after = browser.get(ctx.url(&detail_path)).send().await.unwrap().text().await.unwrap();
    assert!(after.contains("Alpha"));
    assert!(!after.contains("old text"));
}

#[tokio::test]
async fn dashboard_counts_the_callers_rows() {
    let ctx = TestContext::new().await;
    let browser = signed_in_browser(&ctx).await;

    let form = browser.get(ctx.url("/channels/new")).send().await.unwrap().text().await.unwrap();
    let csrf = csrf_from_html(&form);
    for name in ["general", "random"] {
        let response = browser
            .post(ctx.url("/channels/new"))
            .form(&[("_csrf", csrf.as_str()), ("name", name)])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 303);
    }

    let other = ctx.sign_up("other").await;
    reqwest::Client::new()
        .post(ctx.url("/api/channels"))
        .bearer_auth(&other.token)
        .json(&serde_json::json!({ "name": "theirs" }))
        .send()
        .await
        .unwrap();

    let html = browser.get(ctx.url("/dashboard")).send().await.unwrap().text().await.unwrap();
    assert!(html.contains(r#"<a href="/channels"><strong>2</strong><span>Channels</span></a>"#));
    assert!(html.contains(r#"<a href="/servers"><strong>0</strong><span>Servers</span></a>"#));
}

#[tokio::test]
async fn signout_clears_the_session() {
    let ctx = TestContext::new().await;
    let browser = signed_in_browser(&ctx).await;

    let signout = browser.get(ctx.url("/auth/signout")).send().await.unwrap();
    assert_eq!(signout.status().as_u16(), 303);
    assert_eq!(location(&signout), "/login");

    let dashboard = browser.get(ctx.url("/dashboard")).send().await.unwrap();
    assert_eq!(dashboard.status().as_u16(), 303);
    assert_eq!(location(&dashboard), "/login");
}

#[tokio::test]
async fn unknown_pages_render_not_found() {
    let ctx = TestContext::new().await;
    let response = TestContext::browser().get(ctx.url("/nowhere")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert!(response.text().await.unwrap().contains("Not found"));
}

#[tokio::test]
async fn stylesheet_is_served_from_assets() {
    let ctx = TestContext::new().await;
    let response = TestContext::browser().get(ctx.url("/assets/app.css")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
