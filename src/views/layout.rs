//! Page shell and shared HTML helpers.
//!
//! Pages are plain strings assembled here; every interpolated value goes
//! through [`html_escape`].

use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::entities::ALL;
use crate::error::AppError;
use crate::middleware_layer::auth::LOGIN_PATH;
use crate::models::user::AuthUser;

const STYLESHEET: &str = "/assets/app.css";

/// Escapes text for use in element content and quoted attributes.
pub fn html_escape(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }

    let mut escaped = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

fn nav(user: Option<&AuthUser>) -> String {
    let Some(user) = user else {
        return String::new();
    };

    let mut links = String::from(r#"<a href="/dashboard">Dashboard</a>"#);
    for entity in ALL {
        links.push_str(&format!(
            r#"<a href="{}">{}</a>"#,
            entity.href(),
            html_escape(entity.label_plural)
        ));
    }

    let who = user.email.as_deref().unwrap_or("Signed in");
    format!(
        r#"<nav>{links}<span class="who">{who}</span><form method="post" action="/auth/signout"><button type="submit">Sign out</button></form></nav>"#,
        links = links,
        who = html_escape(who),
    )
}

/// Wraps page content in the document shell. `user` controls the navigation bar.
pub fn page(title: &str, user: Option<&AuthUser>, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="{css}">
</head>
<body>
{nav}
<main>
{body}
</main>
</body>
</html>"#,
        title = html_escape(title),
        css = STYLESHEET,
        nav = nav(user),
        body = body,
    )
}

/// Inline error banner, empty when there is nothing to report.
pub fn error_banner(message: Option<&str>) -> String {
    match message {
        Some(message) => format!(r#"<p class="error" role="alert">{}</p>"#, html_escape(message)),
        None => String::new(),
    }
}

/// Hidden CSRF input for forms.
pub fn csrf_input(token: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        crate::crypto::csrf::CSRF_FIELD,
        html_escape(token)
    )
}

pub fn html_response(status: StatusCode, document: String) -> Response {
    (status, Html(document)).into_response()
}

pub fn not_found_page(user: Option<&AuthUser>) -> Response {
    let body = r#"<h1>Not found</h1>
<p>The page you are looking for does not exist or you do not have access to it.</p>
<p><a href="/dashboard">Back to the dashboard</a></p>"#;
    html_response(StatusCode::NOT_FOUND, page("Not found", user, body))
}

/// Renders an error for a page request.
///
/// A lost session goes back to the login page; a missing row gets the
/// not-found page.
pub fn error_page(err: &AppError) -> Response {
    match err {
        AppError::Unauthorized => Redirect::to(LOGIN_PATH).into_response(),
        AppError::NotFound => not_found_page(None),
        other => {
            let status = other.status();
            let body = format!(
                "<h1>Something went wrong</h1>{}<p><a href=\"/dashboard\">Back to the dashboard</a></p>",
                error_banner(Some(&other.public_message()))
            );
            html_response(status, page("Error", None, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_covers_markup_and_quotes() {
        assert_eq!(
            html_escape(r#"<script>alert("x" & 'y')</script>"#),
            "&lt;script&gt;alert(&quot;x&quot; &amp; &#39;y&#39;)&lt;/script&gt;"
        );
        assert!(matches!(html_escape("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn navigation_only_for_signed_in_users() {
        let anonymous = page("Login", None, "<p>x</p>");
        assert!(!anonymous.contains("<nav>"));

        let user = AuthUser {
            id: uuid::Uuid::new_v4(),
            email: Some("ada@example.com".into()),
        };
        let signed_in = page("Dashboard", Some(&user), "<p>x</p>");
        assert!(signed_in.contains(r#"href="/servers""#));
        assert!(signed_in.contains("ada@example.com"));
        assert!(signed_in.contains(r#"action="/auth/signout""#));
    }
}
