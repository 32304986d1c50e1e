use std::collections::HashMap;

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use crate::{
    crypto::csrf::{CSRF_FIELD, ensure_csrf_token, verify_submitted},
    error::AppError,
    middleware_layer::auth::LOGIN_PATH,
    services::auth::{self as auth_service, end_browser_session, start_browser_session},
    state::AppState,
    validation::{
        auth::{MIN_PASSWORD_LEN, SignInInput, SignUpInput},
        payload::check,
    },
    views::{
        dashboard::DASHBOARD_PATH,
        layout::{csrf_input, error_banner, error_page, html_escape, html_response, page},
    },
};

pub const SIGNUP_PATH: &str = "/signup";

#[derive(Clone, Copy, PartialEq, Eq)]
enum AuthForm {
    Login,
    Signup,
}

impl AuthForm {
    fn title(self) -> &'static str {
        match self {
            AuthForm::Login => "Sign in",
            AuthForm::Signup => "Create an account",
        }
    }

    fn action(self) -> &'static str {
        match self {
            AuthForm::Login => LOGIN_PATH,
            AuthForm::Signup => SIGNUP_PATH,
        }
    }
}

fn render_auth_form(form: AuthForm, email: &str, banner: Option<&str>, notice: Option<&str>, csrf: &str) -> String {
    let (password_hint, switch) = match form {
        AuthForm::Login => (
            String::new(),
            format!(r#"<p>No account yet? <a href="{}">Sign up</a></p>"#, SIGNUP_PATH),
        ),
        AuthForm::Signup => (
            format!(r#"<small>At least {} characters.</small>"#, MIN_PASSWORD_LEN),
            format!(r#"<p>Already registered? <a href="{}">Sign in</a></p>"#, LOGIN_PATH),
        ),
    };
    let notice = notice
        .map(|text| format!(r#"<p class="notice">{}</p>"#, html_escape(text)))
        .unwrap_or_default();

    format!(
        r#"<h1>{title}</h1>{notice}{banner}<form method="post" action="{action}">{csrf}
<label for="email">Email</label><input id="email" name="email" type="email" value="{email}" required>
<label for="password">Password</label><input id="password" name="password" type="password" required>{hint}
<button type="submit">{title}</button></form>{switch}"#,
        title = form.title(),
        notice = notice,
        banner = error_banner(banner),
        action = form.action(),
        csrf = csrf_input(csrf),
        email = html_escape(email),
        hint = password_hint,
        switch = switch,
    )
}

fn auth_page(
    status: StatusCode,
    cookies: &Cookies,
    state: &AppState,
    form: AuthForm,
    email: &str,
    banner: Option<&str>,
    notice: Option<&str>,
) -> Response {
    let csrf = ensure_csrf_token(cookies, state.config.production);
    html_response(
        status,
        page(form.title(), None, &render_auth_form(form, email, banner, notice, &csrf)),
    )
}

/// Message shown above a rejected form.
fn rejection_message(err: &AppError) -> String {
    match err {
        AppError::InvalidPayload(issues) => issues
            .iter()
            .map(|issue| match issue.path.as_str() {
                "" => issue.message.clone(),
                path => format!("{}: {}", path, issue.message),
            })
            .collect::<Vec<_>>()
            .join(". "),
        other => other.public_message(),
    }
}

pub async fn login_page(State(state): State<AppState>, cookies: Cookies) -> Response {
    auth_page(StatusCode::OK, &cookies, &state, AuthForm::Login, "", None, None)
}

pub async fn signup_page(State(state): State<AppState>, cookies: Cookies) -> Response {
    auth_page(StatusCode::OK, &cookies, &state, AuthForm::Signup, "", None, None)
}

/// Signs in from the login form and continues to the dashboard.
pub async fn login_submit(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(mut form): Form<HashMap<String, String>>,
) -> Response {
    if !verify_submitted(&cookies, form.get(CSRF_FIELD).map(String::as_str)) {
        tracing::warn!("❌ CSRF: login form token missing or mismatched");
        return error_page(&AppError::Forbidden("CSRF token missing or invalid".to_string()));
    }

    let input = SignInInput {
        email: form.remove("email").unwrap_or_default(),
        password: form.remove("password").unwrap_or_default(),
    };
    let email = input.email.trim().to_string();

    let result = match check(input) {
        Ok(input) => auth_service::sign_in(state.auth.as_ref(), &input).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(session) => {
            start_browser_session(&cookies, &session, state.config.production);
            Redirect::to(DASHBOARD_PATH).into_response()
        }
        Err(e @ (AppError::InvalidPayload(_) | AppError::Validation(_) | AppError::Authentication(_))) => {
            let message = rejection_message(&e);
            auth_page(e.status(), &cookies, &state, AuthForm::Login, &email, Some(&message), None)
        }
        Err(e) => error_page(&e),
    }
}

/// Registers from the sign-up form.
///
/// Continues to the dashboard when the provider opens a session right away,
/// otherwise shows the login form with a confirmation notice.
pub async fn signup_submit(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(mut form): Form<HashMap<String, String>>,
) -> Response {
    if !verify_submitted(&cookies, form.get(CSRF_FIELD).map(String::as_str)) {
        tracing::warn!("❌ CSRF: sign-up form token missing or mismatched");
        return error_page(&AppError::Forbidden("CSRF token missing or invalid".to_string()));
    }

    let input = SignUpInput {
        email: form.remove("email").unwrap_or_default(),
        password: form.remove("password").unwrap_or_default(),
    };
    let email = input.email.trim().to_string();

    let result = match check(input) {
        Ok(input) => auth_service::sign_up(state.auth.as_ref(), &input).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(Some(session)) => {
            start_browser_session(&cookies, &session, state.config.production);
            Redirect::to(DASHBOARD_PATH).into_response()
        }
        Ok(None) => auth_page(
            StatusCode::OK,
            &cookies,
            &state,
            AuthForm::Login,
            &email,
            None,
            Some("Check your email to confirm your account, then sign in."),
        ),
        Err(e @ (AppError::InvalidPayload(_) | AppError::Validation(_) | AppError::Authentication(_))) => {
            let message = rejection_message(&e);
            auth_page(e.status(), &cookies, &state, AuthForm::Signup, &email, Some(&message), None)
        }
        Err(e) => error_page(&e),
    }
}

/// Ends the session on GET or POST and returns to the login page.
pub async fn signout(State(state): State<AppState>, headers: HeaderMap, cookies: Cookies) -> Redirect {
    let token = auth_service::presented_token(&headers, &cookies).map(|(token, _)| token);
    auth_service::sign_out(state.auth.as_ref(), token.as_ref()).await;
    end_browser_session(&cookies);
    Redirect::to(LOGIN_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::payload::FieldIssue;

    #[test]
    fn signup_form_states_the_password_minimum() {
        let html = render_auth_form(AuthForm::Signup, "a@b.c", None, None, "tok");
        assert!(html.contains("At least 6 characters."));
        assert!(html.contains(r#"action="/signup""#));
        assert!(html.contains(r#"value="a@b.c""#));
    }

    #[test]
    fn field_issues_are_joined_into_one_banner() {
        let err = AppError::InvalidPayload(vec![
            FieldIssue::new("email", "not a valid email"),
            FieldIssue::new("password", "length is lower than 6"),
        ]);
        assert_eq!(
            rejection_message(&err),
            "email: not a valid email. password: length is lower than 6"
        );
    }
}
