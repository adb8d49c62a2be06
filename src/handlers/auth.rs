use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};
use askama::Template;
use log::{info, warn};
use serde::Deserialize;
use tower_cookies::{Cookie, Cookies};

use crate::{
    database::Database,
    error::AppError,
    middleware::AUTH_COOKIE,
    models::User,
    state::AppState,
    utils::{auth::TOKEN_TTL_HOURS, create_token, verify_password},
};

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    error: String,
    email: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

pub async fn login_page() -> LoginTemplate {
    LoginTemplate {
        error: String::new(),
        email: String::new(),
    }
}

fn login_error(status: StatusCode, message: &str, email: &str) -> (StatusCode, Html<String>) {
    let template = LoginTemplate {
        error: message.to_string(),
        email: email.to_string(),
    };
    (status, Html(template.render().unwrap_or_else(|_| message.to_string())))
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, (StatusCode, Html<String>)> {
    let user = match authenticate_user(&state.db, &form.email, &form.password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Failed sign-in for {}", form.email);
            return Err(login_error(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password",
                &form.email,
            ));
        }
        Err(e) => {
            log::error!("Sign-in lookup failed: {}", e);
            return Err(login_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed",
                &form.email,
            ));
        }
    };

    let token = state
        .config
        .jwt_secret()
        .and_then(|secret| create_token(secret, user.id, user.email.clone(), user.role))
        .map_err(|e| {
            log::error!("Failed to issue token: {}", e);
            login_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed",
                &form.email,
            )
        })?;

    // Secure HTTP-only cookie with the JWT
    let cookie = Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(TOKEN_TTL_HOURS))
        .build();
    cookies.add(cookie);

    info!("{} signed in", user.email);
    Ok(Redirect::to("/dashboard"))
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
    Redirect::to("/login")
}

async fn authenticate_user(
    db: &Database,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.trim())
        .fetch_optional(db)
        .await?;

    Ok(user.filter(|user| verify_password(password, &user.password_hash).unwrap_or(false)))
}
