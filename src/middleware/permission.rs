use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    models::{User, UserRole},
    state::AppState,
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    // Helper property for templates
    pub is_manager: bool,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_manager: user.role == UserRole::Manager,
            role: user.role,
        }
    }
}

/// Resolves the signed-in user from the `auth_token` cookie. The token must
/// verify and its subject must still exist.
pub async fn get_current_user(cookies: &Cookies, state: &AppState) -> Option<CurrentUser> {
    let token = cookies.get(AUTH_COOKIE)?.value().to_string();
    let secret = state.config.jwt_secret().ok()?;

    let claims = match verify_token(secret, &token) {
        Ok(claims) => claims,
        Err(err) => {
            log::debug!("Rejected auth token: {}", err);
            return None;
        }
    };

    let user_id = Uuid::parse_str(&claims.sub).ok()?;
    get_user_by_id(state, user_id).await
}

async fn get_user_by_id(state: &AppState, user_id: Uuid) -> Option<CurrentUser> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| log::error!("Failed to load user {}: {}", user_id, e))
        .ok()??;

    Some(CurrentUser::from(user))
}
