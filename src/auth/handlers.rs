use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::{self, User};

use super::dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, SignupRequest};
use super::services::{
    hash_password, is_valid_email, is_valid_username, verify_password, CurrentUser, JwtKeys,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/me", get(get_me))
}

fn token_pair(keys: &JwtKeys, user: &User) -> AppResult<AuthResponse> {
    let access_token = keys.sign_access(user.id, &user.username)?;
    let refresh_token = keys.sign_refresh(user.id, &user.username)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("invalid email".into()));
    }
    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(AppError::Validation("invalid username".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::Validation("password too short".into()));
    }

    let hash = hash_password(&payload.password)?;

    // Unique indexes on email and username turn duplicates into Conflict.
    let user = User::create(&state.db, &payload.username, &payload.email, &hash).await?;

    info!(user_id = %user.id, username = %user.username, "user signed up");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(token_pair(&keys, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let id = payload.id.trim();

    // `id` is an email when it parses as one, a username otherwise.
    let user = if is_valid_email(&id.to_lowercase()) {
        User::find_by_email(&state.db, &id.to_lowercase()).await?
    } else {
        User::find_by_username(&state.db, id).await?
    };

    let Some(user) = user else {
        warn!("login with unknown identifier");
        return Err(AppError::Unauthorized("invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AppError::Unauthorized("invalid credentials".into()));
    }

    info!(user_id = %user.id, username = %user.username, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(token_pair(&keys, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(AppError::Unauthorized("user not found".into()))?;

    Ok(Json(token_pair(&keys, &user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<PublicUser>> {
    let user = users::services::get_user(&state, user.id).await?;
    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}
