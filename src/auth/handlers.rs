use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            LoginRequest, PublicUser, RegisterRequest, TokenResponse, UpdateProfileRequest,
            VerifyTokenResponse,
        },
        extractors::{bearer_token, ApiJson, AuthUser},
        services,
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-token", get(verify_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = services::register(state.users.as_ref(), &state.tokens, payload).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = services::login(state.users.as_ref(), &state.tokens, payload).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(services::current_user(state.users.as_ref(), user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(
        services::update_profile(state.users.as_ref(), user_id, payload).await?,
    ))
}

/// Operational inspection of a bearer token; protected routes never call this.
#[instrument(skip(state, headers))]
pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<VerifyTokenResponse>> {
    let token = bearer_token(&headers)?;
    Ok(Json(services::inspect_token(&state.tokens, token)?))
}
