use crate::state::AppState;
use axum::{middleware, Router};

mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Public auth endpoints plus the `/me` routes behind [`extractors::require_auth`].
pub fn router(tokens: jwt::TokenService) -> Router<AppState> {
    Router::new().merge(handlers::auth_routes()).merge(
        handlers::me_routes()
            .route_layer(middleware::from_fn_with_state(tokens, extractors::require_auth)),
    )
}
