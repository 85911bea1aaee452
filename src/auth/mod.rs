use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub(crate) mod middleware;
pub mod password;
pub mod repo;
mod repo_types;
pub mod services;

/// `/api/auth/*` is public; `/api/v1/*` sits behind the bearer gate.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/auth", handlers::auth_routes())
        .nest("/api/v1", handlers::me_routes(state))
}
