mod dto;
pub mod handlers;
pub mod rating;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::reroll_routes())
        .merge(handlers::spot_routes())
}
