pub mod conversations;
pub mod health;
pub mod resolve;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(resolve::router())
        .merge(health::router())
        .nest("/conversations", conversations::router())
}
