use axum::{middleware, Router};

use crate::state::AppState;
use crate::{cors, health, mailbox, quotes};

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(mailbox::router())
        .merge(quotes::router())
        .merge(health::router())
        .layer(middleware::from_fn(cors::cors))
        .with_state(state)
}
