pub mod ag_ui;
pub mod chat;
pub mod health;

use axum::Router;

use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .merge(health::routes())
        .merge(chat::routes())
        .merge(ag_ui::routes())
}
