mod dto;
pub mod handlers;
pub mod machine;
mod store;

pub use store::SessionStore;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::session_routes()
}
