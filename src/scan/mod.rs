mod dto;
pub mod handlers;
pub mod services;

pub use dto::BarcodeScanRequest;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::scan_routes()
}
