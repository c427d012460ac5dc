use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::services::LookupOutcome;

#[derive(Debug, Deserialize)]
pub struct BarcodeScanRequest {
    pub barcode: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoScanRequest {
    pub photo_data_uri: String,
}

impl LookupOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LookupOutcome::Found { .. } => StatusCode::OK,
            LookupOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
            LookupOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for LookupOutcome {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
