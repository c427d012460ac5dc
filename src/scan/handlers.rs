use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;

use crate::{
    error::ApiError,
    state::AppState,
    validation::{BarcodeQuery, ImageQuery, MAX_IMAGE_BYTES},
};

use super::dto::{BarcodeScanRequest, PhotoScanRequest};
use super::services::{identify_image, lookup_barcode, LookupOutcome};

/// Uploads above the image limit still reach the validator so the caller
/// gets the field message rather than a bare 413.
pub(crate) const UPLOAD_BODY_LIMIT: usize = 2 * MAX_IMAGE_BYTES + 64 * 1024;

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/barcode", post(scan_barcode))
        .route("/scan/image", post(scan_image_multipart))
        .route("/scan/image/base64", post(scan_image_data_uri))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

/// POST /scan/barcode { "barcode": "..." }
#[instrument(skip(state, body))]
pub async fn scan_barcode(
    State(state): State<AppState>,
    Json(body): Json<BarcodeScanRequest>,
) -> Result<LookupOutcome, ApiError> {
    let query = BarcodeQuery::parse(&body.barcode)?;
    Ok(lookup_barcode(state.flows.as_ref(), &query).await)
}

/// POST /scan/image (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn scan_image_multipart(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<LookupOutcome, ApiError> {
    let file = read_image_field(mp).await?;
    let photo = ImageQuery::parse(file.as_ref().map(|(b, ct)| (b.clone(), ct.as_str())))?;
    Ok(identify_image(state.flows.as_ref(), &photo).await)
}

/// POST /scan/image/base64 { "photoDataUri": "data:image/jpeg;base64,..." }
#[instrument(skip(state, body))]
pub async fn scan_image_data_uri(
    State(state): State<AppState>,
    Json(body): Json<PhotoScanRequest>,
) -> Result<LookupOutcome, ApiError> {
    let photo = ImageQuery::from_data_uri(&body.photo_data_uri)?;
    Ok(identify_image(state.flows.as_ref(), &photo).await)
}

/// First `image` field of a multipart body, with its declared content type.
pub(crate) async fn read_image_field(
    mut mp: Multipart,
) -> Result<Option<(Bytes, String)>, ApiError> {
    while let Some(field) = mp.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field.bytes().await?;
        return Ok(Some((data, content_type)));
    }
    Ok(None)
}
