mod barcode;
mod image;

pub use barcode::BarcodeQuery;
pub use image::{ImageQuery, MAX_IMAGE_BYTES};

use serde::Serialize;

/// Field-level rejection raised before anything is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    pub(crate) const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}
