//! Boundary to the hosted model that does the actual nutrition work.
//!
//! Two flows exist: a barcode lookup (with a `lookupBarcode` tool the model
//! may call back into) and a photo identification. Both are one outbound
//! round trip per submission with no retries.

pub mod dto;
pub mod gemini;
mod prompts;
pub mod tool;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::validation::{BarcodeQuery, ImageQuery};
pub use dto::{BarcodeFlowOutput, FoodIdentification, ImageFlowOutput, NutritionalInformation};

#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
    #[error("request to model failed: {0}")]
    Transport(String),
    #[error("model api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model api rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("could not parse model output: {0}")]
    Parse(String),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model kept calling tools after {0} rounds")]
    ToolLoop(usize),
}

#[async_trait]
pub trait NutritionFlows: Send + Sync {
    async fn extract_nutritional_data(
        &self,
        query: &BarcodeQuery,
    ) -> Result<BarcodeFlowOutput, FlowError>;

    async fn identify_food(&self, photo: &ImageQuery) -> Result<ImageFlowOutput, FlowError>;

    fn model_name(&self) -> &str;
}
