use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{BarcodeFlowOutput, FlowError, ImageFlowOutput, NutritionFlows};
use crate::validation::{BarcodeQuery, ImageQuery};

/// Scripted flows with call counters. With a gate set, every call parks
/// until the gate is notified.
pub struct FakeFlows {
    pub barcode: Result<BarcodeFlowOutput, FlowError>,
    pub image: Result<ImageFlowOutput, FlowError>,
    pub barcode_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub gate: Option<Arc<Notify>>,
}

impl FakeFlows {
    pub fn new(
        barcode: Result<BarcodeFlowOutput, FlowError>,
        image: Result<ImageFlowOutput, FlowError>,
    ) -> Self {
        Self {
            barcode,
            image,
            barcode_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    pub fn barcode_only(barcode: Result<BarcodeFlowOutput, FlowError>) -> Self {
        Self::new(barcode, Err(FlowError::EmptyResponse))
    }

    pub fn image_only(image: Result<ImageFlowOutput, FlowError>) -> Self {
        Self::new(Err(FlowError::EmptyResponse), image)
    }

    pub fn calls(&self) -> usize {
        self.barcode_calls.load(Ordering::SeqCst) + self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NutritionFlows for FakeFlows {
    async fn extract_nutritional_data(
        &self,
        _query: &BarcodeQuery,
    ) -> Result<BarcodeFlowOutput, FlowError> {
        self.barcode_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.barcode.clone()
    }

    async fn identify_food(&self, _photo: &ImageQuery) -> Result<ImageFlowOutput, FlowError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.image.clone()
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}
