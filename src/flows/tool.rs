use async_trait::async_trait;
use serde_json::{json, Value};

use super::dto::BarcodeFlowOutput;

pub const LOOKUP_BARCODE: &str = "lookupBarcode";

/// Callback the model may invoke during the barcode flow.
#[async_trait]
pub trait BarcodeTool: Send + Sync {
    async fn lookup(&self, barcode: &str) -> anyhow::Result<BarcodeFlowOutput>;
}

/// Placeholder product source. There is no product database behind this
/// service, so every barcode resolves to the same example product.
#[derive(Debug, Clone, Default)]
pub struct StubBarcodeTool;

#[async_trait]
impl BarcodeTool for StubBarcodeTool {
    async fn lookup(&self, barcode: &str) -> anyhow::Result<BarcodeFlowOutput> {
        tracing::info!(%barcode, "lookupBarcode tool called");
        let s = |v: &str| Some(v.to_string());
        Ok(BarcodeFlowOutput {
            product_name: s("Example Product"),
            serving_size: s("100g"),
            calories: s("200"),
            fat: s("10g"),
            saturated_fat: s("5g"),
            trans_fat: s("0g"),
            cholesterol: s("0mg"),
            sodium: s("100mg"),
            carbohydrates: s("20g"),
            fiber: s("5g"),
            sugar: s("10g"),
            protein: s("5g"),
            allergens: s("None"),
        })
    }
}

/// Function declaration advertised to the model.
pub(crate) fn declaration() -> Value {
    json!({
        "name": LOOKUP_BARCODE,
        "description": "Looks up product information based on a barcode.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "barcode": { "type": "STRING", "description": "The barcode to look up." }
            },
            "required": ["barcode"]
        }
    })
}
