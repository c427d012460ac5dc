use serde::{Deserialize, Serialize};

use super::Allergens;

/// Which pathway produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Barcode,
    Image,
}

/// Values shared by both pathways. Free-form, unit-bearing text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreNutrients {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbohydrates: Option<String>,
}

/// Label values only a packaged product lookup provides.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeNutrients {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturated_fat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_fat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cholesterol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sodium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiber: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sugar: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidRecord {
    #[error("item name is empty")]
    EmptyItemName,
    #[error("confidence level is not a number")]
    ConfidenceNotANumber,
}

/// The normalized result shown to the user.
///
/// Built only through [`NutritionRecord::from_barcode`] and
/// [`NutritionRecord::from_image`]: a confidence level exists iff the
/// source is `image`, and the label extras exist iff the source is
/// `barcode`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionRecord {
    source: ScanSource,
    item_name: String,
    #[serde(flatten)]
    core: CoreNutrients,
    #[serde(flatten)]
    label: Option<BarcodeNutrients>,
    allergens: Allergens,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence_level: Option<f64>,
}

impl NutritionRecord {
    pub fn from_barcode(
        item_name: &str,
        core: CoreNutrients,
        label: BarcodeNutrients,
        allergens: Allergens,
    ) -> Result<Self, InvalidRecord> {
        Ok(Self {
            source: ScanSource::Barcode,
            item_name: checked_name(item_name)?,
            core,
            label: Some(label),
            allergens,
            confidence_level: None,
        })
    }

    /// Confidence outside `[0, 1]` is clamped into range.
    pub fn from_image(
        item_name: &str,
        confidence_level: f64,
        core: CoreNutrients,
        allergens: Allergens,
    ) -> Result<Self, InvalidRecord> {
        if confidence_level.is_nan() {
            return Err(InvalidRecord::ConfidenceNotANumber);
        }
        Ok(Self {
            source: ScanSource::Image,
            item_name: checked_name(item_name)?,
            core,
            label: None,
            allergens,
            confidence_level: Some(confidence_level.clamp(0.0, 1.0)),
        })
    }

    pub fn source(&self) -> ScanSource {
        self.source
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn core(&self) -> &CoreNutrients {
        &self.core
    }

    pub fn label(&self) -> Option<&BarcodeNutrients> {
        self.label.as_ref()
    }

    pub fn allergens(&self) -> &Allergens {
        &self.allergens
    }

    pub fn confidence_level(&self) -> Option<f64> {
        self.confidence_level
    }
}

fn checked_name(raw: &str) -> Result<String, InvalidRecord> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(InvalidRecord::EmptyItemName);
    }
    Ok(name.to_string())
}
