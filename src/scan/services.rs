//! Turns raw flow output into a tagged outcome.
//!
//! This is the one place the two upstream shapes meet the display shape.
//! Values stay opaque strings: no unit conversion, no numeric parsing.

use serde::Serialize;
use tracing::{info, warn};

use crate::flows::{BarcodeFlowOutput, ImageFlowOutput, NutritionFlows};
use crate::nutrition::{Allergens, BarcodeNutrients, CoreNutrients, NutritionRecord};
use crate::validation::{BarcodeQuery, ImageQuery};

const NOT_FOUND_PHRASE: &str = "could not be found";

pub const BARCODE_INCOMPLETE: &str =
    "Failed to retrieve nutritional data. The product might not be in the database.";
pub const BARCODE_FLOW_FAILED: &str = "An error occurred while fetching nutritional data.";
pub const IMAGE_INCOMPLETE: &str =
    "Could not identify the food or extract nutritional data from the image.";
pub const IMAGE_FLOW_FAILED: &str = "An error occurred while analyzing the image.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LookupOutcome {
    Found { record: NutritionRecord },
    NotFound { message: String },
    Failed { message: String },
}

impl LookupOutcome {
    fn failed(message: &str) -> Self {
        LookupOutcome::Failed {
            message: message.to_string(),
        }
    }
}

pub fn adapt_barcode(query: &BarcodeQuery, out: BarcodeFlowOutput) -> LookupOutcome {
    let Some(name) = out.product_name.as_deref().filter(|n| !n.trim().is_empty()) else {
        return LookupOutcome::failed(BARCODE_INCOMPLETE);
    };
    if name.to_lowercase().contains(NOT_FOUND_PHRASE) {
        return LookupOutcome::NotFound {
            message: format!("Could not find nutritional information for barcode: {query}"),
        };
    }

    let allergens = out
        .allergens
        .as_deref()
        .map(Allergens::from_delimited)
        .unwrap_or_default();
    let core = CoreNutrients {
        serving_size: out.serving_size,
        calories: out.calories,
        protein: out.protein,
        fat: out.fat,
        carbohydrates: out.carbohydrates,
    };
    let label = BarcodeNutrients {
        saturated_fat: out.saturated_fat,
        trans_fat: out.trans_fat,
        cholesterol: out.cholesterol,
        sodium: out.sodium,
        fiber: out.fiber,
        sugar: out.sugar,
    };
    match NutritionRecord::from_barcode(name, core, label, allergens) {
        Ok(record) => LookupOutcome::Found { record },
        Err(e) => {
            warn!(error = %e, "barcode output rejected");
            LookupOutcome::failed(BARCODE_INCOMPLETE)
        }
    }
}

pub fn adapt_image(out: ImageFlowOutput) -> LookupOutcome {
    let Some(id) = out.food_identification else {
        return LookupOutcome::failed(IMAGE_INCOMPLETE);
    };
    let Some(name) = id.identified_food.filter(|n| !n.trim().is_empty()) else {
        return LookupOutcome::failed(IMAGE_INCOMPLETE);
    };
    let confidence = id.confidence_level.unwrap_or_else(|| {
        warn!(food = %name, "identification without confidence; reporting 0");
        0.0
    });

    let info = out.nutritional_information.unwrap_or_default();
    let core = CoreNutrients {
        serving_size: info.serving_size,
        calories: info.calories,
        protein: info.protein,
        fat: info.fat,
        carbohydrates: info.carbohydrates,
    };
    match NutritionRecord::from_image(&name, confidence, core, Allergens::from_list(out.allergens)) {
        Ok(record) => LookupOutcome::Found { record },
        Err(e) => {
            warn!(error = %e, "image output rejected");
            LookupOutcome::failed(IMAGE_INCOMPLETE)
        }
    }
}

/// One round trip, no retries. Every collaborator error collapses into one
/// generic failure.
pub async fn lookup_barcode(flows: &dyn NutritionFlows, query: &BarcodeQuery) -> LookupOutcome {
    match flows.extract_nutritional_data(query).await {
        Ok(out) => {
            let outcome = adapt_barcode(query, out);
            info!(barcode = %query, status = outcome_name(&outcome), "barcode lookup finished");
            outcome
        }
        Err(e) => {
            warn!(error = %e, barcode = %query, "barcode flow failed");
            LookupOutcome::failed(BARCODE_FLOW_FAILED)
        }
    }
}

pub async fn identify_image(flows: &dyn NutritionFlows, photo: &ImageQuery) -> LookupOutcome {
    match flows.identify_food(photo).await {
        Ok(out) => {
            let outcome = adapt_image(out);
            info!(mime = %photo.mime(), size = photo.len(), status = outcome_name(&outcome), "image identification finished");
            outcome
        }
        Err(e) => {
            warn!(error = %e, mime = %photo.mime(), "image flow failed");
            LookupOutcome::failed(IMAGE_FLOW_FAILED)
        }
    }
}

fn outcome_name(outcome: &LookupOutcome) -> &'static str {
    match outcome {
        LookupOutcome::Found { .. } => "found",
        LookupOutcome::NotFound { .. } => "not_found",
        LookupOutcome::Failed { .. } => "failed",
    }
}

#[cfg(test)]
mod adapter_tests {
    use super::*;
    use crate::flows::fake::FakeFlows;
    use crate::flows::{FlowError, FoodIdentification, NutritionalInformation};
    use crate::nutrition::ScanSource;
    use bytes::Bytes;

    fn query() -> BarcodeQuery {
        BarcodeQuery::parse("8901725181222").unwrap()
    }

    fn full_barcode_output() -> BarcodeFlowOutput {
        let s = |v: &str| Some(v.to_string());
        BarcodeFlowOutput {
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
            allergens: s("Milk, Soy, None"),
        }
    }

    #[test]
    fn not_found_phrase_in_any_case() {
        for name in ["Could not be found", "COULD NOT BE FOUND", "The product could not be found."] {
            let out = BarcodeFlowOutput {
                product_name: Some(name.into()),
                ..full_barcode_output()
            };
            assert_eq!(
                adapt_barcode(&query(), out),
                LookupOutcome::NotFound {
                    message: "Could not find nutritional information for barcode: 8901725181222"
                        .into()
                }
            );
        }
    }

    #[test]
    fn missing_product_name_is_generic_failure() {
        for product_name in [None, Some(String::new()), Some("   ".into())] {
            let out = BarcodeFlowOutput {
                product_name,
                ..full_barcode_output()
            };
            assert_eq!(
                adapt_barcode(&query(), out),
                LookupOutcome::Failed {
                    message: BARCODE_INCOMPLETE.into()
                }
            );
        }
    }

    #[test]
    fn barcode_output_maps_every_field() {
        let LookupOutcome::Found { record } = adapt_barcode(&query(), full_barcode_output()) else {
            panic!("expected found");
        };
        assert_eq!(record.source(), ScanSource::Barcode);
        assert_eq!(record.item_name(), "Example Product");
        assert_eq!(record.core().calories.as_deref(), Some("200"));
        assert_eq!(record.core().serving_size.as_deref(), Some("100g"));
        let label = record.label().unwrap();
        assert_eq!(label.sodium.as_deref(), Some("100mg"));
        assert_eq!(label.trans_fat.as_deref(), Some("0g"));
        assert_eq!(
            record.allergens().as_slice(),
            &["Milk".to_string(), "Soy".to_string()]
        );
        assert_eq!(record.confidence_level(), None);
    }

    #[test]
    fn image_output_becomes_image_record() {
        let out = ImageFlowOutput {
            food_identification: Some(FoodIdentification {
                identified_food: Some("Apple".into()),
                confidence_level: Some(0.87),
            }),
            nutritional_information: Some(NutritionalInformation {
                calories: Some("52".into()),
                serving_size: Some("1 medium".into()),
                ..Default::default()
            }),
            allergens: vec!["None".into()],
        };
        let LookupOutcome::Found { record } = adapt_image(out) else {
            panic!("expected found");
        };
        assert_eq!(record.source(), ScanSource::Image);
        assert_eq!(record.confidence_level(), Some(0.87));
        assert!(record.allergens().is_empty());
        assert!(record.label().is_none());
        assert_eq!(record.core().calories.as_deref(), Some("52"));
    }

    #[test]
    fn image_without_identification_fails() {
        let blank = ImageFlowOutput {
            food_identification: Some(FoodIdentification {
                identified_food: Some(String::new()),
                confidence_level: Some(0.4),
            }),
            ..Default::default()
        };
        for out in [ImageFlowOutput::default(), blank] {
            assert_eq!(
                adapt_image(out),
                LookupOutcome::Failed {
                    message: IMAGE_INCOMPLETE.into()
                }
            );
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let v = serde_json::to_value(LookupOutcome::NotFound {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(v, serde_json::json!({ "status": "notFound", "message": "nope" }));
    }

    #[tokio::test]
    async fn flow_errors_collapse_to_generic_failure() {
        let flows = FakeFlows::new(
            Err(FlowError::Transport("connection reset".into())),
            Err(FlowError::Api {
                status: 500,
                message: "boom".into(),
            }),
        );
        assert_eq!(
            lookup_barcode(&flows, &query()).await,
            LookupOutcome::Failed {
                message: BARCODE_FLOW_FAILED.into()
            }
        );
        let photo = ImageQuery::parse(Some((Bytes::from_static(b"jpg"), "image/jpeg"))).unwrap();
        assert_eq!(
            identify_image(&flows, &photo).await,
            LookupOutcome::Failed {
                message: IMAGE_FLOW_FAILED.into()
            }
        );
    }

    #[tokio::test]
    async fn same_barcode_twice_makes_two_requests() {
        let flows = FakeFlows::barcode_only(Ok(full_barcode_output()));
        let first = lookup_barcode(&flows, &query()).await;
        let second = lookup_barcode(&flows, &query()).await;
        assert_eq!(first, second);
        assert_eq!(flows.calls(), 2);
    }
}
