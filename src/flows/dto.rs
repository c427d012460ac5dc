use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Barcode flow output. Every field is optional so that the "could not be
/// found" sentinel and partial answers still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeFlowOutput {
    pub product_name: Option<String>,
    pub serving_size: Option<String>,
    pub calories: Option<String>,
    pub fat: Option<String>,
    pub saturated_fat: Option<String>,
    pub trans_fat: Option<String>,
    pub cholesterol: Option<String>,
    pub sodium: Option<String>,
    pub carbohydrates: Option<String>,
    pub fiber: Option<String>,
    pub sugar: Option<String>,
    pub protein: Option<String>,
    /// Comma separated.
    pub allergens: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodIdentification {
    pub identified_food: Option<String>,
    pub confidence_level: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionalInformation {
    pub calories: Option<String>,
    pub protein: Option<String>,
    pub fat: Option<String>,
    pub carbohydrates: Option<String>,
    pub serving_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFlowOutput {
    pub food_identification: Option<FoodIdentification>,
    pub nutritional_information: Option<NutritionalInformation>,
    #[serde(default)]
    pub allergens: Vec<String>,
}

const BARCODE_FIELDS: [(&str, &str); 13] = [
    ("productName", "The name of the product."),
    ("servingSize", "The serving size of the product."),
    ("calories", "The number of calories per serving."),
    ("fat", "The amount of fat per serving."),
    ("saturatedFat", "The amount of saturated fat per serving."),
    ("transFat", "The amount of trans fat per serving."),
    ("cholesterol", "The amount of cholesterol per serving."),
    ("sodium", "The amount of sodium per serving."),
    ("carbohydrates", "The amount of carbohydrates per serving."),
    ("fiber", "The amount of fiber per serving."),
    ("sugar", "The amount of sugar per serving."),
    ("protein", "The amount of protein per serving."),
    (
        "allergens",
        "A comma-separated list of allergens contained in the product.",
    ),
];

/// OpenAPI-subset schema understood by the model API.
pub fn barcode_output_schema() -> Value {
    let properties: serde_json::Map<String, Value> = BARCODE_FIELDS
        .iter()
        .map(|(name, desc)| {
            (
                (*name).to_string(),
                json!({ "type": "STRING", "description": desc }),
            )
        })
        .collect();
    let required: Vec<&str> = BARCODE_FIELDS.iter().map(|(name, _)| *name).collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

pub fn image_output_schema() -> Value {
    let text = |desc: &str| json!({ "type": "STRING", "description": desc });
    json!({
        "type": "OBJECT",
        "properties": {
            "foodIdentification": {
                "type": "OBJECT",
                "properties": {
                    "identifiedFood": text("The identified food item."),
                    "confidenceLevel": {
                        "type": "NUMBER",
                        "description": "The confidence level of the food identification (0-1)."
                    }
                },
                "required": ["identifiedFood", "confidenceLevel"]
            },
            "nutritionalInformation": {
                "type": "OBJECT",
                "properties": {
                    "calories": text("The number of calories in the food item."),
                    "protein": text("The amount of protein in the food item."),
                    "fat": text("The amount of fat in the food item."),
                    "carbohydrates": text("The amount of carbohydrates in the food item."),
                    "servingSize": text("The serving size for the nutritional information.")
                },
                "required": ["calories", "protein", "fat", "carbohydrates", "servingSize"]
            },
            "allergens": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A list of common allergens that may be present in the food item."
            }
        },
        "required": ["foodIdentification", "nutritionalInformation", "allergens"]
    })
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn barcode_sentinel_deserializes() {
        let out: BarcodeFlowOutput =
            serde_json::from_str(r#"{"productName":"Information could not be found"}"#).unwrap();
        assert_eq!(
            out.product_name.as_deref(),
            Some("Information could not be found")
        );
        assert!(out.calories.is_none());
    }

    #[test]
    fn image_output_tolerates_missing_groups() {
        let out: ImageFlowOutput = serde_json::from_str("{}").unwrap();
        assert!(out.food_identification.is_none());
        assert!(out.allergens.is_empty());
    }

    #[test]
    fn barcode_schema_lists_every_field() {
        let schema = barcode_output_schema();
        assert_eq!(schema["properties"].as_object().unwrap().len(), 13);
        assert_eq!(schema["required"][0], "productName");
    }
}
