use super::dto::barcode_output_schema;

pub(crate) fn barcode_prompt(barcode: &str) -> String {
    format!(
        "Extract the nutritional information for the given barcode. Use the lookupBarcode tool to find the information.\n\
         Prioritize finding nutritional information for products that are available in India.\n\
         Barcode: {barcode}\n\
         \n\
         If you cannot find the nutritional information, return a message saying that the information could not be found.\n\
         \n\
         Answer with a single JSON object matching this schema and nothing else:\n\
         {schema}",
        schema = barcode_output_schema(),
    )
}

pub(crate) const IMAGE_PROMPT: &str = "You are an expert nutritionist. You will identify the food item in the image and extract its nutritional information.

Analyze the following image of a food product and provide its nutritional information:
Prioritize identifying food items that are commonly found or available in India.

Here is the nutritional information you should extract:
- Food Identification: Identify the food item and provide a confidence level (0-1).
- Nutritional Information: Calories, protein, fat, carbohydrates, and serving size.
- Allergens: A list of common allergens that may be present in the food item.
";

#[cfg(test)]
mod prompt_tests {
    use super::*;

    #[test]
    fn barcode_prompt_embeds_barcode_and_schema() {
        let p = barcode_prompt("8901063010260");
        assert!(p.contains("Barcode: 8901063010260"));
        assert!(p.contains("could not be found"));
        assert!(p.contains("\"saturatedFat\""));
    }
}
