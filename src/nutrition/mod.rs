mod allergens;
mod record;

pub use allergens::Allergens;
pub use record::{BarcodeNutrients, CoreNutrients, NutritionRecord, ScanSource};
