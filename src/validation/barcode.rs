use super::ValidationError;

const MIN_BARCODE_CHARS: usize = 3;

pub(crate) const BARCODE_TOO_SHORT: ValidationError =
    ValidationError::new("barcode", "Barcode must be at least 3 characters.");

/// A barcode (or QR payload) that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeQuery(String);

impl BarcodeQuery {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.chars().count() < MIN_BARCODE_CHARS {
            return Err(BARCODE_TOO_SHORT);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BarcodeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
