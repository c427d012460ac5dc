use base64ct::{Base64, Encoding};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;

use super::ValidationError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

pub(crate) const IMAGE_REQUIRED: ValidationError =
    ValidationError::new("image", "Image is required.");
pub(crate) const IMAGE_TOO_LARGE: ValidationError =
    ValidationError::new("image", "Max file size is 5MB.");
pub(crate) const IMAGE_BAD_TYPE: ValidationError = ValidationError::new(
    "image",
    "Only .jpg, .jpeg, .png, .webp and .gif formats are supported.",
);
pub(crate) const BAD_DATA_URI: ValidationError = ValidationError::new(
    "photoDataUri",
    "Photo must be a data URI of the form data:<mimetype>;base64,<data>.",
);

/// An uploaded food photo that passed validation.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    bytes: Bytes,
    mime: String,
}

impl ImageQuery {
    /// Rules apply in order and the first failure wins: a file must be
    /// present, then the size limit, then the MIME allow-list.
    pub fn parse(file: Option<(Bytes, &str)>) -> Result<Self, ValidationError> {
        let Some((bytes, content_type)) = file.filter(|(b, _)| !b.is_empty()) else {
            return Err(IMAGE_REQUIRED);
        };
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(IMAGE_TOO_LARGE);
        }
        let mime = essence(content_type);
        if !ALLOWED_IMAGE_TYPES.contains(&mime.as_str()) {
            return Err(IMAGE_BAD_TYPE);
        }
        Ok(Self { bytes, mime })
    }

    /// Decodes a `data:` URI and runs the result through [`ImageQuery::parse`].
    pub fn from_data_uri(raw: &str) -> Result<Self, ValidationError> {
        let uri = DataUri::parse(raw)?;
        let bytes = Base64::decode_vec(&uri.data).map_err(|_| BAD_DATA_URI)?;
        Self::parse(Some((Bytes::from(bytes), uri.mime.as_str())))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The photo as the identification flow takes it. Built from the bytes
    /// directly; its `Display` form is the `data:` URI string.
    pub fn to_data_uri(&self) -> DataUri {
        DataUri {
            mime: self.mime.clone(),
            data: Base64::encode_string(&self.bytes),
        }
    }
}

/// `data:<mimetype>;base64,<data>` split into its parts. The payload stays
/// encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub data: String,
}

impl DataUri {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        lazy_static! {
            static ref DATA_URI_RE: Regex =
                Regex::new(r"^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=\s]*)$")
                    .unwrap();
        }
        let caps = DATA_URI_RE.captures(raw.trim()).ok_or(BAD_DATA_URI)?;
        let data: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(IMAGE_REQUIRED);
        }
        Ok(Self {
            mime: caps[1].to_ascii_lowercase(),
            data,
        })
    }
}

impl std::fmt::Display for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, self.data)
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
