//! Image sources: base64 data URIs and remote URLs.
//!
//! DESIGN
//! ======
//! The editor moves images around as strings, exactly as the browser hands
//! them over: `data:<mime>;base64,<payload>` for uploaded and generated
//! images, plain URLs for the placeholder. `ImageSource` keeps that string
//! form on the wire (serde `into`/`try_from`) while giving the services a
//! typed view of the mime type and payload size.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Shown when a session has no stored image yet.
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "https://placehold.co/800x600.png?text=Start+Editing!";

/// Upper bound for uploaded and reference images, in decoded bytes.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Mime types accepted for a fresh upload.
pub const SUPPORTED_UPLOAD_MIMES: [&str; 6] =
    ["image/jpeg", "image/jpg", "image/png", "image/webp", "image/gif", "image/bmp"];

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";
const DOWNLOAD_STEM: &str = "imagigenius-edit";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("not a data URI")]
    NotDataUri,
    #[error("data URI is not base64 encoded")]
    NotBase64,
    #[error("data URI has no mime type")]
    MissingMime,
    #[error("data URI payload is not valid base64")]
    InvalidPayload,
    #[error("Please upload a supported image file (JPEG, PNG, WebP, GIF, BMP).")]
    UnsupportedUpload { mime: String },
    #[error("Please upload an image file for the reference.")]
    NotAnImage { mime: String },
    #[error("Image must be less than {}MB. Your file is {}MB.", MAX_IMAGE_BYTES / (1024 * 1024), .size.div_ceil(1024 * 1024))]
    TooLarge { size: usize },
}

impl crate::error::ErrorCode for ImageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotDataUri | Self::NotBase64 | Self::MissingMime | Self::InvalidPayload => "E_INVALID_IMAGE",
            Self::UnsupportedUpload { .. } | Self::NotAnImage { .. } => "E_UNSUPPORTED_IMAGE",
            Self::TooLarge { .. } => "E_IMAGE_TOO_LARGE",
        }
    }
}

// =============================================================================
// DATA URI
// =============================================================================

/// A parsed `data:<mime>;base64,<payload>` URI. The payload stays encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime: String,
    data: String,
    decoded_len: usize,
}

impl DataUri {
    /// Parse and validate a base64 data URI.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] when the prefix, the base64 marker, the mime
    /// type, or the payload encoding is missing or malformed.
    pub fn parse(raw: &str) -> Result<Self, ImageError> {
        let rest = raw.strip_prefix(DATA_PREFIX).ok_or(ImageError::NotDataUri)?;
        let (mime, data) = rest.split_once(BASE64_MARKER).ok_or(ImageError::NotBase64)?;
        if mime.trim().is_empty() {
            return Err(ImageError::MissingMime);
        }
        let decoded_len = STANDARD
            .decode(data)
            .map_err(|_| ImageError::InvalidPayload)?
            .len();
        Ok(Self { mime: mime.to_ascii_lowercase(), data: data.to_owned(), decoded_len })
    }

    /// Build a data URI from an already-encoded payload (e.g. a model response).
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidPayload`] if `data` is not valid base64.
    pub fn from_base64(mime: &str, data: &str) -> Result<Self, ImageError> {
        if mime.trim().is_empty() {
            return Err(ImageError::MissingMime);
        }
        let decoded_len = STANDARD
            .decode(data)
            .map_err(|_| ImageError::InvalidPayload)?
            .len();
        Ok(Self { mime: mime.to_ascii_lowercase(), data: data.to_owned(), decoded_len })
    }

    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The base64 payload, without the `data:` header.
    #[must_use]
    pub fn base64(&self) -> &str {
        &self.data
    }

    #[must_use]
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Decode the payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidPayload`] if decoding fails.
    pub fn bytes(&self) -> Result<Vec<u8>, ImageError> {
        STANDARD.decode(&self.data).map_err(|_| ImageError::InvalidPayload)
    }

    /// File extension derived from the mime subtype (`image/svg+xml` -> `svg`).
    #[must_use]
    pub fn file_extension(&self) -> &str {
        self.mime
            .split_once('/')
            .map(|(_, sub)| sub.split('+').next().unwrap_or(sub))
            .filter(|ext| !ext.is_empty())
            .unwrap_or("png")
    }

    #[must_use]
    pub fn download_name(&self) -> String {
        format!("{DOWNLOAD_STEM}.{}", self.file_extension())
    }

    /// Validate a fresh upload: supported mime and size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::UnsupportedUpload`] or [`ImageError::TooLarge`].
    pub fn validate_upload(&self) -> Result<(), ImageError> {
        if !SUPPORTED_UPLOAD_MIMES.contains(&self.mime.as_str()) {
            return Err(ImageError::UnsupportedUpload { mime: self.mime.clone() });
        }
        self.check_size()
    }

    /// Validate a reference image for the object tool: any `image/*` mime.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::NotAnImage`] or [`ImageError::TooLarge`].
    pub fn validate_reference(&self) -> Result<(), ImageError> {
        if !self.mime.starts_with("image/") {
            return Err(ImageError::NotAnImage { mime: self.mime.clone() });
        }
        self.check_size()
    }

    fn check_size(&self) -> Result<(), ImageError> {
        if self.decoded_len > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge { size: self.decoded_len });
        }
        Ok(())
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DATA_PREFIX}{}{BASE64_MARKER}{}", self.mime, self.data)
    }
}

// =============================================================================
// IMAGE SOURCE
// =============================================================================

/// Either an inline data URI or a remote URL (only the placeholder in practice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ImageSource {
    Data(DataUri),
    Url(String),
}

impl ImageSource {
    /// Interpret a stored string: `data:` strings must parse, anything else is a URL.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] for a malformed data URI.
    pub fn parse(raw: &str) -> Result<Self, ImageError> {
        if raw.starts_with(DATA_PREFIX) {
            DataUri::parse(raw).map(Self::Data)
        } else {
            Ok(Self::Url(raw.to_owned()))
        }
    }

    #[must_use]
    pub fn placeholder() -> Self {
        Self::Url(DEFAULT_PLACEHOLDER_IMAGE.to_owned())
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Url(url) if url == DEFAULT_PLACEHOLDER_IMAGE)
    }

    #[must_use]
    pub fn as_data(&self) -> Option<&DataUri> {
        match self {
            Self::Data(uri) => Some(uri),
            Self::Url(_) => None,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(uri) => uri.fmt(f),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl From<DataUri> for ImageSource {
    fn from(uri: DataUri) -> Self {
        Self::Data(uri)
    }
}

impl From<ImageSource> for String {
    fn from(source: ImageSource) -> Self {
        source.to_string()
    }
}

impl TryFrom<String> for ImageSource {
    type Error = ImageError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

#[cfg(test)]
#[path = "image_test.rs"]
mod tests;
