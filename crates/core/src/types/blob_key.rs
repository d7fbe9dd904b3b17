//! Opaque keys addressing product images in the media store.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing a [`BlobKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobKeyError {
    #[error("blob key cannot be empty")]
    Empty,
    #[error("blob key must be at most {max} characters")]
    TooLong { max: usize },
    #[error("blob key contains invalid character {0:?}")]
    InvalidChar(char),
    #[error("blob key cannot start with a dot")]
    LeadingDot,
}

/// Key of a blob in the media store.
///
/// Keys are generated at upload time as `{uuid}.{ext}` and have no relation
/// to product IDs. Parsing accepts only ASCII alphanumerics, `-`, `_` and `.`
/// (never leading), so a key can always be used as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey(String);

impl BlobKey {
    /// Maximum accepted key length.
    pub const MAX_LENGTH: usize = 128;

    /// Extension used when the uploaded file name has none.
    pub const FALLBACK_EXTENSION: &'static str = "bin";

    const MAX_EXTENSION_LENGTH: usize = 8;

    /// Generate a fresh key, keeping the extension of the uploaded file name.
    ///
    /// The extension is lower-cased and must be short and alphanumeric,
    /// otherwise [`Self::FALLBACK_EXTENSION`] is used.
    #[must_use]
    pub fn generate(file_name: Option<&str>) -> Self {
        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= Self::MAX_EXTENSION_LENGTH
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| Self::FALLBACK_EXTENSION.to_owned());

        Self(format!("{}.{extension}", Uuid::new_v4()))
    }

    /// Parse an existing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, too long, starts with a dot, or
    /// contains a character outside `[A-Za-z0-9._-]`.
    pub fn parse(s: &str) -> Result<Self, BlobKeyError> {
        if s.is_empty() {
            return Err(BlobKeyError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(BlobKeyError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.starts_with('.') {
            return Err(BlobKeyError::LeadingDot);
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(BlobKeyError::InvalidChar(bad));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased extension after the last dot, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }

    /// MIME type to serve the blob with, derived from the extension.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("avif") => "image/avif",
            Some("svg") => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlobKey {
    type Error = BlobKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BlobKey> for String {
    fn from(key: BlobKey) -> Self {
        key.0
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keeps_extension() {
        let key = BlobKey::generate(Some("Toaster.Photo.JPG"));
        assert_eq!(key.extension(), Some("jpg"));
        assert_eq!(key.content_type(), "image/jpeg");
        assert!(BlobKey::parse(key.as_str()).is_ok());
    }

    #[test]
    fn test_generate_falls_back_for_odd_extensions() {
        assert_eq!(BlobKey::generate(None).extension(), Some("bin"));
        assert_eq!(BlobKey::generate(Some("noext")).extension(), Some("bin"));
        assert_eq!(
            BlobKey::generate(Some("x.tar/../../etc")).extension(),
            Some("bin")
        );
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = BlobKey::generate(Some("a.png"));
        let b = BlobKey::generate(Some("a.png"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_rejects_path_traversal() {
        assert_eq!(BlobKey::parse("../secret"), Err(BlobKeyError::LeadingDot));
        assert_eq!(
            BlobKey::parse("a/b.png"),
            Err(BlobKeyError::InvalidChar('/'))
        );
        assert_eq!(BlobKey::parse(""), Err(BlobKeyError::Empty));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<BlobKey, _> = serde_json::from_str("\"abc.png\"");
        assert!(ok.is_ok());
        let bad: Result<BlobKey, _> = serde_json::from_str("\"a b.png\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        let key = BlobKey::parse("file.heic").unwrap();
        assert_eq!(key.content_type(), "application/octet-stream");
    }
}
