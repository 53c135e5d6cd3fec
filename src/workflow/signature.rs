use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// Where a captured signature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureSource {
    Drawn,
    Uploaded,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Signature is empty")]
    Empty,
    #[error("Signature is not valid base64: {0}")]
    InvalidEncoding(String),
}

/// An opaque base64 image payload, optionally wrapped in a `data:` URL.
///
/// Pixel content is never inspected; a signature is accepted when it decodes
/// to at least one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    payload: String,
    source: SignatureSource,
}

impl Signature {
    pub fn new(payload: impl Into<String>, source: SignatureSource) -> Result<Self, SignatureError> {
        let payload = payload.into().trim().to_string();
        let encoded = strip_data_url(&payload);
        if encoded.is_empty() {
            return Err(SignatureError::Empty);
        }
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
        if bytes.is_empty() {
            return Err(SignatureError::Empty);
        }
        Ok(Self { payload, source })
    }

    /// Wrap raw image bytes (an uploaded file) as a data URL
    pub fn from_image_bytes(bytes: &[u8], content_type: &str) -> Result<Self, SignatureError> {
        if bytes.is_empty() {
            return Err(SignatureError::Empty);
        }
        let payload = format!("data:{content_type};base64,{}", BASE64.encode(bytes));
        Ok(Self {
            payload,
            source: SignatureSource::Uploaded,
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn source(&self) -> SignatureSource {
        self.source
    }
}

fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(";base64,") {
        Some((prefix, encoded)) if prefix.starts_with("data:") => encoded,
        _ => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_data_url_payloads() {
        let plain = Signature::new("iVBORw0KGgo=", SignatureSource::Drawn).unwrap();
        assert_eq!(plain.payload(), "iVBORw0KGgo=");

        let url = Signature::new("data:image/png;base64,iVBORw0KGgo=", SignatureSource::Profile).unwrap();
        assert_eq!(url.source(), SignatureSource::Profile);
    }

    #[test]
    fn test_rejects_empty_canvas_payloads() {
        assert_eq!(Signature::new("  ", SignatureSource::Drawn), Err(SignatureError::Empty));
        assert_eq!(
            Signature::new("data:image/png;base64,", SignatureSource::Drawn),
            Err(SignatureError::Empty)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Signature::new("not base64!!", SignatureSource::Uploaded),
            Err(SignatureError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_uploaded_bytes_become_data_url() {
        let sig = Signature::from_image_bytes(&[0x89, 0x50, 0x4e, 0x47], "image/png").unwrap();
        assert_eq!(sig.payload(), "data:image/png;base64,iVBORw==");
        assert_eq!(sig.source(), SignatureSource::Uploaded);
        assert!(Signature::new(sig.payload(), SignatureSource::Uploaded).is_ok());
    }
}
