//! Compact scannable payload printed on certificate labels.
//!
//! Format: `QC1.` followed by unpadded base64url of a small JSON object
//! `{"c": certificate id, "b": batch id, "u": dereference URL}`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const QR_PREFIX: &str = "QC1.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    #[serde(rename = "c")]
    pub certificate_id: Uuid,
    #[serde(rename = "b")]
    pub batch_id: Uuid,
    #[serde(rename = "u")]
    pub url: String,
}

impl QrPayload {
    pub fn encode(&self) -> String {
        // Serializing a struct of uuids and a string cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        format!("{QR_PREFIX}{}", URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(raw: &str) -> Result<Self, QrError> {
        let body = raw
            .trim()
            .strip_prefix(QR_PREFIX)
            .ok_or(QrError::UnknownFormat)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| QrError::Encoding(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| QrError::Content(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR payload does not start with '{QR_PREFIX}'")]
    UnknownFormat,

    #[error("QR payload is not valid base64url: {0}")]
    Encoding(String),

    #[error("QR payload does not contain certificate, batch and url fields: {0}")]
    Content(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QrPayload {
        QrPayload {
            certificate_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            url: "https://quality-cert.dev/credentials/mock-1".to_string(),
        }
    }

    #[test]
    fn test_encoded_form_is_compact_and_prefixed() {
        let encoded = sample().encode();
        assert!(encoded.starts_with(QR_PREFIX));
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        assert_eq!(QrPayload::decode(&encoded).unwrap().url, sample().url);
    }

    #[test]
    fn test_decode_errors_are_descriptive() {
        assert!(matches!(QrPayload::decode("hello"), Err(QrError::UnknownFormat)));
        assert!(matches!(QrPayload::decode("QC1.***"), Err(QrError::Encoding(_))));

        let not_ours = format!("{QR_PREFIX}{}", URL_SAFE_NO_PAD.encode(br#"{"x":1}"#));
        let err = QrPayload::decode(&not_ours).unwrap_err();
        assert!(matches!(err, QrError::Content(_)));
        assert!(err.to_string().contains("certificate"));
    }
}
