//! Job envelopes and per-kind payloads.
//!
//! A broker entry carries a single JSON-encoded `data` field. Producers are
//! not entirely consistent about field names (`jobId` vs `taskId`, `clientId`
//! vs `userId`), so the envelope accepts both spellings on input and always
//! writes the canonical one on output.

use crate::errors::DecodeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A job as decoded from the `data` field of a stream entry.
///
/// `P` is the job-kind-specific payload, flattened into the same JSON object
/// as the business identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope<P> {
    /// Application-level business identifier, used for idempotency and logging
    #[serde(rename = "jobId", alias = "taskId")]
    pub job_id: String,

    /// Identifier of the client that submitted the job
    #[serde(rename = "clientId", alias = "userId", default)]
    pub client_id: Option<String>,

    /// Endpoint the result is delivered to
    pub callback_url: String,

    /// Opaque token carried through for callback signing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_token: Option<String>,

    /// Job-kind-specific payload fields
    #[serde(flatten)]
    pub payload: P,
}

/// Decode the raw `data` field of a stream entry.
///
/// A missing field and malformed JSON are both reported as [`DecodeError`];
/// the caller decides what to do with the undecodable entry.
pub fn decode_envelope<P: DeserializeOwned>(
    data: Option<&str>,
) -> Result<JobEnvelope<P>, DecodeError> {
    let data = data.ok_or(DecodeError::MissingData)?;
    Ok(serde_json::from_str(data)?)
}

/// Payload of a text fact-checking job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPayload {
    /// The statement to verify
    pub text: String,

    /// Producer-side hash of the submitted text, echoed back in the callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hash: Option<String>,

    /// Producer-side hash of the summary, echoed back in the callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_hash: Option<String>,
}

/// Payload of an image verification job (forensic or ML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Where to fetch the image from
    pub image_url: String,

    /// Producer-side hash of the image, echoed back in the callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_envelope() {
        let data = r#"{
            "jobId": "t1",
            "clientId": "c1",
            "callback_url": "http://x/cb",
            "text": "Apples are not blue"
        }"#;

        let envelope: JobEnvelope<TextPayload> = decode_envelope(Some(data)).unwrap();
        assert_eq!(envelope.job_id, "t1");
        assert_eq!(envelope.client_id.as_deref(), Some("c1"));
        assert_eq!(envelope.callback_url, "http://x/cb");
        assert_eq!(envelope.payload.text, "Apples are not blue");
        assert!(envelope.job_token.is_none());
    }

    #[test]
    fn accepts_task_id_and_user_id_aliases() {
        let data = r#"{
            "taskId": "t2",
            "userId": "u9",
            "callback_url": "http://x/cb",
            "image_url": "http://img/1.png",
            "image_hash": "abc",
            "job_token": "tok"
        }"#;

        let envelope: JobEnvelope<ImagePayload> = decode_envelope(Some(data)).unwrap();
        assert_eq!(envelope.job_id, "t2");
        assert_eq!(envelope.client_id.as_deref(), Some("u9"));
        assert_eq!(envelope.payload.image_url, "http://img/1.png");
        assert_eq!(envelope.payload.image_hash.as_deref(), Some("abc"));
        assert_eq!(envelope.job_token.as_deref(), Some("tok"));
    }

    #[test]
    fn missing_data_field_is_reported() {
        let err = decode_envelope::<TextPayload>(None).unwrap_err();
        assert!(matches!(err, DecodeError::MissingData));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = decode_envelope::<TextPayload>(Some("not json")).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        // No callback_url: structurally invalid, must not decode.
        let data = r#"{"jobId": "t3", "text": "hello"}"#;
        let err = decode_envelope::<TextPayload>(Some(data)).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
