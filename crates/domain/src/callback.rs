//! Outbound callback payload construction.

use crate::envelope::JobEnvelope;
use crate::kind::JobKind;
use crate::verdict::Verdict;
use serde_json::{Map, Value};

/// Build the JSON body POSTed to a job's callback endpoint.
///
/// The payload merges the business identifiers from the envelope, the verdict
/// fields, and the kind-specific echo fields. `mark`, `reason` and
/// `confidence` are always present (null when the collaborator returned
/// nothing); kind-specific fields are added only when they carry a value.
///
/// The `hmac` signature field is not added here; signing happens at the
/// delivery layer, over the canonical encoding of this payload.
pub fn callback_payload<K: JobKind>(
    envelope: &JobEnvelope<K::Payload>,
    verdict: &Verdict,
) -> Value {
    let mut out = Map::new();
    out.insert("jobId".into(), Value::String(envelope.job_id.clone()));
    if let Some(client_id) = &envelope.client_id {
        out.insert("clientId".into(), Value::String(client_id.clone()));
    }
    if let Some(token) = &envelope.job_token {
        out.insert("job_token".into(), Value::String(token.clone()));
    }
    out.insert("mark".into(), Value::String(verdict.mark.clone()));
    out.insert("reason".into(), serde_json::json!(verdict.reason));
    out.insert("confidence".into(), serde_json::json!(verdict.confidence));
    K::callback_fields(&envelope.payload, verdict, &mut out);
    Value::Object(out)
}
