//! Job kinds.
//!
//! The three deployed worker variants (text, image forensic, image ML) share
//! the same control flow and differ only in stream key, payload shape and
//! which fields they echo back to the callback endpoint. That variation is
//! captured here so the worker engine can stay generic.

use crate::envelope::{ImagePayload, TextPayload};
use crate::verdict::Verdict;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Compile-time description of one job kind.
pub trait JobKind: Send + Sync + 'static {
    /// Payload carried by this kind of job
    type Payload: Serialize + DeserializeOwned + Clone + Debug + Send + Sync;

    /// Short name used in logs and configuration
    const NAME: &'static str;

    /// Default stream key for this kind
    const STREAM_KEY: &'static str;

    /// Add the kind-specific fields to an outbound callback payload.
    fn callback_fields(payload: &Self::Payload, verdict: &Verdict, out: &mut Map<String, Value>);
}

/// Text fact-checking jobs.
pub struct TextJob;

impl JobKind for TextJob {
    type Payload = TextPayload;

    const NAME: &'static str = "text";
    const STREAM_KEY: &'static str = "stream:ai:text:jobs";

    fn callback_fields(payload: &Self::Payload, verdict: &Verdict, out: &mut Map<String, Value>) {
        if let Some(hash) = &payload.text_hash {
            out.insert("text_hash".into(), Value::String(hash.clone()));
        }
        if let Some(hash) = &payload.summary_hash {
            out.insert("summary_hash".into(), Value::String(hash.clone()));
        }
        if let Some(urls) = &verdict.urls {
            out.insert("urls".into(), serde_json::json!(urls));
        }
        if let Some(summary) = &verdict.summary {
            out.insert("summary".into(), Value::String(summary.clone()));
        }
    }
}

fn image_callback_fields(payload: &ImagePayload, out: &mut Map<String, Value>) {
    out.insert("image_url".into(), Value::String(payload.image_url.clone()));
    if let Some(hash) = &payload.image_hash {
        out.insert("image_hash".into(), Value::String(hash.clone()));
    }
}

/// Image verification via forensic analysis.
pub struct ImageForensicJob;

impl JobKind for ImageForensicJob {
    type Payload = ImagePayload;

    const NAME: &'static str = "image-forensic";
    const STREAM_KEY: &'static str = "stream:ai:imageforensic:jobs";

    fn callback_fields(payload: &Self::Payload, _verdict: &Verdict, out: &mut Map<String, Value>) {
        image_callback_fields(payload, out);
    }
}

/// Image verification via ML classifiers.
pub struct ImageMlJob;

impl JobKind for ImageMlJob {
    type Payload = ImagePayload;

    const NAME: &'static str = "image-ml";
    const STREAM_KEY: &'static str = "stream:ai:imageml:jobs";

    fn callback_fields(payload: &Self::Payload, _verdict: &Verdict, out: &mut Map<String, Value>) {
        image_callback_fields(payload, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_kind_echoes_hashes_and_verdict_extras() {
        let payload = TextPayload {
            text: "x".into(),
            text_hash: Some("th".into()),
            summary_hash: None,
        };
        let mut verdict = Verdict::new("Correct");
        verdict.urls = Some(vec!["http://a".into()]);
        verdict.summary = Some("s".into());

        let mut out = Map::new();
        TextJob::callback_fields(&payload, &verdict, &mut out);

        assert_eq!(out["text_hash"], "th");
        assert!(out.get("summary_hash").is_none());
        assert_eq!(out["urls"], serde_json::json!(["http://a"]));
        assert_eq!(out["summary"], "s");
    }

    #[test]
    fn image_kinds_echo_url_and_hash() {
        let payload = ImagePayload {
            image_url: "http://img/1.png".into(),
            image_hash: Some("ih".into()),
        };
        let verdict = Verdict::new("AI-generated");

        let mut out = Map::new();
        ImageForensicJob::callback_fields(&payload, &verdict, &mut out);

        assert_eq!(out["image_url"], "http://img/1.png");
        assert_eq!(out["image_hash"], "ih");
    }
}
