//! Verdicts produced by the inference collaborator.

use serde::{Deserialize, Serialize};

/// Outcome of processing one job.
///
/// This is the boundary to the out-of-scope ML/LLM logic: the worker never
/// interprets these fields, it only forwards them to the callback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// The verdict itself, e.g. "Correct" or "AI-generated"
    pub mark: String,

    /// Human-readable justification
    #[serde(default)]
    pub reason: Option<String>,

    /// Confidence in the mark, 0-100
    #[serde(default)]
    pub confidence: Option<f64>,

    /// Supporting source URLs (text verification only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,

    /// Summary of the verified text (text verification only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Verdict {
    /// Shorthand for a verdict with just the required fields.
    pub fn new(mark: impl Into<String>) -> Self {
        Self {
            mark: mark.into(),
            reason: None,
            confidence: None,
            urls: None,
            summary: None,
        }
    }
}
