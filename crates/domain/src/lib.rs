//! Veristream domain model
//!
//! Shared types for the content-verification pipeline:
//! - Job envelopes as they arrive on the broker stream
//! - Job kinds (text fact-checking, image forensics, image ML)
//! - Verdicts produced by the inference collaborator
//! - Callback payload construction

pub mod callback;
pub mod envelope;
pub mod errors;
pub mod kind;
pub mod verdict;

pub use callback::callback_payload;
pub use envelope::{decode_envelope, ImagePayload, JobEnvelope, TextPayload};
pub use errors::DecodeError;
pub use kind::{ImageForensicJob, ImageMlJob, JobKind, TextJob};
pub use verdict::Verdict;
