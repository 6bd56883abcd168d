//! Domain error types.

/// Errors raised while decoding a raw stream entry into a typed job.
///
/// Decoding is structural only; anything beyond JSON shape is the
/// responsibility of the inference collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The stream entry has no `data` field to decode
    #[error("stream entry is missing the data field")]
    MissingData,

    /// The `data` field is not a valid job envelope
    #[error("malformed job payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
