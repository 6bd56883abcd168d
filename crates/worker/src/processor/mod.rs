//! The inference collaborator boundary.
//!
//! Everything that decides whether text is "Correct" or an image is
//! "AI-generated" lives behind [`Processor`]. The worker only knows that a
//! call may take a long time and may fail; a failure leaves the entry
//! pending for redelivery.

pub mod http;
pub mod tokens;

pub use http::HttpProcessor;
pub use tokens::TokenPool;

use anyhow::Result;
use async_trait::async_trait;
use veristream_domain::Verdict;

/// The external processing collaborator.
///
/// No concurrency contract is assumed: the engine calls this from one source
/// loop at a time per job, but implementations shared across sources must be
/// safe to call concurrently (hence `Send + Sync`).
#[async_trait]
pub trait Processor<P>: Send + Sync {
    async fn process(&self, payload: &P) -> Result<Verdict>;
}
