//! Job dispatch: decode, process, deliver, decide on acknowledgement.

use crate::callback::CallbackPublisher;
use crate::metrics::WorkerMetrics;
use crate::processor::Processor;
use crate::stream::RawEntry;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use veristream_domain::{callback_payload, decode_envelope, JobEnvelope, JobKind};

/// What the source loop should do with an entry after one dispatch attempt.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOutcome {
    /// Acknowledge and delete the entry
    pub ack: bool,
    /// The result reached the callback endpoint
    pub published: bool,
}

/// Decodes entries, invokes the processing collaborator and delivers results.
///
/// The acknowledgement decision encodes the two load-bearing tradeoffs:
/// - a processing failure leaves the entry pending, so the job is
///   redelivered (at-least-once processing);
/// - a callback-delivery failure after successful processing still
///   acknowledges, because re-running expensive inference to repair a
///   transient delivery problem would duplicate costly work. Result delivery
///   is best-effort and accounted for in the metrics.
pub struct Dispatcher<K: JobKind> {
    processor: Arc<dyn Processor<K::Payload>>,
    publisher: CallbackPublisher,
    metrics: WorkerMetrics,
    _kind: PhantomData<K>,
}

impl<K: JobKind> Dispatcher<K> {
    pub fn new(
        processor: Arc<dyn Processor<K::Payload>>,
        publisher: CallbackPublisher,
        metrics: WorkerMetrics,
    ) -> Self {
        Self {
            processor,
            publisher,
            metrics,
            _kind: PhantomData,
        }
    }

    pub async fn dispatch(&self, source: &str, entry: &RawEntry) -> DispatchOutcome {
        self.metrics.increment_jobs_processed();

        let envelope: JobEnvelope<K::Payload> = match decode_envelope(entry.data.as_deref()) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Left pending on purpose: a truly corrupt message should be
                // inspectable by an operator, not silently vanish.
                error!(
                    source,
                    entry_id = %entry.id,
                    error = %e,
                    "undecodable entry left pending"
                );
                self.metrics.increment_jobs_failed();
                return DispatchOutcome {
                    ack: false,
                    published: false,
                };
            }
        };

        info!(
            source,
            job_id = %envelope.job_id,
            entry_id = %entry.id,
            "processing job"
        );
        let start = Instant::now();

        let verdict = match self.processor.process(&envelope.payload).await {
            Ok(verdict) => verdict,
            Err(e) => {
                // The at-least-once guarantee: the entry stays pending and
                // will be redelivered.
                error!(
                    source,
                    job_id = %envelope.job_id,
                    entry_id = %entry.id,
                    error = %e,
                    "processing failed, entry left pending"
                );
                self.metrics.increment_jobs_failed();
                return DispatchOutcome {
                    ack: false,
                    published: false,
                };
            }
        };

        let duration = start.elapsed();
        self.metrics.record_job_duration(duration);
        self.metrics.increment_jobs_succeeded();
        info!(
            source,
            job_id = %envelope.job_id,
            mark = %verdict.mark,
            duration_ms = duration.as_millis(),
            "job processed"
        );

        let payload = callback_payload::<K>(&envelope, &verdict);
        match self.publisher.publish(&envelope.callback_url, payload).await {
            Ok(()) => DispatchOutcome {
                ack: true,
                published: true,
            },
            Err(e) => {
                warn!(
                    source,
                    job_id = %envelope.job_id,
                    callback_url = %envelope.callback_url,
                    error = %e,
                    "callback delivery failed, result dropped"
                );
                self.metrics.increment_callbacks_failed();
                DispatchOutcome {
                    ack: true,
                    published: false,
                }
            }
        }
    }
}
