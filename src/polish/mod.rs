//! Polishing pipeline: batched AI rewriting with rate-limit resilience.
//!
//! Segments are processed in `start_ms` order, in fixed-size batches, one
//! batch at a time. Sequential batches are a deliberate throttle against the
//! rewriting model's rate limits, not a missed optimization. Each batch's
//! rewrites are persisted before its progress event is emitted, so a caller
//! disconnecting mid-run loses at most the event stream, never durable work.
//!
//! A batch failure never aborts the run: rate limits get one retry after a
//! cooldown, other failures skip the batch, and partial failure is reported
//! through the polished-vs-processed counts on the final `done` event.
//!
//! Segments must not be mutated concurrently by this pipeline and the
//! dictionary pass; serializing the two per transcript is the caller's
//! contract.

mod clean;
mod parse;

pub use clean::collapse_logographic_spacing;
pub use parse::parse_batch_response;

use crate::config::{PolishPrompts, PolishingSettings};
use crate::error::{Result, TolkError};
use crate::rewrite::Rewriter;
use crate::store::SqliteStore;
use crate::transcript::Segment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Progress events streamed to the caller while a run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Emitted after every batch.
    Progress {
        /// Percentage complete, 0-100.
        progress: u8,
        /// Batches completed so far.
        completed: usize,
        /// Total batches in this run.
        total: usize,
        /// Cumulative successfully polished segments.
        polished: usize,
    },
    /// Emitted before the cooldown when the model rate-limits a batch.
    Waiting { message: String },
    /// Emitted once, at the end of every run.
    #[serde(rename_all = "camelCase")]
    Done {
        processed_count: usize,
        polished_count: usize,
    },
}

/// Final counts of a polishing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolishSummary {
    /// Segments the run covered.
    pub processed_count: usize,
    /// Segments whose rewrite was persisted.
    pub polished_count: usize,
}

/// Batched, rate-limited rewriting pass over a transcript's segments.
pub struct PolishingPipeline {
    store: Arc<SqliteStore>,
    rewriter: Arc<dyn Rewriter>,
    prompts: PolishPrompts,
    batch_size: usize,
    inter_batch_delay: Duration,
    rate_limit_cooldown: Duration,
}

impl PolishingPipeline {
    pub fn new(
        store: Arc<SqliteStore>,
        rewriter: Arc<dyn Rewriter>,
        prompts: PolishPrompts,
        batch_size: usize,
        inter_batch_delay: Duration,
        rate_limit_cooldown: Duration,
    ) -> Self {
        Self {
            store,
            rewriter,
            prompts,
            batch_size: batch_size.max(1),
            inter_batch_delay,
            rate_limit_cooldown,
        }
    }

    pub fn from_settings(
        store: Arc<SqliteStore>,
        rewriter: Arc<dyn Rewriter>,
        settings: &PolishingSettings,
    ) -> Self {
        Self::new(
            store,
            rewriter,
            PolishPrompts::default(),
            settings.batch_size,
            Duration::from_millis(settings.inter_batch_delay_ms),
            Duration::from_millis(settings.rate_limit_cooldown_ms),
        )
    }

    /// Polish every segment of a transcript, streaming progress into `events`.
    ///
    /// The run always finishes with a `done` event; batch failures are folded
    /// into the counts rather than propagated. A closed receiver stops event
    /// delivery but not the run. The returned summary mirrors the final event.
    #[instrument(skip(self, events))]
    pub async fn run(
        &self,
        transcript_id: &str,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Result<PolishSummary> {
        let segments = self.store.segments_for_transcript(transcript_id)?;
        let total_batches = segments.len().div_ceil(self.batch_size);
        let mut polished = 0usize;

        info!(
            "Polishing {} segments of transcript {} in {} batches",
            segments.len(),
            transcript_id,
            total_batches
        );

        for (batch_index, batch) in segments.chunks(self.batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(self.inter_batch_delay).await;
            }

            polished += self.polish_batch(batch, &events).await;

            let completed = batch_index + 1;
            let progress = (completed * 100 / total_batches) as u8;
            let _ = events
                .send(ProgressEvent::Progress {
                    progress,
                    completed,
                    total: total_batches,
                    polished,
                })
                .await;
        }

        let summary = PolishSummary {
            processed_count: segments.len(),
            polished_count: polished,
        };
        let _ = events
            .send(ProgressEvent::Done {
                processed_count: summary.processed_count,
                polished_count: summary.polished_count,
            })
            .await;

        info!(
            "Polishing done for transcript {}: {}/{} segments",
            transcript_id, summary.polished_count, summary.processed_count
        );
        Ok(summary)
    }

    /// Polish one batch: request, parse, persist. Returns the number of
    /// segments whose rewrite was written.
    async fn polish_batch(
        &self,
        batch: &[Segment],
        events: &mpsc::Sender<ProgressEvent>,
    ) -> usize {
        let prompt = self.build_prompt(batch);

        let response = match self.rewriter.rewrite(&prompt).await {
            Ok(response) => response,
            Err(TolkError::RateLimited(message)) => {
                warn!("Rate limited, cooling down: {}", message);
                let _ = events
                    .send(ProgressEvent::Waiting {
                        message: format!(
                            "Rate limited by rewriting model, retrying in {}s",
                            self.rate_limit_cooldown.as_secs()
                        ),
                    })
                    .await;
                tokio::time::sleep(self.rate_limit_cooldown).await;

                // Exactly one retry, then the batch is skipped for this run.
                match self.rewriter.rewrite(&prompt).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Retry failed, skipping batch: {}", e);
                        return 0;
                    }
                }
            }
            Err(e) => {
                warn!("Rewrite request failed, skipping batch: {}", e);
                return 0;
            }
        };

        let mut written = 0;
        for (index, text) in parse_batch_response(&response, batch.len()) {
            match self.store.update_edited_text(&batch[index].id, &text) {
                Ok(()) => written += 1,
                Err(e) => warn!("Failed to persist rewrite for segment {}: {}", batch[index].id, e),
            }
        }
        written
    }

    fn build_prompt(&self, batch: &[Segment]) -> String {
        let lines = batch
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                format!("{}|{}", index, collapse_logographic_spacing(segment.effective_text()))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("count".to_string(), batch.len().to_string());
        vars.insert("lines".to_string(), lines);
        PolishPrompts::render(&self.prompts.user, &vars)
    }
}
