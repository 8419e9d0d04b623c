//! Polish command - rewrite a transcript's segments with progress display.

use super::open_store;
use crate::cli::Output;
use crate::config::{PolishPrompts, Settings};
use crate::polish::{PolishingPipeline, ProgressEvent};
use crate::rewrite::OpenAiRewriter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Run the polishing pipeline with a live progress bar.
pub async fn run_polish(
    transcript_id: &str,
    model: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let model = model.unwrap_or_else(|| settings.polishing.model.clone());

    let segments = store.segments_for_transcript(transcript_id)?;
    if segments.is_empty() {
        Output::warning("Transcript has no segments to polish yet.");
        return Ok(());
    }

    Output::info(&format!(
        "Polishing {} segments with {}",
        segments.len(),
        model
    ));

    let pipeline = PolishingPipeline::new(
        store,
        Arc::new(OpenAiRewriter::new(&model)),
        PolishPrompts::default(),
        settings.polishing.batch_size,
        Duration::from_millis(settings.polishing.inter_batch_delay_ms),
        Duration::from_millis(settings.polishing.rate_limit_cooldown_ms),
    );

    let (tx, mut rx) = mpsc::channel(32);
    let id = transcript_id.to_string();
    let handle = tokio::spawn(async move { pipeline.run(&id, tx).await });

    let pb = Output::progress_bar(1, "polishing");
    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::Progress {
                completed,
                total,
                polished,
                ..
            } => {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
                pb.set_message(format!("{} segments polished", polished));
            }
            ProgressEvent::Waiting { message } => {
                pb.println(format!("  {}", message));
            }
            ProgressEvent::Done { .. } => {}
        }
    }
    pb.finish_and_clear();

    let summary = handle.await??;

    if summary.polished_count == summary.processed_count {
        Output::success(&format!("Polished all {} segments.", summary.polished_count));
    } else {
        Output::warning(&format!(
            "Polished {} of {} segments; the rest keep their previous text.",
            summary.polished_count, summary.processed_count
        ));
    }

    Ok(())
}
