//! Status command - poll a transcript's recognition job.

use super::{build_registry, open_store};
use crate::cli::{format_duration, Output};
use crate::config::Settings;
use crate::poller::Poller;
use crate::transcript::TranscriptStatus;
use std::time::Duration;

const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll the engine for the transcript's job and print the result.
pub async fn run_status(transcript_id: &str, wait: bool, settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let registry = build_registry(&settings)?;
    let poller = Poller::new(store.clone(), registry);

    let status = if wait {
        let spinner = Output::spinner("Waiting for recognition to finish...");
        let status = loop {
            let status = poller.poll(transcript_id).await?;
            if status.is_terminal() {
                break status;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        };
        spinner.finish_and_clear();
        status
    } else {
        poller.poll(transcript_id).await?
    };

    let transcript = store.require_transcript(transcript_id)?;

    Output::header(&format!("Transcript {}", transcript.id));
    Output::kv("Status", &status.to_string());
    Output::kv("Engine", &transcript.engine_id);
    Output::kv("Audio", &transcript.audio_reference);
    if let Some(job_id) = &transcript.external_job_id {
        Output::kv("Job", job_id);
    }

    match status {
        TranscriptStatus::Ready => {
            if let Some(duration) = transcript.duration_seconds {
                Output::kv("Duration", &format_duration(duration));
            }
            if !transcript.speakers.is_empty() {
                Output::kv("Speakers", &transcript.speakers.len().to_string());
            }

            let segments = store.segments_for_transcript(transcript_id)?;
            Output::kv("Segments", &segments.len().to_string());
            println!();
            for segment in segments.iter().take(5) {
                Output::segment(&segment.speaker, segment.start_ms, segment.effective_text());
            }
            if segments.len() > 5 {
                Output::info(&format!("... and {} more", segments.len() - 5));
            }
        }
        TranscriptStatus::Error => {
            if let Some(message) = &transcript.error_message {
                Output::error(message);
            }
        }
        _ => {
            Output::info("Recognition still in progress; run this command again later.");
        }
    }

    Ok(())
}
