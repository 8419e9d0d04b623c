//! Submit command - create a transcript record and dispatch it.

use super::{build_registry, open_store};
use crate::cli::Output;
use crate::config::Settings;
use crate::dispatch::{DispatchOutcome, Dispatcher};

/// Create a transcript for the audio reference and dispatch it to an engine.
pub async fn run_submit(
    audio: &str,
    engine: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let registry = build_registry(&settings)?;

    let engine_id = match engine {
        Some(id) => id,
        None => settings
            .engines
            .iter()
            .find(|e| e.active)
            .map(|e| e.id.clone())
            .ok_or_else(|| anyhow::anyhow!("No active engine configured; run 'tolk init'"))?,
    };

    let transcript = store.create_transcript(audio, &engine_id)?;
    Output::info(&format!("Created transcript {}", transcript.id));

    let dispatcher = Dispatcher::new(store, registry);
    match dispatcher.dispatch(&transcript.id).await? {
        DispatchOutcome::Submitted { external_job_id } => {
            Output::success(&format!(
                "Submitted to {} as job {}",
                engine_id, external_job_id
            ));
            Output::info(&format!(
                "Check progress with: tolk status {}",
                transcript.id
            ));
        }
        DispatchOutcome::Deferred => {
            Output::success(&format!(
                "Queued for local engine {}; recognition runs out-of-band",
                engine_id
            ));
        }
    }

    Ok(())
}
