//! Correct command - apply the dictionary pass to a transcript.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::dictionary::apply_dictionary;

/// Apply every dictionary pair to the transcript's segments.
pub fn run_correct(transcript_id: &str, settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;

    let entries = store.dictionary_entries()?;
    if entries.is_empty() {
        Output::warning("The correction dictionary is empty. Add pairs with 'tolk dict add'.");
        return Ok(());
    }

    let corrected = apply_dictionary(&store, transcript_id)?;
    if corrected == 0 {
        Output::info("No segments matched any dictionary pair.");
    } else {
        Output::success(&format!(
            "Corrected {} segment{} with {} dictionary pair{}",
            corrected,
            if corrected == 1 { "" } else { "s" },
            entries.len(),
            if entries.len() == 1 { "" } else { "s" },
        ));
    }

    Ok(())
}
