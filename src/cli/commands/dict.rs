//! Dict command - manage the correction dictionary.

use super::open_store;
use crate::cli::{DictAction, Output};
use crate::config::Settings;
use console::style;

/// Manage correction dictionary pairs.
pub fn run_dict(action: &DictAction, settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;

    match action {
        DictAction::Add { wrong, correct } => {
            store.add_dictionary_entry(wrong, correct)?;
            Output::success(&format!("\"{}\" will be corrected to \"{}\"", wrong, correct));
        }

        DictAction::List => {
            let entries = store.dictionary_entries()?;
            if entries.is_empty() {
                Output::info("The correction dictionary is empty.");
                return Ok(());
            }

            Output::header("Correction Dictionary");
            for entry in &entries {
                println!(
                    "  {} {} {}",
                    style(&entry.wrong_text).red(),
                    style("->").dim(),
                    style(&entry.correct_text).green()
                );
            }
            println!();
            Output::info(&format!("{} pair(s), applied in this order.", entries.len()));
        }

        DictAction::Remove { wrong } => {
            if store.remove_dictionary_entry(wrong)? {
                Output::success(&format!("Removed \"{}\"", wrong));
            } else {
                Output::warning(&format!("No dictionary pair for \"{}\"", wrong));
            }
        }
    }

    Ok(())
}
