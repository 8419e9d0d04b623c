//! Replace command - manual find/replace on one segment.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::dictionary::manual_replace;

/// Replace text in a single segment, optionally remembering the pair.
pub fn run_replace(
    segment_id: &str,
    from: &str,
    to: &str,
    remember: bool,
    settings: Settings,
) -> anyhow::Result<()> {
    let store = open_store(&settings)?;

    let changed = manual_replace(&store, segment_id, from, to, remember)?;
    if changed {
        Output::success(&format!("Replaced \"{}\" with \"{}\"", from, to));
    } else {
        Output::info(&format!("Segment does not contain \"{}\"", from));
    }
    if remember {
        Output::info("Saved the pair to the correction dictionary.");
    }

    Ok(())
}
