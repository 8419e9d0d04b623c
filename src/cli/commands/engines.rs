//! Engines command - list configured engines and usage statistics.

use super::{build_registry, open_store};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::EngineStatus;
use console::style;

/// List registered engines with their cumulative usage.
pub fn run_engines(settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let registry = build_registry(&settings)?;

    let engines = registry.list();
    if engines.is_empty() {
        Output::warning("No engines configured. Run 'tolk init' to seed the defaults.");
        return Ok(());
    }

    Output::header("Engines");
    for engine in &engines {
        let status = match engine.status {
            EngineStatus::Active => style("active").green(),
            EngineStatus::Inactive => style("inactive").dim(),
        };
        println!(
            "  {} {} ({}, {}, {})",
            style("*").cyan(),
            style(&engine.display_name).bold(),
            style(&engine.id).dim(),
            engine.kind,
            status
        );

        let stats = store.engine_stats(&engine.id)?;
        if stats.jobs_completed > 0 {
            Output::kv(
                "usage",
                &format!(
                    "{:.1} min across {} job(s), {:.1} min/job",
                    stats.minutes_processed, stats.jobs_completed, stats.avg_minutes_per_job
                ),
            );
        }
    }

    Ok(())
}
