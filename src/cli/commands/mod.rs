//! CLI command implementations.

mod correct;
mod dict;
mod engines;
mod init;
mod polish;
mod replace;
mod serve;
mod status;
mod submit;

pub use correct::run_correct;
pub use dict::run_dict;
pub use engines::run_engines;
pub use init::run_init;
pub use polish::run_polish;
pub use replace::run_replace;
pub use serve::run_serve;
pub use status::run_status;
pub use submit::run_submit;

use crate::config::Settings;
use crate::engine::EngineRegistry;
use crate::store::SqliteStore;
use std::sync::Arc;

/// Open the transcript store at the configured location.
fn open_store(settings: &Settings) -> anyhow::Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::new(&settings.sqlite_path())?))
}

/// Build the engine registry from configuration.
fn build_registry(settings: &Settings) -> anyhow::Result<Arc<EngineRegistry>> {
    let descriptors = settings.engines.iter().map(|e| e.to_descriptor()).collect();
    Ok(Arc::new(EngineRegistry::from_descriptors(descriptors)?))
}
