//! Configuration management for Tolk.

mod prompts;
mod settings;

pub use prompts::PolishPrompts;
pub use settings::{
    EngineSettings, GeneralSettings, PolishingSettings, Settings, StoreSettings,
};
