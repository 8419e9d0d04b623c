//! Configuration settings for Tolk.

use crate::engine::{EngineDescriptor, EngineKind, EngineStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub store: StoreSettings,
    pub polishing: PolishingSettings,
    /// Engines available for dispatch, loaded into the registry at startup.
    pub engines: Vec<EngineSettings>,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tolk".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Transcript store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.tolk/transcripts.db".to_string(),
        }
    }
}

/// Settings for the polishing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolishingSettings {
    /// Rewriting model to use.
    pub model: String,
    /// Segments per rewrite request.
    pub batch_size: usize,
    /// Pause between successive batches, in milliseconds.
    pub inter_batch_delay_ms: u64,
    /// Cooldown before the single retry after a rate-limit response, in milliseconds.
    pub rate_limit_cooldown_ms: u64,
}

impl Default for PolishingSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            batch_size: 5,
            inter_batch_delay_ms: 1_000,
            rate_limit_cooldown_ms: 10_000,
        }
    }
}

/// One configured speech-to-text engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub id: String,
    pub display_name: String,
    pub kind: EngineKind,
    /// Whether the engine accepts dispatches.
    pub active: bool,
    /// Built-in engines cannot be removed from the registry.
    pub builtin: bool,
    /// Engine-specific configuration (base_url, api_key, model, ...).
    pub config: HashMap<String, String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: String::new(),
            kind: EngineKind::Cloud,
            active: true,
            builtin: false,
            config: HashMap::new(),
        }
    }
}

impl EngineSettings {
    /// Convert to the registry's descriptor shape.
    pub fn to_descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            kind: self.kind,
            status: if self.active { EngineStatus::Active } else { EngineStatus::Inactive },
            config: self.config.clone(),
            builtin: self.builtin,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::with_default_engines())
        }
    }

    /// Default settings seeded with the built-in engines.
    pub fn with_default_engines() -> Self {
        Self {
            engines: vec![EngineSettings {
                id: "local-default".to_string(),
                display_name: "Local Recognizer".to_string(),
                kind: EngineKind::Local,
                active: true,
                builtin: true,
                config: HashMap::new(),
            }],
            ..Self::default()
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TolkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tolk")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}
