//! Speech-to-text engine abstraction.
//!
//! Engines are catalogued in an explicit [`EngineRegistry`] injected into the
//! components that need one, loaded once at process start from configuration.
//! Cloud engines carry a recognizer client speaking the submit/status
//! protocol; local engines have no recognizer here and complete out-of-band
//! through the poller's completion path.

mod cloud;

pub use cloud::CloudEngine;

use crate::error::{Result, TolkError};
use crate::transcript::Utterance;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Engine kind: runs on this host or behind a remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Local,
    #[default]
    Cloud,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Local => write!(f, "local"),
            EngineKind::Cloud => write!(f, "cloud"),
        }
    }
}

/// Administrative status of an engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    #[default]
    Active,
    Inactive,
}

/// Descriptor for a registered speech-to-text engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Engine ID.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Local or cloud.
    pub kind: EngineKind,
    /// Whether the engine accepts new dispatches.
    pub status: EngineStatus,
    /// Opaque engine-specific configuration (endpoints, keys, model names).
    #[serde(default)]
    pub config: HashMap<String, String>,
    /// Built-in engines cannot be removed.
    #[serde(default)]
    pub builtin: bool,
}

/// Status of an external recognition job.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// Still running; poll again later.
    Running,
    /// Finished: diarized utterances and total audio duration.
    Completed {
        utterances: Vec<Utterance>,
        duration_seconds: f64,
    },
    /// The engine gave up on the job.
    Failed { message: String },
}

/// Client interface to a speech-to-text engine's job API.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Submit an audio reference for recognition, biased toward the boost
    /// vocabulary. Returns the engine's own job handle.
    async fn submit(&self, audio_reference: &str, boost_terms: &[String]) -> Result<String>;

    /// Query the status of a previously submitted job.
    async fn job_status(&self, external_job_id: &str) -> Result<JobStatus>;
}

struct RegistryInner {
    descriptors: Vec<EngineDescriptor>,
    recognizers: HashMap<String, Arc<dyn SpeechEngine>>,
}

/// Catalogue of available speech-to-text engines.
pub struct EngineRegistry {
    inner: RwLock<RegistryInner>,
}

impl EngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                descriptors: Vec::new(),
                recognizers: HashMap::new(),
            }),
        }
    }

    /// Build a registry from configured descriptors, constructing recognizer
    /// clients for active cloud engines.
    pub fn from_descriptors(descriptors: Vec<EngineDescriptor>) -> Result<Self> {
        let registry = Self::new();
        for descriptor in descriptors {
            let recognizer: Option<Arc<dyn SpeechEngine>> =
                if descriptor.kind == EngineKind::Cloud && descriptor.status == EngineStatus::Active {
                    Some(Arc::new(CloudEngine::from_config(&descriptor.id, &descriptor.config)?))
                } else {
                    None
                };
            registry.register(descriptor, recognizer);
        }
        Ok(registry)
    }

    /// Register an engine, replacing any previous registration with the same ID.
    pub fn register(
        &self,
        descriptor: EngineDescriptor,
        recognizer: Option<Arc<dyn SpeechEngine>>,
    ) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        info!("Registering engine {} ({})", descriptor.id, descriptor.kind);
        if let Some(client) = recognizer {
            inner.recognizers.insert(descriptor.id.clone(), client);
        }
        inner.descriptors.retain(|d| d.id != descriptor.id);
        inner.descriptors.push(descriptor);
    }

    /// Look up a descriptor by ID.
    pub fn get(&self, id: &str) -> Option<EngineDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.descriptors.iter().find(|d| d.id == id).cloned()
    }

    /// Look up an engine that is known and active, as dispatch requires.
    pub fn active(&self, id: &str) -> Result<EngineDescriptor> {
        match self.get(id) {
            Some(d) if d.status == EngineStatus::Active => Ok(d),
            _ => Err(TolkError::InvalidEngine(id.to_string())),
        }
    }

    /// The recognizer client for an engine, if one is registered.
    pub fn recognizer(&self, id: &str) -> Option<Arc<dyn SpeechEngine>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.recognizers.get(id).cloned()
    }

    /// All registered descriptors, in registration order.
    pub fn list(&self) -> Vec<EngineDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.descriptors.clone()
    }

    /// Mark an engine active or inactive.
    pub fn set_status(&self, id: &str, status: EngineStatus) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let descriptor = inner
            .descriptors
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| TolkError::InvalidEngine(id.to_string()))?;
        descriptor.status = status;
        Ok(())
    }

    /// Remove an engine. Built-in engines are rejected.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let descriptor = inner
            .descriptors
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| TolkError::InvalidEngine(id.to_string()))?;
        if descriptor.builtin {
            return Err(TolkError::InvalidInput(format!(
                "Built-in engine cannot be removed: {}",
                id
            )));
        }

        inner.descriptors.retain(|d| d.id != id);
        inner.recognizers.remove(id);
        Ok(())
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, kind: EngineKind, builtin: bool) -> EngineDescriptor {
        EngineDescriptor {
            id: id.to_string(),
            display_name: id.to_string(),
            kind,
            status: EngineStatus::Active,
            config: HashMap::new(),
            builtin,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = EngineRegistry::new();
        registry.register(descriptor("local-1", EngineKind::Local, true), None);

        assert!(registry.get("local-1").is_some());
        assert!(registry.get("missing").is_none());
        assert!(registry.active("local-1").is_ok());
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_inactive_engine_is_not_dispatchable() {
        let registry = EngineRegistry::new();
        registry.register(descriptor("e1", EngineKind::Cloud, false), None);

        registry.set_status("e1", EngineStatus::Inactive).unwrap();
        let err = registry.active("e1").unwrap_err();
        assert!(matches!(err, TolkError::InvalidEngine(_)));
    }

    #[test]
    fn test_builtin_engine_cannot_be_removed() {
        let registry = EngineRegistry::new();
        registry.register(descriptor("builtin", EngineKind::Local, true), None);
        registry.register(descriptor("custom", EngineKind::Cloud, false), None);

        let err = registry.remove("builtin").unwrap_err();
        assert!(matches!(err, TolkError::InvalidInput(_)));

        registry.remove("custom").unwrap();
        assert!(registry.get("custom").is_none());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = EngineRegistry::new();
        registry.register(descriptor("e1", EngineKind::Local, false), None);

        let mut updated = descriptor("e1", EngineKind::Local, false);
        updated.display_name = "renamed".to_string();
        registry.register(updated, None);

        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get("e1").unwrap().display_name, "renamed");
    }
}
