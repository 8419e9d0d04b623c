//! Dispatch controller: hands a transcript's audio to its chosen engine.

use crate::engine::{EngineKind, EngineRegistry};
use crate::error::{Result, TolkError};
use crate::store::SqliteStore;
use crate::transcript::TranscriptStatus;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Submitted to a cloud engine; the transcript is now `processing`.
    Submitted { external_job_id: String },
    /// Local engine: recognition is driven by an out-of-band worker and the
    /// transcript stays `pending` until that worker reports completion.
    Deferred,
}

/// Submits recognition jobs and records the external job handle.
pub struct Dispatcher {
    store: Arc<SqliteStore>,
    registry: Arc<EngineRegistry>,
}

impl Dispatcher {
    pub fn new(store: Arc<SqliteStore>, registry: Arc<EngineRegistry>) -> Self {
        Self { store, registry }
    }

    /// Dispatch a pending transcript to its engine.
    ///
    /// The engine must be known and active. Cloud submission failure leaves
    /// the transcript `pending` so the caller can retry; a transcript that is
    /// no longer `pending` is rejected before anything is submitted, so each
    /// successful call performs exactly one status transition.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, transcript_id: &str) -> Result<DispatchOutcome> {
        let transcript = self.store.require_transcript(transcript_id)?;
        let engine = self.registry.active(&transcript.engine_id)?;

        if transcript.status != TranscriptStatus::Pending {
            return Err(TolkError::InvalidTransition {
                from: transcript.status.to_string(),
                to: TranscriptStatus::Processing.to_string(),
            });
        }

        if engine.kind == EngineKind::Local {
            info!(
                "Transcript {} queued for local engine {}",
                transcript_id, engine.id
            );
            return Ok(DispatchOutcome::Deferred);
        }

        let recognizer = self
            .registry
            .recognizer(&engine.id)
            .ok_or_else(|| TolkError::InvalidEngine(engine.id.clone()))?;

        // Bias recognition toward terms we already know are correct.
        let boost_terms = self.store.boost_vocabulary()?;

        let external_job_id = match recognizer
            .submit(&transcript.audio_reference, &boost_terms)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("Submission failed for transcript {}: {}", transcript_id, e);
                return Err(match e {
                    TolkError::Submission(_) => e,
                    other => TolkError::Submission(other.to_string()),
                });
            }
        };

        self.store.mark_processing(transcript_id, &external_job_id)?;
        info!(
            "Transcript {} dispatched to {} as job {}",
            transcript_id, engine.id, external_job_id
        );

        Ok(DispatchOutcome::Submitted { external_job_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineDescriptor, EngineStatus, JobStatus, SpeechEngine};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedEngine {
        submit_result: Mutex<Option<Result<String>>>,
        submitted_boost: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn succeeding(job_id: &str) -> Self {
            Self {
                submit_result: Mutex::new(Some(Ok(job_id.to_string()))),
                submitted_boost: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                submit_result: Mutex::new(Some(Err(TolkError::Submission(
                    "connection refused".to_string(),
                )))),
                submitted_boost: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechEngine for ScriptedEngine {
        async fn submit(&self, _audio: &str, boost: &[String]) -> Result<String> {
            *self.submitted_boost.lock().unwrap() = boost.to_vec();
            self.submit_result
                .lock()
                .unwrap()
                .take()
                .expect("submit called more than scripted")
        }

        async fn job_status(&self, _id: &str) -> Result<JobStatus> {
            Ok(JobStatus::Running)
        }
    }

    fn descriptor(id: &str, kind: EngineKind) -> EngineDescriptor {
        EngineDescriptor {
            id: id.to_string(),
            display_name: id.to_string(),
            kind,
            status: EngineStatus::Active,
            config: HashMap::new(),
            builtin: false,
        }
    }

    fn setup(engine: Option<Arc<dyn SpeechEngine>>, kind: EngineKind) -> (Arc<SqliteStore>, Dispatcher) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Arc::new(EngineRegistry::new());
        registry.register(descriptor("e1", kind), engine);
        let dispatcher = Dispatcher::new(store.clone(), registry);
        (store, dispatcher)
    }

    #[tokio::test]
    async fn test_unknown_engine_leaves_status_unchanged() {
        let (store, dispatcher) = setup(None, EngineKind::Cloud);
        let transcript = store.create_transcript("file:///a.wav", "unknown-engine").unwrap();

        let err = dispatcher.dispatch(&transcript.id).await.unwrap_err();
        assert!(matches!(err, TolkError::InvalidEngine(_)));

        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Pending);
    }

    #[tokio::test]
    async fn test_cloud_dispatch_records_job_and_boost() {
        let engine = Arc::new(ScriptedEngine::succeeding("job-7"));
        let (store, dispatcher) = setup(Some(engine.clone()), EngineKind::Cloud);
        store.add_dictionary_entry("台積店", "台積電").unwrap();

        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();
        let outcome = dispatcher.dispatch(&transcript.id).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Submitted { external_job_id: "job-7".to_string() }
        );
        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Processing);
        assert_eq!(loaded.external_job_id.as_deref(), Some("job-7"));
        assert_eq!(*engine.submitted_boost.lock().unwrap(), vec!["台積電".to_string()]);
    }

    #[tokio::test]
    async fn test_submission_failure_stays_pending() {
        let engine = Arc::new(ScriptedEngine::failing());
        let (store, dispatcher) = setup(Some(engine), EngineKind::Cloud);
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        let err = dispatcher.dispatch(&transcript.id).await.unwrap_err();
        assert!(matches!(err, TolkError::Submission(_)));

        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Pending);
        assert!(loaded.external_job_id.is_none());
    }

    #[tokio::test]
    async fn test_local_engine_defers() {
        let (store, dispatcher) = setup(None, EngineKind::Local);
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        let outcome = dispatcher.dispatch(&transcript.id).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Deferred);

        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Pending);
    }

    #[tokio::test]
    async fn test_redispatch_of_processing_transcript_rejected() {
        let engine = Arc::new(ScriptedEngine::succeeding("job-1"));
        let (store, dispatcher) = setup(Some(engine), EngineKind::Cloud);
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        dispatcher.dispatch(&transcript.id).await.unwrap();
        let err = dispatcher.dispatch(&transcript.id).await.unwrap_err();
        assert!(matches!(err, TolkError::InvalidTransition { .. }));
    }
}
