//! Completion poller: tracks recognition jobs and materializes their output.

use crate::engine::{EngineRegistry, JobStatus};
use crate::error::{Result, TolkError};
use crate::store::SqliteStore;
use crate::transcript::{SpeakerMap, TranscriptStatus, Utterance};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Polls engines for job completion and materializes diarized output.
pub struct Poller {
    store: Arc<SqliteStore>,
    registry: Arc<EngineRegistry>,
}

impl Poller {
    pub fn new(store: Arc<SqliteStore>, registry: Arc<EngineRegistry>) -> Self {
        Self { store, registry }
    }

    /// Query the engine for the transcript's job and apply the result.
    ///
    /// Transcripts without an external job handle (local engines before their
    /// worker reports in) are a no-op: the stored status is returned
    /// unchanged. Segment materialization happens at most once per
    /// transcript; a completion report against a terminal transcript, whether
    /// `ready` or `error`, never inserts segments.
    #[instrument(skip(self))]
    pub async fn poll(&self, transcript_id: &str) -> Result<TranscriptStatus> {
        let transcript = self.store.require_transcript(transcript_id)?;

        let Some(external_job_id) = transcript.external_job_id.as_deref() else {
            debug!("Transcript {} has no external job yet", transcript_id);
            return Ok(transcript.status);
        };

        let recognizer = self
            .registry
            .recognizer(&transcript.engine_id)
            .ok_or_else(|| TolkError::InvalidEngine(transcript.engine_id.clone()))?;

        match recognizer.job_status(external_job_id).await? {
            JobStatus::Running => Ok(transcript.status),
            JobStatus::Completed {
                utterances,
                duration_seconds,
            } => {
                if transcript.status.is_terminal() {
                    // Already materialized, or already failed. Terminal
                    // states admit no further mutation.
                    return Ok(transcript.status);
                }
                self.materialize(transcript_id, &transcript.engine_id, utterances, duration_seconds)?;
                Ok(TranscriptStatus::Ready)
            }
            JobStatus::Failed { message } => {
                warn!("Recognition failed for transcript {}: {}", transcript_id, message);
                self.store.mark_failed(transcript_id, &message)?;
                Ok(TranscriptStatus::Error)
            }
        }
    }

    /// Completion path for local engines: an out-of-band worker reports the
    /// finished recognition result here. Shares the materialization code with
    /// [`poll`](Self::poll), so the same idempotence guard applies.
    #[instrument(skip(self, utterances))]
    pub fn complete_local(
        &self,
        transcript_id: &str,
        utterances: Vec<Utterance>,
        duration_seconds: f64,
    ) -> Result<TranscriptStatus> {
        let transcript = self.store.require_transcript(transcript_id)?;
        if transcript.status.is_terminal() {
            return Ok(transcript.status);
        }
        self.materialize(transcript_id, &transcript.engine_id, utterances, duration_seconds)?;
        Ok(TranscriptStatus::Ready)
    }

    /// Failure path for local engines' out-of-band workers.
    pub fn fail_local(&self, transcript_id: &str, message: &str) -> Result<TranscriptStatus> {
        self.store.mark_failed(transcript_id, message)?;
        Ok(TranscriptStatus::Error)
    }

    fn materialize(
        &self,
        transcript_id: &str,
        engine_id: &str,
        mut utterances: Vec<Utterance>,
        duration_seconds: f64,
    ) -> Result<()> {
        utterances.sort_by_key(|u| u.start_ms);

        let mut speakers = SpeakerMap::new();
        for utterance in &utterances {
            speakers
                .entry(utterance.speaker.clone())
                .or_insert_with(|| utterance.speaker.clone());
        }

        self.store.insert_segments(transcript_id, &utterances)?;
        self.store.mark_ready(transcript_id, duration_seconds, &speakers)?;
        self.store.record_engine_usage(engine_id, duration_seconds)?;

        info!(
            "Materialized {} segments ({} speakers) for transcript {}",
            utterances.len(),
            speakers.len(),
            transcript_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineDescriptor, EngineKind, EngineStatus, SpeechEngine};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    struct ScriptedEngine {
        statuses: Mutex<VecDeque<Result<JobStatus>>>,
    }

    impl ScriptedEngine {
        fn new(statuses: Vec<Result<JobStatus>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
            }
        }
    }

    #[async_trait]
    impl SpeechEngine for ScriptedEngine {
        async fn submit(&self, _audio: &str, _boost: &[String]) -> Result<String> {
            Ok("job-1".to_string())
        }

        async fn job_status(&self, _id: &str) -> Result<JobStatus> {
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("job_status called more than scripted")
        }
    }

    fn utterances() -> Vec<Utterance> {
        vec![
            Utterance {
                speaker: "spk_1".to_string(),
                text: "later".to_string(),
                start_ms: 3000,
                end_ms: 4000,
                confidence: Some(0.8),
            },
            Utterance {
                speaker: "spk_0".to_string(),
                text: "earlier".to_string(),
                start_ms: 0,
                end_ms: 2000,
                confidence: Some(0.95),
            },
        ]
    }

    fn setup(engine: Arc<dyn SpeechEngine>) -> (Arc<SqliteStore>, Poller, String) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Arc::new(EngineRegistry::new());
        registry.register(
            EngineDescriptor {
                id: "e1".to_string(),
                display_name: "Engine".to_string(),
                kind: EngineKind::Cloud,
                status: EngineStatus::Active,
                config: HashMap::new(),
                builtin: false,
            },
            Some(engine),
        );

        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();
        store.mark_processing(&transcript.id, "job-1").unwrap();

        let poller = Poller::new(store.clone(), registry);
        (store, poller, transcript.id)
    }

    fn completed() -> Result<JobStatus> {
        Ok(JobStatus::Completed {
            utterances: utterances(),
            duration_seconds: 4.0,
        })
    }

    #[tokio::test]
    async fn test_no_job_handle_is_noop() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Arc::new(EngineRegistry::new());
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        let poller = Poller::new(store.clone(), registry);
        let status = poller.poll(&transcript.id).await.unwrap();

        assert_eq!(status, TranscriptStatus::Pending);
        assert!(store.segments_for_transcript(&transcript.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_running_does_not_mutate() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(JobStatus::Running)]));
        let (store, poller, id) = setup(engine);

        let status = poller.poll(&id).await.unwrap();
        assert_eq!(status, TranscriptStatus::Processing);
        assert!(store.segments_for_transcript(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_materializes_in_order() {
        let engine = Arc::new(ScriptedEngine::new(vec![completed()]));
        let (store, poller, id) = setup(engine);

        let status = poller.poll(&id).await.unwrap();
        assert_eq!(status, TranscriptStatus::Ready);

        let segments = store.segments_for_transcript(&id).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "earlier");
        assert_eq!(segments[1].text, "later");

        let transcript = store.require_transcript(&id).unwrap();
        assert_eq!(transcript.duration_seconds, Some(4.0));
        assert_eq!(transcript.speakers.len(), 2);

        let stats = store.engine_stats("e1").unwrap();
        assert_eq!(stats.jobs_completed, 1);
    }

    #[tokio::test]
    async fn test_double_poll_does_not_duplicate_segments() {
        let engine = Arc::new(ScriptedEngine::new(vec![completed(), completed()]));
        let (store, poller, id) = setup(engine);

        poller.poll(&id).await.unwrap();
        let status = poller.poll(&id).await.unwrap();

        assert_eq!(status, TranscriptStatus::Ready);
        assert_eq!(store.segments_for_transcript(&id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_job_marks_error() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(JobStatus::Failed {
            message: "audio unreadable".to_string(),
        })]));
        let (store, poller, id) = setup(engine);

        let status = poller.poll(&id).await.unwrap();
        assert_eq!(status, TranscriptStatus::Error);

        let transcript = store.require_transcript(&id).unwrap();
        assert_eq!(transcript.error_message.as_deref(), Some("audio unreadable"));
    }

    #[tokio::test]
    async fn test_local_completion_after_failure_does_not_materialize() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Arc::new(EngineRegistry::new());
        let transcript = store.create_transcript("file:///a.wav", "local-1").unwrap();

        let poller = Poller::new(store.clone(), registry);
        poller.fail_local(&transcript.id, "worker crashed").unwrap();

        // A retrying worker reporting completion must not resurrect the job.
        let status = poller
            .complete_local(&transcript.id, utterances(), 4.0)
            .unwrap();
        assert_eq!(status, TranscriptStatus::Error);
        let status = poller
            .complete_local(&transcript.id, utterances(), 4.0)
            .unwrap();
        assert_eq!(status, TranscriptStatus::Error);

        assert!(store.segments_for_transcript(&transcript.id).unwrap().is_empty());
        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Error);
    }

    #[tokio::test]
    async fn test_poll_completion_after_failure_does_not_materialize() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(JobStatus::Failed {
                message: "audio unreadable".to_string(),
            }),
            completed(),
        ]));
        let (store, poller, id) = setup(engine);

        poller.poll(&id).await.unwrap();
        let status = poller.poll(&id).await.unwrap();

        assert_eq!(status, TranscriptStatus::Error);
        assert!(store.segments_for_transcript(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_completion_path() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Arc::new(EngineRegistry::new());
        let transcript = store.create_transcript("file:///a.wav", "local-1").unwrap();

        let poller = Poller::new(store.clone(), registry);
        let status = poller
            .complete_local(&transcript.id, utterances(), 4.0)
            .unwrap();

        assert_eq!(status, TranscriptStatus::Ready);
        assert_eq!(store.segments_for_transcript(&transcript.id).unwrap().len(), 2);

        // Re-reporting is idempotent.
        let status = poller
            .complete_local(&transcript.id, utterances(), 4.0)
            .unwrap();
        assert_eq!(status, TranscriptStatus::Ready);
        assert_eq!(store.segments_for_transcript(&transcript.id).unwrap().len(), 2);
    }
}
