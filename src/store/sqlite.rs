//! SQLite-backed transcript store.

use crate::error::{Result, TolkError};
use crate::transcript::{
    DictionaryEntry, Segment, SpeakerMap, Transcript, TranscriptStatus, Utterance,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    audio_reference TEXT NOT NULL,
    engine_id TEXT NOT NULL,
    external_job_id TEXT,
    status TEXT NOT NULL,
    duration_seconds REAL,
    speakers_json TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS segments (
    id TEXT PRIMARY KEY,
    transcript_id TEXT NOT NULL,
    speaker TEXT NOT NULL,
    text TEXT NOT NULL,
    edited_text TEXT,
    start_ms INTEGER NOT NULL,
    end_ms INTEGER NOT NULL,
    confidence REAL,
    is_reviewed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_segments_transcript ON segments(transcript_id, start_ms);

CREATE TABLE IF NOT EXISTS dictionary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wrong_text TEXT NOT NULL UNIQUE,
    correct_text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS engine_usage (
    engine_id TEXT PRIMARY KEY,
    seconds_processed REAL NOT NULL DEFAULT 0,
    jobs_completed INTEGER NOT NULL DEFAULT 0
);
"#;

/// Cumulative usage statistics for one engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Total audio minutes processed.
    pub minutes_processed: f64,
    /// Number of completed recognition jobs.
    pub jobs_completed: u64,
    /// Average minutes of audio per completed job.
    pub avg_minutes_per_job: f64,
}

/// SQLite-backed store for the transcript pipeline.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized transcript store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TolkError::Store(format!("Failed to acquire lock: {}", e)))
    }

    // ========================================================================
    // Transcripts
    // ========================================================================

    /// Create a new transcript with status `pending`.
    #[instrument(skip(self))]
    pub fn create_transcript(&self, audio_reference: &str, engine_id: &str) -> Result<Transcript> {
        let conn = self.lock()?;

        let transcript = Transcript {
            id: uuid::Uuid::new_v4().to_string(),
            audio_reference: audio_reference.to_string(),
            engine_id: engine_id.to_string(),
            external_job_id: None,
            status: TranscriptStatus::Pending,
            duration_seconds: None,
            speakers: SpeakerMap::new(),
            error_message: None,
            created_at: Utc::now(),
        };

        conn.execute(
            r#"
            INSERT INTO transcripts (id, audio_reference, engine_id, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                transcript.id,
                transcript.audio_reference,
                transcript.engine_id,
                transcript.status.to_string(),
                transcript.created_at.to_rfc3339(),
            ],
        )?;

        debug!("Created transcript {}", transcript.id);
        Ok(transcript)
    }

    /// Fetch a transcript by ID.
    pub fn get_transcript(&self, id: &str) -> Result<Option<Transcript>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            r#"
            SELECT id, audio_reference, engine_id, external_job_id, status,
                   duration_seconds, speakers_json, error_message, created_at
            FROM transcripts WHERE id = ?1
            "#,
            params![id],
            row_to_transcript,
        );

        match result {
            Ok(t) => Ok(Some(t?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a transcript, erroring when it does not exist.
    pub fn require_transcript(&self, id: &str) -> Result<Transcript> {
        self.get_transcript(id)?
            .ok_or_else(|| TolkError::TranscriptNotFound(id.to_string()))
    }

    /// Move a transcript to `processing` and record the engine's job handle.
    #[instrument(skip(self))]
    pub fn mark_processing(&self, id: &str, external_job_id: &str) -> Result<()> {
        let conn = self.lock()?;
        check_transition(&conn, id, TranscriptStatus::Processing)?;

        conn.execute(
            "UPDATE transcripts SET status = ?1, external_job_id = ?2 WHERE id = ?3",
            params![TranscriptStatus::Processing.to_string(), external_job_id, id],
        )?;

        Ok(())
    }

    /// Move a transcript to `ready`, recording duration and the speaker map.
    #[instrument(skip(self, speakers))]
    pub fn mark_ready(&self, id: &str, duration_seconds: f64, speakers: &SpeakerMap) -> Result<()> {
        let conn = self.lock()?;
        check_transition(&conn, id, TranscriptStatus::Ready)?;

        let speakers_json = serde_json::to_string(speakers)?;
        conn.execute(
            "UPDATE transcripts SET status = ?1, duration_seconds = ?2, speakers_json = ?3 WHERE id = ?4",
            params![TranscriptStatus::Ready.to_string(), duration_seconds, speakers_json, id],
        )?;

        info!("Transcript {} is ready ({:.1}s)", id, duration_seconds);
        Ok(())
    }

    /// Move a transcript to `error`, retaining the engine's diagnostic.
    #[instrument(skip(self))]
    pub fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        let conn = self.lock()?;
        check_transition(&conn, id, TranscriptStatus::Error)?;

        conn.execute(
            "UPDATE transcripts SET status = ?1, error_message = ?2 WHERE id = ?3",
            params![TranscriptStatus::Error.to_string(), message, id],
        )?;

        Ok(())
    }

    // ========================================================================
    // Segments
    // ========================================================================

    /// Bulk-insert one segment per utterance, preserving `start_ms` order.
    ///
    /// The idempotence guard (skip when the transcript is already `ready`)
    /// lives in the poller, not here.
    #[instrument(skip(self, utterances))]
    pub fn insert_segments(&self, transcript_id: &str, utterances: &[Utterance]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for utterance in utterances {
            tx.execute(
                r#"
                INSERT INTO segments (id, transcript_id, speaker, text, start_ms, end_ms, confidence)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    uuid::Uuid::new_v4().to_string(),
                    transcript_id,
                    utterance.speaker,
                    utterance.text,
                    utterance.start_ms,
                    utterance.end_ms,
                    utterance.confidence,
                ],
            )?;
        }

        tx.commit()?;
        info!("Inserted {} segments for transcript {}", utterances.len(), transcript_id);
        Ok(utterances.len())
    }

    /// All segments of a transcript, ordered by `start_ms`.
    pub fn segments_for_transcript(&self, transcript_id: &str) -> Result<Vec<Segment>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, transcript_id, speaker, text, edited_text, start_ms, end_ms, confidence, is_reviewed
            FROM segments WHERE transcript_id = ?1 ORDER BY start_ms
            "#,
        )?;

        let segments = stmt.query_map(params![transcript_id], row_to_segment)?;
        let result = segments.collect::<rusqlite::Result<Vec<Segment>>>()?;

        debug!("Loaded {} segments for transcript {}", result.len(), transcript_id);
        Ok(result)
    }

    /// Fetch a single segment by ID.
    pub fn get_segment(&self, id: &str) -> Result<Option<Segment>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            r#"
            SELECT id, transcript_id, speaker, text, edited_text, start_ms, end_ms, confidence, is_reviewed
            FROM segments WHERE id = ?1
            "#,
            params![id],
            row_to_segment,
        );

        match result {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite a segment's `edited_text`. The original `text` is never touched.
    pub fn update_edited_text(&self, segment_id: &str, edited_text: &str) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE segments SET edited_text = ?1 WHERE id = ?2",
            params![edited_text, segment_id],
        )?;

        if updated == 0 {
            return Err(TolkError::Store(format!("Segment not found: {}", segment_id)));
        }
        Ok(())
    }

    // ========================================================================
    // Dictionary
    // ========================================================================

    /// Add or update a correction rule, keyed on `wrong_text`.
    pub fn add_dictionary_entry(&self, wrong_text: &str, correct_text: &str) -> Result<()> {
        if wrong_text.is_empty() {
            return Err(TolkError::InvalidInput("wrong_text must not be empty".to_string()));
        }

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO dictionary (wrong_text, correct_text) VALUES (?1, ?2)
            ON CONFLICT(wrong_text) DO UPDATE SET correct_text = excluded.correct_text
            "#,
            params![wrong_text, correct_text],
        )?;
        Ok(())
    }

    /// All correction rules in insertion order.
    ///
    /// Insertion order is what the substitution pass applies, so overlapping
    /// rules resolve deterministically but order-dependently.
    pub fn dictionary_entries(&self) -> Result<Vec<DictionaryEntry>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT wrong_text, correct_text FROM dictionary ORDER BY id")?;
        let entries = stmt.query_map([], |row| {
            Ok(DictionaryEntry {
                wrong_text: row.get(0)?,
                correct_text: row.get(1)?,
            })
        })?;

        Ok(entries.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Remove a correction rule. Returns whether one existed.
    pub fn remove_dictionary_entry(&self, wrong_text: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM dictionary WHERE wrong_text = ?1",
            params![wrong_text],
        )?;
        Ok(deleted > 0)
    }

    /// All known-correct terms, used as boost vocabulary at dispatch time.
    pub fn boost_vocabulary(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT correct_text FROM dictionary ORDER BY id")?;
        let terms = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(terms.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ========================================================================
    // Engine usage stats
    // ========================================================================

    /// Record one completed job's audio duration against an engine.
    pub fn record_engine_usage(&self, engine_id: &str, seconds: f64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO engine_usage (engine_id, seconds_processed, jobs_completed)
            VALUES (?1, ?2, 1)
            ON CONFLICT(engine_id) DO UPDATE SET
                seconds_processed = seconds_processed + excluded.seconds_processed,
                jobs_completed = jobs_completed + 1
            "#,
            params![engine_id, seconds],
        )?;
        Ok(())
    }

    /// Cumulative usage stats for one engine.
    pub fn engine_stats(&self, engine_id: &str) -> Result<EngineStats> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT seconds_processed, jobs_completed FROM engine_usage WHERE engine_id = ?1",
            params![engine_id],
            |row| {
                let seconds: f64 = row.get(0)?;
                let jobs: i64 = row.get(1)?;
                Ok((seconds, jobs))
            },
        );

        match result {
            Ok((seconds, jobs)) => {
                let minutes = seconds / 60.0;
                Ok(EngineStats {
                    minutes_processed: minutes,
                    jobs_completed: jobs as u64,
                    avg_minutes_per_job: if jobs > 0 { minutes / jobs as f64 } else { 0.0 },
                })
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(EngineStats::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Validate that the transcript's current status admits a move to `next`.
fn check_transition(conn: &Connection, id: &str, next: TranscriptStatus) -> Result<()> {
    let current: String = conn
        .query_row("SELECT status FROM transcripts WHERE id = ?1", params![id], |row| row.get(0))
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => TolkError::TranscriptNotFound(id.to_string()),
            other => other.into(),
        })?;

    let current: TranscriptStatus = current.parse()?;
    if !current.can_transition(next) {
        return Err(TolkError::InvalidTransition {
            from: current.to_string(),
            to: next.to_string(),
        });
    }
    Ok(())
}

fn row_to_transcript(row: &Row<'_>) -> rusqlite::Result<Result<Transcript>> {
    let status_str: String = row.get(4)?;
    let speakers_json: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(8)?;

    Ok((|| {
        let speakers: SpeakerMap = match speakers_json {
            Some(json) => serde_json::from_str(&json)?,
            None => SpeakerMap::new(),
        };

        Ok(Transcript {
            id: row.get(0)?,
            audio_reference: row.get(1)?,
            engine_id: row.get(2)?,
            external_job_id: row.get(3)?,
            status: status_str.parse()?,
            duration_seconds: row.get(5)?,
            speakers,
            error_message: row.get(7)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    TolkError::Store(format!("Invalid created_at on transcript: {}", e))
                })?,
        })
    })())
}

fn row_to_segment(row: &Row<'_>) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        transcript_id: row.get(1)?,
        speaker: row.get(2)?,
        text: row.get(3)?,
        edited_text: row.get(4)?,
        start_ms: row.get(5)?,
        end_ms: row.get(6)?,
        confidence: row.get(7)?,
        is_reviewed: row.get::<_, i64>(8)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(speaker: &str, text: &str, start_ms: i64) -> Utterance {
        Utterance {
            speaker: speaker.to_string(),
            text: text.to_string(),
            start_ms,
            end_ms: start_ms + 1000,
            confidence: Some(0.9),
        }
    }

    #[test]
    fn test_transcript_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();

        let transcript = store.create_transcript("file:///a.wav", "cloud-default").unwrap();
        assert_eq!(transcript.status, TranscriptStatus::Pending);

        store.mark_processing(&transcript.id, "job-42").unwrap();
        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Processing);
        assert_eq!(loaded.external_job_id.as_deref(), Some("job-42"));

        let mut speakers = SpeakerMap::new();
        speakers.insert("spk_0".to_string(), "spk_0".to_string());
        store.mark_ready(&transcript.id, 12.5, &speakers).unwrap();

        let loaded = store.require_transcript(&transcript.id).unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Ready);
        assert_eq!(loaded.duration_seconds, Some(12.5));
        assert_eq!(loaded.speakers.len(), 1);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        store.mark_ready(&transcript.id, 1.0, &SpeakerMap::new()).unwrap();

        // Terminal state: no further moves.
        let err = store.mark_failed(&transcript.id, "boom").unwrap_err();
        assert!(matches!(err, TolkError::InvalidTransition { .. }));

        let err = store.mark_processing(&transcript.id, "job-1").unwrap_err();
        assert!(matches!(err, TolkError::InvalidTransition { .. }));
    }

    #[test]
    fn test_segments_ordered_by_start() {
        let store = SqliteStore::in_memory().unwrap();
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        let utterances = vec![
            utterance("A", "second", 2000),
            utterance("B", "first", 0),
            utterance("A", "third", 4000),
        ];
        store.insert_segments(&transcript.id, &utterances).unwrap();

        let segments = store.segments_for_transcript(&transcript.id).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "first");
        assert_eq!(segments[1].text, "second");
        assert_eq!(segments[2].text, "third");
    }

    #[test]
    fn test_edited_text_leaves_original_untouched() {
        let store = SqliteStore::in_memory().unwrap();
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();
        store.insert_segments(&transcript.id, &[utterance("A", "original", 0)]).unwrap();

        let segment = &store.segments_for_transcript(&transcript.id).unwrap()[0];
        store.update_edited_text(&segment.id, "polished").unwrap();

        let reloaded = store.get_segment(&segment.id).unwrap().unwrap();
        assert_eq!(reloaded.text, "original");
        assert_eq!(reloaded.edited_text.as_deref(), Some("polished"));
    }

    #[test]
    fn test_dictionary_order_and_boost() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_dictionary_entry("teh", "the").unwrap();
        store.add_dictionary_entry("台積店", "台積電").unwrap();

        let entries = store.dictionary_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].wrong_text, "teh");
        assert_eq!(entries[1].wrong_text, "台積店");

        let boost = store.boost_vocabulary().unwrap();
        assert_eq!(boost, vec!["the".to_string(), "台積電".to_string()]);

        assert!(store.remove_dictionary_entry("teh").unwrap());
        assert!(!store.remove_dictionary_entry("teh").unwrap());
    }

    #[test]
    fn test_engine_usage_accumulates() {
        let store = SqliteStore::in_memory().unwrap();

        assert_eq!(store.engine_stats("e1").unwrap(), EngineStats::default());

        store.record_engine_usage("e1", 120.0).unwrap();
        store.record_engine_usage("e1", 60.0).unwrap();

        let stats = store.engine_stats("e1").unwrap();
        assert!((stats.minutes_processed - 3.0).abs() < 1e-9);
        assert_eq!(stats.jobs_completed, 2);
        assert!((stats.avg_minutes_per_job - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_segment_row_surfaces_error() {
        let store = SqliteStore::in_memory().unwrap();
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        // Bypass the API to plant a confidence value that cannot map to f64.
        store
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO segments (id, transcript_id, speaker, text, start_ms, end_ms, confidence)
                VALUES ('s1', ?1, 'A', 'hi', 0, 1000, 'not-a-number')
                "#,
                params![transcript.id],
            )
            .unwrap();

        assert!(store.segments_for_transcript(&transcript.id).is_err());
    }

    #[test]
    fn test_unparseable_created_at_surfaces_error() {
        let store = SqliteStore::in_memory().unwrap();
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();

        store
            .lock()
            .unwrap()
            .execute(
                "UPDATE transcripts SET created_at = 'yesterday' WHERE id = ?1",
                params![transcript.id],
            )
            .unwrap();

        let err = store.get_transcript(&transcript.id).unwrap_err();
        assert!(matches!(err, TolkError::Store(_)));
    }

    #[test]
    fn test_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tolk.db");

        let store = SqliteStore::new(&path).unwrap();
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();
        drop(store);

        let store = SqliteStore::new(&path).unwrap();
        assert!(store.get_transcript(&transcript.id).unwrap().is_some());
    }
}
