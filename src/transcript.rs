//! Data model for transcripts, segments, and dictionary entries.

use crate::error::{Result, TolkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a transcript.
///
/// The only legal moves are forward: `pending -> processing -> ready | error`,
/// or directly `pending -> ready | error` when a local engine's out-of-band
/// worker reports completion. `ready` and `error` are terminal; reprocessing
/// requires a new transcript.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    #[default]
    Pending,
    Processing,
    Ready,
    Error,
}

impl TranscriptStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(self, next: TranscriptStatus) -> bool {
        use TranscriptStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Ready) | (Pending, Error) | (Processing, Ready) | (Processing, Error)
        )
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TranscriptStatus::Ready | TranscriptStatus::Error)
    }
}

impl std::str::FromStr for TranscriptStatus {
    type Err = TolkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TranscriptStatus::Pending),
            "processing" => Ok(TranscriptStatus::Processing),
            "ready" => Ok(TranscriptStatus::Ready),
            "error" => Ok(TranscriptStatus::Error),
            _ => Err(TolkError::Store(format!("Unknown transcript status: {}", s))),
        }
    }
}

impl std::fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptStatus::Pending => write!(f, "pending"),
            TranscriptStatus::Processing => write!(f, "processing"),
            TranscriptStatus::Ready => write!(f, "ready"),
            TranscriptStatus::Error => write!(f, "error"),
        }
    }
}

/// Mapping from engine-assigned speaker labels to display names.
pub type SpeakerMap = BTreeMap<String, String>;

/// One audio submission, tracked from dispatch through final text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcript ID.
    pub id: String,
    /// URI/handle to the source audio, owned externally.
    pub audio_reference: String,
    /// ID of the engine handling this transcript.
    pub engine_id: String,
    /// The engine's own job handle, once a cloud submission succeeded.
    pub external_job_id: Option<String>,
    /// Lifecycle status.
    pub status: TranscriptStatus,
    /// Total duration in seconds, set on completion.
    pub duration_seconds: Option<f64>,
    /// Speaker label to display name mapping, populated on completion.
    pub speakers: SpeakerMap,
    /// Diagnostic retained when recognition fails.
    pub error_message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One diarized utterance belonging to a transcript.
///
/// `text` is the write-once original recognition output; all corrective
/// mutation targets `edited_text` only, so the original is always
/// recoverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Segment ID.
    pub id: String,
    /// Owning transcript.
    pub transcript_id: String,
    /// Engine-assigned speaker label.
    pub speaker: String,
    /// Original recognition output. Never mutated after creation.
    pub text: String,
    /// Corrected/polished text, if any pass has run.
    pub edited_text: Option<String>,
    /// Start time in milliseconds.
    pub start_ms: i64,
    /// End time in milliseconds.
    pub end_ms: i64,
    /// Recognition confidence, if the engine reports one.
    pub confidence: Option<f64>,
    /// Manual-review flag. Not mutated by the pipeline.
    pub is_reviewed: bool,
}

impl Segment {
    /// The text correction passes operate on: `edited_text` when present,
    /// otherwise the original `text`.
    pub fn effective_text(&self) -> &str {
        self.edited_text.as_deref().unwrap_or(&self.text)
    }
}

/// A diarized utterance as reported by a speech engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Engine-assigned speaker label.
    pub speaker: String,
    /// Recognized text.
    pub text: String,
    /// Start time in milliseconds.
    pub start_ms: i64,
    /// End time in milliseconds.
    pub end_ms: i64,
    /// Recognition confidence, if available.
    pub confidence: Option<f64>,
}

/// A correction rule shared across all transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// The mis-transcription to replace. Unique.
    pub wrong_text: String,
    /// The replacement.
    pub correct_text: String,
}
