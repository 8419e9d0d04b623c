//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for submission, polling, correction, and an SSE
//! stream for polishing progress.

use super::{build_registry, open_store};
use crate::cli::Output;
use crate::config::{PolishPrompts, Settings};
use crate::dictionary::{apply_dictionary, manual_replace};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::engine::EngineRegistry;
use crate::error::TolkError;
use crate::poller::Poller;
use crate::polish::PolishingPipeline;
use crate::rewrite::OpenAiRewriter;
use crate::store::SqliteStore;
use crate::transcript::{Segment, Transcript, Utterance};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    store: Arc<SqliteStore>,
    registry: Arc<EngineRegistry>,
    settings: Settings,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let registry = build_registry(&settings)?;

    let state = Arc::new(AppState {
        store,
        registry,
        settings,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/transcripts", post(create_transcript))
        .route("/transcripts/{id}", get(get_transcript))
        .route("/transcripts/{id}/correct", post(correct_transcript))
        .route("/transcripts/{id}/polish", get(polish_transcript))
        .route("/transcripts/{id}/complete", post(complete_transcript))
        .route("/segments/{id}/replace", post(replace_segment))
        .route("/dictionary", get(list_dictionary).post(add_dictionary))
        .route("/dictionary/{wrong}", delete(remove_dictionary))
        .route("/engines", get(list_engines))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Tolk API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Submit", "POST   /transcripts");
    Output::kv("Poll", "GET    /transcripts/:id");
    Output::kv("Correct", "POST   /transcripts/:id/correct");
    Output::kv("Polish (SSE)", "GET    /transcripts/:id/polish");
    Output::kv("Complete", "POST   /transcripts/:id/complete");
    Output::kv("Replace", "POST   /segments/:id/replace");
    Output::kv("Dictionary", "GET|POST /dictionary");
    Output::kv("Engines", "GET    /engines");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SubmitRequest {
    /// Audio reference the engine can fetch.
    audio: String,
    /// Engine ID; first active configured engine if omitted.
    #[serde(default)]
    engine: Option<String>,
}

#[derive(Serialize)]
struct SubmitResponse {
    transcript: Transcript,
    dispatched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_job_id: Option<String>,
}

#[derive(Serialize)]
struct TranscriptResponse {
    transcript: Transcript,
    segments: Vec<Segment>,
}

#[derive(Serialize)]
struct CorrectResponse {
    corrected_segments: usize,
}

#[derive(Deserialize)]
struct CompleteRequest {
    #[serde(default)]
    utterances: Vec<Utterance>,
    #[serde(default)]
    duration_seconds: f64,
    /// When set, the job is recorded as failed instead.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct CompleteResponse {
    status: String,
}

#[derive(Deserialize)]
struct ReplaceRequest {
    from: String,
    to: String,
    #[serde(default)]
    remember: bool,
}

#[derive(Serialize)]
struct ReplaceResponse {
    changed: bool,
}

#[derive(Deserialize)]
struct DictionaryAddRequest {
    wrong: String,
    correct: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

/// Map pipeline errors onto HTTP statuses.
fn error_response(e: TolkError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        TolkError::TranscriptNotFound(_) => StatusCode::NOT_FOUND,
        TolkError::InvalidTransition { .. } => StatusCode::CONFLICT,
        TolkError::InvalidEngine(_) | TolkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TolkError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_transcript(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    let engine_id = match req.engine.or_else(|| {
        state
            .settings
            .engines
            .iter()
            .find(|e| e.active)
            .map(|e| e.id.clone())
    }) {
        Some(id) => id,
        None => {
            return error_response(TolkError::InvalidInput(
                "No engine specified and none configured".to_string(),
            ))
            .into_response()
        }
    };

    let transcript = match state.store.create_transcript(&req.audio, &engine_id) {
        Ok(t) => t,
        Err(e) => return error_response(e).into_response(),
    };

    let dispatcher = Dispatcher::new(state.store.clone(), state.registry.clone());
    match dispatcher.dispatch(&transcript.id).await {
        Ok(outcome) => {
            // Re-read so the response reflects the post-dispatch status.
            let transcript = match state.store.require_transcript(&transcript.id) {
                Ok(t) => t,
                Err(e) => return error_response(e).into_response(),
            };
            let (dispatched, external_job_id) = match outcome {
                DispatchOutcome::Submitted { external_job_id } => (true, Some(external_job_id)),
                DispatchOutcome::Deferred => (false, None),
            };
            Json(SubmitResponse {
                transcript,
                dispatched,
                external_job_id,
            })
            .into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let poller = Poller::new(state.store.clone(), state.registry.clone());
    if let Err(e) = poller.poll(&id).await {
        return error_response(e).into_response();
    }

    let transcript = match state.store.require_transcript(&id) {
        Ok(t) => t,
        Err(e) => return error_response(e).into_response(),
    };
    match state.store.segments_for_transcript(&id) {
        Ok(segments) => Json(TranscriptResponse {
            transcript,
            segments,
        })
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn correct_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match apply_dictionary(&state.store, &id) {
        Ok(corrected_segments) => Json(CorrectResponse { corrected_segments }).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// Stream polishing progress as server-sent events.
///
/// The pipeline runs on its own task and persists batch-by-batch, so a client
/// that disconnects mid-stream only stops receiving events.
async fn polish_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = state.store.require_transcript(&id) {
        return error_response(e).into_response();
    }

    let pipeline = PolishingPipeline::new(
        state.store.clone(),
        Arc::new(OpenAiRewriter::new(&state.settings.polishing.model)),
        PolishPrompts::default(),
        state.settings.polishing.batch_size,
        Duration::from_millis(state.settings.polishing.inter_batch_delay_ms),
        Duration::from_millis(state.settings.polishing.rate_limit_cooldown_ms),
    );

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        if let Err(e) = pipeline.run(&id, tx).await {
            warn!("Polishing run failed: {}", e);
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn complete_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> impl IntoResponse {
    let poller = Poller::new(state.store.clone(), state.registry.clone());

    let result = match req.error {
        Some(message) => poller.fail_local(&id, &message),
        None => poller.complete_local(&id, req.utterances, req.duration_seconds),
    };

    match result {
        Ok(status) => Json(CompleteResponse {
            status: status.to_string(),
        })
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn replace_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReplaceRequest>,
) -> impl IntoResponse {
    match manual_replace(&state.store, &id, &req.from, &req.to, req.remember) {
        Ok(changed) => Json(ReplaceResponse { changed }).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn list_dictionary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.dictionary_entries() {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn add_dictionary(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DictionaryAddRequest>,
) -> impl IntoResponse {
    match state.store.add_dictionary_entry(&req.wrong, &req.correct) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn remove_dictionary(
    State(state): State<Arc<AppState>>,
    Path(wrong): Path<String>,
) -> impl IntoResponse {
    match state.store.remove_dictionary_entry(&wrong) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(TolkError::InvalidInput(format!(
            "No dictionary pair for: {}",
            wrong
        )))
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn list_engines(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.list()).into_response()
}
