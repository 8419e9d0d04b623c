//! Tolk - Audio transcript processing pipeline.
//!
//! Tolk takes recorded audio through speech-to-text engines and turns the
//! result into reviewed, publishable transcripts: dispatch to a configured
//! engine, poll for diarized output, apply deterministic dictionary
//! corrections, and polish the text with a rewriting model. The name "Tolk"
//! comes from the Norwegian word for "interpreter."

pub mod cli;
pub mod config;
pub mod dictionary;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod poller;
pub mod polish;
pub mod rewrite;
pub mod store;
pub mod transcript;

pub use error::{Result, TolkError};
