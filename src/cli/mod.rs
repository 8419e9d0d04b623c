//! CLI module for Tolk.

pub mod commands;
mod output;

pub use output::{format_duration, format_timestamp, Output};

use clap::{Parser, Subcommand};

/// Tolk - Audio Transcript Processing
///
/// A CLI for turning recorded audio into reviewed transcripts: dispatch to
/// speech-to-text engines, dictionary correction, and AI polishing.
/// The name "Tolk" comes from the Norwegian word for "interpreter."
#[derive(Parser, Debug)]
#[command(name = "tolk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Tolk and write a default configuration
    Init,

    /// Create a transcript record and dispatch it to an engine
    Submit {
        /// Audio reference (file path or URL the engine can fetch)
        audio: String,

        /// Engine to dispatch to (default engine from config if omitted)
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// Check a transcript's recognition job and materialize its result
    Status {
        /// Transcript ID
        transcript_id: String,

        /// Keep polling until the transcript reaches a terminal state
        #[arg(short, long)]
        wait: bool,
    },

    /// Apply the correction dictionary to a transcript's segments
    Correct {
        /// Transcript ID
        transcript_id: String,
    },

    /// Polish a transcript's segments with the rewriting model
    Polish {
        /// Transcript ID
        transcript_id: String,

        /// Rewriting model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Find/replace inside a single segment
    Replace {
        /// Segment ID
        segment_id: String,

        /// Text to find
        from: String,

        /// Replacement text
        to: String,

        /// Also save the pair to the correction dictionary
        #[arg(short, long)]
        remember: bool,
    },

    /// Manage the correction dictionary
    Dict {
        #[command(subcommand)]
        action: DictAction,
    },

    /// List configured engines and their usage statistics
    Engines,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
pub enum DictAction {
    /// Add or update a correction pair
    Add {
        /// Text the engines get wrong
        wrong: String,
        /// What it should read instead
        correct: String,
    },

    /// List all correction pairs in application order
    List,

    /// Remove a correction pair
    Remove {
        /// The wrong text of the pair to remove
        wrong: String,
    },
}
