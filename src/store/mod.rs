//! Persistence for transcripts, segments, dictionary entries, and engine stats.
//!
//! Backed by SQLite. The store is intentionally dumb: status transitions are
//! validated here, but coordination between correction passes is a caller
//! contract (see `dictionary` and `polish` module docs).

mod sqlite;

pub use sqlite::{EngineStats, SqliteStore};
