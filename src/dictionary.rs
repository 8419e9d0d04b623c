//! Dictionary correction pass: deterministic find/replace over segments.
//!
//! Substitutions are applied in dictionary insertion order, case-sensitive,
//! all occurrences. Later entries see the output of earlier ones, so
//! overlapping rules resolve order-dependently; with a stable dictionary the
//! pass converges to a fixed point on re-run.
//!
//! Segments must not be mutated concurrently by this pass and the polishing
//! pipeline; serializing the two per transcript is the caller's contract.

use crate::error::{Result, TolkError};
use crate::store::SqliteStore;
use crate::transcript::DictionaryEntry;
use tracing::{debug, info, instrument};

/// Apply every dictionary rule to every segment of a transcript.
///
/// Returns the number of segments whose text changed. Each changed segment's
/// result is persisted to `edited_text`; the original `text` is untouched.
#[instrument(skip(store))]
pub fn apply_dictionary(store: &SqliteStore, transcript_id: &str) -> Result<usize> {
    let entries = store.dictionary_entries()?;
    if entries.is_empty() {
        debug!("Dictionary is empty, nothing to correct");
        return Ok(0);
    }

    let segments = store.segments_for_transcript(transcript_id)?;
    let mut corrected = 0;

    for segment in &segments {
        let base = segment.effective_text();
        let replaced = substitute(base, &entries);

        if replaced != base {
            store.update_edited_text(&segment.id, &replaced)?;
            corrected += 1;
        }
    }

    info!(
        "Dictionary pass corrected {}/{} segments of transcript {}",
        corrected,
        segments.len(),
        transcript_id
    );
    Ok(corrected)
}

/// Apply all rules to one piece of text, in entry order.
fn substitute(text: &str, entries: &[DictionaryEntry]) -> String {
    let mut result = text.to_string();
    for entry in entries {
        result = result.replace(&entry.wrong_text, &entry.correct_text);
    }
    result
}

/// Manual find/replace on a single segment, with optional "remember this"
/// promotion of the pair into the shared dictionary.
///
/// Returns whether the segment's text changed.
#[instrument(skip(store))]
pub fn manual_replace(
    store: &SqliteStore,
    segment_id: &str,
    from: &str,
    to: &str,
    remember: bool,
) -> Result<bool> {
    if from.is_empty() {
        return Err(TolkError::InvalidInput("Search text must not be empty".to_string()));
    }

    let segment = store
        .get_segment(segment_id)?
        .ok_or_else(|| TolkError::InvalidInput(format!("Segment not found: {}", segment_id)))?;

    let base = segment.effective_text();
    let replaced = base.replace(from, to);
    let changed = replaced != base;

    if changed {
        store.update_edited_text(&segment.id, &replaced)?;
    }
    if remember {
        store.add_dictionary_entry(from, to)?;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Utterance;

    fn seed_transcript(store: &SqliteStore, texts: &[&str]) -> String {
        let transcript = store.create_transcript("file:///a.wav", "e1").unwrap();
        let utterances: Vec<Utterance> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Utterance {
                speaker: "spk_0".to_string(),
                text: text.to_string(),
                start_ms: i as i64 * 1000,
                end_ms: i as i64 * 1000 + 900,
                confidence: None,
            })
            .collect();
        store.insert_segments(&transcript.id, &utterances).unwrap();
        transcript.id
    }

    #[test]
    fn test_known_mistranscription_corrected() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_dictionary_entry("台積店", "台積電").unwrap();
        let id = seed_transcript(&store, &["今天去台積店"]);

        let corrected = apply_dictionary(&store, &id).unwrap();
        assert_eq!(corrected, 1);

        let segment = &store.segments_for_transcript(&id).unwrap()[0];
        assert_eq!(segment.edited_text.as_deref(), Some("今天去台積電"));
        assert_eq!(segment.text, "今天去台積店");
    }

    #[test]
    fn test_second_run_is_fixed_point() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_dictionary_entry("teh", "the").unwrap();
        let id = seed_transcript(&store, &["teh cat", "already fine"]);

        assert_eq!(apply_dictionary(&store, &id).unwrap(), 1);
        // Unchanged dictionary: nothing left to correct.
        assert_eq!(apply_dictionary(&store, &id).unwrap(), 0);
    }

    #[test]
    fn test_replaces_all_occurrences_case_sensitive() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_dictionary_entry("abc", "xyz").unwrap();
        let id = seed_transcript(&store, &["abc abc ABC"]);

        apply_dictionary(&store, &id).unwrap();
        let segment = &store.segments_for_transcript(&id).unwrap()[0];
        assert_eq!(segment.edited_text.as_deref(), Some("xyz xyz ABC"));
    }

    #[test]
    fn test_overlapping_rules_apply_in_entry_order() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_dictionary_entry("aa", "bb").unwrap();
        store.add_dictionary_entry("bb", "cc").unwrap();
        let id = seed_transcript(&store, &["aa"]);

        apply_dictionary(&store, &id).unwrap();
        // First rule rewrites aa -> bb, second then sees bb.
        let segment = &store.segments_for_transcript(&id).unwrap()[0];
        assert_eq!(segment.edited_text.as_deref(), Some("cc"));
    }

    #[test]
    fn test_rerun_uses_edited_text_as_base() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_dictionary_entry("one", "two").unwrap();
        let id = seed_transcript(&store, &["one"]);

        apply_dictionary(&store, &id).unwrap();
        store.add_dictionary_entry("two", "three").unwrap();
        assert_eq!(apply_dictionary(&store, &id).unwrap(), 1);

        let segment = &store.segments_for_transcript(&id).unwrap()[0];
        assert_eq!(segment.edited_text.as_deref(), Some("three"));
        assert_eq!(segment.text, "one");
    }

    #[test]
    fn test_manual_replace_with_remember() {
        let store = SqliteStore::in_memory().unwrap();
        let id = seed_transcript(&store, &["hello wrold"]);
        let segment_id = store.segments_for_transcript(&id).unwrap()[0].id.clone();

        let changed = manual_replace(&store, &segment_id, "wrold", "world", true).unwrap();
        assert!(changed);

        let segment = store.get_segment(&segment_id).unwrap().unwrap();
        assert_eq!(segment.edited_text.as_deref(), Some("hello world"));

        let entries = store.dictionary_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].wrong_text, "wrold");
    }

    #[test]
    fn test_manual_replace_no_match() {
        let store = SqliteStore::in_memory().unwrap();
        let id = seed_transcript(&store, &["hello"]);
        let segment_id = store.segments_for_transcript(&id).unwrap()[0].id.clone();

        let changed = manual_replace(&store, &segment_id, "missing", "x", false).unwrap();
        assert!(!changed);
        assert!(store.get_segment(&segment_id).unwrap().unwrap().edited_text.is_none());
    }
}
