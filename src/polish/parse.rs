//! Parser for the rewriting model's `index|text` batch responses.
//!
//! The contract with the model is strict: one line per input segment, batch-
//! local index, a pipe, then the rewritten text. Anything that does not match
//! is dropped and the corresponding segment is left unpolished this round.
//! Malformed input never fails the batch and an invalid index is never
//! applied to a different segment.

use tracing::debug;

/// Parse a batch response into `(batch_index, rewritten_text)` pairs.
///
/// Lines are dropped (never errored) when they have no pipe separator, a
/// non-numeric or out-of-range index, an empty rewrite, or repeat an index
/// already seen.
pub fn parse_batch_response(response: &str, batch_len: usize) -> Vec<(usize, String)> {
    let mut seen = vec![false; batch_len];
    let mut rewrites = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((index_part, text)) = line.split_once('|') else {
            debug!("Dropping line without separator: {:?}", line);
            continue;
        };

        let Ok(index) = index_part.trim().parse::<usize>() else {
            debug!("Dropping line with non-numeric index: {:?}", line);
            continue;
        };

        if index >= batch_len || seen[index] {
            debug!("Dropping line with out-of-range or duplicate index {}", index);
            continue;
        }

        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        seen[index] = true;
        rewrites.push((index, text.to_string()));
    }

    rewrites
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_response() {
        let response = "0|First sentence.\n1|Second sentence.\n2|Third sentence.";
        let rewrites = parse_batch_response(response, 3);

        assert_eq!(rewrites.len(), 3);
        assert_eq!(rewrites[0], (0, "First sentence.".to_string()));
        assert_eq!(rewrites[2], (2, "Third sentence.".to_string()));
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let response = "\
0|Good line.
no separator here
x|Bad index.
1|
2|Another good line.";
        let rewrites = parse_batch_response(response, 3);

        assert_eq!(rewrites, vec![
            (0, "Good line.".to_string()),
            (2, "Another good line.".to_string()),
        ]);
    }

    #[test]
    fn test_out_of_range_index_never_misapplied() {
        let response = "7|Hallucinated.\n0|Real.";
        let rewrites = parse_batch_response(response, 2);
        assert_eq!(rewrites, vec![(0, "Real.".to_string())]);
    }

    #[test]
    fn test_duplicate_index_keeps_first() {
        let response = "0|First.\n0|Second.";
        let rewrites = parse_batch_response(response, 1);
        assert_eq!(rewrites, vec![(0, "First.".to_string())]);
    }

    #[test]
    fn test_pipe_in_rewritten_text_preserved() {
        let response = "0|a | b";
        let rewrites = parse_batch_response(response, 1);
        assert_eq!(rewrites, vec![(0, "a | b".to_string())]);
    }

    #[test]
    fn test_empty_response() {
        assert!(parse_batch_response("", 5).is_empty());
        assert!(parse_batch_response("\n\n", 5).is_empty());
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let response = "  1 | Tidy text.  ";
        let rewrites = parse_batch_response(response, 2);
        assert_eq!(rewrites, vec![(1, "Tidy text.".to_string())]);
    }
}
