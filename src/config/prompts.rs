//! Prompt templates for the polishing pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prompts instructing the rewriting model to polish a batch of segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolishPrompts {
    pub system: String,
    pub user: String,
}

impl Default for PolishPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a transcript editor. You receive numbered lines of raw speech-to-text output and return the same lines with correct punctuation and smoothed phrasing.

Rules:
- Add correct punctuation and capitalization
- Smooth awkward or disfluent phrasing
- Preserve the original meaning exactly
- Keep the original language of each line; never translate
- Never merge, split, reorder, or drop lines
- Never add commentary, explanations, or extra lines"#
                .to_string(),

            user: r#"Rewrite each of the {{count}} lines below. Respond with exactly one line per input line, in the format:

index|rewritten text

Use the same index as the input line. No other output.

{{lines}}"#
                .to_string(),
        }
    }
}

impl PolishPrompts {
    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}
