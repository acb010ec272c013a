// src/knowledge.rs
//
// Builds the knowledge text: every readable file in the data directory that
// mentions at least one body-system keyword, concatenated with a source
// header per file and capped at MAX_CHARS characters.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::extract::{self, ExtractError};

/// Topics a file must mention to be included.
pub const KEYWORDS: [&str; 8] = ["뼈", "근육", "소화", "심장", "호흡", "배설", "뇌", "신경"];

/// Upper bound on the combined knowledge text, counted in characters.
pub const MAX_CHARS: usize = 50_000;

static KNOWLEDGE: OnceLock<String> = OnceLock::new();

/// Loads the knowledge text on first call and returns the same text for the
/// rest of the process lifetime. Later calls ignore `dir`.
pub fn knowledge(dir: &Path) -> &'static str {
    KNOWLEDGE.get_or_init(|| load_knowledge(dir))
}

pub fn load_knowledge(dir: &Path) -> String {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "data directory not readable, starting without material");
            return String::new();
        }
    };

    let mut combined = String::new();
    let mut included = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let text = match extract::extract_text(&path) {
            Ok(text) => text,
            Err(ExtractError::Unsupported) => continue,
            Err(err) => {
                debug!(file = %name, error = %err, "skipping unreadable file");
                continue;
            }
        };
        if !mentions_keyword(&text) {
            debug!(file = %name, "no topic keyword, skipped");
            continue;
        }
        combined.push_str(&format!("\n[source: {}]\n{}", name, text));
        included += 1;
    }

    let capped = cap_chars(combined, MAX_CHARS);
    info!(
        files = included,
        chars = capped.chars().count(),
        "knowledge text loaded"
    );
    capped
}

fn mentions_keyword(text: &str) -> bool {
    KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

// The cap counts characters, not bytes. The material is Korean, so a byte
// cut could land inside a scalar value.
fn cap_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut text = text;
            text.truncate(idx);
            text
        }
        None => text,
    }
}
