/*!
 * Batch helpers for the translation loop.
 *
 * Cues are sent to the backend as one numbered block per batch
 * (`[1] text`, `[2] text`, ...) and the response is mapped back to cues by
 * line position. Alignment is positional only: the n-th response line is
 * taken for the n-th cue, whatever marker it carries.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::Cue;

// @const: Leading "[n]" marker plus following whitespace
static MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\d+\]\s*").expect("marker regex is valid")
});

/// Number of batches needed for `total` cues
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Split cues into consecutive batches of at most `batch_size`
pub fn partition(cues: &[Cue], batch_size: usize) -> Vec<&[Cue]> {
    cues.chunks(batch_size.max(1)).collect()
}

/// One `[n] text` line per cue, n starting at 1 within the batch
pub fn build_numbered_block(batch: &[Cue]) -> String {
    batch
        .iter()
        .enumerate()
        .map(|(idx, cue)| format!("[{}] {}", idx + 1, cue.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the generation prompt around a numbered block
pub fn build_prompt(numbered_block: &str, source_language: &str, target_language: &str) -> String {
    format!(
        "Translate this text from {} to {}. Keep the [n] markers at the start of each line. \
         Reply ONLY with the translation, nothing else.\n\n{}",
        source_language, target_language, numbered_block
    )
}

/// Map a backend response back onto the batch.
///
/// Line `idx` of the trimmed response goes to cue `idx`. Missing or blank
/// lines keep the original text, a leading marker is removed, and a line
/// that is empty after stripping also keeps the original.
pub fn align_translation(batch: &[Cue], response: &str) -> Vec<Cue> {
    let lines: Vec<&str> = response.trim().split('\n').collect();

    batch
        .iter()
        .enumerate()
        .map(|(idx, cue)| {
            let candidate = match lines.get(idx) {
                Some(line) if !line.is_empty() => *line,
                _ => cue.text.as_str(),
            };
            let stripped = strip_marker(candidate).trim();
            if stripped.is_empty() {
                cue.clone()
            } else {
                cue.with_text(stripped)
            }
        })
        .collect()
}

/// Remove a leading `[n]` marker and the whitespace after it
pub fn strip_marker(line: &str) -> &str {
    match MARKER_REGEX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}
