use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use anyhow::{Result, Context, anyhow};
use log::{warn, debug};

use crate::errors::SubtitleError;

// @module: Cue codec for SRT subtitle tracks

// @const: SRT timing line regex, accepts ',' or '.' before milliseconds
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})")
        .expect("timing regex is valid")
});

// @struct: Single timed cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    // @field: Sequence number, 1-based
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Cue text, may span several lines
    pub text: String,
}

impl Cue {
    /// Creates a new cue
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Cue {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    // @creates: Validated cue
    // @validates: Time range and non-empty text
    pub fn new_validated(index: usize, start_ms: u64, end_ms: u64, text: &str) -> Result<Self> {
        if end_ms < start_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} < start time {}",
                end_ms, start_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for cue {}", index));
        }

        Ok(Cue::new(index, start_ms, end_ms, trimmed_text))
    }

    /// Same timing and index, new text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Cue {
            index: self.index,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            text: text.into(),
        }
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_ms)
    }

    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_ms)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)
    }
}

/// Parse SRT text into cues, in input order.
///
/// Blocks with a bad timing line, an inverted range or no text are skipped
/// with a warning. Fails only when nothing usable remains.
pub fn parse(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut cues = Vec::new();
    let mut skipped = 0usize;

    // State for the block being read
    let mut current_index: Option<usize> = None;
    let mut current_timing: Option<(u64, u64)> = None;
    let mut current_text = String::new();

    let mut finish_block = |index: Option<usize>, timing: Option<(u64, u64)>, text: &str, cues: &mut Vec<Cue>| {
        let Some((start_ms, end_ms)) = timing else {
            if index.is_some() || !text.trim().is_empty() {
                skipped += 1;
            }
            return;
        };
        let index = index.unwrap_or(cues.len() + 1);
        match Cue::new_validated(index, start_ms, end_ms, text) {
            Ok(cue) => cues.push(cue),
            Err(e) => {
                warn!("Skipping invalid cue {}: {}", index, e);
                skipped += 1;
            }
        }
    };

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            // A timed block ends here even when it has no text
            if current_timing.is_some() {
                finish_block(current_index.take(), current_timing.take(), current_text.as_str(), &mut cues);
                current_text.clear();
            }
            continue;
        }

        // Sequence number only opens a block
        if current_index.is_none() && current_timing.is_none() && current_text.is_empty() {
            if let Ok(num) = trimmed.parse::<usize>() {
                current_index = Some(num);
                continue;
            }
        }

        if current_timing.is_none() {
            if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                current_timing = Some((captures_to_ms(&caps, 1), captures_to_ms(&caps, 5)));
                continue;
            }
            debug!("Unexpected line {} outside of a cue: {}", line_no + 1, trimmed);
            current_index = None;
            continue;
        }

        if !current_text.is_empty() {
            current_text.push('\n');
        }
        current_text.push_str(trimmed);
    }

    finish_block(current_index, current_timing, current_text.as_str(), &mut cues);

    if skipped > 0 {
        warn!("Skipped {} unusable block(s) while parsing track", skipped);
    }

    if cues.is_empty() {
        return Err(SubtitleError::MalformedTrack(
            "no valid cue was found in the track".to_string(),
        ));
    }

    Ok(cues)
}

/// Serialize cues to SRT text, renumbering from 1 in the given order
pub fn serialize(cues: &[Cue]) -> String {
    cues.iter()
        .enumerate()
        .map(|(i, cue)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                cue.format_start_time(),
                cue.format_end_time(),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn captures_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let field = |offset: usize| -> u64 {
        caps.get(start_idx + offset)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };

    // "5" after the separator means 500 ms, not 5 ms
    let millis = caps.get(start_idx + 3).map_or(0, |m| {
        let digits = m.as_str();
        let value: u64 = digits.parse().unwrap_or(0);
        value * 10u64.pow(3 - digits.len() as u32)
    });

    (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + millis
}
