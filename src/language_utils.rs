use anyhow::{Result, anyhow};
use isolang::Language;
use log::warn;
use std::fmt;

/// Language utilities for ISO language code handling
///
/// This module provides functions for validating, normalizing, and
/// matching ISO 639-1 (2-letter) and ISO 639-2 (3-letter) language codes.
/// Subtitle catalogs key tracks by ISO 639-2/B, so conversions to and from
/// the bibliographic form are provided as well.

// @const: ISO 639-2/B codes that differ from 639-2/T, as (B, T) pairs
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Language code type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter) code
    Part2B,
}

fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    BIBLIOGRAPHIC_CODES
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

fn terminology_to_bibliographic(code: &str) -> Option<&'static str> {
    BIBLIOGRAPHIC_CODES
        .iter()
        .find(|(_, t)| *t == code)
        .map(|(b, _)| *b)
}

/// Validate if a language code is a valid ISO 639-1 or ISO 639-2 code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let normalized_code = code.trim().to_lowercase();

    if normalized_code.len() == 2 {
        if Language::from_639_1(&normalized_code).is_some() {
            return Ok(LanguageCodeType::Part1);
        }
    } else if normalized_code.len() == 3 {
        if bibliographic_to_terminology(&normalized_code).is_some() {
            return Ok(LanguageCodeType::Part2B);
        }
        if Language::from_639_3(&normalized_code).is_some() {
            return Ok(LanguageCodeType::Part2T);
        }
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    // If it's a 2-letter code, convert to 3-letter
    if normalized_code.len() == 2 {
        if let Some(lang) = Language::from_639_1(&normalized_code) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if normalized_code.len() == 3 {
        if let Some(part2t) = bibliographic_to_terminology(&normalized_code) {
            return Ok(part2t.to_string());
        }
        if Language::from_639_3(&normalized_code).is_some() {
            return Ok(normalized_code);
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Normalize a language code to the ISO 639-2/B form used by subtitle catalogs
pub fn normalize_to_part2b(code: &str) -> Result<String> {
    let part2t = normalize_to_part2t(code)?;
    Ok(terminology_to_bibliographic(&part2t)
        .map(|b| b.to_string())
        .unwrap_or(part2t))
}

/// Normalize a language code to ISO 639-1 (2-letter) format if possible
/// Falls back to ISO 639-2/T if no ISO 639-1 code exists
pub fn normalize_to_part1_or_part2t(code: &str) -> Result<String> {
    let part2t = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&part2t)
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;

    Ok(lang
        .to_639_1()
        .map(|c| c.to_string())
        .unwrap_or(part2t))
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// A validated language, carried in the forms the rest of the crate needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference {
    part1: String,
    part2b: String,
    name: String,
}

impl LanguagePreference {
    /// Parse any ISO 639-1, 639-2/T or 639-2/B code
    pub fn parse(code: &str) -> Result<Self> {
        let part1 = normalize_to_part1_or_part2t(code)?;
        let part2b = normalize_to_part2b(code)?;
        let name = get_language_name(code)?;
        Ok(Self { part1, part2b, name })
    }

    /// Parse `raw`, or fall back to `default` with a warning
    pub fn parse_or(raw: Option<&str>, default: &str) -> Result<Self> {
        match raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => match Self::parse(raw) {
                Ok(lang) => Ok(lang),
                Err(e) => {
                    warn!("{}; using '{}' instead", e, default);
                    Self::parse(default)
                }
            },
            None => Self::parse(default),
        }
    }

    /// 2-letter code, or 639-2/T when the language has none
    pub fn part1(&self) -> &str {
        &self.part1
    }

    /// ISO 639-2/B code (`fre`, `eng`, ...)
    pub fn part2b(&self) -> &str {
        &self.part2b
    }

    /// English name (`French`)
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for LanguagePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.part1)
    }
}
