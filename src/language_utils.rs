//! Language utilities for the codes carried by translation requests
//!
//! Providers accept ISO 639-1 codes, optionally followed by script or
//! region subtags (`zh-TW`, `sr-Latn`). Only the primary subtag is checked
//! against ISO 639; subtags are passed through untouched.

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T equivalents
const PART2B_TO_PART2T: &[(&str, &str)] = &[
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

fn lookup_primary(primary: &str) -> Option<Language> {
    match primary.len() {
        2 => Language::from_639_1(primary),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == primary)
                .map_or(primary, |(_, t)| *t);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Validate a language tag and return it in normalized form
///
/// The primary subtag is lowercased and reduced to ISO 639-1 where one
/// exists. Remaining subtags keep their original spelling.
pub fn normalize_language_code(code: &str) -> Result<String> {
    let trimmed = code.trim();
    let mut parts = trimmed.split(['-', '_']);
    let primary = parts.next().unwrap_or_default().to_lowercase();

    let lang = lookup_primary(&primary)
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))?;

    let mut normalized = lang
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_639_3().to_string());

    for subtag in parts {
        if subtag.is_empty() || !subtag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("Invalid language code: {}", code));
        }
        normalized.push('-');
        normalized.push_str(subtag);
    }

    Ok(normalized)
}

/// Get the English language name for a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_language_code(code)?;
    let primary = normalized.split('-').next().unwrap_or_default();
    let lang = lookup_primary(primary)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}
