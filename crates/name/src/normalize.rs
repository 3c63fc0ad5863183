//! Canonical name form.
//!
//! A name is a `.`-separated list of segments. Normalization trims and
//! lowercases every segment; validation then checks each segment's length
//! and character class and the number of segments.

use crate::errors::{NameError, Result};
use crate::types::Params;
use once_cell::sync::Lazy;
use regex::Regex;

/// One lowercase letter (Ll) or one decimal digit (Nd).
static SEGMENT_CHAR: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[\p{Ll}\p{Nd}]$"));

/// Trim and lowercase each segment. Performs no validation.
pub fn normalize_name(name: &str) -> String {
    name.split('.')
        .map(|segment| segment.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}

/// True when `segment` parses as a UUID (hyphenated, simple, braced or urn).
pub fn is_valid_uuid(segment: &str) -> bool {
    uuid::Uuid::parse_str(segment).is_ok()
}

/// Character class of one already-normalized segment: lowercase letters and
/// digits with at most one `-`. UUID segments are exempt.
pub fn validate_segment(segment: &str) -> std::result::Result<(), String> {
    if is_valid_uuid(segment) {
        return Ok(());
    }
    let class = SEGMENT_CHAR.as_ref().map_err(|e| e.to_string())?;
    let mut dashes = 0;
    let mut buf = [0u8; 4];
    for c in segment.chars() {
        if c == '-' {
            dashes += 1;
            if dashes > 1 {
                return Err(format!("segment {segment:?} has too many dashes"));
            }
        } else if !class.is_match(c.encode_utf8(&mut buf)) {
            return Err(format!("illegal character {c:?} in segment {segment:?}"));
        }
    }
    Ok(())
}

/// Normalize `name` and validate it against `params`.
///
/// Idempotent: a normalized name normalizes to itself.
pub fn normalize(params: &Params, name: &str) -> Result<String> {
    let normalized = normalize_name(name);
    let min = params.min_segment_length as usize;
    let max = params.max_segment_length as usize;

    let mut levels = 0u32;
    for segment in normalized.split('.') {
        levels += 1;
        if segment.len() < min {
            return Err(NameError::SegmentTooShort {
                name: name.to_string(),
            });
        }
        if segment.len() > max {
            return Err(NameError::SegmentTooLong {
                name: name.to_string(),
            });
        }
        validate_segment(segment).map_err(|reason| NameError::Invalid {
            name: name.to_string(),
            reason,
        })?;
    }
    if levels > params.max_name_levels {
        return Err(NameError::TooManySegments {
            name: name.to_string(),
        });
    }
    Ok(normalized)
}
