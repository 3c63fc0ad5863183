use crate::types::AttributeType;
use num_bigint::BigInt;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Whether `value` is a well-formed payload for `attribute_type`.
pub fn is_valid_attribute_value(attribute_type: AttributeType, value: &[u8]) -> bool {
    match attribute_type {
        AttributeType::Unspecified => false,
        AttributeType::Uuid => as_str(value).is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        AttributeType::Json => serde_json::from_slice::<serde_json::Value>(value).is_ok(),
        AttributeType::String => as_str(value).is_some_and(|s| !s.trim().is_empty()),
        AttributeType::Uri => as_str(value).is_some_and(is_uri),
        AttributeType::Int => as_str(value).is_some_and(is_int),
        AttributeType::Float => as_str(value).is_some_and(is_float),
        AttributeType::Bytes | AttributeType::Proto => true,
    }
}

fn as_str(value: &[u8]) -> Option<&str> {
    std::str::from_utf8(value).ok()
}

/// Absolute URI, or an absolute request path.
fn is_uri(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    url::Url::parse(s).is_ok() || s.starts_with('/')
}

/// Base-10 integer of any size with an optional sign.
fn is_int(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && BigInt::from_str(s.trim_start_matches('+')).is_ok()
}

/// Plain or scientific decimal.
fn is_float(s: &str) -> bool {
    if s.is_empty() || s != s.trim() {
        return false;
    }
    Decimal::from_str(s).is_ok() || Decimal::from_scientific(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(t: AttributeType, v: &str) -> bool {
        is_valid_attribute_value(t, v.as_bytes())
    }

    #[test]
    fn unspecified_is_never_valid() {
        assert!(!valid(AttributeType::Unspecified, "anything"));
        assert!(!valid(AttributeType::Unspecified, ""));
    }

    #[test]
    fn uuid_values() {
        assert!(valid(AttributeType::Uuid, "91978ba2-5f35-459a-86a7-feca1b0512e0"));
        assert!(valid(AttributeType::Uuid, "91978ba25f35459a86a7feca1b0512e0"));
        assert!(!valid(AttributeType::Uuid, "91978ba2-5f35-459a-86a7-feca1b0512e"));
        assert!(!is_valid_attribute_value(AttributeType::Uuid, &[0xff, 0xfe]));
    }

    #[test]
    fn json_values() {
        assert!(valid(AttributeType::Json, r#"{"id":1,"tags":["a"]}"#));
        assert!(valid(AttributeType::Json, "[]"));
        assert!(!valid(AttributeType::Json, "{id: 1}"));
        assert!(!valid(AttributeType::Json, ""));
    }

    #[test]
    fn string_values() {
        assert!(valid(AttributeType::String, "hello"));
        assert!(!valid(AttributeType::String, "   "));
        assert!(!is_valid_attribute_value(AttributeType::String, &[0xc3, 0x28]));
    }

    #[test]
    fn uri_values() {
        assert!(valid(AttributeType::Uri, "https://provenance.io/path?q=1"));
        assert!(valid(AttributeType::Uri, "urn:isbn:0451450523"));
        assert!(valid(AttributeType::Uri, "/just/a/path"));
        assert!(!valid(AttributeType::Uri, "relative/path"));
        assert!(!valid(AttributeType::Uri, "http://exa mple.com"));
        assert!(!valid(AttributeType::Uri, ""));
    }

    #[test]
    fn int_values() {
        assert!(valid(AttributeType::Int, "0"));
        assert!(valid(AttributeType::Int, "-42"));
        assert!(valid(AttributeType::Int, "+7"));
        assert!(valid(
            AttributeType::Int,
            "123456789012345678901234567890123456789012345678901234567890"
        ));
        assert!(!valid(AttributeType::Int, "1.5"));
        assert!(!valid(AttributeType::Int, "1_000"));
        assert!(!valid(AttributeType::Int, "-"));
        assert!(!valid(AttributeType::Int, "0x10"));
    }

    #[test]
    fn float_values() {
        assert!(valid(AttributeType::Float, "1.5"));
        assert!(valid(AttributeType::Float, "-0.25"));
        assert!(valid(AttributeType::Float, "10"));
        assert!(valid(AttributeType::Float, "1.2e3"));
        assert!(!valid(AttributeType::Float, "one"));
        assert!(!valid(AttributeType::Float, ""));
    }

    #[test]
    fn opaque_payloads_are_always_valid() {
        for t in [AttributeType::Bytes, AttributeType::Proto] {
            assert!(is_valid_attribute_value(t, &[]));
            assert!(is_valid_attribute_value(t, &[0xff, 0x00, 0x20]));
        }
    }
}
