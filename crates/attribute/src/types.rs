//! Types for the attribute store

use crate::errors::{AttributeError, Result};
use crate::validate::is_valid_attribute_value;
use chrono::{DateTime, Utc};
use idreg_types::{hex_bytes, Address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of an attribute value. The variant order is the stable
/// numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    Unspecified,
    Uuid,
    Json,
    String,
    Bytes,
    Uri,
    Int,
    Float,
    Proto,
}

impl AttributeType {
    pub const ALL: [AttributeType; 9] = [
        AttributeType::Unspecified,
        AttributeType::Uuid,
        AttributeType::Json,
        AttributeType::String,
        AttributeType::Bytes,
        AttributeType::Uri,
        AttributeType::Int,
        AttributeType::Float,
        AttributeType::Proto,
    ];

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Unspecified => "ATTRIBUTE_TYPE_UNSPECIFIED",
            AttributeType::Uuid => "ATTRIBUTE_TYPE_UUID",
            AttributeType::Json => "ATTRIBUTE_TYPE_JSON",
            AttributeType::String => "ATTRIBUTE_TYPE_STRING",
            AttributeType::Bytes => "ATTRIBUTE_TYPE_BYTES",
            AttributeType::Uri => "ATTRIBUTE_TYPE_URI",
            AttributeType::Int => "ATTRIBUTE_TYPE_INT",
            AttributeType::Float => "ATTRIBUTE_TYPE_FLOAT",
            AttributeType::Proto => "ATTRIBUTE_TYPE_PROTO",
        }
    }

    /// Bytes and Proto payloads are kept exactly as given.
    pub fn is_opaque(&self) -> bool {
        matches!(self, AttributeType::Bytes | AttributeType::Proto)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = AttributeError;

    /// Accepts `ATTRIBUTE_TYPE_STRING` as well as the short `string`.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("ATTRIBUTE_TYPE_").unwrap_or(&upper);
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().strip_prefix("ATTRIBUTE_TYPE_") == Some(short))
            .ok_or_else(|| AttributeError::InvalidAttribute {
                reason: format!("unknown attribute type {s:?}"),
            })
    }
}

/// A typed value attached to an account under a bound name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub attribute_type: AttributeType,
    pub address: Address,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl Attribute {
    /// Builds an attribute, trimming surrounding whitespace from the value
    /// unless the type is opaque.
    pub fn new(
        name: impl Into<String>,
        address: Address,
        attribute_type: AttributeType,
        value: impl Into<Vec<u8>>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        let value = value.into();
        let value = if attribute_type.is_opaque() {
            value
        } else {
            trim_value(value)
        };
        Self {
            name: name.into(),
            value,
            attribute_type,
            address,
            expiration,
        }
    }

    /// State-free checks: name, address, type and value.
    pub fn validate_basic(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AttributeError::InvalidAttribute {
                reason: "attribute name cannot be blank".into(),
            });
        }
        if self.address.is_empty() {
            return Err(AttributeError::InvalidAttribute {
                reason: format!("attribute {:?} has an empty address", self.name),
            });
        }
        if !is_valid_attribute_value(self.attribute_type, &self.value) {
            return Err(AttributeError::InvalidValue {
                name: self.name.clone(),
                attribute_type: self.attribute_type,
            });
        }
        Ok(())
    }

    /// Expired once block time reaches the expiration.
    pub fn is_expired(&self, at: &DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= *at)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) on {}", self.name, self.attribute_type, self.address)?;
        if let Some(exp) = self.expiration {
            write!(f, " until {}", exp.to_rfc3339())?;
        }
        Ok(())
    }
}

fn trim_value(value: Vec<u8>) -> Vec<u8> {
    let trimmed = match std::str::from_utf8(&value) {
        Ok(s) => s.trim().as_bytes(),
        Err(_) => value.trim_ascii(),
    };
    trimmed.to_vec()
}

/// Attribute module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub max_value_length: u32,
}

pub const DEFAULT_MAX_VALUE_LENGTH: u32 = 1_000;

impl Default for Params {
    fn default() -> Self {
        Self {
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.max_value_length == 0 {
            return Err(AttributeError::InvalidParams(
                "max value length must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        for attr in &self.attributes {
            attr.validate_basic()
                .map_err(|e| AttributeError::InvalidGenesis(e.to_string()))?;
            if attr.value.len() > self.params.max_value_length as usize {
                return Err(AttributeError::InvalidGenesis(format!(
                    "value of {:?} exceeds max length {}",
                    attr.name, self.params.max_value_length
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: Address = Address([5; 32]);

    #[test]
    fn type_codes_and_names() {
        for (code, t) in AttributeType::ALL.iter().enumerate() {
            assert_eq!(t.code(), code as u32);
            assert_eq!(AttributeType::from_code(code as u32), Some(*t));
            assert_eq!(t.as_str().parse::<AttributeType>().unwrap(), *t);
        }
        assert_eq!(AttributeType::String.code(), 3);
        assert_eq!(AttributeType::Proto.code(), 8);
        assert_eq!(AttributeType::from_code(9), None);
        assert_eq!("int".parse::<AttributeType>().unwrap(), AttributeType::Int);
        assert!("decimal".parse::<AttributeType>().is_err());
    }

    #[test]
    fn new_trims_unless_opaque() {
        let text = Attribute::new("a.b", ACCOUNT, AttributeType::String, "  hi \n", None);
        assert_eq!(text.value, b"hi");
        let raw = Attribute::new("a.b", ACCOUNT, AttributeType::Bytes, &b" hi "[..], None);
        assert_eq!(raw.value, b" hi ");
        let proto = Attribute::new("a.b", ACCOUNT, AttributeType::Proto, vec![b' ', 0xff], None);
        assert_eq!(proto.value, vec![b' ', 0xff]);
    }

    #[test]
    fn validate_basic_checks_pairing() {
        let ok = Attribute::new("a.b", ACCOUNT, AttributeType::Int, "12", None);
        assert!(ok.validate_basic().is_ok());

        let bad = Attribute::new("a.b", ACCOUNT, AttributeType::Int, "twelve", None);
        assert!(matches!(bad.validate_basic(), Err(AttributeError::InvalidValue { .. })));

        let blank = Attribute::new(" ", ACCOUNT, AttributeType::Int, "12", None);
        assert!(matches!(blank.validate_basic(), Err(AttributeError::InvalidAttribute { .. })));

        let nobody = Attribute::new("a.b", Address::ZERO, AttributeType::Int, "12", None);
        assert!(nobody.validate_basic().is_err());
    }

    #[test]
    fn json_shape_is_stable() {
        let attr = Attribute::new("a.b", ACCOUNT, AttributeType::String, "v", None);
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["attribute_type"], "string");
        assert_eq!(json["value"], "76");
        let back: Attribute = serde_json::from_value(json).unwrap();
        assert_eq!(back, attr);
    }
}
