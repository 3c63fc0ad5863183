//! Types for the name registry

use crate::errors::{NameError, Result};
use idreg_types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binding of a normalized name to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub name: String,
    pub address: Address,
    /// Only the owner may bind children below a restricted name.
    #[serde(default)]
    pub restricted: bool,
}

impl NameRecord {
    pub fn new(name: impl Into<String>, address: Address, restricted: bool) -> Self {
        Self {
            name: name.into(),
            address,
            restricted,
        }
    }

    /// Shallow checks that need no state.
    pub fn validate_basic(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NameError::Invalid {
                name: self.name.clone(),
                reason: "name cannot be empty".into(),
            });
        }
        if self.address.is_empty() {
            return Err(NameError::InvalidAddress(format!(
                "record {:?} has an empty address",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for NameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.address)?;
        if self.restricted {
            f.write_str(" [restricted]")?;
        }
        Ok(())
    }
}

/// Name module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub max_segment_length: u32,
    pub min_segment_length: u32,
    pub max_name_levels: u32,
    pub allow_unrestricted_names: bool,
}

pub const DEFAULT_MAX_SEGMENT_LENGTH: u32 = 32;
pub const DEFAULT_MIN_SEGMENT_LENGTH: u32 = 2;
pub const DEFAULT_MAX_NAME_LEVELS: u32 = 16;

impl Default for Params {
    fn default() -> Self {
        Self {
            max_segment_length: DEFAULT_MAX_SEGMENT_LENGTH,
            min_segment_length: DEFAULT_MIN_SEGMENT_LENGTH,
            max_name_levels: DEFAULT_MAX_NAME_LEVELS,
            allow_unrestricted_names: true,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.min_segment_length == 0 {
            return Err(NameError::InvalidParams(
                "min segment length must be positive".into(),
            ));
        }
        if self.min_segment_length > self.max_segment_length {
            return Err(NameError::InvalidParams(format!(
                "min segment length {} exceeds max segment length {}",
                self.min_segment_length, self.max_segment_length
            )));
        }
        if self.max_name_levels == 0 {
            return Err(NameError::InvalidParams(
                "max name levels must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Name module state at genesis or export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub bindings: Vec<NameRecord>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        let mut seen = std::collections::HashSet::new();
        for record in &self.bindings {
            record
                .validate_basic()
                .map_err(|e| NameError::InvalidGenesis(e.to_string()))?;
            if !seen.insert(record.name.as_str()) {
                return Err(NameError::InvalidGenesis(format!(
                    "duplicate binding for {:?}",
                    record.name
                )));
            }
        }
        Ok(())
    }
}
