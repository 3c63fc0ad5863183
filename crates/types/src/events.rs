//! Append-only typed events emitted by state transitions.
//!
//! Modules define one struct per event and implement [`TypedEvent`]; the
//! context records them as [`Event`] values carrying the type name and a JSON
//! payload. Events are output only and never read back by state logic.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A concrete event payload with a stable, fully-qualified type name.
pub trait TypedEvent: Serialize + DeserializeOwned {
    const TYPE_NAME: &'static str;
}

/// Recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub type_name: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn from_typed<E: TypedEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self {
            type_name: E::TYPE_NAME.to_string(),
            payload: serde_json::to_value(event)?,
        })
    }

    pub fn is<E: TypedEvent>(&self) -> bool {
        self.type_name == E::TYPE_NAME
    }

    /// Decode the payload when the type name matches `E`.
    pub fn decode<E: TypedEvent>(&self) -> Option<E> {
        if !self.is::<E>() {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}
