use crate::types::Params;
use idreg_types::{Address, TypedEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNameBound {
    pub address: Address,
    pub name: String,
    pub restricted: bool,
}

impl TypedEvent for EventNameBound {
    const TYPE_NAME: &'static str = "idreg.name.v1.EventNameBound";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNameUnbound {
    pub address: Address,
    pub name: String,
    pub restricted: bool,
}

impl TypedEvent for EventNameUnbound {
    const TYPE_NAME: &'static str = "idreg.name.v1.EventNameUnbound";
}

/// Emitted when a name changes owner or restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNameUpdate {
    pub address: Address,
    pub name: String,
    pub restricted: bool,
}

impl TypedEvent for EventNameUpdate {
    const TYPE_NAME: &'static str = "idreg.name.v1.EventNameUpdate";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNameParamsUpdated {
    pub params: Params,
}

impl TypedEvent for EventNameParamsUpdated {
    const TYPE_NAME: &'static str = "idreg.name.v1.EventNameParamsUpdated";
}
