use crate::types::{AttributeType, Params};
use chrono::{DateTime, Utc};
use idreg_types::{hex_bytes, Address, TypedEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeAdd {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub attribute_type: AttributeType,
    pub account: Address,
    pub owner: Address,
    pub expiration: Option<DateTime<Utc>>,
}

impl TypedEvent for EventAttributeAdd {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeAdd";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeUpdate {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub original_value: Vec<u8>,
    pub original_type: AttributeType,
    #[serde(with = "hex_bytes")]
    pub update_value: Vec<u8>,
    pub update_type: AttributeType,
    pub account: Address,
    pub owner: Address,
}

impl TypedEvent for EventAttributeUpdate {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeUpdate";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeExpirationUpdate {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub account: Address,
    pub owner: Address,
    pub original_expiration: Option<DateTime<Utc>>,
    pub updated_expiration: Option<DateTime<Utc>>,
}

impl TypedEvent for EventAttributeExpirationUpdate {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeExpirationUpdate";
}

/// One per record removed by a delete without a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeDelete {
    pub name: String,
    pub account: Address,
    pub owner: Address,
}

impl TypedEvent for EventAttributeDelete {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeDelete";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeDistinctDelete {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub account: Address,
    pub owner: Address,
}

impl TypedEvent for EventAttributeDistinctDelete {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeDistinctDelete";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeExpiredDelete {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub attribute_type: AttributeType,
    pub account: Address,
    pub expiration: Option<DateTime<Utc>>,
}

impl TypedEvent for EventAttributeExpiredDelete {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeExpiredDelete";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAccountDataUpdated {
    pub account: Address,
}

impl TypedEvent for EventAccountDataUpdated {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAccountDataUpdated";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributeParamsUpdated {
    pub params: Params,
}

impl TypedEvent for EventAttributeParamsUpdated {
    const TYPE_NAME: &'static str = "idreg.attribute.v1.EventAttributeParamsUpdated";
}
