//! Transaction messages and the type URL registry used to decode them.

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use idreg_attribute::{AttributeType, Params as AttributeParams};
use idreg_name::{NameRecord, Params as NameParams};
use idreg_types::{hex_bytes, Address};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message with a stable type URL and a single authorizing address.
pub trait TypedMsg: Serialize + DeserializeOwned + Into<Msg> {
    const TYPE_URL: &'static str;

    fn signer(&self) -> Address;
}

/// Bind `record` below `parent`. Signed by the parent owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBindName {
    pub parent: NameRecord,
    pub record: NameRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeleteName {
    pub record: NameRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgModifyName {
    pub authority: Address,
    pub record: NameRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateRootName {
    pub authority: Address,
    pub record: NameRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateNameParams {
    pub authority: Address,
    pub params: NameParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddAttribute {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub attribute_type: AttributeType,
    pub account: Address,
    pub owner: Address,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateAttribute {
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateAttributeExpiration {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    pub account: Address,
    pub owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeleteAttribute {
    pub name: String,
    pub account: Address,
    pub owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeleteDistinctAttribute {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub account: Address,
    pub owner: Address,
}

/// Replace the account data of `account`. Signed by the account itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetAccountData {
    pub value: String,
    pub account: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateAttributeParams {
    pub authority: Address,
    pub params: AttributeParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    BindName(MsgBindName),
    DeleteName(MsgDeleteName),
    ModifyName(MsgModifyName),
    CreateRootName(MsgCreateRootName),
    UpdateNameParams(MsgUpdateNameParams),
    AddAttribute(MsgAddAttribute),
    UpdateAttribute(MsgUpdateAttribute),
    UpdateAttributeExpiration(MsgUpdateAttributeExpiration),
    DeleteAttribute(MsgDeleteAttribute),
    DeleteDistinctAttribute(MsgDeleteDistinctAttribute),
    SetAccountData(MsgSetAccountData),
    UpdateAttributeParams(MsgUpdateAttributeParams),
}

macro_rules! typed_msg {
    ($msg:ident, $variant:ident, $url:literal, |$m:ident| $signer:expr) => {
        impl TypedMsg for $msg {
            const TYPE_URL: &'static str = $url;

            fn signer(&self) -> Address {
                let $m = self;
                $signer
            }
        }

        impl From<$msg> for Msg {
            fn from(msg: $msg) -> Self {
                Msg::$variant(msg)
            }
        }
    };
}

typed_msg!(MsgBindName, BindName, "/idreg.name.v1.MsgBindName", |m| m.parent.address);
typed_msg!(MsgDeleteName, DeleteName, "/idreg.name.v1.MsgDeleteName", |m| m.record.address);
typed_msg!(MsgModifyName, ModifyName, "/idreg.name.v1.MsgModifyName", |m| m.authority);
typed_msg!(MsgCreateRootName, CreateRootName, "/idreg.name.v1.MsgCreateRootName", |m| m.authority);
typed_msg!(MsgUpdateNameParams, UpdateNameParams, "/idreg.name.v1.MsgUpdateParams", |m| m.authority);
typed_msg!(MsgAddAttribute, AddAttribute, "/idreg.attribute.v1.MsgAddAttribute", |m| m.owner);
typed_msg!(MsgUpdateAttribute, UpdateAttribute, "/idreg.attribute.v1.MsgUpdateAttribute", |m| m.owner);
typed_msg!(
    MsgUpdateAttributeExpiration,
    UpdateAttributeExpiration,
    "/idreg.attribute.v1.MsgUpdateAttributeExpiration",
    |m| m.owner
);
typed_msg!(MsgDeleteAttribute, DeleteAttribute, "/idreg.attribute.v1.MsgDeleteAttribute", |m| m.owner);
typed_msg!(
    MsgDeleteDistinctAttribute,
    DeleteDistinctAttribute,
    "/idreg.attribute.v1.MsgDeleteDistinctAttribute",
    |m| m.owner
);
typed_msg!(MsgSetAccountData, SetAccountData, "/idreg.attribute.v1.MsgSetAccountData", |m| m.account);
typed_msg!(
    MsgUpdateAttributeParams,
    UpdateAttributeParams,
    "/idreg.attribute.v1.MsgUpdateParams",
    |m| m.authority
);

impl Msg {
    pub fn type_url(&self) -> &'static str {
        match self {
            Msg::BindName(_) => MsgBindName::TYPE_URL,
            Msg::DeleteName(_) => MsgDeleteName::TYPE_URL,
            Msg::ModifyName(_) => MsgModifyName::TYPE_URL,
            Msg::CreateRootName(_) => MsgCreateRootName::TYPE_URL,
            Msg::UpdateNameParams(_) => MsgUpdateNameParams::TYPE_URL,
            Msg::AddAttribute(_) => MsgAddAttribute::TYPE_URL,
            Msg::UpdateAttribute(_) => MsgUpdateAttribute::TYPE_URL,
            Msg::UpdateAttributeExpiration(_) => MsgUpdateAttributeExpiration::TYPE_URL,
            Msg::DeleteAttribute(_) => MsgDeleteAttribute::TYPE_URL,
            Msg::DeleteDistinctAttribute(_) => MsgDeleteDistinctAttribute::TYPE_URL,
            Msg::SetAccountData(_) => MsgSetAccountData::TYPE_URL,
            Msg::UpdateAttributeParams(_) => MsgUpdateAttributeParams::TYPE_URL,
        }
    }

    /// The address that authorized this message.
    pub fn signer(&self) -> Address {
        match self {
            Msg::BindName(m) => m.signer(),
            Msg::DeleteName(m) => m.signer(),
            Msg::ModifyName(m) => m.signer(),
            Msg::CreateRootName(m) => m.signer(),
            Msg::UpdateNameParams(m) => m.signer(),
            Msg::AddAttribute(m) => m.signer(),
            Msg::UpdateAttribute(m) => m.signer(),
            Msg::UpdateAttributeExpiration(m) => m.signer(),
            Msg::DeleteAttribute(m) => m.signer(),
            Msg::DeleteDistinctAttribute(m) => m.signer(),
            Msg::SetAccountData(m) => m.signer(),
            Msg::UpdateAttributeParams(m) => m.signer(),
        }
    }

    pub fn to_any(&self) -> std::result::Result<AnyMsg, serde_json::Error> {
        let value = match self {
            Msg::BindName(m) => serde_json::to_value(m),
            Msg::DeleteName(m) => serde_json::to_value(m),
            Msg::ModifyName(m) => serde_json::to_value(m),
            Msg::CreateRootName(m) => serde_json::to_value(m),
            Msg::UpdateNameParams(m) => serde_json::to_value(m),
            Msg::AddAttribute(m) => serde_json::to_value(m),
            Msg::UpdateAttribute(m) => serde_json::to_value(m),
            Msg::UpdateAttributeExpiration(m) => serde_json::to_value(m),
            Msg::DeleteAttribute(m) => serde_json::to_value(m),
            Msg::DeleteDistinctAttribute(m) => serde_json::to_value(m),
            Msg::SetAccountData(m) => serde_json::to_value(m),
            Msg::UpdateAttributeParams(m) => serde_json::to_value(m),
        }?;
        Ok(AnyMsg {
            type_url: self.type_url().to_string(),
            value,
        })
    }
}

/// Encoded message as carried by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyMsg {
    pub type_url: String,
    pub value: serde_json::Value,
}

/// Ordered list of messages applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    pub messages: Vec<AnyMsg>,
}

impl Tx {
    pub fn new(msgs: &[Msg]) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            messages: msgs.iter().map(Msg::to_any).collect::<std::result::Result<_, _>>()?,
        })
    }
}

type Decoder = fn(serde_json::Value) -> std::result::Result<Msg, serde_json::Error>;

fn decode<M: TypedMsg>(value: serde_json::Value) -> std::result::Result<Msg, serde_json::Error> {
    serde_json::from_value::<M>(value).map(Into::into)
}

fn entry<M: TypedMsg>() -> (&'static str, Decoder) {
    (M::TYPE_URL, decode::<M> as Decoder)
}

/// Type URL to decoder table. Built once, read-only afterwards.
pub struct MsgRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

static REGISTRY: Lazy<MsgRegistry> = Lazy::new(|| {
    MsgRegistry::from_entries(&[
        entry::<MsgBindName>(),
        entry::<MsgDeleteName>(),
        entry::<MsgModifyName>(),
        entry::<MsgCreateRootName>(),
        entry::<MsgUpdateNameParams>(),
        entry::<MsgAddAttribute>(),
        entry::<MsgUpdateAttribute>(),
        entry::<MsgUpdateAttributeExpiration>(),
        entry::<MsgDeleteAttribute>(),
        entry::<MsgDeleteDistinctAttribute>(),
        entry::<MsgSetAccountData>(),
        entry::<MsgUpdateAttributeParams>(),
    ])
    .unwrap_or_else(|url| panic!("message type {url:?} registered twice"))
});

impl MsgRegistry {
    /// Fails with the first duplicated type URL.
    pub fn from_entries(
        entries: &[(&'static str, Decoder)],
    ) -> std::result::Result<Self, &'static str> {
        let mut decoders = HashMap::with_capacity(entries.len());
        for (url, decoder) in entries {
            if decoders.insert(*url, *decoder).is_some() {
                return Err(*url);
            }
        }
        Ok(Self { decoders })
    }

    pub fn global() -> &'static MsgRegistry {
        &REGISTRY
    }

    pub fn type_urls(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.keys().copied()
    }

    pub fn decode(&self, any: &AnyMsg) -> Result<Msg> {
        let decoder = self
            .decoders
            .get(any.type_url.as_str())
            .ok_or_else(|| AppError::UnrecognizedMsg(any.type_url.clone()))?;
        decoder(any.value.clone()).map_err(|source| AppError::Decode {
            type_url: any.type_url.clone(),
            source,
        })
    }
}
