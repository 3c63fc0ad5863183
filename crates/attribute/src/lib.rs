//! Typed account attributes
//!
//! Attributes are `(name, value, type)` triples attached to an account. The
//! name must be bound in the name registry to whoever writes the attribute,
//! several values can coexist under one name, and an optional expiration
//! makes the record eligible for the per-block sweep.

pub mod account_data;
pub mod errors;
pub mod events;
pub mod expected;
pub mod expiration;
pub mod genesis;
pub mod index;
pub mod keeper;
pub mod keys;
pub mod query;
pub mod types;
pub mod validate;

pub use account_data::ACCOUNT_DATA_NAME;
pub use errors::*;
pub use events::*;
pub use expected::{AccountKeeper, NameResolver};
pub use expiration::DEFAULT_EXPIRED_DELETE_LIMIT;
pub use keeper::AttributeKeeper;
pub use types::*;
pub use validate::is_valid_attribute_value;

use idreg_storage::StoreKey;

/// Key space of the attribute module.
pub const STORE_KEY: StoreKey = StoreKey::new("attribute");
