//! Hierarchical name registry
//!
//! Binds dot-separated names (`child.parent.root`) to owning accounts. A
//! child can only be bound below an existing parent, and below a restricted
//! parent only by its owner. Records are stored under a digest of the
//! reversed name together with an address to names reverse index.

pub mod errors;
pub mod events;
pub mod expected;
pub mod genesis;
pub mod keeper;
pub mod keys;
pub mod normalize;
pub mod types;

pub use errors::*;
pub use events::*;
pub use expected::AccountKeeper;
pub use keeper::NameKeeper;
pub use normalize::{is_valid_uuid, normalize, normalize_name, validate_segment};
pub use types::*;

use idreg_storage::StoreKey;

/// Key space of the name module.
pub const STORE_KEY: StoreKey = StoreKey::new("name");
