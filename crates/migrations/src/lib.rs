//! Store migrations
//!
//! Persisted layouts only change through an entry in [`MigrationPlan`]. The
//! plan is applied at the start of a block, a bounded batch at a time, and
//! the application refuses transactions until it has caught up.

pub mod engine;
pub mod errors;
pub mod legacy;
pub mod v2_attribute_keys;
pub mod v3_name_index;

pub use engine::{
    Cursor, EventMigrationApplied, Migration, MigrationOutcome, MigrationPlan, StepFn,
    StepProgress, StepStatus, LATEST_SCHEMA_VERSION, LEGACY_SCHEMA_VERSION,
};
pub use errors::*;
pub use legacy::{widen_address, write_legacy_attribute, LegacyAttribute};

use idreg_storage::StoreKey;

/// Key space holding the schema version and migration cursors.
pub const UPGRADE_STORE_KEY: StoreKey = StoreKey::new("upgrade");
