//! Application layer of the idreg registry
//!
//! Decodes transaction messages, dispatches them to the name and attribute
//! keepers, and drives the block lifecycle (migrations, expiration sweep,
//! delivery, commit) over a single backing store.

pub mod accounts;
pub mod app;
pub mod config;
pub mod errors;
pub mod handler;
pub mod logging;
pub mod msgs;

pub use accounts::{AccountRegistry, ACCOUNT_STORE_KEY};
pub use app::{App, Block, BlockResult, GenesisDoc, TxResult, APP_STORE_KEY};
pub use config::{AppConfig, AppSettings};
pub use errors::{AppError, Result};
pub use logging::init_logging;
pub use msgs::*;
