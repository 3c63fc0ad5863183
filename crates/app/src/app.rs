//! Block driver tying the registry modules to one backing store.
//!
//! A block runs as: `begin_block` (migrations, then the expiration sweep),
//! `deliver` for every transaction, `commit`. Nothing reaches the backing
//! store before `commit`.

use crate::accounts::AccountRegistry;
use crate::config::AppSettings;
use crate::errors::{AppError, Result};
use crate::msgs::{MsgRegistry, Tx};
use chrono::{DateTime, Utc};
use idreg_attribute::AttributeKeeper;
use idreg_migrations::{
    write_legacy_attribute, LegacyAttribute, MigrationOutcome, MigrationPlan,
    LEGACY_SCHEMA_VERSION,
};
use idreg_name::NameKeeper;
use idreg_storage::{Context, KvStore, StoreKey};
use idreg_types::{Address, BlockHeader, ClassifyError, ErrorKind, Event};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const APP_STORE_KEY: StoreKey = StoreKey::new("app");

const AUTHORITY_KEY: &[u8] = &[0x01];
const LAST_HEADER_KEY: &[u8] = &[0x02];

/// Initial chain state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub genesis_time: DateTime<Utc>,
    pub authority: Address,
    #[serde(default)]
    pub accounts: Vec<Address>,
    #[serde(default)]
    pub name: idreg_name::GenesisState,
    #[serde(default)]
    pub attribute: idreg_attribute::GenesisState,
    /// Records in the pre-migration layout. When present the chain starts at
    /// the legacy schema version and upgrades over the first blocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_attributes: Vec<LegacyAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(default)]
    pub txs: Vec<Tx>,
}

/// Outcome of one transaction. A failed transaction contributes no events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxResult {
    pub events: Vec<Event>,
    pub error: Option<String>,
    pub kind: Option<ErrorKind>,
}

impl TxResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockResult {
    pub height: u64,
    /// Events from `begin_block` (migrations and the sweep).
    pub begin_events: Vec<Event>,
    pub txs: Vec<TxResult>,
}

pub struct App {
    store: Arc<dyn KvStore>,
    pub(crate) names: Arc<NameKeeper>,
    pub(crate) attributes: AttributeKeeper,
    accounts: Arc<AccountRegistry>,
    migrations: MigrationPlan,
    settings: AppSettings,
}

impl App {
    pub fn new(store: Arc<dyn KvStore>, settings: AppSettings, authority: Address) -> Result<Self> {
        let accounts = Arc::new(AccountRegistry::new());
        let names = Arc::new(
            NameKeeper::new(authority, accounts.clone())
                .with_max_scan_entries(settings.max_scan_entries),
        );
        let attributes = AttributeKeeper::new(authority, names.clone(), accounts.clone())
            .with_max_scan_entries(settings.max_scan_entries);
        Ok(Self {
            store,
            names,
            attributes,
            accounts,
            migrations: MigrationPlan::standard()?,
            settings,
        })
    }

    /// Reopen an initialized store with the authority recorded at genesis.
    pub fn open(store: Arc<dyn KvStore>, settings: AppSettings) -> Result<Self> {
        let authority = Self::stored_authority(store.clone())?.ok_or(AppError::Uninitialized)?;
        Self::new(store, settings, authority)
    }

    pub fn stored_authority(store: Arc<dyn KvStore>) -> Result<Option<Address>> {
        let ctx = Context::new(store, BlockHeader::default());
        match ctx.kv_store(&APP_STORE_KEY).get(AUTHORITY_KEY)? {
            Some(bytes) => Ok(Some(Address::from_slice(&bytes).map_err(anyhow::Error::from)?)),
            None => Ok(None),
        }
    }

    /// Header of the last committed block, if any.
    pub fn last_header(&self) -> Result<Option<BlockHeader>> {
        let ctx = Context::new(self.store.clone(), BlockHeader::default());
        match ctx.kv_store(&APP_STORE_KEY).get(LAST_HEADER_KEY)? {
            Some(bytes) => Ok(Some(decode_header(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn names(&self) -> &NameKeeper {
        &self.names
    }

    pub fn attributes(&self) -> &AttributeKeeper {
        &self.attributes
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn migrations(&self) -> &MigrationPlan {
        &self.migrations
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Read-only view at the last committed block. Writes made through it
    /// are never committed.
    pub fn query_context(&self) -> Result<Context> {
        let header = self.last_header()?.unwrap_or_default();
        Ok(Context::new(self.store.clone(), header))
    }

    // ---------------------------------------------------------------------
    // Genesis
    // ---------------------------------------------------------------------

    pub fn init_genesis(&self, doc: &GenesisDoc) -> Result<Vec<Event>> {
        if Self::stored_authority(self.store.clone())?.is_some() {
            return Err(AppError::InvalidGenesis("state is already initialized".into()));
        }
        if doc.authority != *self.names.authority() {
            return Err(AppError::InvalidGenesis(format!(
                "genesis authority {} does not match {}",
                doc.authority,
                self.names.authority()
            )));
        }
        if doc.authority.is_empty() {
            return Err(AppError::InvalidGenesis("authority must be set".into()));
        }

        let header = BlockHeader::new(0, doc.genesis_time);
        let ctx = Context::new(self.store.clone(), header);
        let app_store = ctx.kv_store(&APP_STORE_KEY);
        app_store.set(AUTHORITY_KEY, doc.authority.as_bytes())?;
        app_store.set(LAST_HEADER_KEY, &encode_header(&header)?)?;

        for account in &doc.accounts {
            self.accounts.register(&ctx, account)?;
        }
        self.names.init_genesis(&ctx, &doc.name)?;
        self.attributes.init_genesis(&ctx, &doc.attribute)?;

        let version = if doc.legacy_attributes.is_empty() {
            self.migrations.latest()
        } else {
            let store = ctx.kv_store(&idreg_attribute::STORE_KEY);
            for legacy in &doc.legacy_attributes {
                write_legacy_attribute(&store, legacy)?;
            }
            LEGACY_SCHEMA_VERSION
        };
        MigrationPlan::set_version(&ctx, version)?;

        info!(
            accounts = doc.accounts.len(),
            names = doc.name.bindings.len(),
            attributes = doc.attribute.attributes.len(),
            legacy = doc.legacy_attributes.len(),
            schema_version = version,
            "Initialized genesis state"
        );
        Ok(ctx.commit()?)
    }

    /// Current state as a genesis document. Refused while migrations are
    /// pending, as legacy records are not exportable.
    pub fn export_genesis(&self) -> Result<GenesisDoc> {
        let ctx = self.query_context()?;
        self.ensure_migrated(&ctx)?;
        Ok(GenesisDoc {
            genesis_time: ctx.block_time(),
            authority: *self.names.authority(),
            accounts: self.accounts.accounts(&ctx)?,
            name: self.names.export_genesis(&ctx)?,
            attribute: self.attributes.export_genesis(&ctx)?,
            legacy_attributes: Vec::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Block lifecycle
    // ---------------------------------------------------------------------

    pub fn begin_block(&self, header: BlockHeader) -> Result<Context> {
        if let Some(last) = self.last_header()? {
            if header.height <= last.height {
                return Err(AppError::BlockOutOfOrder {
                    last: last.height,
                    got: header.height,
                });
            }
            if header.time < last.time {
                return Err(AppError::BlockTimeRegressed {
                    last: last.time,
                    got: header.time,
                });
            }
        }
        let ctx = Context::new(self.store.clone(), header);

        match self.migrations.run_pending(&ctx, self.settings.migration_batch_limit)? {
            MigrationOutcome::UpToDate { .. } => {}
            MigrationOutcome::InProgress {
                name,
                version,
                migrated,
            } => info!(
                "Migration {} at version {} migrated {} records at height {}",
                name, version, migrated, header.height
            ),
            MigrationOutcome::Applied { name, to, .. } => {
                debug!(migration = name, version = to, height = header.height, "schema advanced")
            }
        }

        if !self.migrations.is_pending(&ctx)? {
            self.attributes
                .delete_expired_attributes(&ctx, self.settings.expired_delete_limit)?;
        }
        Ok(ctx)
    }

    /// Apply every message of `tx` or none of them. Returns the events the
    /// transaction emitted.
    pub fn deliver(&self, ctx: &Context, tx: &Tx) -> Result<Vec<Event>> {
        if tx.messages.is_empty() {
            return Err(AppError::EmptyTx);
        }
        self.ensure_migrated(ctx)?;

        let registry = MsgRegistry::global();
        let msgs = tx
            .messages
            .iter()
            .map(|any| registry.decode(any))
            .collect::<Result<Vec<_>>>()?;

        ctx.run_atomic(|branch| {
            for msg in &msgs {
                self.handle(branch, msg)?;
            }
            Ok(branch.events())
        })
    }

    /// Persist everything buffered in `ctx`.
    pub fn commit(&self, ctx: Context) -> Result<Vec<Event>> {
        ctx.kv_store(&APP_STORE_KEY)
            .set(LAST_HEADER_KEY, &encode_header(ctx.header())?)?;
        let height = ctx.block_height();
        let events = ctx.commit()?;
        debug!(height, events = events.len(), "committed block");
        Ok(events)
    }

    /// Run a whole block. Failed transactions are recorded and skipped; only
    /// a failure outside a transaction aborts the block.
    pub fn apply_block(&self, block: &Block) -> Result<BlockResult> {
        let ctx = self.begin_block(block.header)?;
        let begin_events = ctx.events();

        let mut txs = Vec::with_capacity(block.txs.len());
        for (index, tx) in block.txs.iter().enumerate() {
            match self.deliver(&ctx, tx) {
                Ok(events) => txs.push(TxResult {
                    events,
                    error: None,
                    kind: None,
                }),
                Err(err) => {
                    warn!(height = block.header.height, index, kind = ?err.kind(), "transaction failed: {err}");
                    txs.push(TxResult {
                        events: Vec::new(),
                        error: Some(err.to_string()),
                        kind: Some(err.kind()),
                    });
                }
            }
        }

        self.commit(ctx)?;
        Ok(BlockResult {
            height: block.header.height,
            begin_events,
            txs,
        })
    }

    fn ensure_migrated(&self, ctx: &Context) -> Result<()> {
        let current = self.migrations.current_version(ctx)?;
        if current < self.migrations.latest() {
            return Err(AppError::MigrationPending {
                current,
                latest: self.migrations.latest(),
            });
        }
        Ok(())
    }
}

fn encode_header(header: &BlockHeader) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(header)?)
}

fn decode_header(bytes: &[u8]) -> anyhow::Result<BlockHeader> {
    Ok(serde_json::from_slice(bytes)?)
}
