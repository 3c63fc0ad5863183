//! Schema version tracking and the ordered migration list.
//!
//! The `upgrade` key space holds the schema version (`0x01`, u64 BE) and a
//! per-migration resume cursor (`0x02 || name`). A step migrates at most
//! `batch_limit` records per invocation and reports whether it is finished;
//! the version only advances once a step reports [`StepStatus::Done`].

use crate::errors::{MigrationError, Result};
use crate::{v2_attribute_keys, v3_name_index, UPGRADE_STORE_KEY};
use idreg_attribute::keys::LEGACY_ATTRIBUTE_KEY_PREFIX;
use idreg_attribute::STORE_KEY as ATTRIBUTE_STORE_KEY;
use idreg_storage::{Context, KvStore, PrefixStore};
use idreg_types::TypedEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Version of state written before addresses were widened to 32 bytes.
pub const LEGACY_SCHEMA_VERSION: u64 = 1;
/// Version produced by the last registered migration.
pub const LATEST_SCHEMA_VERSION: u64 = 3;

const VERSION_KEY: &[u8] = &[0x01];
const CURSOR_KEY_PREFIX: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Partial,
}

/// Result of one invocation of a migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    pub status: StepStatus,
    /// Records rewritten or removed by this invocation.
    pub migrated: usize,
}

impl StepProgress {
    pub fn done(migrated: usize) -> Self {
        Self {
            status: StepStatus::Done,
            migrated,
        }
    }

    pub fn partial(migrated: usize) -> Self {
        Self {
            status: StepStatus::Partial,
            migrated,
        }
    }
}

/// A step gets the context, its resume cursor store and the batch limit.
pub type StepFn = fn(&Context, &Cursor, usize) -> Result<StepProgress>;

#[derive(Clone)]
pub struct Migration {
    pub from: u64,
    pub to: u64,
    pub name: &'static str,
    pub step: StepFn,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} -> {})", self.name, self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing to do.
    UpToDate { version: u64 },
    /// A step ran but has more records left.
    InProgress {
        name: &'static str,
        version: u64,
        migrated: usize,
    },
    /// A step finished and the stored version moved forward.
    Applied {
        name: &'static str,
        from: u64,
        to: u64,
        migrated: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMigrationApplied {
    pub name: String,
    pub from: u64,
    pub to: u64,
}

impl TypedEvent for EventMigrationApplied {
    const TYPE_NAME: &'static str = "idreg.upgrade.v1.EventMigrationApplied";
}

/// Resume position of one migration, kept in the upgrade key space.
pub struct Cursor {
    store: PrefixStore,
    key: Vec<u8>,
}

impl Cursor {
    fn new(store: PrefixStore, name: &str) -> Self {
        let mut key = vec![CURSOR_KEY_PREFIX];
        key.extend_from_slice(name.as_bytes());
        Self { store, key }
    }

    pub fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(&self.key)?)
    }

    pub fn save(&self, position: &[u8]) -> Result<()> {
        Ok(self.store.set(&self.key, position)?)
    }

    pub fn clear(&self) -> Result<()> {
        Ok(self.store.delete(&self.key)?)
    }
}

/// Validated, ordered list of migrations.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    migrations: Vec<Migration>,
    latest: u64,
}

impl MigrationPlan {
    /// Checks that every migration moves exactly one version forward, the
    /// list is contiguous and names are unique.
    pub fn new(migrations: Vec<Migration>) -> Result<Self> {
        let mut names = HashSet::new();
        for (i, migration) in migrations.iter().enumerate() {
            if migration.to != migration.from + 1 {
                return Err(MigrationError::InvalidPlan(format!(
                    "{migration:?} must advance exactly one version"
                )));
            }
            if !names.insert(migration.name) {
                return Err(MigrationError::InvalidPlan(format!(
                    "duplicate migration name {:?}",
                    migration.name
                )));
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &migrations[p]) {
                if prev.to != migration.from {
                    return Err(MigrationError::InvalidPlan(format!(
                        "{migration:?} does not follow {prev:?}"
                    )));
                }
            }
        }
        let latest = migrations.last().map_or(LATEST_SCHEMA_VERSION, |m| m.to);
        Ok(Self { migrations, latest })
    }

    /// The migrations shipped with this release.
    pub fn standard() -> Result<Self> {
        Self::new(vec![
            Migration {
                from: 1,
                to: 2,
                name: v2_attribute_keys::NAME,
                step: v2_attribute_keys::migrate,
            },
            Migration {
                from: 2,
                to: 3,
                name: v3_name_index::NAME,
                step: v3_name_index::migrate,
            },
        ])
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    fn store(ctx: &Context) -> PrefixStore {
        ctx.kv_store(&UPGRADE_STORE_KEY)
    }

    pub fn stored_version(ctx: &Context) -> Result<Option<u64>> {
        let Some(bytes) = Self::store(ctx).get(VERSION_KEY)? else {
            return Ok(None);
        };
        let raw: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| MigrationError::corrupt(VERSION_KEY, "schema version is not 8 bytes"))?;
        Ok(Some(u64::from_be_bytes(raw)))
    }

    pub fn set_version(ctx: &Context, version: u64) -> Result<()> {
        Self::store(ctx).set(VERSION_KEY, &version.to_be_bytes())?;
        Ok(())
    }

    /// Stored version. Without a marker, state holding legacy attribute keys
    /// is at [`LEGACY_SCHEMA_VERSION`] and anything else is at the latest.
    pub fn current_version(&self, ctx: &Context) -> Result<u64> {
        let version = match Self::stored_version(ctx)? {
            Some(version) => version,
            None if has_legacy_attributes(ctx)? => LEGACY_SCHEMA_VERSION,
            None => self.latest,
        };
        if version > self.latest {
            return Err(MigrationError::VersionAhead {
                stored: version,
                latest: self.latest,
            });
        }
        Ok(version)
    }

    pub fn is_pending(&self, ctx: &Context) -> Result<bool> {
        Ok(self.current_version(ctx)? < self.latest)
    }

    /// Run one invocation of the migration for the current version. Writes
    /// only land in `ctx` when the invocation succeeds.
    pub fn run_pending(&self, ctx: &Context, batch_limit: usize) -> Result<MigrationOutcome> {
        let version = self.current_version(ctx)?;
        if version == self.latest {
            return Ok(MigrationOutcome::UpToDate { version });
        }
        let migration = self
            .migrations
            .iter()
            .find(|m| m.from == version)
            .ok_or(MigrationError::NoPath(version))?;

        ctx.run_atomic(|branch| {
            let cursor = Cursor::new(Self::store(branch), migration.name);
            let progress = (migration.step)(branch, &cursor, batch_limit.max(1))?;
            match progress.status {
                StepStatus::Partial => {
                    debug!(
                        migration = migration.name,
                        migrated = progress.migrated,
                        "migration batch complete"
                    );
                    Ok(MigrationOutcome::InProgress {
                        name: migration.name,
                        version,
                        migrated: progress.migrated,
                    })
                }
                StepStatus::Done => {
                    cursor.clear()?;
                    Self::set_version(branch, migration.to)?;
                    branch.emit(&EventMigrationApplied {
                        name: migration.name.to_string(),
                        from: migration.from,
                        to: migration.to,
                    })?;
                    info!(
                        "Applied migration {} ({} -> {}), {} records in final batch",
                        migration.name, migration.from, migration.to, progress.migrated
                    );
                    Ok(MigrationOutcome::Applied {
                        name: migration.name,
                        from: migration.from,
                        to: migration.to,
                        migrated: progress.migrated,
                    })
                }
            }
        })
    }

    /// Run invocations until the latest version is reached. Used offline,
    /// where no per-block budget applies.
    pub fn run_all(&self, ctx: &Context, batch_limit: usize) -> Result<u64> {
        loop {
            if let MigrationOutcome::UpToDate { version } = self.run_pending(ctx, batch_limit)? {
                return Ok(version);
            }
        }
    }
}

fn has_legacy_attributes(ctx: &Context) -> Result<bool> {
    let store = ctx.kv_store(&ATTRIBUTE_STORE_KEY);
    Ok(!store.prefix_scan(&[LEGACY_ATTRIBUTE_KEY_PREFIX], Some(1))?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use idreg_storage::MemoryStore;
    use idreg_types::BlockHeader;
    use std::sync::Arc;

    fn noop(_: &Context, _: &Cursor, _: usize) -> Result<StepProgress> {
        Ok(StepProgress::done(0))
    }

    fn twice(_: &Context, cursor: &Cursor, _: usize) -> Result<StepProgress> {
        if cursor.load()?.is_some() {
            return Ok(StepProgress::done(1));
        }
        cursor.save(b"half")?;
        Ok(StepProgress::partial(1))
    }

    fn failing(ctx: &Context, _: &Cursor, _: usize) -> Result<StepProgress> {
        ctx.kv_store(&UPGRADE_STORE_KEY).set(b"junk", b"x")?;
        Err(MigrationError::corrupt(b"junk", "boom"))
    }

    fn m(from: u64, name: &'static str, step: StepFn) -> Migration {
        Migration {
            from,
            to: from + 1,
            name,
            step,
        }
    }

    fn ctx() -> Context {
        Context::new(Arc::new(MemoryStore::new()), BlockHeader::at_unix(1, 0))
    }

    #[test]
    fn plan_validation() {
        assert!(MigrationPlan::new(vec![m(1, "a", noop), m(2, "b", noop)]).is_ok());
        assert!(MigrationPlan::standard().is_ok());

        let gap = MigrationPlan::new(vec![m(1, "a", noop), m(3, "b", noop)]);
        assert!(matches!(gap, Err(MigrationError::InvalidPlan(_))));
        let dup = MigrationPlan::new(vec![m(1, "a", noop), m(2, "a", noop)]);
        assert!(matches!(dup, Err(MigrationError::InvalidPlan(_))));
        let jump = MigrationPlan::new(vec![Migration {
            from: 1,
            to: 3,
            name: "jump",
            step: noop,
        }]);
        assert!(matches!(jump, Err(MigrationError::InvalidPlan(_))));
    }

    #[test]
    fn fresh_state_is_latest() {
        let plan = MigrationPlan::standard().unwrap();
        let ctx = ctx();
        assert_eq!(plan.current_version(&ctx).unwrap(), LATEST_SCHEMA_VERSION);
        assert!(!plan.is_pending(&ctx).unwrap());
        assert_eq!(
            plan.run_pending(&ctx, 10).unwrap(),
            MigrationOutcome::UpToDate {
                version: LATEST_SCHEMA_VERSION
            }
        );
    }

    #[test]
    fn unmarked_legacy_state_is_detected() {
        let plan = MigrationPlan::standard().unwrap();
        let ctx = ctx();
        let key = idreg_attribute::keys::legacy_attribute_key(&[0x07; 20], "example.name", b"v");
        ctx.kv_store(&ATTRIBUTE_STORE_KEY).set(&key, b"record").unwrap();

        assert_eq!(MigrationPlan::stored_version(&ctx).unwrap(), None);
        assert_eq!(plan.current_version(&ctx).unwrap(), LEGACY_SCHEMA_VERSION);
        assert!(plan.is_pending(&ctx).unwrap());
    }

    #[test]
    fn version_advances_only_when_done() {
        let plan = MigrationPlan::new(vec![m(1, "twice", twice)]).unwrap();
        let ctx = ctx();
        MigrationPlan::set_version(&ctx, 1).unwrap();

        let first = plan.run_pending(&ctx, 10).unwrap();
        assert!(matches!(first, MigrationOutcome::InProgress { version: 1, .. }));
        assert_eq!(MigrationPlan::stored_version(&ctx).unwrap(), Some(1));

        let second = plan.run_pending(&ctx, 10).unwrap();
        assert!(matches!(second, MigrationOutcome::Applied { from: 1, to: 2, .. }));
        assert_eq!(MigrationPlan::stored_version(&ctx).unwrap(), Some(2));
        assert_eq!(ctx.events().len(), 1);
        assert!(ctx.kv_store(&UPGRADE_STORE_KEY).prefix_scan(&[CURSOR_KEY_PREFIX], None).unwrap().is_empty());
    }

    #[test]
    fn failed_step_leaves_no_writes() {
        let plan = MigrationPlan::new(vec![m(1, "failing", failing)]).unwrap();
        let ctx = ctx();
        MigrationPlan::set_version(&ctx, 1).unwrap();

        assert!(matches!(plan.run_pending(&ctx, 10), Err(MigrationError::Corrupt { .. })));
        assert_eq!(ctx.kv_store(&UPGRADE_STORE_KEY).get(b"junk").unwrap(), None);
        assert_eq!(MigrationPlan::stored_version(&ctx).unwrap(), Some(1));
    }

    #[test]
    fn newer_state_is_rejected() {
        let plan = MigrationPlan::standard().unwrap();
        let ctx = ctx();
        MigrationPlan::set_version(&ctx, LATEST_SCHEMA_VERSION + 1).unwrap();
        assert!(matches!(
            plan.run_pending(&ctx, 10),
            Err(MigrationError::VersionAhead { .. })
        ));
    }
}
