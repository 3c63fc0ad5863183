use anyhow::{anyhow, Context as _, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use idreg_app::{init_logging, App, AppConfig, Block, BlockResult, GenesisDoc};
use idreg_storage::{KvStore, SledStore};
use idreg_types::Address;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod version;

use version::{git_commit_hash, IDREG_VERSION};

fn cli() -> Command {
    Command::new("idreg-node")
        .version(IDREG_VERSION)
        .about("Name registry and attribute store node")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .subcommand(
            Command::new("init")
                .about("Initialize an empty data directory from a genesis document")
                .arg(
                    Arg::new("genesis")
                        .long("genesis")
                        .value_name("FILE")
                        .required(true)
                        .help("Genesis document (JSON)"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Execute a file of blocks against the stored state")
                .arg(
                    Arg::new("blocks")
                        .long("blocks")
                        .value_name("FILE")
                        .required(true)
                        .help("JSON array of blocks"),
                )
                .arg(
                    Arg::new("genesis")
                        .long("genesis")
                        .value_name("FILE")
                        .help("Genesis document used when the data directory is empty"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Write the current state as a genesis document")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Destination file (stdout when omitted)"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the record bound to a name")
                .arg(Arg::new("name").required(true).value_name("NAME")),
        )
        .subcommand(
            Command::new("attributes")
                .about("Print the attributes of an account")
                .arg(Arg::new("account").required(true).value_name("ADDRESS"))
                .arg(
                    Arg::new("name")
                        .long("name")
                        .value_name("NAME")
                        .help("Only attributes stored under this name"),
                )
                .arg(
                    Arg::new("include-expired")
                        .long("include-expired")
                        .action(ArgAction::SetTrue)
                        .help("Also print records waiting for the expiration sweep"),
                ),
        )
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("a subcommand is required"))?;

    let config = load_config_with_overrides(sub)?;
    init_logging(&config)?;
    info!(
        "idreg-node {} ({}) using {}",
        IDREG_VERSION,
        git_commit_hash(),
        config.db_path
    );

    match name {
        "init" => {
            let genesis = read_genesis(required(sub, "genesis")?)?;
            let app = open_app(&config, Some(&genesis))?;
            info!("Initialized state with authority {}", app.names().authority());
        }
        "apply" => {
            let genesis = sub.get_one::<String>("genesis").map(read_genesis).transpose()?;
            let app = open_app(&config, genesis.as_ref())?;
            let blocks = read_blocks(required(sub, "blocks")?)?;
            let results = apply_blocks(&app, &blocks)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        "export" => {
            let app = open_app(&config, None)?;
            let doc = serde_json::to_string_pretty(&app.export_genesis()?)?;
            match sub.get_one::<String>("output") {
                Some(path) => {
                    fs::write(path, doc).with_context(|| format!("writing {path}"))?;
                    info!("Exported state to {path}");
                }
                None => println!("{doc}"),
            }
        }
        "resolve" => {
            let app = open_app(&config, None)?;
            let ctx = app.query_context()?;
            let record = app.names().resolve(&ctx, required(sub, "name")?)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        "attributes" => {
            let app = open_app(&config, None)?;
            let ctx = app.query_context()?;
            let account: Address = required(sub, "account")?.parse()?;
            let mut attributes = match sub.get_one::<String>("name") {
                Some(name) => app.attributes().get_attributes(&ctx, &account, name)?,
                None => app.attributes().get_all_attributes(&ctx, &account)?,
            };
            if !sub.get_flag("include-expired") {
                let now = ctx.block_time();
                attributes.retain(|attr| !attr.is_expired(&now));
            }
            println!("{}", serde_json::to_string_pretty(&attributes)?);
        }
        other => return Err(anyhow!("unknown subcommand {other}")),
    }
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("--{id} is required"))
}

fn load_config_with_overrides(matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &ArgMatches, config: &mut AppConfig) {
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.data_dir = data_dir.clone();
        config.db_path = format!("{data_dir}/db");
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }
}

fn read_genesis(path: impl AsRef<Path>) -> Result<GenesisDoc> {
    let path = path.as_ref();
    let raw = fs::read(path).with_context(|| format!("reading genesis {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing genesis {}", path.display()))
}

fn read_blocks(path: impl AsRef<Path>) -> Result<Vec<Block>> {
    let path = path.as_ref();
    let raw = fs::read(path).with_context(|| format!("reading blocks {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing blocks {}", path.display()))
}

/// Open the store under `config.db_path`. An empty store is initialized from
/// `genesis`; an initialized one ignores it.
fn open_app(config: &AppConfig, genesis: Option<&GenesisDoc>) -> Result<App> {
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir))?;
    let store: Arc<dyn KvStore> = Arc::new(SledStore::new(PathBuf::from(&config.db_path))?);
    let settings = config.settings();

    match App::stored_authority(store.clone())? {
        Some(authority) => {
            if let Some(doc) = genesis {
                if doc.authority != authority {
                    warn!(
                        "Ignoring genesis for authority {}, state belongs to {}",
                        doc.authority, authority
                    );
                }
            }
            Ok(App::new(store, settings, authority)?)
        }
        None => {
            let doc = genesis.ok_or_else(|| {
                anyhow!("{} holds no state, pass --genesis to initialize it", config.db_path)
            })?;
            let app = App::new(store, settings, doc.authority)?;
            app.init_genesis(doc)?;
            Ok(app)
        }
    }
}

fn apply_blocks(app: &App, blocks: &[Block]) -> Result<Vec<BlockResult>> {
    let mut results = Vec::with_capacity(blocks.len());
    for block in blocks {
        let result = app.apply_block(block)?;
        let failed = result.txs.iter().filter(|tx| !tx.is_ok()).count();
        info!(
            "Applied block {} with {} transactions ({} failed)",
            result.height,
            result.txs.len(),
            failed
        );
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use idreg_app::{Msg, MsgCreateRootName, Tx};
    use idreg_name::NameRecord;
    use idreg_types::BlockHeader;

    const AUTHORITY: Address = Address([0xaa; 32]);
    const OWNER: Address = Address([0x01; 32]);

    fn config_in(dir: &Path) -> AppConfig {
        let data_dir = dir.to_string_lossy().into_owned();
        AppConfig {
            db_path: format!("{data_dir}/db"),
            data_dir,
            ..AppConfig::default()
        }
    }

    fn genesis() -> GenesisDoc {
        GenesisDoc {
            genesis_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            authority: AUTHORITY,
            accounts: vec![AUTHORITY, OWNER],
            name: Default::default(),
            attribute: Default::default(),
            legacy_attributes: Vec::new(),
        }
    }

    #[test]
    fn cli_flags_override_config() {
        let matches = cli().get_matches_from([
            "idreg-node",
            "export",
            "--data-dir",
            "/tmp/idreg-cli",
            "--log-format",
            "json",
        ]);
        let (_, sub) = matches.subcommand().unwrap();
        let mut config = AppConfig::default();
        apply_overrides(sub, &mut config);
        assert_eq!(config.data_dir, "/tmp/idreg-cli");
        assert_eq!(config.db_path, "/tmp/idreg-cli/db");
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn empty_store_requires_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_app(&config_in(dir.path()), None).err().unwrap();
        assert!(err.to_string().contains("--genesis"), "unexpected error: {err}");
    }

    #[test]
    fn blocks_apply_on_reopened_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        drop(open_app(&config, Some(&genesis())).unwrap());

        let create: Msg = MsgCreateRootName {
            authority: AUTHORITY,
            record: NameRecord::new("pb", OWNER, true),
        }
        .into();
        let blocks = vec![Block {
            header: BlockHeader::at_unix(1, 1_700_000_005),
            txs: vec![Tx::new(&[create]).unwrap()],
        }];

        let app = open_app(&config, None).unwrap();
        let results = apply_blocks(&app, &blocks).unwrap();
        assert!(results[0].txs[0].is_ok());

        let ctx = app.query_context().unwrap();
        assert_eq!(app.names().resolve(&ctx, "pb").unwrap().address, OWNER);
    }
}
