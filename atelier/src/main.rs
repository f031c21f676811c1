//! Run and artifact lifecycle CLI.
//!
//! Scaffolds `.atelier/` (config plus an empty store), inspects the skill
//! catalog, checks sandbox paths, and prints artifact version chains from the
//! configured store.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use atelier::Error;
use atelier::core::sandbox::{self, Zone};
use atelier::core::types::ArtifactId;
use atelier::exit_codes;
use atelier::io::config::{AtelierConfig, load_config, write_config};
use atelier::io::sqlite_store::{SqliteStore, init_store_file};
use atelier::lifecycle::Coordinator;

const CONFIG_PATH: &str = ".atelier/config.toml";

#[derive(Parser)]
#[command(name = "atelier", version, about = "Run and artifact lifecycle engine")]
struct Cli {
    /// Project root holding `.atelier/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to `<root>/.atelier/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and an empty store if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the skill catalog as JSON.
    Skills,
    /// Exit 0 if the path is confined to the zone, 4 otherwise.
    CheckPath {
        #[arg(long, value_enum)]
        zone: ZoneArg,
        path: String,
    },
    /// Print an artifact's previous and next versions as JSON.
    Chain { artifact_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ZoneArg {
    Raw,
    Out,
}

impl From<ZoneArg> for Zone {
    fn from(zone: ZoneArg) -> Self {
        match zone {
            ZoneArg::Raw => Zone::Raw,
            ZoneArg::Out => Zone::Out,
        }
    }
}

fn main() {
    atelier::logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_code_for(&err));
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_PATH));
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, &config_path, force),
        Command::Skills => cmd_skills(&config_path),
        Command::CheckPath { zone, path } => Ok(cmd_check_path(zone.into(), &path)),
        Command::Chain { artifact_id } => cmd_chain(&cli.root, &config_path, artifact_id),
    }
}

fn cmd_init(root: &Path, config_path: &Path, force: bool) -> Result<i32> {
    let cfg = if force || !config_path.exists() {
        let cfg = AtelierConfig::default();
        write_config(config_path, &cfg)
            .with_context(|| format!("write {}", config_path.display()))?;
        cfg
    } else {
        load_config(config_path)?
    };
    let data_file = cfg.data_file_under(root);
    init_store_file(&data_file, force)
        .with_context(|| format!("initialize store {}", data_file.display()))?;
    println!("{}", data_file.display());
    Ok(exit_codes::OK)
}

fn cmd_skills(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let skills: Vec<_> = cfg.catalog()?.iter().cloned().collect();
    print_json(&skills)?;
    Ok(exit_codes::OK)
}

fn cmd_check_path(zone: Zone, path: &str) -> i32 {
    if sandbox::validate(path, zone) {
        println!("ok");
        exit_codes::OK
    } else {
        eprintln!("path '{path}' is not confined to the {zone}/ zone");
        exit_codes::INVALID_PATH
    }
}

fn cmd_chain(root: &Path, config_path: &Path, artifact_id: u64) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let store = SqliteStore::open(cfg.data_file_under(root))?;
    let coordinator = Coordinator::from_config(store, &cfg)?;
    let chain = coordinator.get_version_chain(ArtifactId(artifact_id))?;
    print_json(&chain)?;
    Ok(exit_codes::OK)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::NotFound { .. } | Error::SkillNotFound(_)) => exit_codes::NOT_FOUND,
        Some(Error::DataIntegrity(_)) => exit_codes::DATA_INTEGRITY,
        Some(Error::InvalidPath { .. } | Error::OutsideSandbox { .. }) => exit_codes::INVALID_PATH,
        _ => exit_codes::INVALID,
    }
}
