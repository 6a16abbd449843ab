//! Custom Race Armor - command line front end.
//!
//! # Overview
//!
//! Patches the armor of a load order so that custom races with their own body
//! meshes can wear it. The binary initializes:
//! - Configuration loading ([`ConfigManager`])
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime; the patch itself runs on the blocking pool
//! - Ctrl-C handling, forwarded to the pipeline as a cancellation request
//!
//! # Commands
//!
//! - `cra races --snapshot records.yaml`: list custom races found in the load order
//! - `cra patch --snapshot records.yaml [--races LizardRace,...]`: run the patch
//!
//! # Configuration Files
//!
//! Expected in the `CRA Data/` directory (override with `--config-dir`):
//! - `CRA General.yaml`: ignore list, non-wearable patterns, skin prefix
//! - `CRA User.yaml`: log level, per-release output and capacity settings
//! - `RaceSettings/<EditorID>.yaml`: body parts, genders and mesh path rules per race

use anyhow::{bail, Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use custom_race_armor::models::GameRelease;
use custom_race_armor::services::{
    build_profiles, clear_previous_outputs, discover_races, run_patch_task, GameDataProvider, ManifestWriter,
    SnapshotProvider,
};
use custom_race_armor::{
    logging, Cancellation, ConfigManager, PatchConfig, PatchStatus, Patcher, Severity, TracingSink, APP_NAME,
    VERSION,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cra")]
#[command(about = "Lets custom races wear existing armor", long_about = None)]
struct Cli {
    /// Directory holding the YAML settings
    #[arg(long, env = "CRA_CONFIG_DIR", default_value = "CRA Data")]
    config_dir: Utf8PathBuf,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List custom races (with their vampire form) found in the records
    Races {
        /// YAML record snapshot exported from the game
        #[arg(short, long)]
        snapshot: Utf8PathBuf,
    },

    /// Patch armor for the selected races
    Patch {
        /// YAML record snapshot exported from the game
        #[arg(short, long)]
        snapshot: Utf8PathBuf,

        /// Game release (defaults to the snapshot's)
        #[arg(long, value_enum)]
        release: Option<GameRelease>,

        /// Game data folder (defaults to the configured or snapshot data path)
        #[arg(long)]
        data_path: Option<Utf8PathBuf>,

        /// Where output plugins are written (defaults to the data folder)
        #[arg(short, long)]
        output_dir: Option<Utf8PathBuf>,

        /// Races to patch, by editor id (defaults to the saved selection)
        #[arg(short, long, value_delimiter = ',')]
        races: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let user_settings = config_manager.load_user_settings()?;
    let level = if cli.debug {
        Severity::Debug
    } else {
        user_settings.log_level
    };
    let _guard = logging::setup_logging(&cli.log_dir, logging::LOG_PREFIX, level, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    match cli.command {
        Commands::Races { snapshot } => list_races(&config_manager, &snapshot),
        Commands::Patch {
            snapshot,
            release,
            data_path,
            output_dir,
            races,
        } => patch(&config_manager, &user_settings, snapshot, release, data_path, output_dir, races),
    }
}

fn list_races(config_manager: &ConfigManager, snapshot: &Utf8PathBuf) -> Result<()> {
    let provider = SnapshotProvider::load(snapshot)?;
    let pairs = discover_races(&provider.races());
    if pairs.is_empty() {
        println!("No custom races found");
        return Ok(());
    }

    for pair in pairs {
        let configured = if config_manager.race_settings_exist(&pair.main.editor_id) {
            "configured"
        } else {
            "defaults"
        };
        println!(
            "{} ({}) + {} [{}]",
            pair.main.editor_id, pair.main.form_key, pair.vampire.editor_id, configured
        );
    }
    Ok(())
}

fn patch(
    config_manager: &ConfigManager,
    user_settings: &custom_race_armor::UserSettings,
    snapshot: Utf8PathBuf,
    release: Option<GameRelease>,
    data_path: Option<Utf8PathBuf>,
    output_dir: Option<Utf8PathBuf>,
    races: Vec<String>,
) -> Result<()> {
    let mut provider = SnapshotProvider::load(&snapshot)?;
    let release = release.unwrap_or_else(|| provider.release());
    let version = user_settings.for_release(release);
    if let Some(path) = data_path.or_else(|| version.custom_data_path.clone()) {
        provider = provider.with_data_path(path);
    }

    let selected = if races.is_empty() {
        version.selected_races.clone()
    } else {
        races
    };
    if selected.is_empty() {
        bail!("No races selected; pass --races or save a selection in CRA User.yaml");
    }

    let general = config_manager.load_general_settings()?;
    let selections = config_manager.load_race_selections(&selected)?;
    let profiles = build_profiles(&selections, &provider.races())?;
    let data_path = provider.data_path();
    let config = PatchConfig::from_settings(&general, &version, release, &data_path)?;

    let output_dir = output_dir.unwrap_or(data_path);
    let removed = clear_previous_outputs(&output_dir, &config.output_name)
        .with_context(|| format!("Failed to remove previous outputs from {}", output_dir))?;
    if !removed.is_empty() {
        tracing::info!("Removed {} previous output file(s)", removed.len());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("cra-worker")
        .build()?;

    let patcher = Patcher::new(config, Arc::new(ManifestWriter), Arc::new(TracingSink));
    let provider: Arc<dyn GameDataProvider> = Arc::new(provider);

    let outcome = runtime.block_on(async move {
        let (cancel_tx, cancel) = Cancellation::channel();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, stopping after the current group");
                let _ = cancel_tx.send(true);
            }
        });

        run_patch_task(patcher, provider, profiles, output_dir, cancel).await
    })?;

    for path in &outcome.missing_paths {
        println!("missing mesh: {}", path);
    }
    println!("{}", outcome.summary.summary());
    for path in &outcome.written {
        println!("wrote {}", path);
    }

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    match outcome.status {
        PatchStatus::Completed => Ok(()),
        PatchStatus::Cancelled => {
            tracing::warn!("Patch was cancelled, output is incomplete");
            Ok(())
        }
    }
}
