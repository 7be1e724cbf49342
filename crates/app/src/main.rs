mod app;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use engine::{DEFAULT_APP_INFO_PATH, EngineConfig};
use log::LevelFilter;

use crate::app::App;

/// Archive de démo liée à l'exécutable.
static DEMO_ARCHIVE: &[u8] = include_bytes!("../assets/demo.zip");

#[derive(Parser, Debug)]
#[command(name = "app", about = "Loads assets through the engine's resolver")]
struct Cli {
    /// Path of the app descriptor, on disk or inside the archive
    #[arg(long, default_value = DEFAULT_APP_INFO_PATH)]
    app_info: String,

    /// Use this zip or tar archive instead of the built-in one
    #[arg(long, value_name = "FILE")]
    archive: Option<PathBuf>,

    /// Run without any archive
    #[arg(long, conflicts_with = "archive")]
    no_embed: bool,

    /// Prefer an app descriptor next to the executable over the archived one
    #[arg(long)]
    external: bool,

    /// Memory-map files instead of reading them
    #[arg(long)]
    map: bool,

    /// Log to the descriptor's log path instead of stderr
    #[arg(long)]
    log: bool,

    /// Most verbose level written to the log file (defaults to RUST_LOG, then info)
    #[arg(long, value_name = "LEVEL", requires = "log")]
    log_level: Option<LevelFilter>,

    /// Archive entries to load
    #[arg(long = "embedded", value_name = "PATH")]
    embedded: Vec<String>,

    /// Files to load from the descriptor's search paths
    assets: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.log {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let archive = match &cli.archive {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let embed = match &archive {
        Some(bytes) => Some(bytes.as_slice()),
        None if cli.no_embed => None,
        None => Some(DEMO_ARCHIVE),
    };

    let mut app = App::new(EngineConfig {
        embed,
        allow_external_app_info: cli.external,
        start_log: cli.log,
        log_level: cli.log_level,
        app_info_path: &cli.app_info,
    })?;

    app.load_embedded(&cli.embedded)?;
    app.load_files(&cli.assets, cli.map)?;
    app.summary();
    app.end();

    Ok(())
}
