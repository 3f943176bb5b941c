use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::Notepad;
use crate::config::{AppConfig, ConfigLoader, StorageBackend, CONFIG_ENV, DATA_ENV};
use crate::storage::{KeyValueStore, MemoryKv, SqliteKv};

pub mod commands;

use self::commands::{ExportArgs, IdArgs, NewArgs, RenameArgs, ShowArgs, TransformArgs, WriteArgs};

#[derive(Parser, Debug)]
#[command(
    name = "notepad",
    version,
    about = "Multi-note scratchpad with text utilities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTEPAD_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over NOTEPAD_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes in tab order, marking the active one (default)
    List,
    /// Create a note and make it active
    New(NewArgs),
    /// Make a note active
    Select(IdArgs),
    /// Rename a note (blank titles are ignored)
    Rename(RenameArgs),
    /// Delete a note
    Delete(IdArgs),
    /// Print a note's content
    Show(ShowArgs),
    /// Replace the active note's content
    Write(WriteArgs),
    /// Run a text utility over the active note
    Transform(TransformArgs),
    /// Word, character and line counts for the active note
    Stats,
    /// Export the active note to a file
    Export(ExportArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let loader = ConfigLoader::discover()?;
    let config = loader.load_or_init()?;
    let backend = open_backend(&config)?;

    let mut notepad = Notepad::open(backend, &config);
    let command = cli.command.unwrap_or(Commands::List);
    let result = execute(&mut notepad, &config, command);
    let closing = notepad.close();
    if let Some(err) = closing.warning {
        tracing::error!(%err, "failed to persist notes on exit");
    }
    let output = result?;
    print!("{output}");
    Ok(())
}

fn execute<K: KeyValueStore>(
    notepad: &mut Notepad<K>,
    config: &AppConfig,
    command: Commands,
) -> Result<String> {
    match command {
        Commands::List => Ok(commands::list_notes(notepad)),
        Commands::New(args) => Ok(commands::new_note(notepad, args)),
        Commands::Select(args) => commands::select_note(notepad, args),
        Commands::Rename(args) => commands::rename_note(notepad, args),
        Commands::Delete(args) => commands::delete_note(notepad, args),
        Commands::Show(args) => commands::show_note(notepad, args),
        Commands::Write(args) => commands::write_note(notepad, args),
        Commands::Transform(args) => Ok(commands::transform_note(notepad, args)),
        Commands::Stats => Ok(commands::note_stats(notepad)),
        Commands::Export(args) => commands::export_note(notepad, config, args),
    }
}

fn open_backend(config: &AppConfig) -> Result<Box<dyn KeyValueStore>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let kv = SqliteKv::open(&config.storage).context("opening note storage")?;
            Ok(Box::new(kv))
        }
        StorageBackend::Memory => {
            tracing::warn!("memory backend selected, notes will not outlive this process");
            Ok(Box::new(MemoryKv::new()))
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
