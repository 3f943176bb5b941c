use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::export::ExportFormat;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Notepad";
const APP_NAME: &str = "notepad";

pub const CONFIG_ENV: &str = "NOTEPAD_CONFIG";
pub const DATA_ENV: &str = "NOTEPAD_DATA";

const CONFIG_FILE: &str = "config.toml";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Loads the config file, writing one with defaults on first run.
    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        let file = &self.paths.config_file;
        if file.exists() {
            return self.load();
        }
        let mut cfg = AppConfig::default();
        let rendered = toml::to_string_pretty(&cfg).context("rendering default notepad config")?;
        fs::write(file, rendered)
            .with_context(|| format!("writing default notepad config {}", file.display()))?;
        tracing::info!(path = %file.display(), "wrote default config");
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    pub fn load(&self) -> Result<AppConfig> {
        let file = &self.paths.config_file;
        let raw = fs::read_to_string(file)
            .with_context(|| format!("reading notepad config {}", file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing notepad config {}", file.display()))?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub export_dir: PathBuf,
}

impl ConfigPaths {
    /// Resolves XDG locations, honouring `NOTEPAD_CONFIG` (a directory or a
    /// file path) and `NOTEPAD_DATA`.
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving notepad project directories")?;

        let (config_dir, config_file) = match env::var_os(CONFIG_ENV).map(PathBuf::from) {
            Some(path) if path.is_dir() => (path.clone(), path.join(CONFIG_FILE)),
            Some(path) => {
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (dir, path)
            }
            None => {
                let dir = dirs.config_dir().to_path_buf();
                let file = dir.join(CONFIG_FILE);
                (dir, file)
            }
        };
        let data_dir = env::var_os(DATA_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_dir))
    }

    /// Lays out every path below explicit config and data roots.
    pub fn rooted(config_dir: PathBuf, config_file: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("notepad.db"),
            export_dir: data_dir.join("exports"),
            config_dir,
            config_file,
            data_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub editor: EditorConfig,
    pub storage: StorageOptions,
    pub export: ExportOptions,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.storage.resolve(paths);
        self.export.resolve(paths);
        if self.storage.notes_key == self.storage.active_key {
            tracing::warn!(
                key = %self.storage.notes_key,
                "notes and active keys collide, falling back to defaults"
            );
            let defaults = StorageOptions::default();
            self.storage.notes_key = defaults.notes_key;
            self.storage.active_key = defaults.active_key;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period after the last edit before content is committed.
    pub debounce_ms: u64,
    /// How long the "Saving..." indicator stays up after a commit.
    pub saving_indicator_ms: u64,
    pub switch_policy: SwitchPolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            saving_indicator_ms: 300,
            switch_policy: SwitchPolicy::Flush,
        }
    }
}

impl EditorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn saving_indicator(&self) -> Duration {
        Duration::from_millis(self.saving_indicator_ms)
    }
}

/// What happens to buffered edits when the active note changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchPolicy {
    #[default]
    Flush,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub backend: StorageBackend,
    pub notes_key: String,
    pub active_key: String,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            backend: StorageBackend::Sqlite,
            notes_key: "onlinetext-notes".to_string(),
            active_key: "onlinetext-active-note".to_string(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub default_format: ExportFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::Txt,
            directory: None,
        }
    }
}

impl ExportOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.directory.is_none() {
            self.directory = Some(paths.export_dir.clone());
        }
    }
}
