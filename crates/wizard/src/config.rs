use std::fs;
use std::{env, path::PathBuf};

use autofill::config::EngineConfig;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use serde::Deserialize;
use tracing::warn;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
    /// Session file; relative paths live in `data_dir`.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Default locations, resolved once per process.
#[derive(Clone, Debug, PartialEq)]
struct Dirs {
    data: PathBuf,
    config: PathBuf,
}

lazy_static! {
    /// `WIZARD_DATA` / `WIZARD_CONFIG` win over the platform directories.
    static ref DIRS: Dirs = {
        let prefix = env!("CARGO_CRATE_NAME").to_uppercase();
        let var = |suffix: &str| env::var(format!("{prefix}_{suffix}")).ok().map(PathBuf::from);
        Dirs::resolve(
            var("DATA"),
            var("CONFIG"),
            ProjectDirs::from("com", "autofill", env!("CARGO_PKG_NAME")),
        )
    };
}

impl Dirs {
    fn resolve(data: Option<PathBuf>, config: Option<PathBuf>, project: Option<ProjectDirs>) -> Self {
        let data = data
            .or_else(|| project.as_ref().map(|p| p.data_local_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".data"));
        let config = config
            .or_else(|| project.as_ref().map(|p| p.config_local_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".config"));
        Self { data, config }
    }
}

impl Config {
    /// Defaults from [`DIRS`], overlaid by `config.json5` / `config.toml`
    /// in the config directory when present.
    pub fn new() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("data_dir", DIRS.data.to_string_lossy().to_string())?
            .set_default("config_dir", DIRS.config.to_string_lossy().to_string())?;

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.toml", config::FileFormat::Toml),
        ];
        for (file, format) in &config_files {
            let source = config::File::from(DIRS.config.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder.build()?.try_deserialize()
    }

    /// Create the data and config directories this configuration points at.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.config_dir] {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
                warn!(dir = %dir.display(), "created missing directory");
            }
        }
        Ok(())
    }

    /// Session file to use: `overridden`, else the configured one, else
    /// `session.json` in the data directory.
    pub fn session_path(&self, overridden: Option<PathBuf>) -> PathBuf {
        match overridden.or_else(|| self.session_file.clone()) {
            Some(path) if path.is_absolute() => path,
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join("session.json"),
        }
    }
}
