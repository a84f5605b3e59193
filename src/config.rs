// Persistent user settings. What is on disk (`StoredConfig`) may be
// partial; `Config` is only built through `Config::from_stored`, which
// checks every required field once so the rest of the crate can rely on it.

use crate::naming::normalize_prefix;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_NAME_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 64;

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "UCLIP_CONFIG";

/// Settings exactly as persisted. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub key_id: Option<String>,
    pub application_key: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub base_url: Option<String>,
    pub name_length: Option<usize>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("base URL `{0}` is not a valid http(s) URL")]
    InvalidBaseUrl(String),
    #[error("name length must be between 1 and {max}, got {0}", max = MAX_NAME_LENGTH)]
    InvalidNameLength(usize),
}

/// Validated settings for one run.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub key_id: String,
    pub application_key: String,
    pub bucket: String,
    /// Empty for the bucket root, otherwise ends with `/`.
    pub prefix: String,
    pub base_url: String,
    pub name_length: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("key_id", &self.key_id)
            .field("application_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("base_url", &self.base_url)
            .field("name_length", &self.name_length)
            .finish()
    }
}

impl Config {
    pub fn from_stored(stored: StoredConfig) -> std::result::Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let key_id = required(stored.key_id, "key_id", &mut missing);
        let application_key = required(stored.application_key, "application_key", &mut missing);
        let bucket = required(stored.bucket, "bucket", &mut missing);
        let base_url = required(stored.base_url, "base_url", &mut missing);
        if stored.name_length.is_none() {
            missing.push("name_length");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        match Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(base_url)),
        }

        let name_length = stored.name_length.unwrap_or(DEFAULT_NAME_LENGTH);
        if name_length == 0 || name_length > MAX_NAME_LENGTH {
            return Err(ConfigError::InvalidNameLength(name_length));
        }

        Ok(Config {
            key_id,
            application_key,
            bucket,
            prefix: normalize_prefix(stored.prefix.as_deref().unwrap_or_default()),
            base_url,
            name_length,
        })
    }

    pub fn to_stored(&self) -> StoredConfig {
        StoredConfig {
            key_id: Some(self.key_id.clone()),
            application_key: Some(self.application_key.clone()),
            bucket: Some(self.bucket.clone()),
            prefix: Some(self.prefix.clone()),
            base_url: Some(self.base_url.clone()),
            name_length: Some(self.name_length),
        }
    }
}

fn required(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

/// Location of the persisted settings. The content is base64-encoded JSON
/// so the secret is not sitting in the file as plain text at a glance.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/uclip/config`, falling back to the home directory and
    /// then the working directory.
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join("uclip").join("config"))
    }

    /// Use `path` when given, else the default location.
    pub fn locate(path: Option<PathBuf>) -> Self {
        path.map(Self::new).unwrap_or_else(Self::default_location)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<StoredConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let encoded = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config file {}", self.path.display()))?;
        if encoded.trim().is_empty() {
            return Ok(None);
        }
        let raw = STANDARD
            .decode(encoded.trim())
            .context("Config file is not valid base64")?;
        let stored = serde_json::from_slice(&raw).context("Config file is not valid JSON")?;
        Ok(Some(stored))
    }

    /// Load and validate, with messages pointing the user at `--config`.
    pub fn load_config(&self) -> Result<Config> {
        let stored = self
            .load()?
            .with_context(|| "Config not found. Please run `uclip --config`.".to_string())?;
        Config::from_stored(stored).context("Config not valid. Please run `uclip --config`.")
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec(&config.to_stored()).context("Serializing config")?;
        let encoded = STANDARD.encode(json);

        let mut file = open_private(&self.path)
            .with_context(|| format!("Failed to write config file {}", self.path.display()))?;
        file.write_all(encoded.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}
