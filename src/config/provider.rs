use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::config::{Config, ConfigError};

/// Source of the configuration consulted at the start of every cycle.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<Config, ConfigError>;
}

pub struct StaticConfigProvider {
    config: Config,
}

impl StaticConfigProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Re-reads the file whenever its modification time changes.
///
/// A file that stops parsing or validating keeps the last good
/// configuration in effect; the error only surfaces if nothing was ever
/// loaded.
pub struct FileConfigProvider {
    path: PathBuf,
    cache: Mutex<Option<Cached>>,
}

struct Cached {
    modified: Option<SystemTime>,
    config: Config,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<Config, ConfigError> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let modified = self.modified();

        if let Some(cached) = cache.as_ref() {
            if modified.is_some() && cached.modified == modified {
                return Ok(cached.config.clone());
            }
        }

        match Config::load(&self.path) {
            Ok(config) => {
                if cache.is_some() {
                    tracing::info!("Reloaded configuration from {}", self.path.display());
                }
                *cache = Some(Cached {
                    modified,
                    config: config.clone(),
                });
                Ok(config)
            }
            Err(e) => match cache.as_ref() {
                Some(cached) => {
                    tracing::warn!("Keeping previous configuration: {}", e);
                    Ok(cached.config.clone())
                }
                None => Err(e),
            },
        }
    }
}
