//! Store configuration loaded from TOML.
//!
//! ```toml
//! path = ".dataspace/rows.jsonl"
//! default_lifetime_secs = 1800
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DataSpaceError, Result};
use crate::header::{DEFAULT_DATA_LIFETIME_SECS, Header, HeaderBuilder};
use crate::jsonl::JsonlDataSpace;

pub const DEFAULT_STORE_PATH: &str = ".dataspace/rows.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_lifetime_secs")]
    pub default_lifetime_secs: i64,
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_lifetime_secs() -> i64 {
    DEFAULT_DATA_LIFETIME_SECS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            default_lifetime_secs: default_lifetime_secs(),
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DataSpaceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DataSpaceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.default_lifetime_secs <= 0 {
            return Err(DataSpaceError::Config(format!(
                "default_lifetime_secs must be positive, got {}",
                self.default_lifetime_secs
            )));
        }
        self.lifetime()?;
        Ok(())
    }

    pub fn lifetime(&self) -> Result<Duration> {
        Duration::try_seconds(self.default_lifetime_secs).ok_or_else(|| {
            DataSpaceError::Config(format!(
                "default_lifetime_secs {} is out of range",
                self.default_lifetime_secs
            ))
        })
    }

    /// Header builder carrying this store's default lifetime.
    pub fn header_builder(&self, taskmanager_id: impl Into<String>) -> Result<HeaderBuilder> {
        Ok(Header::builder(taskmanager_id).lifetime(self.lifetime()?))
    }

    pub fn open_dataspace(&self) -> Result<JsonlDataSpace> {
        Ok(JsonlDataSpace::open(&self.path)?)
    }
}
