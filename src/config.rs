use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Points credited per successful vote.
pub type Reward = u64;

pub const DEFAULT_REWARD: Reward = 10;
pub const DEFAULT_MAX_TITLE_LEN: usize = 32;
pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Rules a ledger is created with. Persisted in every snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Points credited to a voter per successful vote.
    pub reward_amount: Reward,
    /// Upper bound on title length in bytes.
    pub max_title_len: usize,
    /// Upper bound on description length in bytes.
    pub max_description_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reward_amount: DEFAULT_REWARD,
            max_title_len: DEFAULT_MAX_TITLE_LEN,
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
        }
    }
}

impl LedgerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let cfg: LedgerConfig =
            serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reward_amount == 0 {
            return Err(ConfigError::Invalid("reward_amount must be > 0"));
        }
        if self.max_title_len == 0 {
            return Err(ConfigError::Invalid("max_title_len must be > 0"));
        }
        if self.max_description_len == 0 {
            return Err(ConfigError::Invalid("max_description_len must be > 0"));
        }
        Ok(())
    }
}
