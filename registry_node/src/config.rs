use anyhow::{anyhow, Context, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Registry policy constants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Window after a ping failure during which another failure counts as
    /// the same outage
    pub suspect_interval_secs: u64,
    /// A node is banned once its failure counter exceeds this
    pub max_failed_pings: u64,
    /// Replica holders recorded per file
    pub replica_slots: usize,
    /// Storage bytes bought by one token
    pub bytes_per_token: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            suspect_interval_secs: 3600,
            max_failed_pings: 5,
            replica_slots: 4,
            bytes_per_token: 128,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: RegistryConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replica_slots == 0 {
            return Err(anyhow!("replica_slots must be at least 1"));
        }
        if self.bytes_per_token == 0 {
            return Err(anyhow!("bytes_per_token must be at least 1"));
        }
        Ok(())
    }

    /// Capacity bought by `tokens`.
    ///
    /// No registry operation calls this: `addtoken` and `prepay` accept no
    /// payment yet. Callers pricing a pledge before `register` use it to
    /// stay in step with the configured rate.
    pub fn tokens_to_bytes(&self, tokens: &BigUint) -> BigUint {
        tokens * BigUint::from(self.bytes_per_token)
    }
}
