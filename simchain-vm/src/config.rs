//! Executor configuration

use crate::builtin::{ModuloShard, ShardCoordinator, SingleShard};
use crate::gas::GasSchedule;
use crate::{VmError, VmResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Compare expected gas in step checks
    pub check_gas: bool,
    /// Log gas used by every deploy and call
    pub trace_gas: bool,
    /// Number of shards addresses are spread over
    pub num_shards: u32,
    /// Shard simulated by this world
    pub self_shard: u32,
    /// Costs of the builtin functions
    pub gas_schedule: GasSchedule,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            check_gas: true,
            trace_gas: false,
            num_shards: 1,
            self_shard: 0,
            gas_schedule: GasSchedule::default(),
        }
    }
}

impl ExecutorConfig {
    /// Parse from TOML
    pub fn from_toml(toml_str: &str) -> VmResult<Self> {
        let config: ExecutorConfig = toml::from_str(toml_str)
            .map_err(|e| VmError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> VmResult<Self> {
        let config: ExecutorConfig = serde_json::from_str(json)
            .map_err(|e| VmError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file; `.json` files are read as JSON, anything
    /// else as TOML
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> VmResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| VmError::Config(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> VmResult<String> {
        toml::to_string(self)
            .map_err(|e| VmError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> VmResult<()> {
        if self.num_shards == 0 {
            return Err(VmError::Config(
                "Number of shards must be greater than 0".to_string(),
            ));
        }

        if self.self_shard >= self.num_shards {
            return Err(VmError::Config(format!(
                "Self shard {} out of range for {} shards",
                self.self_shard, self.num_shards
            )));
        }

        Ok(())
    }

    /// Shard coordinator matching the shard settings
    pub fn shard_coordinator(&self) -> Arc<dyn ShardCoordinator> {
        if self.num_shards <= 1 {
            Arc::new(SingleShard)
        } else {
            Arc::new(ModuloShard::new(self.num_shards, self.self_shard))
        }
    }
}
