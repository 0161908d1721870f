//! Directory builder settings

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Motor outputs a blackbox header can declare (`motor[0]`..`motor[7]`)
pub const MAX_MOTOR_CHANNELS: usize = 8;

/// Settings for building intraframe directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    /// Start a new chunk on every Nth intra frame
    pub chunk_interval: usize,
    /// Number of `motor[n]` fields probed for the throttle summary
    pub max_motor_channels: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            chunk_interval: 4,
            max_motor_channels: MAX_MOTOR_CHANNELS,
        }
    }
}

impl IndexConfig {
    /// Reject settings the builder cannot work with
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.chunk_interval == 0 {
            return Err(IndexError::Config(
                "chunkInterval must be at least 1".to_string(),
            ));
        }
        if self.max_motor_channels > MAX_MOTOR_CHANNELS {
            return Err(IndexError::Config(format!(
                "maxMotorChannels must be at most {}",
                MAX_MOTOR_CHANNELS
            )));
        }
        Ok(())
    }

    /// Parse settings from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
