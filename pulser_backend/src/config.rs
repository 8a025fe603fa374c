//! Instrument configuration.
//!
//! The defaults describe a four-card, sixteen-channel generator with 64k of output memory
//! per channel. A host can override any field from JSON:
//!
//! ```
//! use pulser_backend::config::EngineConfig;
//!
//! let cfg = EngineConfig::from_json(r#"{ "memory_size": 1024, "keep_all_pulses": true }"#).unwrap();
//! assert_eq!(cfg.memory_size, 1024);
//! assert_eq!(cfg.num_channels, 16);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PulserError, Result};
use crate::timebase::Ticks;

/// Channels are grouped per output card, four to a card (`A1`..`A4`, `B1`..).
pub const CHANNELS_PER_CARD: usize = 4;

/// Highest channel count that still has a letter per card.
pub const MAX_CHANNELS: usize = 26 * CHANNELS_PER_CARD;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest timebase the instrument accepts, in seconds.
    pub min_timebase: f64,
    /// Largest timebase the instrument accepts, in seconds.
    pub max_timebase: f64,
    /// Output memory per channel, in ticks. This is the capacity during test runs.
    pub memory_size: Ticks,
    /// Number of pulse channels, not counting the trigger-out channel.
    pub num_channels: usize,
    /// Initial value of the "keep all pulses" flag.
    pub keep_all_pulses: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_timebase: 1.6e-9,
            max_timebase: 2.0e-5,
            memory_size: 65536,
            num_channels: 16,
            keep_all_pulses: false,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_timebase > 0.0 && self.min_timebase <= self.max_timebase) {
            return Err(PulserError::Config(format!(
                "timebase range [{}, {}] s is empty or not positive",
                self.min_timebase, self.max_timebase
            )));
        }
        if self.memory_size <= 0 {
            return Err(PulserError::Config(format!(
                "memory size must be positive, got {}",
                self.memory_size
            )));
        }
        if self.num_channels == 0 || self.num_channels > MAX_CHANNELS {
            return Err(PulserError::Config(format!(
                "number of channels must be within 1..={}, got {}",
                MAX_CHANNELS, self.num_channels
            )));
        }
        Ok(())
    }
}
