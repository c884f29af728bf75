use serde::Deserialize;
use thiserror::Error;

use crate::nal::FramingMode;
use crate::queue::DEFAULT_CAPACITY;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimtrackConfigInput {
    pub version: u32,
    pub sender: SenderConfigInput,
    pub receiver: ReceiverConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SenderConfigInput {
    pub queue_capacity: Option<usize>,
    pub record_interval: Option<u32>,
    pub objects: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReceiverConfigInput {
    pub framing: Option<String>,
    pub watchdog_buffers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Tracking record queue capacity.
    pub queue_capacity: usize,
    /// One inference result per this many access units.
    pub record_interval: u32,
    /// Object count stamped into synthetic records.
    pub objects: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            record_interval: 1,
            objects: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverConfig {
    pub framing: FramingMode,
    /// Warn after this many consecutive buffers without a record; 0 disables.
    pub watchdog_buffers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimtrackConfig {
    pub version: u32,
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
}

impl Default for SimtrackConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sender: SenderConfig::default(),
            receiver: ReceiverConfig::default(),
        }
    }
}

impl SimtrackConfigInput {
    pub fn resolve(self) -> Result<SimtrackConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let defaults = SenderConfig::default();
        let queue_capacity = self.sender.queue_capacity.unwrap_or(defaults.queue_capacity);
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sender.queue_capacity",
                reason: "must be at least 1".into(),
            });
        }
        let record_interval = self
            .sender
            .record_interval
            .unwrap_or(defaults.record_interval);
        if record_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sender.record_interval",
                reason: "must be at least 1".into(),
            });
        }
        let sender = SenderConfig {
            queue_capacity,
            record_interval,
            objects: self.sender.objects.unwrap_or(defaults.objects),
        };

        let framing = match self.receiver.framing.as_deref().map(str::trim) {
            None | Some("") => FramingMode::Auto,
            Some(s) => s.parse().map_err(|reason| ConfigError::InvalidValue {
                field: "receiver.framing",
                reason,
            })?,
        };
        let receiver = ReceiverConfig {
            framing,
            watchdog_buffers: self.receiver.watchdog_buffers.unwrap_or(0),
        };

        Ok(SimtrackConfig {
            version,
            sender,
            receiver,
        })
    }
}

impl SimtrackConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(SimtrackConfig::default());
        }
        let parsed: SimtrackConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }
}
