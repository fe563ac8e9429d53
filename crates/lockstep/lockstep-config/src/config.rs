use lockstep_engine::{CommandUpdate, SchedulerConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LockstepConfig {
    /// Run length in base ticks (200 Hz).
    #[serde(default = "defaults::ticks")]
    pub ticks: u64,
    /// Sleep `pace_us` after every tick to approach wall-clock time.
    #[serde(default)]
    pub real_time: bool,
    #[serde(default = "defaults::pace_us")]
    pub pace_us: u64,
    #[serde(default = "defaults::initial_altitude")]
    pub initial_altitude: f64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub output: OutputFormat,
    /// Timed altitude changes, `[[command]]` tables in ascending tick order.
    #[serde(default, rename = "command")]
    pub commands: Vec<CommandEntry>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CommandEntry {
    pub at_tick: u64,
    pub altitude: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

mod defaults {
    pub fn ticks() -> u64 {
        20_000
    }

    pub fn pace_us() -> u64 {
        5_000 // one 200 Hz period
    }

    pub fn initial_altitude() -> f64 {
        lockstep_engine::DEFAULT_INITIAL_COMMAND
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for LockstepConfig {
    fn default() -> Self {
        Self {
            ticks: defaults::ticks(),
            real_time: false,
            pace_us: defaults::pace_us(),
            initial_altitude: defaults::initial_altitude(),
            log_level: defaults::log_level(),
            output: OutputFormat::default(),
            commands: Vec::new(),
        }
    }
}

impl LockstepConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: LockstepConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.real_time && self.pace_us == 0 {
            return Err(ConfigError::Invalid(
                "real_time needs a non-zero pace_us".into(),
            ));
        }
        for pair in self.commands.windows(2) {
            if pair[1].at_tick <= pair[0].at_tick {
                return Err(ConfigError::Invalid(format!(
                    "command at tick {} must come after tick {}",
                    pair[1].at_tick, pair[0].at_tick
                )));
            }
        }
        if let Some(late) = self.commands.iter().find(|c| c.at_tick >= self.ticks) {
            return Err(ConfigError::Invalid(format!(
                "command at tick {} is past the run length {}",
                late.at_tick, self.ticks
            )));
        }
        Ok(())
    }

    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            pace: self
                .real_time
                .then(|| Duration::from_micros(self.pace_us)),
            initial_command: self.initial_altitude,
            command_schedule: self
                .commands
                .iter()
                .map(|c| CommandUpdate {
                    at_tick: c.at_tick,
                    value: c.altitude,
                })
                .collect(),
        }
    }
}
