pub mod config;

pub use config::{CommandEntry, ConfigError, LockstepConfig, OutputFormat};
