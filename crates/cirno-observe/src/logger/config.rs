use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::object::{LoggerFormat, LoggerLevel, LoggerTimeZone};

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` expression, e.g. `"info"` or `"cirno_core=debug,info"`.
    pub level: LoggerLevel,
    /// Timezone of the timestamps in text and json output.
    pub tz: LoggerTimeZone,
    /// Print the module path of each event.
    pub with_targets: bool,
    /// Colorize text output. Ignored when stderr is not a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: false,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Color only when asked for and when a human is watching.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stderr().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = LoggerConfig::default();
        assert_eq!(config.format, LoggerFormat::Text);
        assert_eq!(config.tz, LoggerTimeZone::Utc);
        assert_eq!(config.level.as_str(), "info");
        assert!(!config.with_targets);
        assert!(config.use_color);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: LoggerConfig =
            serde_json::from_str(r#"{"format": "json", "level": "cirno_core=debug,info"}"#)
                .unwrap();
        assert_eq!(config.format, LoggerFormat::Json);
        assert_eq!(config.level.as_str(), "cirno_core=debug,info");
        assert_eq!(config.tz, LoggerTimeZone::Utc);
    }

    #[test]
    fn invalid_level_is_rejected_on_load() {
        let parsed = serde_json::from_str::<LoggerConfig>(r#"{"level": "cirno=loud"}"#);
        assert!(parsed.is_err());
    }
}
