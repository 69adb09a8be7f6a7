//! Logging settings.

use std::{borrow::Cow, str::FromStr as _};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Logging settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Log {
    /// Maximum allowed level of log entries.
    /// Defaults to `INFO`.
    #[default("INFO")]
    pub level: Cow<'static, str>,
}

impl Log {
    /// Returns the configured logging level. `None` if disabled.
    #[must_use]
    pub fn level(&self) -> Option<slog::Level> {
        slog::Level::from_str(&self.level).ok()
    }
}

#[cfg(test)]
mod log_conf_specs {
    use std::env;

    use serial_test::serial;

    use crate::conf::Conf;

    #[test]
    #[serial]
    fn overrides_defaults() {
        let default_conf = Conf::default();

        env::set_var("CONCLAVE_LOG__LEVEL", "WARN");
        let env_conf = Conf::parse().unwrap();
        env::set_var("CONCLAVE_LOG__LEVEL", "OFF");
        let disabled_conf = Conf::parse().unwrap();
        env::remove_var("CONCLAVE_LOG__LEVEL");

        assert_ne!(default_conf.log.level(), env_conf.log.level());
        assert_eq!(env_conf.log.level(), Some(slog::Level::Warning));
        assert_eq!(disabled_conf.log.level(), None);
    }
}
