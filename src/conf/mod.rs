//! Provides library configuration options.
//!
//! Configuration options can be parsed from config files in TOML format and
//! overridden with environment variables.

pub mod channels;
pub mod log;

use std::env;

use config::{Config, Environment, File};
use failure::Error;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

pub use self::{channels::Channels, log::Log};

/// CLI argument that the config file path can be passed with.
static APP_CONF_PATH_CMD_ARG_NAME: &str = "--conf";
/// Environment variable that the config file path can be passed with.
static APP_CONF_PATH_ENV_VAR_NAME: &str = "CONCLAVE_CONF";

/// All configuration options of the library.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Conf {
    /// Channel allocation options, applied to every channel created by
    /// allocation requests.
    pub channels: Channels,

    /// Logging settings.
    pub log: Log,
}

impl Conf {
    /// Creates a new [`Conf`], applying values from the following sources
    /// (later ones override earlier ones):
    /// - default values;
    /// - a configuration file, the name of which is given as a `--conf`
    ///   command line parameter or a `CONCLAVE_CONF` environment variable;
    /// - environment variables with the `CONCLAVE_` prefix.
    pub fn parse() -> Result<Self, Error> {
        let mut cfg = Config::new();

        if let Some(path) =
            get_conf_file_name(env::var(APP_CONF_PATH_ENV_VAR_NAME), env::args())
        {
            cfg.merge(File::with_name(&path))?;
        }

        cfg.merge(Environment::with_prefix("CONCLAVE").separator("__"))?;

        Ok(cfg.try_into()?)
    }
}

/// Returns the name of the configuration file, if defined. The environment
/// variable takes precedence over the command line argument.
fn get_conf_file_name<T>(
    env_var: Result<String, env::VarError>,
    cmd_args: T,
) -> Option<String>
where
    T: IntoIterator<Item = String>,
{
    if let Ok(path) = env_var {
        return Some(path);
    }
    let mut args = cmd_args
        .into_iter()
        .skip_while(|arg| arg != APP_CONF_PATH_CMD_ARG_NAME)
        .skip(1);
    args.next()
}

#[cfg(test)]
mod conf_specs {
    use super::*;

    #[test]
    fn no_conf_file_name_by_default() {
        let name = get_conf_file_name(
            Err(env::VarError::NotPresent),
            Vec::new(),
        );

        assert_eq!(name, None);
    }

    #[test]
    fn conf_file_name_from_env_var() {
        let name = get_conf_file_name(
            Ok("env-path.toml".to_owned()),
            vec!["--conf".to_owned(), "arg-path.toml".to_owned()],
        );

        assert_eq!(name, Some("env-path.toml".to_owned()));
    }

    #[test]
    fn conf_file_name_from_cmd_arg() {
        let name = get_conf_file_name(
            Err(env::VarError::NotPresent),
            vec!["--conf".to_owned(), "arg-path.toml".to_owned()],
        );

        assert_eq!(name, Some("arg-path.toml".to_owned()));
    }
}
