//! Channel allocation settings.

use serde::{Deserialize, Serialize};

use crate::proto::{RelayMode, SimulcastMode};

/// Options applied to every channel created by allocation requests.
///
/// Every option defaults to "unspecified", leaving the relay's own default
/// in force: an unset option is omitted from requests, which differs
/// observably from explicitly requesting any value.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Channels {
    /// Maximum number of video streams forwarded to an endpoint.
    pub last_n: Option<u32>,

    /// Whether the relay may adapt `last_n` to network conditions.
    pub adaptive_last_n: Option<bool>,

    /// Whether the relay may enable/disable simulcast layers adaptively.
    pub adaptive_simulcast: Option<bool>,

    /// Simulcast forwarding strategy of created channels.
    pub simulcast_mode: Option<SimulcastMode>,

    /// Extra playout delay in milliseconds requested for audio packets.
    /// Applied to audio channels only.
    pub audio_packet_delay: Option<u32>,

    /// RTP-level relay behavior of created channels. Applied to audio
    /// channels only.
    pub relay_mode: Option<RelayMode>,
}

#[cfg(test)]
mod channels_conf_specs {
    use std::{env, fs};

    use serial_test::serial;

    use crate::conf::Conf;
    use crate::proto::SimulcastMode;

    #[test]
    #[serial]
    fn overrides_defaults_with_env_vars() {
        let default_conf = Conf::default();

        env::set_var("CONCLAVE_CHANNELS__LAST_N", "20");
        env::set_var("CONCLAVE_CHANNELS__SIMULCAST_MODE", "rewriting");
        let env_conf = Conf::parse().unwrap();
        env::remove_var("CONCLAVE_CHANNELS__LAST_N");
        env::remove_var("CONCLAVE_CHANNELS__SIMULCAST_MODE");

        assert_eq!(default_conf.channels.last_n, None);
        assert_eq!(env_conf.channels.last_n, Some(20));
        assert_eq!(
            env_conf.channels.simulcast_mode,
            Some(SimulcastMode::Rewriting),
        );
    }

    #[test]
    #[serial]
    fn overrides_defaults_with_conf_file() {
        let file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        fs::write(
            file.path(),
            "[channels]\nlast_n = 10\naudio_packet_delay = 60",
        )
        .unwrap();
        env::set_var("CONCLAVE_CONF", file.path());

        let conf = Conf::parse().unwrap();
        env::remove_var("CONCLAVE_CONF");

        assert_eq!(conf.channels.last_n, Some(10));
        assert_eq!(conf.channels.audio_packet_delay, Some(60));
        assert_eq!(conf.channels.relay_mode, None);
    }
}
