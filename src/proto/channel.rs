//! Channel and SCTP connection descriptors of a conference document.

use std::str::FromStr;

use derive_more::Display;
use failure::Fail;
use serde::{Deserialize, Serialize};

use super::{
    media::{PayloadType, RtpHdrExt, Source, SourceGroup},
    transport::Transport,
    ChannelId, EndpointId, RelayId,
};

/// Relay-managed RTP forwarding/mixing point for one endpoint within one
/// content.
///
/// A [`Channel`] without an `id` has not been allocated yet; the relay
/// assigns the id in its allocation response, after which the id is the
/// primary key for matching local intent to remote state.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Channel {
    /// Relay-assigned channel id. `None` until allocated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChannelId>,

    /// Id of the endpoint owning this channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointId>,

    /// Id of the channel bundle this channel shares transport with.
    ///
    /// A channel either references a bundle or carries its own
    /// [`Channel::transport`], never both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<EndpointId>,

    /// Seconds of inactivity before the relay garbage-collects this channel.
    /// `None` leaves the relay default untouched; `Some(0)` requests
    /// immediate teardown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<u32>,

    /// Which side initiated the media negotiation, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<bool>,

    /// Dedicated transport of this channel, when not bundled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,

    /// Media flow direction, as seen from the relay.
    #[serde(default, skip_serializing_if = "Direction::is_default")]
    pub direction: Direction,

    /// Maximum number of video streams forwarded to the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_n: Option<u32>,

    /// Whether the relay may adapt [`Channel::last_n`] to network
    /// conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_last_n: Option<bool>,

    /// Whether the relay may enable/disable simulcast layers adaptively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_simulcast: Option<bool>,

    /// Simulcast forwarding strategy for this channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulcast_mode: Option<SimulcastMode>,

    /// Extra playout delay in milliseconds requested for audio packets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_delay: Option<u32>,

    /// RTP-level relay behavior of the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_mode: Option<RelayMode>,

    /// Payload types the channel accepts, in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload_types: Vec<PayloadType>,

    /// RTP header extensions the channel understands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtp_hdr_exts: Vec<RtpHdrExt>,

    /// Sources the owning endpoint advertises on this channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// Source groups the owning endpoint advertises on this channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_groups: Vec<SourceGroup>,

    /// SSRCs the relay has observed on this channel. Relay-populated;
    /// never set by clients in requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssrcs: Vec<u32>,

    /// Ids of the peer relays this channel bridges the conference to.
    /// Non-empty only on relay-bridging channels, which have no owning
    /// endpoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relays: Vec<RelayId>,
}

impl Channel {
    /// Creates a new unallocated [`Channel`] with all attributes unset.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload type, unless an equal one is present already.
    /// Returns whether the list changed.
    pub fn add_payload_type(&mut self, payload_type: PayloadType) -> bool {
        if self.payload_types.contains(&payload_type) {
            return false;
        }
        self.payload_types.push(payload_type);
        true
    }

    /// Adds an RTP header extension mapping, unless an equal one is present
    /// already. Returns whether the list changed.
    pub fn add_rtp_hdr_ext(&mut self, ext: RtpHdrExt) -> bool {
        if self.rtp_hdr_exts.contains(&ext) {
            return false;
        }
        self.rtp_hdr_exts.push(ext);
        true
    }

    /// Adds a source, unless an equal one is present already.
    /// Returns whether the list changed.
    pub fn add_source(&mut self, source: Source) -> bool {
        if self.sources.contains(&source) {
            return false;
        }
        self.sources.push(source);
        true
    }

    /// Adds a source group.
    pub fn add_source_group(&mut self, group: SourceGroup) {
        self.source_groups.push(group);
    }

    /// Records an SSRC observed by the relay, unless known already.
    /// Returns whether the set changed.
    pub fn add_ssrc(&mut self, ssrc: u32) -> bool {
        if self.ssrcs.contains(&ssrc) {
            return false;
        }
        self.ssrcs.push(ssrc);
        true
    }

    /// Forgets an SSRC observed by the relay.
    /// Returns whether the set changed.
    pub fn remove_ssrc(&mut self, ssrc: u32) -> bool {
        let before = self.ssrcs.len();
        self.ssrcs.retain(|known| *known != ssrc);
        self.ssrcs.len() != before
    }
}

/// Relay-managed SCTP-like data channel.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SctpConnection {
    /// Relay-assigned connection id. `None` until allocated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChannelId>,

    /// Id of the endpoint owning this connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointId>,

    /// Id of the channel bundle this connection shares transport with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<EndpointId>,

    /// Seconds of inactivity before the relay garbage-collects this
    /// connection. Same semantics as [`Channel::expire`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<u32>,

    /// Which side initiated the negotiation, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<bool>,

    /// Dedicated transport of this connection, when not bundled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,

    /// SCTP port of the connection.
    #[serde(default = "SctpConnection::default_port")]
    pub port: u16,
}

impl SctpConnection {
    /// SCTP port used unless overridden.
    pub const DEFAULT_PORT: u16 = 5000;

    fn default_port() -> u16 {
        Self::DEFAULT_PORT
    }

    /// Creates a new unallocated [`SctpConnection`] on the default port.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SctpConnection {
    fn default() -> Self {
        Self {
            id: None,
            endpoint: None,
            bundle_id: None,
            expire: None,
            initiator: None,
            transport: None,
            port: Self::DEFAULT_PORT,
        }
    }
}

/// Media flow direction of a [`Channel`], as seen from the relay.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Media flows both ways.
    #[display(fmt = "sendrecv")]
    SendRecv,

    /// The relay only sends towards the endpoint.
    #[display(fmt = "sendonly")]
    SendOnly,

    /// The relay only receives from the endpoint.
    #[display(fmt = "recvonly")]
    RecvOnly,

    /// No media flows.
    #[display(fmt = "inactive")]
    Inactive,
}

impl Direction {
    fn is_default(val: &Self) -> bool {
        *val == Self::SendRecv
    }
}

impl Default for Direction {
    #[inline]
    fn default() -> Self {
        Self::SendRecv
    }
}

/// Error of parsing an unknown [`Direction`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown media direction: {}", _0)]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendrecv" => Ok(Self::SendRecv),
            "sendonly" => Ok(Self::SendOnly),
            "recvonly" => Ok(Self::RecvOnly),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ParseDirectionError(s.to_owned())),
        }
    }
}

/// RTP-level relay behavior of a [`Channel`] (RFC 3550, section 2.3).
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// The relay mixes received streams into one.
    #[display(fmt = "mixer")]
    Mixer,

    /// The relay forwards streams without mixing.
    #[display(fmt = "translator")]
    Translator,
}

/// Error of parsing an unknown [`RelayMode`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown RTP-level relay mode: {}", _0)]
pub struct ParseRelayModeError(pub String);

impl FromStr for RelayMode {
    type Err = ParseRelayModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mixer" => Ok(Self::Mixer),
            "translator" => Ok(Self::Translator),
            _ => Err(ParseRelayModeError(s.to_owned())),
        }
    }
}

/// Simulcast forwarding strategy of a [`Channel`].
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulcastMode {
    /// The relay rewrites one selected layer onto a single outgoing stream.
    #[display(fmt = "rewriting")]
    Rewriting,

    /// The relay switches the forwarded layer on the original streams.
    #[display(fmt = "switching")]
    Switching,
}

/// Error of parsing an unknown [`SimulcastMode`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown simulcast mode: {}", _0)]
pub struct ParseSimulcastModeError(pub String);

impl FromStr for SimulcastMode {
    type Err = ParseSimulcastModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rewriting" => Ok(Self::Rewriting),
            "switching" => Ok(Self::Switching),
            _ => Err(ParseSimulcastModeError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod channel_specs {
    use super::*;

    #[test]
    fn sources_deduplicate_by_value() {
        let mut channel = Channel::new();

        assert!(channel.add_source(Source::new(111)));
        assert!(!channel.add_source(Source::new(111)));
        assert!(channel.add_source(Source::new(222)));

        assert_eq!(channel.sources.len(), 2);
    }

    #[test]
    fn observed_ssrcs_form_a_set() {
        let mut channel = Channel::new();

        assert!(channel.add_ssrc(0xcafe));
        assert!(!channel.add_ssrc(0xcafe));
        assert!(channel.remove_ssrc(0xcafe));
        assert!(!channel.remove_ssrc(0xcafe));
    }

    #[test]
    fn relay_mode_parses_fail_closed() {
        assert_eq!("mixer".parse::<RelayMode>().ok(), Some(RelayMode::Mixer));
        assert!("forwarder".parse::<RelayMode>().is_err());
    }

    #[test]
    fn sctp_connection_defaults_its_port() {
        assert_eq!(SctpConnection::new().port, 5000);
    }

    #[test]
    fn unallocated_channel_serializes_empty() {
        let json = serde_json::to_value(&Channel::new()).unwrap();

        assert_eq!(json, serde_json::json!({}));
    }
}
