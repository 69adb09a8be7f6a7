//! RTP media descriptors: payload types, header extensions, sources and
//! source groups.

use std::{collections::BTreeMap, str::FromStr};

use derive_more::Display;
use failure::Fail;
use serde::{Deserialize, Serialize};

use super::transport::Transport;

/// Kind of media carried by a content.
///
/// Its display form is the conventional content name (`audio`, `video`,
/// `data`) used to key contents within a conference.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio RTP media.
    #[display(fmt = "audio")]
    Audio,

    /// Video RTP media.
    #[display(fmt = "video")]
    Video,

    /// SCTP application data.
    #[display(fmt = "data")]
    Data,
}

impl MediaKind {
    /// Returns the content name this [`MediaKind`] is keyed by.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Data => "data",
        }
    }
}

/// Error of parsing an unknown [`MediaKind`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown media kind: {}", _0)]
pub struct ParseMediaKindError(pub String);

impl FromStr for MediaKind {
    type Err = ParseMediaKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "data" => Ok(Self::Data),
            _ => Err(ParseMediaKindError(s.to_owned())),
        }
    }
}

/// RTP-level description of a content: the payload types and header
/// extensions negotiated with a peer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RtpDescription {
    /// Negotiated payload types, in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload_types: Vec<PayloadType>,

    /// Negotiated RTP header extension mappings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtp_hdr_exts: Vec<RtpHdrExt>,
}

/// Caller-supplied description of one content to allocate channels for:
/// which kind of media it carries, its RTP description and the peer's
/// transport.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContentDescription {
    /// Kind of media described.
    pub kind: MediaKind,

    /// RTP description of the media. `None` for [`MediaKind::Data`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp: Option<RtpDescription>,

    /// Peer's transport for this content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

impl ContentDescription {
    /// Creates a new [`ContentDescription`] of the given [`MediaKind`] with
    /// no RTP description and no transport.
    #[inline]
    #[must_use]
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            rtp: None,
            transport: None,
        }
    }
}

/// RTP payload type mapping.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PayloadType {
    /// Payload type number (0..=127).
    pub id: u8,

    /// Encoding name (e.g. `opus`, `VP8`).
    pub name: String,

    /// Clock rate in Hz.
    pub clockrate: u32,

    /// Number of audio channels. Defaults to `1`.
    #[serde(default = "PayloadType::default_channels")]
    pub channels: u8,

    /// Format-specific parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl PayloadType {
    fn default_channels() -> u8 {
        1
    }

    /// Creates a new [`PayloadType`] with the given number, encoding name
    /// and clock rate, a single channel and no parameters.
    #[must_use]
    pub fn new(id: u8, name: impl Into<String>, clockrate: u32) -> Self {
        Self {
            id,
            name: name.into(),
            clockrate,
            channels: Self::default_channels(),
            parameters: BTreeMap::new(),
        }
    }
}

/// RTP header extension mapping.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RtpHdrExt {
    /// Extension id negotiated for the session.
    pub id: u16,

    /// URI identifying the extension.
    pub uri: String,
}

/// RTP source descriptor.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Source {
    /// Synchronization source identifier. A [`Source`] without an SSRC is
    /// the "clear all sources" marker: relays interpret it as an instruction
    /// to drop every source currently set on the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,

    /// Source-level parameters (`cname`, `msid` and friends).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl Source {
    /// Creates a new [`Source`] with the given SSRC and no parameters.
    #[inline]
    #[must_use]
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc: Some(ssrc),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates the "clear all sources" marker: a [`Source`] with no SSRC.
    ///
    /// Sending a source list consisting of this marker differs observably
    /// from sending no source list at all — the former instructs the relay
    /// to drop existing sources, the latter leaves them untouched.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Group of related RTP sources.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceGroup {
    /// Grouping semantics of the member sources.
    pub semantics: GroupSemantics,

    /// SSRCs of the member sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<u32>,
}

impl SourceGroup {
    /// Creates an empty simulcast group: the "turn simulcast layers off"
    /// marker, analogous to [`Source::empty`].
    #[inline]
    #[must_use]
    pub fn simulcast() -> Self {
        Self {
            semantics: GroupSemantics::Sim,
            sources: Vec::new(),
        }
    }
}

/// Semantics of a [`SourceGroup`].
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum GroupSemantics {
    /// Simulcast layers of one stream.
    #[display(fmt = "SIM")]
    #[serde(rename = "SIM")]
    Sim,

    /// Flow identification: an RTP stream and its retransmission stream.
    #[display(fmt = "FID")]
    #[serde(rename = "FID")]
    Fid,

    /// Forward error correction stream pairing.
    #[display(fmt = "FEC-FR")]
    #[serde(rename = "FEC-FR")]
    FecFr,
}

/// Error of parsing an unknown [`GroupSemantics`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown source group semantics: {}", _0)]
pub struct ParseGroupSemanticsError(pub String);

impl FromStr for GroupSemantics {
    type Err = ParseGroupSemanticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIM" => Ok(Self::Sim),
            "FID" => Ok(Self::Fid),
            "FEC-FR" => Ok(Self::FecFr),
            _ => Err(ParseGroupSemanticsError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod media_specs {
    use super::*;

    #[test]
    fn media_kind_parses_fail_closed() {
        assert_eq!("audio".parse::<MediaKind>().ok(), Some(MediaKind::Audio));
        assert!("application".parse::<MediaKind>().is_err());
    }

    #[test]
    fn group_semantics_parses_declared_values_only() {
        assert_eq!(
            "FEC-FR".parse::<GroupSemantics>().ok(),
            Some(GroupSemantics::FecFr),
        );
        assert!("sim".parse::<GroupSemantics>().is_err());
    }

    #[test]
    fn empty_source_marker_serializes_as_entry() {
        let json = serde_json::to_value(&vec![Source::empty()]).unwrap();

        assert_eq!(json, serde_json::json!([{}]));
    }
}
