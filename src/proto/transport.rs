//! ICE-like transport descriptors carried by channels and channel bundles.

use std::str::FromStr;

use derive_more::Display;
use failure::Fail;
use serde::{Deserialize, Serialize};

/// Transport description of a channel or a channel bundle: ICE credentials
/// plus the candidate list gathered so far.
///
/// A channel either carries its own [`Transport`] or references a bundle by
/// endpoint id, never both.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Transport {
    /// ICE username fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ufrag: Option<String>,

    /// ICE password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,

    /// Whether RTP and RTCP are multiplexed on a single port.
    #[serde(default, skip_serializing_if = "is_false")]
    pub rtcp_mux: bool,

    /// DTLS fingerprint of the transport owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,

    /// Gathered ICE candidates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

fn is_false(val: &bool) -> bool {
    !*val
}

/// DTLS fingerprint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Fingerprint {
    /// Hash function name (e.g. `sha-256`).
    pub hash: String,

    /// Fingerprint value in colon-separated hex form.
    pub value: String,

    /// DTLS setup role (`actpass`, `active` or `passive`), if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
}

/// Single ICE candidate of a [`Transport`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Candidate {
    /// Candidate foundation.
    pub foundation: String,

    /// Component id (`1` for RTP, `2` for RTCP).
    pub component: u8,

    /// Transport protocol of this candidate.
    pub protocol: Protocol,

    /// Candidate priority.
    pub priority: u32,

    /// Address the candidate is reachable at.
    pub ip: String,

    /// Port the candidate is reachable at.
    pub port: u16,

    /// Candidate type.
    #[serde(rename = "type")]
    pub kind: CandidateKind,

    /// ICE restart generation.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub generation: u32,

    /// Related address for reflexive/relayed candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_addr: Option<String>,

    /// Related port for reflexive/relayed candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_port: Option<u16>,
}

fn is_zero(val: &u32) -> bool {
    *val == 0
}

/// Transport protocol of a [`Candidate`].
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// UDP candidate.
    #[display(fmt = "udp")]
    Udp,

    /// TCP candidate.
    #[display(fmt = "tcp")]
    Tcp,
}

/// Error of parsing an unknown [`Protocol`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown transport protocol: {}", _0)]
pub struct ParseProtocolError(pub String);

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            _ => Err(ParseProtocolError(s.to_owned())),
        }
    }
}

/// Type of a [`Candidate`].
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    /// Host candidate.
    #[display(fmt = "host")]
    Host,

    /// Server-reflexive candidate.
    #[display(fmt = "srflx")]
    Srflx,

    /// Peer-reflexive candidate.
    #[display(fmt = "prflx")]
    Prflx,

    /// Relayed candidate.
    #[display(fmt = "relay")]
    Relay,
}

/// Error of parsing an unknown [`CandidateKind`] value.
#[derive(Debug, Display, Fail)]
#[display(fmt = "Unknown candidate type: {}", _0)]
pub struct ParseCandidateKindError(pub String);

impl FromStr for CandidateKind {
    type Err = ParseCandidateKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "srflx" => Ok(Self::Srflx),
            "prflx" => Ok(Self::Prflx),
            "relay" => Ok(Self::Relay),
            _ => Err(ParseCandidateKindError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod transport_specs {
    use super::*;

    #[test]
    fn candidate_kind_parses_fail_closed() {
        assert_eq!("srflx".parse::<CandidateKind>().ok(), Some(CandidateKind::Srflx));
        assert!("reflexive".parse::<CandidateKind>().is_err());
    }

    #[test]
    fn absent_credentials_are_omitted() {
        let transport = Transport::default();

        let json = serde_json::to_value(&transport).unwrap();

        assert_eq!(json, serde_json::json!({}));
    }
}
