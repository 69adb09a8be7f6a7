//! Conference document model.
//!
//! One conference document ([`Conference`]) plays three roles: the canonical
//! local record of relay-side state, the payload of outbound requests built
//! by [`RequestBuilder`], and the payload of relay responses folded back by
//! [`analyser`]. Requests and responses therefore always mirror the state's
//! shape.
//!
//! [`RequestBuilder`]: crate::builder::RequestBuilder
//! [`analyser`]: crate::analyser

pub mod channel;
pub mod media;
pub mod transport;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

pub use self::{
    channel::{
        Channel, Direction, RelayMode, SctpConnection, SimulcastMode,
    },
    media::{
        ContentDescription, GroupSemantics, MediaKind, PayloadType,
        RtpDescription, RtpHdrExt, Source, SourceGroup,
    },
    transport::{Candidate, CandidateKind, Fingerprint, Protocol, Transport},
};

/// Id of a conference, assigned by the relay on the first successful
/// allocation.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq,
    Serialize,
)]
#[from(forward)]
pub struct ConferenceId(pub String);

/// Id of a channel or an SCTP connection, assigned by the relay.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq,
    Serialize,
)]
#[from(forward)]
pub struct ChannelId(pub String);

/// Id of a conference participant as known to the relay.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq,
    Serialize,
)]
#[from(forward)]
pub struct EndpointId(pub String);

/// Id of a media relay, used to address requests.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq,
    Serialize,
)]
#[from(forward)]
pub struct RelayId(pub String);

/// Kind of a conference request, stamped on outbound documents.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// Allocates new channels on the relay.
    #[display(fmt = "allocate-channels")]
    AllocateChannels,

    /// Modifies attributes of channels existing on the relay.
    #[display(fmt = "channel-info-update")]
    ChannelInfoUpdate,

    /// Expires channels existing on the relay.
    #[display(fmt = "expire-channels")]
    ExpireChannels,
}

/// Conference document: the aggregate of media relay resources (contents,
/// channels, connections, endpoints) for one multi-party session.
///
/// Used both as the canonical conference state and as the request/response
/// payload — see the [module docs](self).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Conference {
    /// Relay-assigned conference id. Empty until the first allocation
    /// response; immutable once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<ConferenceId>,

    /// Descriptive conference name. Set once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Global correlation id of the conference. Set once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gid: Option<String>,

    /// Destination relay of an outbound request. Unused on state documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<RelayId>,

    /// Originating relay of a response; recorded on state by the analyser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<RelayId>,

    /// Kind of an outbound request. `None` on state documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<RequestKind>,

    /// Contents of the conference, unique by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) contents: Vec<Content>,

    /// Channel bundles of an outbound request, keyed by endpoint id.
    /// Request-level only: never folded into state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) channel_bundles: Vec<ChannelBundle>,

    /// Endpoints known to participate in the conference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) endpoints: Vec<Endpoint>,

    /// Media recording status of the conference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording: Option<Recording>,

    /// RTCP termination strategy announced for the conference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtcp_termination_strategy: Option<RtcpTerminationStrategy>,

    /// Whether the relay reported a graceful shutdown in progress.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub graceful_shutdown: bool,
}

impl Conference {
    /// Creates a new empty [`Conference`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the relay-assigned conference id, if any.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&ConferenceId> {
        self.id.as_ref()
    }

    /// Assigns the conference id.
    ///
    /// # Panics
    ///
    /// If a different id has been assigned already. The relay assigns the id
    /// exactly once; reassigning it means two conferences got mixed up in
    /// the caller.
    pub fn set_id(&mut self, id: ConferenceId) {
        if let Some(current) = &self.id {
            if *current != id {
                panic!(
                    "conference id is '{}' already, refusing to reassign \
                     to '{}'",
                    current, id,
                );
            }
        }
        self.id = Some(id);
    }

    /// Returns the conference name, if set.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the conference name.
    ///
    /// # Panics
    ///
    /// If a different name has been set already.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if let Some(current) = &self.name {
            if *current != name {
                panic!(
                    "conference name is '{}' already, refusing to rename \
                     to '{}'",
                    current, name,
                );
            }
        }
        self.name = Some(name);
    }

    /// Returns the global conference id, if set.
    #[inline]
    #[must_use]
    pub fn gid(&self) -> Option<&str> {
        self.gid.as_deref()
    }

    /// Sets the global conference id.
    ///
    /// # Panics
    ///
    /// If a different global id has been set already.
    pub fn set_gid(&mut self, gid: impl Into<String>) {
        let gid = gid.into();
        if let Some(current) = &self.gid {
            if *current != gid {
                panic!(
                    "conference gid is '{}' already, refusing to reassign \
                     to '{}'",
                    current, gid,
                );
            }
        }
        self.gid = Some(gid);
    }

    /// Returns the destination relay of this document.
    #[inline]
    #[must_use]
    pub fn to(&self) -> Option<&RelayId> {
        self.to.as_ref()
    }

    /// Stamps the destination relay on this document.
    #[inline]
    pub fn set_to(&mut self, to: Option<RelayId>) {
        self.to = to;
    }

    /// Returns the originating relay of this document.
    #[inline]
    #[must_use]
    pub fn from(&self) -> Option<&RelayId> {
        self.from.as_ref()
    }

    /// Records the originating relay of this document.
    #[inline]
    pub fn set_from(&mut self, from: Option<RelayId>) {
        self.from = from;
    }

    /// Returns the request kind of this document.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<RequestKind> {
        self.kind
    }

    /// Stamps the request kind on this document.
    #[inline]
    pub fn set_kind(&mut self, kind: Option<RequestKind>) {
        self.kind = kind;
    }

    /// Returns the contents of the conference.
    #[inline]
    #[must_use]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Returns the content with the given name, if present.
    #[must_use]
    pub fn content(&self, name: &str) -> Option<&Content> {
        self.contents.iter().find(|c| c.name == name)
    }

    /// Returns the content with the given name for mutation, if present.
    pub fn content_mut(&mut self, name: &str) -> Option<&mut Content> {
        self.contents.iter_mut().find(|c| c.name == name)
    }

    /// Returns the content with the given name, creating and registering it
    /// first if absent.
    pub fn get_or_create_content(&mut self, name: &str) -> &mut Content {
        let idx = match self.contents.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.contents.push(Content::new(name));
                self.contents.len() - 1
            }
        };
        &mut self.contents[idx]
    }

    /// Adds a content, unless one with the same name is registered already.
    /// Returns whether the set of contents changed.
    pub fn add_content(&mut self, content: Content) -> bool {
        if self.content(&content.name).is_some() {
            return false;
        }
        self.contents.push(content);
        true
    }

    /// Returns the channel with the given id within the named content.
    #[must_use]
    pub fn channel(
        &self,
        content: &str,
        id: &ChannelId,
    ) -> Option<&Channel> {
        self.content(content)?.channel(id)
    }

    /// Returns the SCTP connection with the given id within the named
    /// content.
    #[must_use]
    pub fn sctp_connection(
        &self,
        content: &str,
        id: &ChannelId,
    ) -> Option<&SctpConnection> {
        self.content(content)?.sctp_connection(id)
    }

    /// Removes the channel with the given id from the named content.
    /// Expiry bookkeeping only.
    pub fn remove_channel(
        &mut self,
        content: &str,
        id: &ChannelId,
    ) -> Option<Channel> {
        self.content_mut(content)?.remove_channel(id)
    }

    /// Removes the SCTP connection with the given id from the named content.
    /// Expiry bookkeeping only.
    pub fn remove_sctp_connection(
        &mut self,
        content: &str,
        id: &ChannelId,
    ) -> Option<SctpConnection> {
        self.content_mut(content)?.remove_sctp_connection(id)
    }

    /// Returns the endpoints of the conference.
    #[inline]
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Returns the endpoint with the given id, if known.
    #[must_use]
    pub fn endpoint(&self, id: &EndpointId) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == *id)
    }

    /// Adds an endpoint, unless one with the same id is known already.
    /// Returns whether the set of endpoints changed.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> bool {
        if self.endpoint(&endpoint.id).is_some() {
            return false;
        }
        self.endpoints.push(endpoint);
        true
    }

    /// Returns the channel bundles of this document.
    #[inline]
    #[must_use]
    pub fn channel_bundles(&self) -> &[ChannelBundle] {
        &self.channel_bundles
    }

    /// Returns the channel bundle with the given id, if present.
    #[must_use]
    pub fn channel_bundle(&self, id: &EndpointId) -> Option<&ChannelBundle> {
        self.channel_bundles.iter().find(|b| b.id == *id)
    }

    /// Adds a channel bundle, unless one with the same id is present
    /// already. Returns whether the set of bundles changed.
    pub fn add_channel_bundle(&mut self, bundle: ChannelBundle) -> bool {
        if self.channel_bundle(&bundle.id).is_some() {
            return false;
        }
        self.channel_bundles.push(bundle);
        true
    }
}

/// Named media category within a conference (e.g. `audio`, `video`,
/// `data`), holding the channels and SCTP connections allocated for it.
///
/// A [`Content`] with no channels and no connections is still valid: it may
/// exist transiently while a request is being diffed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Content {
    /// Name of the content, unique within its conference.
    pub(crate) name: String,

    /// Channels allocated within this content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) channels: Vec<Channel>,

    /// SCTP connections allocated within this content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) sctp_connections: Vec<SctpConnection>,
}

impl Content {
    /// Creates a new empty [`Content`] with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
            sctp_connections: Vec::new(),
        }
    }

    /// Returns the name of this content.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channels of this content.
    #[inline]
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Returns the SCTP connections of this content.
    #[inline]
    #[must_use]
    pub fn sctp_connections(&self) -> &[SctpConnection] {
        &self.sctp_connections
    }

    /// Indicates whether this content holds no channels and no connections.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.sctp_connections.is_empty()
    }

    /// Adds a channel, unless an equal one is present already.
    /// Returns whether the list changed.
    pub fn add_channel(&mut self, channel: Channel) -> bool {
        if self.channels.contains(&channel) {
            return false;
        }
        self.channels.push(channel);
        true
    }

    /// Adds an SCTP connection, unless an equal one is present already.
    /// Returns whether the list changed.
    pub fn add_sctp_connection(&mut self, conn: SctpConnection) -> bool {
        if self.sctp_connections.contains(&conn) {
            return false;
        }
        self.sctp_connections.push(conn);
        true
    }

    /// Appends a channel unconditionally.
    pub(crate) fn push_channel(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    /// Appends an SCTP connection unconditionally.
    pub(crate) fn push_sctp_connection(&mut self, conn: SctpConnection) {
        self.sctp_connections.push(conn);
    }

    /// Returns the channel with the given id, if present.
    #[must_use]
    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id.as_ref() == Some(id))
    }

    /// Returns the channel with the given id for mutation, if present.
    pub fn channel_mut(&mut self, id: &ChannelId) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id.as_ref() == Some(id))
    }

    /// Returns the SCTP connection with the given id, if present.
    #[must_use]
    pub fn sctp_connection(&self, id: &ChannelId) -> Option<&SctpConnection> {
        self.sctp_connections
            .iter()
            .find(|c| c.id.as_ref() == Some(id))
    }

    /// Removes and returns the channel with the given id, if present.
    pub fn remove_channel(&mut self, id: &ChannelId) -> Option<Channel> {
        let idx = self
            .channels
            .iter()
            .position(|c| c.id.as_ref() == Some(id))?;
        Some(self.channels.remove(idx))
    }

    /// Removes and returns the SCTP connection with the given id, if
    /// present.
    pub fn remove_sctp_connection(
        &mut self,
        id: &ChannelId,
    ) -> Option<SctpConnection> {
        let idx = self
            .sctp_connections
            .iter()
            .position(|c| c.id.as_ref() == Some(id))?;
        Some(self.sctp_connections.remove(idx))
    }
}

/// Grouping of channels sharing one transport, keyed by endpoint id.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelBundle {
    /// Id of the endpoint whose channels the bundle groups.
    pub id: EndpointId,

    /// Shared transport of the bundled channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

impl ChannelBundle {
    /// Creates a new [`ChannelBundle`] for the given endpoint with no
    /// transport.
    #[inline]
    #[must_use]
    pub fn new(id: EndpointId) -> Self {
        Self {
            id,
            transport: None,
        }
    }
}

/// Conference participant identity as known to the relay.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Endpoint {
    /// Id of the endpoint, unique within the conference.
    pub id: EndpointId,

    /// Opaque statistics correlation id of the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_id: Option<String>,

    /// Human-readable name of the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Endpoint {
    /// Creates a new [`Endpoint`] with the given id and statistics id.
    #[must_use]
    pub fn new(id: EndpointId, stats_id: Option<String>) -> Self {
        Self {
            id,
            stats_id,
            display_name: None,
        }
    }
}

/// Media recording status of a conference.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Recording {
    /// Whether recording is (requested to be) active.
    pub state: bool,

    /// Authorization token for toggling the recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Directory the relay records into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// RTCP termination strategy announced for a conference.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RtcpTerminationStrategy {
    /// Name of the strategy implementation.
    pub name: String,
}

#[cfg(test)]
mod conference_specs {
    use super::*;

    #[test]
    fn content_is_created_once_per_name() {
        let mut conference = Conference::new();

        conference.get_or_create_content("audio");
        conference
            .get_or_create_content("audio")
            .push_channel(Channel::new());

        assert_eq!(conference.contents().len(), 1);
        assert_eq!(conference.content("audio").unwrap().channels().len(), 1);
    }

    #[test]
    fn endpoints_deduplicate_by_id() {
        let mut conference = Conference::new();

        assert!(conference
            .add_endpoint(Endpoint::new("alice".into(), None)));
        assert!(!conference.add_endpoint(Endpoint::new(
            "alice".into(),
            Some("stats".to_owned()),
        )));

        assert_eq!(conference.endpoints().len(), 1);
    }

    #[test]
    fn id_assignment_is_idempotent() {
        let mut conference = Conference::new();

        conference.set_id("conf-1".into());
        conference.set_id("conf-1".into());

        assert_eq!(conference.id().map(ToString::to_string).as_deref(), Some("conf-1"));
    }

    #[test]
    #[should_panic(expected = "refusing to reassign")]
    fn id_reassignment_is_rejected() {
        let mut conference = Conference::new();

        conference.set_id("conf-1".into());
        conference.set_id("conf-2".into());
    }

    #[test]
    fn relay_status_extras_deserialize() {
        let json = serde_json::json!({
            "id": "conf-1",
            "graceful-shutdown": true,
            "recording": { "state": true, "token": "secret" },
            "rtcp-termination-strategy": { "name": "full-terminate" },
        });

        let conference: Conference = serde_json::from_value(json).unwrap();

        assert!(conference.graceful_shutdown);
        assert_eq!(
            conference.recording.as_ref().unwrap().token.as_deref(),
            Some("secret"),
        );
        assert_eq!(
            conference.rtcp_termination_strategy.as_ref().unwrap().name,
            "full-terminate",
        );
    }

    #[test]
    fn state_document_serializes_without_addressing() {
        let mut conference = Conference::new();
        conference.set_id("conf-1".into());

        let json = serde_json::to_value(&conference).unwrap();

        assert_eq!(json, serde_json::json!({ "id": "conf-1" }));
    }
}
