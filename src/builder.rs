//! Compiler of conference control requests.
//!
//! [`RequestBuilder`] accumulates one coherent request against a shared
//! conference state. The flow is as follows:
//!
//! 1. Add one or multiple operations of the same [`RequestKind`] by calling
//!    [`RequestBuilder::add_allocate_channels_request`],
//!    [`RequestBuilder::add_expire_channels_request`] or any of the
//!    `add_*_update` methods.
//! 2. Compile the request with [`RequestBuilder::finish`] and send the
//!    returned document to the relay. Every add-operation reports whether it
//!    changed anything; if none did, skip the round trip entirely.
//! 3. Feed allocation responses through
//!    [`analyser::apply_allocation_response`], so that the conference state
//!    learns its relay-assigned ids.
//! 4. Call [`RequestBuilder::reset`] and start the next request.
//!
//! The same state document must be shared between the builder and the
//! analyser: the builder needs the conference id assigned by the first
//! allocation response, otherwise it would keep allocating new conferences
//! and fail on update requests.
//!
//! [`analyser::apply_allocation_response`]:
//! crate::analyser::apply_allocation_response

use std::collections::HashMap;

use crate::{
    conf::Channels,
    log::prelude::*,
    proto::{
        Channel, ChannelBundle, Conference, Content, ContentDescription,
        Direction, Endpoint, EndpointId, MediaKind, RelayId, RequestKind,
        RtpDescription, SctpConnection, Source, SourceGroup, Transport,
    },
};

/// Parameters of one channel allocation operation: everything the relay
/// needs to create channels for one endpoint across several contents.
#[derive(Clone, Debug)]
pub struct AllocateParams {
    /// Whether the allocated channels share one bundled transport.
    pub use_bundle: bool,

    /// Id of the endpoint the channels are allocated for.
    pub endpoint: EndpointId,

    /// Statistics correlation id to register with the endpoint.
    pub stats_id: Option<String>,

    /// Whether the remote peer initiated the media negotiation.
    pub peer_is_initiator: bool,

    /// Descriptions of the contents to allocate channels within.
    pub contents: Vec<ContentDescription>,

    /// Sources to announce on the new channels, keyed by content name.
    /// `None` means "no opinion"; an empty list for a content means "clear
    /// any existing sources" and produces the [`Source::empty`] marker.
    pub sources: Option<HashMap<String, Vec<Source>>>,

    /// Source groups to announce on the new channels, keyed by content
    /// name. Same `None`-vs-empty semantics as [`AllocateParams::sources`],
    /// with [`SourceGroup::simulcast`] as the marker.
    pub source_groups: Option<HashMap<String, Vec<SourceGroup>>>,

    /// Peer relays to bridge the conference to. When set, relay-bridging
    /// channels are allocated instead of endpoint-owned ones.
    pub relays: Option<Vec<RelayId>>,
}

impl AllocateParams {
    /// Creates [`AllocateParams`] for the given endpoint and contents, with
    /// no bundling, no sources and no relay bridging.
    #[must_use]
    pub fn new(endpoint: EndpointId, contents: Vec<ContentDescription>) -> Self {
        Self {
            use_bundle: false,
            endpoint,
            stats_id: None,
            peer_is_initiator: false,
            contents,
            sources: None,
            source_groups: None,
            relays: None,
        }
    }
}

/// Single-use compiler of one conference control request.
///
/// A builder compiles requests of exactly one [`RequestKind`] at a time: the
/// first add-operation fixes the kind, and operations of another kind panic
/// until [`RequestBuilder::reset`] is called.
#[derive(Debug)]
pub struct RequestBuilder {
    /// Kind of the request being built. `None` is the "zero" state: the
    /// next add-operation decides the kind.
    kind: Option<RequestKind>,

    /// The request document being accumulated.
    request: Conference,

    /// Options applied to channels created by allocation operations.
    channels_conf: Channels,

    /// Whether any channel has actually been queued for expiration since
    /// the last reset.
    has_channels_to_expire: bool,
}

impl RequestBuilder {
    /// Creates a new [`RequestBuilder`] for the given conference state.
    #[must_use]
    pub fn new(state: &Conference) -> Self {
        let mut this = Self {
            kind: None,
            request: Conference::new(),
            channels_conf: Channels::default(),
            has_channels_to_expire: false,
        };
        this.reset(state);
        this
    }

    /// Returns the kind of the request being built, or `None` if no
    /// operation has been added since the last reset.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<RequestKind> {
        self.kind
    }

    /// Indicates whether an expire request is being built and at least one
    /// channel has actually been queued for expiration.
    #[inline]
    #[must_use]
    pub fn has_channels_to_expire(&self) -> bool {
        self.has_channels_to_expire
    }

    /// Returns the options applied to channels created by allocation
    /// operations.
    #[inline]
    #[must_use]
    pub fn channels_conf(&self) -> &Channels {
        &self.channels_conf
    }

    /// Replaces the options applied to channels created by allocation
    /// operations. The options survive [`RequestBuilder::reset`].
    #[inline]
    pub fn set_channels_conf(&mut self, conf: Channels) {
        self.channels_conf = conf;
    }

    /// Returns this builder to the "zero" state and starts a new request
    /// document.
    ///
    /// The new document inherits the conference id, name and global id
    /// known to `state`, so that subsequent requests target the same remote
    /// conference instead of allocating a new one.
    pub fn reset(&mut self, state: &Conference) {
        self.kind = None;
        self.has_channels_to_expire = false;

        let mut request = Conference::new();
        if let Some(id) = state.id() {
            request.set_id(id.clone());
        }
        if let Some(name) = state.name() {
            request.set_name(name);
        }
        if let Some(gid) = state.gid() {
            request.set_gid(gid);
        }
        self.request = request;
    }

    /// Adds a channel allocation operation to the
    /// [`RequestKind::AllocateChannels`] request being built.
    ///
    /// For every content a channel of the matching type is queued: an SCTP
    /// connection for [`MediaKind::Data`], a relay-bridging channel when
    /// [`AllocateParams::relays`] is set, an endpoint-owned RTP channel
    /// otherwise. With [`AllocateParams::use_bundle`] the channels reference
    /// a channel bundle built from the *first* content's transport and
    /// carry no transport of their own.
    ///
    /// The endpoint record (id plus statistics id) is always registered in
    /// the request.
    ///
    /// Returns whether the operation queued any channel: an empty
    /// [`AllocateParams::contents`] list yields `false`, and such a request
    /// is not worth sending unless some other operation reported a change.
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built. Call
    /// [`RequestBuilder::reset`] first.
    pub fn add_allocate_channels_request(
        &mut self,
        params: AllocateParams,
    ) -> bool {
        self.assert_kind(RequestKind::AllocateChannels);

        let AllocateParams {
            use_bundle,
            endpoint,
            stats_id,
            peer_is_initiator,
            contents,
            sources,
            source_groups,
            relays,
        } = params;

        self.request
            .add_endpoint(Endpoint::new(endpoint.clone(), stats_id));

        let mut has_any_changes = false;

        for description in &contents {
            let content_name = description.kind.as_str();
            has_any_changes = true;

            if description.kind == MediaKind::Data {
                let mut conn = SctpConnection::new();
                conn.endpoint = Some(endpoint.clone());
                conn.initiator = Some(peer_is_initiator);
                if use_bundle {
                    conn.bundle_id = Some(endpoint.clone());
                } else {
                    conn.transport = description.transport.clone();
                }
                self.request
                    .get_or_create_content(content_name)
                    .add_sctp_connection(conn);
                continue;
            }

            let mut channel = Channel::new();
            channel.initiator = Some(peer_is_initiator);
            if let Some(relays) = &relays {
                // Relay-bridging legs are not owned by any endpoint and
                // never join an endpoint's bundle.
                channel.relays = relays.clone();
            } else {
                channel.endpoint = Some(endpoint.clone());
                if use_bundle {
                    channel.bundle_id = Some(endpoint.clone());
                } else {
                    channel.transport = description.transport.clone();
                }
            }

            if let Some(rtp) = &description.rtp {
                for payload_type in &rtp.payload_types {
                    channel.add_payload_type(payload_type.clone());
                }
                for ext in &rtp.rtp_hdr_exts {
                    channel.add_rtp_hdr_ext(ext.clone());
                }
            }

            channel.last_n = self.channels_conf.last_n;
            channel.adaptive_last_n = self.channels_conf.adaptive_last_n;
            channel.adaptive_simulcast = self.channels_conf.adaptive_simulcast;
            channel.simulcast_mode = self.channels_conf.simulcast_mode;
            if description.kind == MediaKind::Audio {
                channel.packet_delay = self.channels_conf.audio_packet_delay;
                channel.relay_mode = self.channels_conf.relay_mode;
            }

            if let Some(map) = &sources {
                for source in map.get(content_name).into_iter().flatten() {
                    channel.add_source(source.clone());
                }
                if channel.sources.is_empty() {
                    channel.add_source(Source::empty());
                }
            }
            if let Some(map) = &source_groups {
                for group in map.get(content_name).into_iter().flatten() {
                    channel.add_source_group(group.clone());
                }
                if channel.source_groups.is_empty() {
                    channel.add_source_group(SourceGroup::simulcast());
                }
            }

            self.request
                .get_or_create_content(content_name)
                .add_channel(channel);
        }

        if use_bundle && !contents.is_empty() {
            let mut bundle = ChannelBundle::new(endpoint);
            // One transport represents the whole bundle.
            if let Some(transport) = &contents[0].transport {
                bundle.transport = Some(transport.clone());
            }
            self.request.add_channel_bundle(bundle);
        }

        has_any_changes
    }

    /// Adds an expire operation to the [`RequestKind::ExpireChannels`]
    /// request being built, for every channel and SCTP connection present
    /// in both `channels` and the live `state`.
    ///
    /// Matched channels are queued as minimal expire-only descriptors (id
    /// plus zero expire, plus the endpoint id for connections) **and
    /// removed from `state` immediately**: expiration is fire-and-forget,
    /// the relay is assumed to honor it.
    ///
    /// Returns whether any channel has been queued for expiration since the
    /// last reset. Channels unknown to `state` are skipped silently, and
    /// `false` is returned unconditionally while the conference has no
    /// relay-assigned id yet (nothing can exist remotely to expire).
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built. Call
    /// [`RequestBuilder::reset`] first.
    pub fn add_expire_channels_request(
        &mut self,
        state: &mut Conference,
        channels: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ExpireChannels);

        for expired_content in channels.contents() {
            let state_content = match state.content(expired_content.name()) {
                Some(content) => content,
                None => continue,
            };

            for expired_channel in expired_content.channels() {
                let id = match &expired_channel.id {
                    Some(id) => id,
                    None => continue,
                };
                if state_content.channel(id).is_some() {
                    let mut channel_request = Channel::new();
                    channel_request.id = Some(id.clone());
                    channel_request.expire = Some(0);
                    self.request
                        .get_or_create_content(expired_content.name())
                        .add_channel(channel_request);
                    self.has_channels_to_expire = true;
                }
            }
            for expired_conn in expired_content.sctp_connections() {
                let id = match &expired_conn.id {
                    Some(id) => id,
                    None => continue,
                };
                if let Some(state_conn) = state_content.sctp_connection(id) {
                    let mut conn_request = SctpConnection::new();
                    conn_request.id = Some(id.clone());
                    conn_request.expire = Some(0);
                    conn_request.endpoint = state_conn.endpoint.clone();
                    self.request
                        .get_or_create_content(expired_content.name())
                        .add_sctp_connection(conn_request);
                    self.has_channels_to_expire = true;
                }
            }
        }

        // Drop the channels queued for expiration from the live state.
        for request_content in self.request.contents() {
            for channel in request_content.channels() {
                if let Some(id) = &channel.id {
                    state.remove_channel(request_content.name(), id);
                }
            }
            for conn in request_content.sctp_connections() {
                if let Some(id) = &conn.id {
                    state.remove_sctp_connection(request_content.name(), id);
                }
            }
        }

        self.has_channels_to_expire
    }

    /// Adds an RTP description update to the
    /// [`RequestKind::ChannelInfoUpdate`] request being built: payload
    /// types and header extensions from `descriptions` (keyed by content
    /// name) are copied onto the channels described by `snapshot`.
    ///
    /// Returns whether anything was queued. No-ops (`false`) while the
    /// conference has no relay-assigned id yet. Contents without a channel
    /// in `snapshot`, or with an empty payload type list, are skipped.
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built.
    pub fn add_rtp_description_update(
        &mut self,
        state: &Conference,
        descriptions: &HashMap<String, RtpDescription>,
        snapshot: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ChannelInfoUpdate);

        let mut any_updates = false;
        for (content_name, description) in descriptions {
            let channel = match snapshot_channel(snapshot, content_name) {
                Some(SnapshotChannel::Rtp(channel)) => channel,
                _ => continue,
            };
            if description.payload_types.is_empty() {
                continue;
            }

            any_updates = true;

            let content = self.request.get_or_create_content(content_name);
            let request_channel = request_rtp_channel(content, channel);
            for payload_type in &description.payload_types {
                request_channel.add_payload_type(payload_type.clone());
            }
            for ext in &description.rtp_hdr_exts {
                request_channel.add_rtp_hdr_ext(ext.clone());
            }
        }
        any_updates
    }

    /// Adds a source update to the [`RequestKind::ChannelInfoUpdate`]
    /// request being built: sources from `sources` (keyed by content name)
    /// are copied onto the channels described by `snapshot`.
    ///
    /// An empty source list for a matched content produces the
    /// [`Source::empty`] marker: "clear any existing sources" must reach
    /// the relay, unlike "no opinion" which is expressed by omitting the
    /// content from the map.
    ///
    /// Returns whether anything was queued. No-ops (`false`) while the
    /// conference has no relay-assigned id yet.
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built.
    pub fn add_source_update(
        &mut self,
        state: &Conference,
        sources: &HashMap<String, Vec<Source>>,
        snapshot: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ChannelInfoUpdate);

        let mut any_updates = false;
        for (content_name, content_sources) in sources {
            let channel = match snapshot_rtp_channel(snapshot, content_name) {
                Some(channel) => channel,
                None => continue,
            };

            any_updates = true;

            let content = self.request.get_or_create_content(content_name);
            let request_channel = request_rtp_channel(content, channel);
            for source in content_sources {
                request_channel.add_source(source.clone());
            }
            if request_channel.sources.is_empty() {
                request_channel.add_source(Source::empty());
            }
        }
        any_updates
    }

    /// Adds a source group update to the
    /// [`RequestKind::ChannelInfoUpdate`] request being built: groups from
    /// `groups` (keyed by content name) are copied onto the channels
    /// described by `snapshot`.
    ///
    /// An empty group list for a video content produces the
    /// [`SourceGroup::simulcast`] marker, turning simulcast layers off on
    /// the relay. Empty lists for other contents are a no-op.
    ///
    /// Returns whether anything was queued. No-ops (`false`) while the
    /// conference has no relay-assigned id yet.
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built.
    pub fn add_source_group_update(
        &mut self,
        state: &Conference,
        groups: &HashMap<String, Vec<SourceGroup>>,
        snapshot: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ChannelInfoUpdate);

        let mut any_updates = false;
        for (content_name, content_groups) in groups {
            let channel = match snapshot_rtp_channel(snapshot, content_name) {
                Some(channel) => channel,
                None => continue,
            };

            let content = self.request.get_or_create_content(content_name);
            let request_channel = request_rtp_channel(content, channel);

            if content_groups.is_empty()
                && content_name.eq_ignore_ascii_case("video")
            {
                any_updates = true;
                request_channel.add_source_group(SourceGroup::simulcast());
            }
            for group in content_groups {
                any_updates = true;
                request_channel.add_source_group(group.clone());
            }
        }
        any_updates
    }

    /// Adds a transport update to the [`RequestKind::ChannelInfoUpdate`]
    /// request being built: for every content in `transports` (keyed by
    /// content name) with a channel in `snapshot`, a descriptor carrying
    /// the channel id, its owning endpoint and the new transport is queued.
    ///
    /// Returns whether anything was queued. No-ops (`false`) while the
    /// conference has no relay-assigned id yet.
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built.
    pub fn add_transport_update(
        &mut self,
        state: &Conference,
        transports: &HashMap<String, Transport>,
        snapshot: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ChannelInfoUpdate);

        let mut has_any_changes = false;
        for (content_name, transport) in transports {
            match snapshot_channel(snapshot, content_name) {
                Some(SnapshotChannel::Rtp(channel)) => {
                    let mut request_channel = Channel::new();
                    request_channel.id = channel.id.clone();
                    request_channel.endpoint = channel.endpoint.clone();
                    request_channel.transport = Some(transport.clone());
                    self.request
                        .get_or_create_content(content_name)
                        .add_channel(request_channel);
                }
                Some(SnapshotChannel::Sctp(conn)) => {
                    let mut request_conn = SctpConnection::new();
                    request_conn.id = conn.id.clone();
                    request_conn.endpoint = conn.endpoint.clone();
                    request_conn.transport = Some(transport.clone());
                    self.request
                        .get_or_create_content(content_name)
                        .add_sctp_connection(request_conn);
                }
                None => continue,
            }
            has_any_changes = true;
        }
        has_any_changes
    }

    /// Adds a bundle transport update to the
    /// [`RequestKind::ChannelInfoUpdate`] request being built: the given
    /// transport replaces the one of the channel bundle described by
    /// `snapshot`.
    ///
    /// Returns whether anything was queued. No-ops (`false`) while the
    /// conference has no relay-assigned id yet.
    ///
    /// # Panics
    ///
    /// If `snapshot` describes no channel bundle (a caller bug — this
    /// method is only meaningful for bundled endpoints), or if a request of
    /// another kind is being built. Snapshots with more than one bundle are
    /// logged and the first bundle wins.
    pub fn add_bundle_transport_update(
        &mut self,
        state: &Conference,
        transport: &Transport,
        snapshot: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ChannelInfoUpdate);

        let local_bundle = match snapshot.channel_bundles().first() {
            Some(bundle) => bundle,
            None => panic!("local channels snapshot describes no channel bundle"),
        };
        if snapshot.channel_bundles().len() > 1 {
            error!(
                "more than one channel bundle in local channels snapshot; \
                 updating the first only"
            );
        }

        let mut bundle = ChannelBundle::new(local_bundle.id.clone());
        bundle.transport = Some(transport.clone());
        self.request.add_channel_bundle(bundle);

        true
    }

    /// Adds a media direction update to the
    /// [`RequestKind::ChannelInfoUpdate`] request being built: for every
    /// content in `directions` (keyed by content name) with an RTP channel
    /// in `snapshot`, the new direction is set on the channel's request
    /// descriptor.
    ///
    /// Returns whether anything was queued. No-ops (`false`) while the
    /// conference has no relay-assigned id yet.
    ///
    /// # Panics
    ///
    /// If a request of another kind is being built.
    pub fn add_direction_update(
        &mut self,
        state: &Conference,
        directions: &HashMap<String, Direction>,
        snapshot: &Conference,
    ) -> bool {
        if state.id().is_none() {
            return false;
        }

        self.assert_kind(RequestKind::ChannelInfoUpdate);

        let mut any_updates = false;
        for (content_name, direction) in directions {
            if let Some(channel) = snapshot_rtp_channel(snapshot, content_name)
            {
                let content = self.request.get_or_create_content(content_name);
                let request_channel = request_rtp_channel(content, channel);
                request_channel.direction = *direction;
                any_updates = true;
            }
        }
        any_updates
    }

    /// Finishes request construction and returns the compiled document,
    /// stamped with the destination relay and the request kind.
    ///
    /// For [`RequestKind::ExpireChannels`] requests with nothing actually
    /// queued, `None` is returned (and the expiration flag cleared): there
    /// is nothing worth sending.
    ///
    /// Does not reset this builder; call [`RequestBuilder::reset`] to start
    /// the next request, or keep adding operations to the current one.
    ///
    /// # Panics
    ///
    /// If `to` is empty.
    pub fn finish(&mut self, to: RelayId) -> Option<&Conference> {
        if to.0.is_empty() {
            panic!("destination relay id is empty");
        }

        self.request.set_to(Some(to));
        self.request.set_kind(self.kind);

        if self.kind == Some(RequestKind::ExpireChannels) {
            if !self.has_channels_to_expire {
                return None;
            }
            self.has_channels_to_expire = false;
        }

        Some(&self.request)
    }

    /// Fixes the kind of the request being built.
    ///
    /// # Panics
    ///
    /// If the kind has been fixed to a different value already.
    fn assert_kind(&mut self, kind: RequestKind) {
        match self.kind {
            None => self.kind = Some(kind),
            Some(current) => {
                if current != kind {
                    panic!(
                        "a {} request is being built already; reset() \
                         before adding {} operations",
                        current, kind,
                    );
                }
            }
        }
    }
}

/// Reference to a channel of either type within a snapshot.
enum SnapshotChannel<'a> {
    Rtp(&'a Channel),
    Sctp(&'a SctpConnection),
}

/// Finds the channel describing `content_name` in a caller-supplied
/// snapshot: the first RTP channel of the content, or failing that its
/// first SCTP connection.
fn snapshot_channel<'a>(
    snapshot: &'a Conference,
    content_name: &str,
) -> Option<SnapshotChannel<'a>> {
    let content = snapshot.content(content_name)?;
    if let Some(channel) = content.channels().first() {
        return Some(SnapshotChannel::Rtp(channel));
    }
    content.sctp_connections().first().map(SnapshotChannel::Sctp)
}

/// Finds the first RTP channel describing `content_name` in a
/// caller-supplied snapshot.
fn snapshot_rtp_channel<'a>(
    snapshot: &'a Conference,
    content_name: &str,
) -> Option<&'a Channel> {
    snapshot.content(content_name)?.channels().first()
}

/// Returns the placeholder request channel matching `like`, creating it
/// first if absent: a channel carrying only the id identifying the remote
/// resource, ready for update facets to be copied onto it.
///
/// # Panics
///
/// If the id of `like` identifies an SCTP connection in `content` instead
/// of an RTP channel.
fn request_rtp_channel<'a>(
    content: &'a mut Content,
    like: &Channel,
) -> &'a mut Channel {
    let idx = match content
        .channels()
        .iter()
        .position(|c| c.id == like.id)
    {
        Some(idx) => idx,
        None => {
            if let Some(id) = &like.id {
                if content.sctp_connection(id).is_some() {
                    panic!(
                        "channel '{}' of content '{}' is an SCTP \
                         connection, not an RTP channel",
                        id,
                        content.name(),
                    );
                }
            }
            let mut channel = Channel::new();
            channel.id = like.id.clone();
            content.push_channel(channel);
            content.channels().len() - 1
        }
    };
    &mut content.channels[idx]
}

#[cfg(test)]
mod request_builder_specs {
    use super::*;

    use crate::proto::ChannelId;

    fn allocated_state() -> Conference {
        let mut state = Conference::new();
        state.set_id("conf-1".into());
        let content = state.get_or_create_content("audio");
        let mut channel = Channel::new();
        channel.id = Some(ChannelId::from("42"));
        channel.endpoint = Some(EndpointId::from("alice"));
        content.push_channel(channel);
        state
    }

    fn audio_video_contents() -> Vec<ContentDescription> {
        vec![
            ContentDescription {
                kind: MediaKind::Audio,
                rtp: Some(RtpDescription {
                    payload_types: vec![crate::proto::PayloadType::new(
                        111, "opus", 48000,
                    )],
                    rtp_hdr_exts: Vec::new(),
                }),
                transport: Some(Transport {
                    ufrag: Some("au".to_owned()),
                    ..Transport::default()
                }),
            },
            ContentDescription {
                kind: MediaKind::Video,
                rtp: Some(RtpDescription::default()),
                transport: Some(Transport {
                    ufrag: Some("vu".to_owned()),
                    ..Transport::default()
                }),
            },
        ]
    }

    #[test]
    fn allocation_with_no_contents_reports_no_changes() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        let changed = builder.add_allocate_channels_request(
            AllocateParams::new("alice".into(), Vec::new()),
        );

        assert!(!changed);
        // The endpoint record is registered regardless.
        let request = builder.finish("relay.example.com".into()).unwrap();
        assert_eq!(request.endpoints().len(), 1);
        assert_eq!(request.endpoints()[0].id, EndpointId::from("alice"));
    }

    #[test]
    fn bundled_allocation_shares_the_first_contents_transport() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        let mut params =
            AllocateParams::new("alice".into(), audio_video_contents());
        params.use_bundle = true;
        assert!(builder.add_allocate_channels_request(params));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let bundles = request.channel_bundles();
        assert_eq!(bundles.len(), 1);
        assert_eq!(
            bundles[0].transport.as_ref().unwrap().ufrag.as_deref(),
            Some("au"),
        );
        for content in request.contents() {
            for channel in content.channels() {
                assert!(channel.transport.is_none());
                assert_eq!(
                    channel.bundle_id,
                    Some(EndpointId::from("alice")),
                );
            }
        }
    }

    #[test]
    fn unbundled_allocation_copies_transport_per_channel() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        assert!(builder.add_allocate_channels_request(AllocateParams::new(
            "alice".into(),
            audio_video_contents(),
        )));

        let request = builder.finish("relay.example.com".into()).unwrap();
        assert!(request.channel_bundles().is_empty());
        let audio = request.content("audio").unwrap();
        assert_eq!(
            audio.channels()[0].transport.as_ref().unwrap().ufrag.as_deref(),
            Some("au"),
        );
    }

    #[test]
    fn empty_source_list_still_signals_clearing_intent() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        let mut params =
            AllocateParams::new("alice".into(), audio_video_contents());
        let mut sources = HashMap::new();
        sources.insert("audio".to_owned(), vec![Source::new(111)]);
        sources.insert("video".to_owned(), Vec::new());
        params.sources = Some(sources);
        assert!(builder.add_allocate_channels_request(params));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let audio = &request.content("audio").unwrap().channels()[0];
        assert_eq!(audio.sources, vec![Source::new(111)]);
        let video = &request.content("video").unwrap().channels()[0];
        assert_eq!(video.sources, vec![Source::empty()]);
    }

    #[test]
    fn relay_bridging_channels_have_no_owning_endpoint() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        let mut params =
            AllocateParams::new("bridge-leg".into(), audio_video_contents());
        params.relays = Some(vec!["relay-2".into()]);
        assert!(builder.add_allocate_channels_request(params));

        let request = builder.finish("relay.example.com".into()).unwrap();
        for content in request.contents() {
            for channel in content.channels() {
                assert!(channel.endpoint.is_none());
                assert_eq!(channel.relays, vec![RelayId::from("relay-2")]);
            }
        }
    }

    #[test]
    fn audio_only_options_skip_video_channels() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);
        let mut conf = Channels::default();
        conf.last_n = Some(10);
        conf.audio_packet_delay = Some(60);
        builder.set_channels_conf(conf);

        assert!(builder.add_allocate_channels_request(AllocateParams::new(
            "alice".into(),
            audio_video_contents(),
        )));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let audio = &request.content("audio").unwrap().channels()[0];
        let video = &request.content("video").unwrap().channels()[0];
        assert_eq!(audio.packet_delay, Some(60));
        assert_eq!(video.packet_delay, None);
        assert_eq!(audio.last_n, Some(10));
        assert_eq!(video.last_n, Some(10));
    }

    #[test]
    #[should_panic(expected = "reset() before adding")]
    fn mixing_request_kinds_is_rejected() {
        let mut state = allocated_state();
        let mut builder = RequestBuilder::new(&state);

        builder.add_allocate_channels_request(AllocateParams::new(
            "alice".into(),
            Vec::new(),
        ));
        let snapshot = state.clone();
        builder.add_expire_channels_request(&mut state, &snapshot);
    }

    #[test]
    fn expiring_unknown_channels_yields_nothing_to_send() {
        let mut state = allocated_state();
        let mut builder = RequestBuilder::new(&state);

        let mut unknown = Conference::new();
        let mut channel = Channel::new();
        channel.id = Some(ChannelId::from("no-such-channel"));
        unknown.get_or_create_content("audio").push_channel(channel);

        assert!(!builder.add_expire_channels_request(&mut state, &unknown));
        assert!(!builder.has_channels_to_expire());
        assert!(builder.finish("relay.example.com".into()).is_none());
    }

    #[test]
    fn expiring_before_allocation_is_a_noop() {
        let mut state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        let snapshot = state.clone();
        assert!(!builder.add_expire_channels_request(&mut state, &snapshot));
        // The kind is not fixed by a no-op call: the builder is still free
        // to compile a request of any kind.
        assert_eq!(builder.kind(), None);
    }

    #[test]
    fn expiration_removes_channels_from_live_state_eagerly() {
        let mut state = allocated_state();
        let mut builder = RequestBuilder::new(&state);
        let snapshot = state.clone();

        assert!(builder.add_expire_channels_request(&mut state, &snapshot));

        let id = ChannelId::from("42");
        assert!(state.channel("audio", &id).is_none());

        let request = builder.finish("relay.example.com".into()).unwrap();
        let expired = &request.content("audio").unwrap().channels()[0];
        assert_eq!(expired.expire, Some(0));
        assert_eq!(expired.id, Some(id));
    }

    #[test]
    fn updates_before_allocation_are_noops() {
        let state = Conference::new();
        let snapshot = state.clone();
        let mut builder = RequestBuilder::new(&state);

        let mut sources = HashMap::new();
        sources.insert("audio".to_owned(), vec![Source::new(111)]);

        assert!(!builder.add_source_update(&state, &sources, &snapshot));
        assert_eq!(builder.kind(), None);
    }

    #[test]
    fn source_update_with_empty_list_emits_the_clear_marker() {
        let state = allocated_state();
        let snapshot = state.clone();
        let mut builder = RequestBuilder::new(&state);

        let mut sources = HashMap::new();
        sources.insert("audio".to_owned(), Vec::new());

        assert!(builder.add_source_update(&state, &sources, &snapshot));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let channel = &request.content("audio").unwrap().channels()[0];
        assert_eq!(channel.sources, vec![Source::empty()]);
        assert_eq!(channel.id, Some(ChannelId::from("42")));
    }

    #[test]
    fn empty_source_groups_disable_simulcast_on_video_only() {
        let mut state = allocated_state();
        let mut video_channel = Channel::new();
        video_channel.id = Some(ChannelId::from("43"));
        state
            .get_or_create_content("video")
            .push_channel(video_channel);
        let snapshot = state.clone();
        let mut builder = RequestBuilder::new(&state);

        let mut groups = HashMap::new();
        groups.insert("audio".to_owned(), Vec::new());
        assert!(!builder.add_source_group_update(&state, &groups, &snapshot));

        let mut groups = HashMap::new();
        groups.insert("video".to_owned(), Vec::new());
        assert!(builder.add_source_group_update(&state, &groups, &snapshot));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let channel = request
            .content("video")
            .unwrap()
            .channel(&ChannelId::from("43"))
            .unwrap();
        assert_eq!(channel.source_groups, vec![SourceGroup::simulcast()]);
    }

    #[test]
    fn transport_update_describes_the_snapshot_channel() {
        let state = allocated_state();
        let snapshot = state.clone();
        let mut builder = RequestBuilder::new(&state);

        let mut transports = HashMap::new();
        transports.insert(
            "audio".to_owned(),
            Transport {
                ufrag: Some("fresh".to_owned()),
                ..Transport::default()
            },
        );

        assert!(builder.add_transport_update(&state, &transports, &snapshot));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let channel = &request.content("audio").unwrap().channels()[0];
        assert_eq!(channel.id, Some(ChannelId::from("42")));
        assert_eq!(channel.endpoint, Some(EndpointId::from("alice")));
        assert_eq!(
            channel.transport.as_ref().unwrap().ufrag.as_deref(),
            Some("fresh"),
        );
    }

    #[test]
    fn direction_update_targets_the_placeholder_channel() {
        let state = allocated_state();
        let snapshot = state.clone();
        let mut builder = RequestBuilder::new(&state);

        let mut directions = HashMap::new();
        directions.insert("audio".to_owned(), Direction::RecvOnly);

        assert!(builder.add_direction_update(&state, &directions, &snapshot));

        let request = builder.finish("relay.example.com".into()).unwrap();
        let channel = &request.content("audio").unwrap().channels()[0];
        assert_eq!(channel.direction, Direction::RecvOnly);
    }

    #[test]
    #[should_panic(expected = "no channel bundle")]
    fn bundle_transport_update_requires_a_bundle_in_the_snapshot() {
        let state = allocated_state();
        let snapshot = state.clone();
        let mut builder = RequestBuilder::new(&state);

        builder.add_bundle_transport_update(
            &state,
            &Transport::default(),
            &snapshot,
        );
    }

    #[test]
    #[should_panic(expected = "SCTP connection, not an RTP channel")]
    fn placeholder_channels_are_subtype_checked() {
        let mut content = Content::new("data");
        let mut conn = SctpConnection::new();
        conn.id = Some(ChannelId::from("7"));
        content.add_sctp_connection(conn);

        let mut like = Channel::new();
        like.id = Some(ChannelId::from("7"));
        request_rtp_channel(&mut content, &like);
    }

    #[test]
    fn reset_carries_the_conference_identifiers_over() {
        let state = allocated_state();
        let mut builder = RequestBuilder::new(&state);

        builder.add_allocate_channels_request(AllocateParams::new(
            "bob".into(),
            Vec::new(),
        ));
        builder.reset(&state);

        assert_eq!(builder.kind(), None);
        let request = builder.finish("relay.example.com".into()).unwrap();
        assert_eq!(
            request.id().map(ToString::to_string).as_deref(),
            Some("conf-1"),
        );
        assert!(request.contents().is_empty());
        assert!(request.endpoints().is_empty());
    }

    #[test]
    #[should_panic(expected = "destination relay id is empty")]
    fn empty_destination_is_rejected() {
        let state = Conference::new();
        let mut builder = RequestBuilder::new(&state);

        builder.finish("".into());
    }
}
