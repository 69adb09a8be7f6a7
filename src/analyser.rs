//! Folding of relay responses back into conference state.
//!
//! The analyser owns no state: it mutates the same [`Conference`] document
//! the [`RequestBuilder`] compiles requests against. Allocation responses
//! must be folded in before any update or expire request referencing the
//! newly assigned channel ids is built.
//!
//! [`RequestBuilder`]: crate::builder::RequestBuilder

use crate::{
    log::prelude::*,
    proto::{Conference, ContentDescription, EndpointId},
};

/// Folds a channel allocation response into the conference state.
///
/// The relay-assigned conference id is recorded on first use; the relay's
/// origin is recorded as the state's `from`. Every returned content,
/// channel, connection and endpoint is appended to the state — the relay is
/// the source of truth for what exists now, so no deduplication beyond the
/// append is attempted.
///
/// # Panics
///
/// If the response carries no conference id, or carries one different from
/// the id already assigned to `state`. Either indicates responses of two
/// different conferences being mixed up by the caller.
pub fn apply_allocation_response(
    state: &mut Conference,
    response: Conference,
) {
    let response_id = match response.id() {
        Some(id) => id.clone(),
        None => panic!("allocation response carries no conference id"),
    };
    match state.id() {
        None => state.set_id(response_id),
        Some(current) => {
            if *current != response_id {
                panic!(
                    "allocation response of conference '{}' fed into \
                     conference '{}'",
                    response_id, current,
                );
            }
        }
    }

    if let Some(from) = response.from() {
        state.set_from(Some(from.clone()));
    }

    for content in response.contents {
        let state_content = state.get_or_create_content(&content.name);
        for channel in content.channels {
            state_content.push_channel(channel);
        }
        for conn in content.sctp_connections {
            state_content.push_sctp_connection(conn);
        }
    }

    for endpoint in response.endpoints {
        state.add_endpoint(endpoint);
    }
}

/// Extracts from a full allocation response the subset relevant to one
/// peer: the channels and connections of the contents the peer originally
/// requested, plus the peer's endpoint record.
///
/// The peer's endpoint id is determined by inspecting the endpoint
/// attribute of the extracted channels — the first declared value wins. A
/// second, different value is an inconsistency in the response: it is
/// logged and the first value is kept.
///
/// Pure function: neither the response nor any conference state is mutated.
#[must_use]
pub fn response_contents(
    response: &Conference,
    contents: &[ContentDescription],
) -> Conference {
    let mut result = Conference::new();
    if let Some(id) = response.id() {
        result.set_id(id.clone());
    }
    if let Some(from) = response.from() {
        result.set_from(Some(from.clone()));
    }

    let mut endpoint_id: Option<EndpointId> = None;
    let note_endpoint = |endpoint_id: &mut Option<EndpointId>,
                             declared: &Option<EndpointId>| {
        let declared = match declared {
            Some(declared) => declared,
            None => return,
        };
        match endpoint_id {
            None => *endpoint_id = Some(declared.clone()),
            Some(first) if first != declared => warn!(
                "inconsistent endpoint ids in allocation response: '{}' \
                 and '{}'; keeping the first",
                first, declared,
            ),
            Some(_) => {}
        }
    };

    for description in contents {
        let content_name = description.kind.as_str();
        let content = match response.content(content_name) {
            Some(content) => content,
            None => continue,
        };

        let result_content = result.get_or_create_content(content_name);
        for channel in content.channels() {
            note_endpoint(&mut endpoint_id, &channel.endpoint);
            result_content.push_channel(channel.clone());
        }
        for conn in content.sctp_connections() {
            note_endpoint(&mut endpoint_id, &conn.endpoint);
            result_content.push_sctp_connection(conn.clone());
        }
    }

    if let Some(id) = &endpoint_id {
        if let Some(endpoint) = response.endpoint(id) {
            result.add_endpoint(endpoint.clone());
        }
    }

    result
}

#[cfg(test)]
mod analyser_specs {
    use super::*;

    use crate::proto::{
        Channel, ChannelId, Endpoint, MediaKind, SctpConnection,
    };

    fn allocation_response(conference_id: &str) -> Conference {
        let mut response = Conference::new();
        response.set_id(conference_id.into());
        response.set_from(Some("relay.example.com".into()));
        let content = response.get_or_create_content("audio");
        let mut channel = Channel::new();
        channel.id = Some(ChannelId::from("42"));
        channel.endpoint = Some("alice".into());
        content.push_channel(channel);
        response.add_endpoint(Endpoint::new(
            "alice".into(),
            Some("alice-stats".to_owned()),
        ));
        response
    }

    #[test]
    fn first_response_assigns_the_conference_id() {
        let mut state = Conference::new();

        apply_allocation_response(&mut state, allocation_response("conf-1"));

        assert_eq!(
            state.id().map(ToString::to_string).as_deref(),
            Some("conf-1"),
        );
        assert_eq!(
            state.from().map(ToString::to_string).as_deref(),
            Some("relay.example.com"),
        );
        let channel =
            state.channel("audio", &ChannelId::from("42")).unwrap();
        assert_eq!(channel.endpoint, Some("alice".into()));
        assert_eq!(state.endpoints().len(), 1);
    }

    #[test]
    #[should_panic(expected = "fed into conference")]
    fn mismatched_conference_id_is_rejected() {
        let mut state = Conference::new();
        state.set_id("conf-1".into());

        apply_allocation_response(&mut state, allocation_response("conf-2"));
    }

    #[test]
    fn repeated_responses_append_channels() {
        let mut state = Conference::new();

        apply_allocation_response(&mut state, allocation_response("conf-1"));
        let mut second = allocation_response("conf-1");
        second
            .content_mut("audio")
            .unwrap()
            .channel_mut(&ChannelId::from("42"))
            .unwrap()
            .id = Some(ChannelId::from("43"));
        apply_allocation_response(&mut state, second);

        assert_eq!(state.content("audio").unwrap().channels().len(), 2);
    }

    #[test]
    fn peer_subset_carries_its_contents_and_endpoint() {
        let mut response = allocation_response("conf-1");
        let video = response.get_or_create_content("video");
        let mut channel = Channel::new();
        channel.id = Some(ChannelId::from("77"));
        channel.endpoint = Some("alice".into());
        video.push_channel(channel);
        let data = response.get_or_create_content("data");
        let mut conn = SctpConnection::new();
        conn.id = Some(ChannelId::from("99"));
        conn.endpoint = Some("bob".into());
        data.push_sctp_connection(conn);

        let peer_contents = vec![
            ContentDescription::new(MediaKind::Audio),
            ContentDescription::new(MediaKind::Video),
        ];
        let subset = response_contents(&response, &peer_contents);

        assert!(subset.content("audio").is_some());
        assert!(subset.content("video").is_some());
        // The peer never asked for the data content.
        assert!(subset.content("data").is_none());
        assert_eq!(subset.endpoints().len(), 1);
        assert_eq!(subset.endpoints()[0].id, EndpointId::from("alice"));
        assert_eq!(
            subset.endpoints()[0].stats_id.as_deref(),
            Some("alice-stats"),
        );
        assert_eq!(
            subset.id().map(ToString::to_string).as_deref(),
            Some("conf-1"),
        );
    }

    #[test]
    fn inconsistent_endpoint_ids_keep_the_first_value() {
        let _guard = slog_scope::set_global_logger(crate::log::new_logger(
            std::io::sink(),
        ));

        let mut response = allocation_response("conf-1");
        let video = response.get_or_create_content("video");
        let mut channel = Channel::new();
        channel.id = Some(ChannelId::from("77"));
        channel.endpoint = Some("mallory".into());
        video.push_channel(channel);

        let peer_contents = vec![
            ContentDescription::new(MediaKind::Audio),
            ContentDescription::new(MediaKind::Video),
        ];
        let subset = response_contents(&response, &peer_contents);

        assert_eq!(subset.endpoints().len(), 1);
        assert_eq!(subset.endpoints()[0].id, EndpointId::from("alice"));
    }
}
