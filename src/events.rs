//! Events published by a [`MediaConnection`] through its
//! [`EventPublisher`].
//!
//! [`MediaConnection`]: crate::peer::MediaConnection

use derive_more::Display;
use serde::Serialize;

use crate::{
    media::Lane,
    peer::ConnectionState,
    platform::EventPublisher,
    sdp::SdpBlob,
};

/// Origin of a mute state change.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MuteSource {
    /// Hardware source of a bound track got (un)muted.
    #[display(fmt = "hardware")]
    Hardware,

    /// Track was (un)muted at the session level.
    #[display(fmt = "session")]
    Session,
}

/// Event happened on a [`MediaConnection`].
///
/// [`MediaConnection`]: crate::peer::MediaConnection
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    /// [`ConnectionState`] has changed.
    ConnectionStateChanged {
        previous: ConnectionState,
        current: ConnectionState,
    },

    /// Track bound to a [`Lane`] has been muted or unmuted.
    TrackMuted {
        lane: Lane,
        muted: bool,
        source: MuteSource,
    },

    /// Track bound to a [`Lane`] has ended.
    TrackEnded { lane: Lane },

    /// Queued renegotiation has started and its offer should be sent to the
    /// remote side.
    RenegotiationOffer { offer: SdpBlob },
}

impl Event {
    /// Returns name of this [`Event`] as it is published.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged { .. } => "connectionStateChange",
            Self::TrackMuted { .. } => "trackMute",
            Self::TrackEnded { .. } => "trackEnded",
            Self::RenegotiationOffer { .. } => "renegotiationOffer",
        }
    }

    /// Publishes this [`Event`] with the provided [`EventPublisher`].
    pub fn publish_with(&self, publisher: &dyn EventPublisher) {
        match serde_json::to_value(self) {
            Ok(payload) => publisher.publish(self.name(), payload),
            Err(e) => log::error!(
                "Failed to serialize `{}` event: {}",
                self.name(),
                e,
            ),
        }
    }
}
