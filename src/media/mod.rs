//! Media lanes multiplexed onto a single [`MediaConnection`].
//!
//! [`MediaConnection`]: crate::peer::MediaConnection

mod direction;
mod lanes;

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use self::{direction::LaneDirection, lanes::MediaLaneSet};

/// [MediaStreamTrack.kind][1] representation.
///
/// [1]: https://w3.org/TR/mediacapture-streams/#dom-mediastreamtrack-kind
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum MediaKind {
    /// Audio track.
    #[display(fmt = "audio")]
    Audio,

    /// Video track.
    #[display(fmt = "video")]
    Video,
}

/// Media source type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MediaSourceKind {
    /// Media is sourced from some media device (webcam or microphone).
    Device,

    /// Media is obtained with screen-capture.
    Display,
}

/// Independent media lane of a session.
///
/// Every [`Lane`] maps onto exactly one SDP media section.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Lane {
    /// Microphone audio.
    #[display(fmt = "audio")]
    Audio,

    /// Camera video.
    #[display(fmt = "video")]
    Video,

    /// Screen-capture video.
    #[display(fmt = "screenShareVideo")]
    ScreenShareVideo,
}

impl Lane {
    /// All the [`Lane`]s in the order their SDP media sections are offered.
    pub const ALL: [Lane; 3] =
        [Lane::Audio, Lane::Video, Lane::ScreenShareVideo];

    /// Returns [`MediaKind`] carried by this [`Lane`].
    #[inline]
    pub fn kind(self) -> MediaKind {
        match self {
            Self::Audio => MediaKind::Audio,
            Self::Video | Self::ScreenShareVideo => MediaKind::Video,
        }
    }

    /// Returns [`MediaSourceKind`] feeding this [`Lane`].
    #[inline]
    pub fn source_kind(self) -> MediaSourceKind {
        match self {
            Self::Audio | Self::Video => MediaSourceKind::Device,
            Self::ScreenShareVideo => MediaSourceKind::Display,
        }
    }

    /// Returns stable SDP `mid` used for this [`Lane`] in local offers.
    #[inline]
    pub fn mid(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::ScreenShareVideo => "screen",
        }
    }
}
