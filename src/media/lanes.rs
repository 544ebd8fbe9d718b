//! [`MediaLaneSet`] and its serialized representation.

use serde::{Deserialize, Serialize};

use super::{Lane, LaneDirection};

/// Set of [`Lane`]s of a session along with their [`LaneDirection`]s.
///
/// [`Lane`] with [`LaneDirection::NONE`] is never offered in SDP.
///
/// Serialized as `{ "send": { "audio": bool, .. }, "receive": { .. } }`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "SendReceive", into = "SendReceive")]
pub struct MediaLaneSet {
    audio: LaneDirection,
    video: LaneDirection,
    screen_share_video: LaneDirection,
}

impl Default for MediaLaneSet {
    #[inline]
    fn default() -> Self {
        Self {
            audio: LaneDirection::NONE,
            video: LaneDirection::NONE,
            screen_share_video: LaneDirection::NONE,
        }
    }
}

impl MediaLaneSet {
    /// Returns new [`MediaLaneSet`] with all the [`Lane`]s disabled.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this [`MediaLaneSet`] with the provided [`LaneDirection`] set
    /// for the given [`Lane`].
    #[inline]
    #[must_use]
    pub fn with(mut self, lane: Lane, direction: LaneDirection) -> Self {
        self.set(lane, direction);
        self
    }

    /// Sets [`LaneDirection`] of the provided [`Lane`].
    pub fn set(&mut self, lane: Lane, direction: LaneDirection) {
        *self.direction_mut(lane) = direction;
    }

    /// Returns [`LaneDirection`] of the provided [`Lane`].
    pub fn direction(&self, lane: Lane) -> LaneDirection {
        match lane {
            Lane::Audio => self.audio,
            Lane::Video => self.video,
            Lane::ScreenShareVideo => self.screen_share_video,
        }
    }

    fn direction_mut(&mut self, lane: Lane) -> &mut LaneDirection {
        match lane {
            Lane::Audio => &mut self.audio,
            Lane::Video => &mut self.video,
            Lane::ScreenShareVideo => &mut self.screen_share_video,
        }
    }

    /// Returns [`Lane`]s that should be offered, in the SDP media section
    /// order.
    pub fn offered(&self) -> impl Iterator<Item = (Lane, LaneDirection)> + '_ {
        Lane::ALL.iter().filter_map(move |lane| {
            let dir = self.direction(*lane);
            if dir.is_empty() {
                None
            } else {
                Some((*lane, dir))
            }
        })
    }

    /// Indicates whether no [`Lane`] is enabled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offered().next().is_none()
    }
}

/// Per-[`Lane`] enable flags.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct LaneFlags {
    audio: bool,
    video: bool,
    #[serde(rename = "screenShareVideo", alias = "screen_share_video")]
    screen_share_video: bool,
}

impl LaneFlags {
    fn get(self, lane: Lane) -> bool {
        match lane {
            Lane::Audio => self.audio,
            Lane::Video => self.video,
            Lane::ScreenShareVideo => self.screen_share_video,
        }
    }

    fn set(&mut self, lane: Lane, enabled: bool) {
        match lane {
            Lane::Audio => self.audio = enabled,
            Lane::Video => self.video = enabled,
            Lane::ScreenShareVideo => self.screen_share_video = enabled,
        }
    }
}

/// Serialized form of a [`MediaLaneSet`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct SendReceive {
    send: LaneFlags,
    #[serde(alias = "recv")]
    receive: LaneFlags,
}

impl From<SendReceive> for MediaLaneSet {
    fn from(flags: SendReceive) -> Self {
        let mut set = Self::new();
        for lane in &Lane::ALL {
            let mut dir = LaneDirection::NONE;
            if flags.send.get(*lane) {
                dir |= LaneDirection::SEND;
            }
            if flags.receive.get(*lane) {
                dir |= LaneDirection::RECV;
            }
            set.set(*lane, dir);
        }
        set
    }
}

impl From<MediaLaneSet> for SendReceive {
    fn from(set: MediaLaneSet) -> Self {
        let mut flags = Self::default();
        for lane in &Lane::ALL {
            let dir = set.direction(*lane);
            flags.send.set(*lane, dir.contains(LaneDirection::SEND));
            flags.receive.set(*lane, dir.contains(LaneDirection::RECV));
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_receive_shape() {
        let lanes: MediaLaneSet = serde_json::from_str(
            r#"{
                "send": {},
                "receive": {
                    "audio": true,
                    "video": true,
                    "screenShareVideo": true
                }
            }"#,
        )
        .unwrap();

        for lane in &Lane::ALL {
            assert_eq!(lanes.direction(*lane), LaneDirection::RECV);
        }
    }

    #[test]
    fn missing_sections_mean_none() {
        let lanes: MediaLaneSet =
            serde_json::from_str(r#"{"send": {"audio": true}}"#).unwrap();

        assert_eq!(lanes.direction(Lane::Audio), LaneDirection::SEND);
        assert_eq!(lanes.direction(Lane::Video), LaneDirection::NONE);
        assert_eq!(lanes.offered().count(), 1);
    }

    #[test]
    fn offered_skips_none_lanes_in_order() {
        let lanes = MediaLaneSet::new()
            .with(Lane::ScreenShareVideo, LaneDirection::SEND)
            .with(Lane::Audio, LaneDirection::all());

        let offered: Vec<_> = lanes.offered().collect();

        assert_eq!(
            offered,
            vec![
                (Lane::Audio, LaneDirection::all()),
                (Lane::ScreenShareVideo, LaneDirection::SEND),
            ]
        );
        assert!(!lanes.is_empty());
        assert!(MediaLaneSet::new().is_empty());
    }

    #[test]
    fn serializes_back_into_send_receive_shape() {
        let lanes = MediaLaneSet::new()
            .with(Lane::Audio, LaneDirection::all())
            .with(Lane::Video, LaneDirection::RECV);

        let json = serde_json::to_value(lanes).unwrap();

        assert_eq!(json["send"]["audio"], true);
        assert_eq!(json["send"]["video"], false);
        assert_eq!(json["receive"]["video"], true);
        assert_eq!(json["receive"]["screenShareVideo"], false);
    }
}
