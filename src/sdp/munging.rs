//! Declarative transformations of locally generated SDP.

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use super::{Line, SessionDescription};

/// Set of SDP transformations applied to every locally generated offer and
/// answer right before it leaves a [`MediaConnection`].
///
/// Pure and stateless, so the same policy always produces the same output
/// for the same input.
///
/// [`MediaConnection`]: crate::peer::MediaConnection
#[derive(
    Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault,
)]
#[serde(default)]
pub struct SdpMungingPolicy {
    /// Rewrites the placeholder discard port `9` of `m=` lines into `0`.
    ///
    /// Defaults to `false`.
    #[serde(alias = "convertPort9to0")]
    pub convert_port_9_to_0: bool,

    /// Caps video bandwidth with `b=AS:<kbps>` in every video section.
    ///
    /// Defaults to `None` (no cap).
    #[serde(alias = "videoBandwidthKbps")]
    pub video_bandwidth_kbps: Option<u32>,
}

impl SdpMungingPolicy {
    /// Applies all the enabled transformations to the provided
    /// [`SessionDescription`].
    pub fn apply(&self, sdp: &mut SessionDescription) {
        for m in &mut sdp.media {
            if self.convert_port_9_to_0 && m.port == 9 {
                m.port = 0;
            }
            if let Some(kbps) = self.video_bandwidth_kbps {
                if m.media == "video" {
                    m.lines.retain(|l| {
                        !(l.kind == 'b' && l.value.starts_with("AS:"))
                    });
                    m.lines.insert(
                        0,
                        Line {
                            kind: 'b',
                            value: format!("AS:{}", kbps),
                        },
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::media::{Lane, LaneDirection};

    use super::{super::MediaSection, *};

    fn description() -> SessionDescription {
        let mut sdp = SessionDescription::new(1, 1);
        sdp.media
            .push(MediaSection::for_lane(Lane::Audio, LaneDirection::SEND));
        sdp.media
            .push(MediaSection::for_lane(Lane::Video, LaneDirection::RECV));
        sdp
    }

    /// Applies the provided policy to the provided SDP text.
    fn munge(policy: &SdpMungingPolicy, sdp: &str) -> String {
        let mut parsed: SessionDescription = sdp.parse().unwrap();
        policy.apply(&mut parsed);
        parsed.to_string()
    }

    #[test]
    fn disabled_policy_changes_nothing() {
        let mut sdp = description();

        SdpMungingPolicy::default().apply(&mut sdp);

        assert_eq!(sdp, description());
    }

    #[test]
    fn converts_port_9_to_0() {
        let policy = SdpMungingPolicy {
            convert_port_9_to_0: true,
            ..SdpMungingPolicy::default()
        };

        let munged = munge(&policy, &description().to_string());

        assert!(munged.contains("m=audio 0 UDP/TLS/RTP/SAVPF 111\r\n"));
        assert!(munged.contains("m=video 0 UDP/TLS/RTP/SAVPF 96\r\n"));
        assert!(!munged.contains("m=audio 9"));
    }

    #[test]
    fn leaves_real_ports_intact() {
        let policy = SdpMungingPolicy {
            convert_port_9_to_0: true,
            ..SdpMungingPolicy::default()
        };
        let mut sdp = description();
        sdp.media[0].port = 5004;

        policy.apply(&mut sdp);

        assert_eq!(sdp.media[0].port, 5004);
        assert_eq!(sdp.media[1].port, 0);
    }

    #[test]
    fn caps_video_bandwidth_once() {
        let policy = SdpMungingPolicy {
            video_bandwidth_kbps: Some(500),
            ..SdpMungingPolicy::default()
        };

        let once = munge(&policy, &description().to_string());
        let twice = munge(&policy, &once);

        assert_eq!(once, twice);
        assert_eq!(once.matches("b=AS:500").count(), 1);
        assert!(once.contains("m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
                               c=IN IP4 0.0.0.0\r\n\
                               b=AS:500\r\n"));
    }

    #[test]
    fn deserializes_camel_case_keys() {
        let policy: SdpMungingPolicy =
            serde_json::from_str(r#"{"convertPort9to0": true}"#).unwrap();

        assert!(policy.convert_port_9_to_0);
        assert_eq!(policy.video_bandwidth_kbps, None);
    }
}
