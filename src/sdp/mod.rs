//! [SDP] model, its parsing and serialization.
//!
//! Only the subset of [RFC 8866] needed for offer/answer negotiation is
//! interpreted. Everything else is preserved verbatim, so a parsed
//! [`SessionDescription`] serializes back into an equivalent text.
//!
//! [SDP]: https://webrtcglossary.com/sdp
//! [RFC 8866]: https://tools.ietf.org/html/rfc8866

mod munging;

use std::{fmt, str::FromStr};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::media::{Lane, LaneDirection, MediaKind};

#[doc(inline)]
pub use self::munging::SdpMungingPolicy;

/// Line separator of a serialized SDP.
const CRLF: &str = "\r\n";

/// ID of a negotiation round (single offer/answer cycle).
///
/// Grows monotonically within a single [`MediaConnection`].
///
/// [`MediaConnection`]: crate::peer::MediaConnection
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct RoundId(pub u64);

/// Type of an [`SdpBlob`].
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    #[display(fmt = "offer")]
    Offer,

    #[display(fmt = "answer")]
    Answer,
}

/// SDP text exchanged with the remote side, tagged with the negotiation round
/// it belongs to.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SdpBlob {
    /// Negotiation round of this [`SdpBlob`].
    pub round: RoundId,

    /// Whether this [`SdpBlob`] is an offer or an answer.
    #[serde(rename = "type")]
    pub kind: SdpType,

    /// Raw SDP text.
    pub sdp: String,
}

/// Error of parsing a [`SessionDescription`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SdpParseError {
    /// SDP has no lines at all.
    #[display(fmt = "SDP is empty")]
    Empty,

    /// First line is not `v=0`.
    #[display(fmt = "SDP must start with `v=0`")]
    InvalidVersion,

    /// Line is not of `<type>=<value>` form.
    #[display(fmt = "invalid SDP line {}: `{}`", _0, _1)]
    InvalidLine(usize, String),

    /// `o=` line is absent.
    #[display(fmt = "SDP has no `o=` line")]
    MissingOrigin,

    /// `o=` line is malformed.
    #[display(fmt = "invalid `o=` line: `{}`", _0)]
    InvalidOrigin(String),

    /// `m=` line is malformed.
    #[display(fmt = "invalid `m=` line: `{}`", _0)]
    InvalidMedia(String),
}

/// Generic SDP line preserved verbatim.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Line {
    pub kind: char,
    pub value: String,
}

/// `a=<name>[:<value>]` line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    /// Creates new flag [`Attribute`] without a value.
    pub fn flag<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Creates new [`Attribute`] with the provided value.
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.find(':') {
            Some(i) => Self::new(&raw[..i], &raw[i + 1..]),
            None => Self::flag(raw),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "a={}:{}", self.name, value),
            None => write!(f, "a={}", self.name),
        }
    }
}

/// Set of helpers shared by the session and media levels.
trait Attributes {
    fn attrs(&self) -> &[Attribute];

    /// Returns value of the first [`Attribute`] with the provided name.
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs()
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    /// Indicates whether an [`Attribute`] with the provided name exists.
    fn has_attribute(&self, name: &str) -> bool {
        self.attrs().iter().any(|a| a.name == name)
    }
}

/// `o=` line of a [`SessionDescription`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub address: String,
}

impl FromStr for Origin {
    type Err = SdpParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || SdpParseError::InvalidOrigin(value.to_owned());

        let parts: Vec<_> = value.split_whitespace().collect();
        if parts.len() != 6 || parts[3] != "IN" {
            return Err(invalid());
        }
        Ok(Self {
            username: parts[0].to_owned(),
            session_id: parts[1].parse().map_err(|_| invalid())?,
            session_version: parts[2].parse().map_err(|_| invalid())?,
            address: parts[5].to_owned(),
        })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr_type = if self.address.contains(':') {
            "IP6"
        } else {
            "IP4"
        };
        write!(
            f,
            "o={} {} {} IN {} {}",
            self.username,
            self.session_id,
            self.session_version,
            addr_type,
            self.address,
        )
    }
}

/// `m=` section of a [`SessionDescription`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MediaSection {
    /// Media type (`audio`, `video`, `application`, etc).
    pub media: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<String>,

    /// `c=` line value.
    pub connection: Option<String>,

    /// Lines other than `c=` and `a=`, preserved verbatim.
    pub lines: Vec<Line>,
    pub attributes: Vec<Attribute>,
}

impl Attributes for MediaSection {
    fn attrs(&self) -> &[Attribute] {
        &self.attributes
    }
}

impl MediaSection {
    /// Creates new [`MediaSection`] carrying the provided [`Lane`].
    ///
    /// Uses the discard port `9` and a single default codec.
    pub fn for_lane(lane: Lane, direction: LaneDirection) -> Self {
        let mut attributes = vec![
            Attribute::new("mid", lane.mid()),
            Attribute::flag(direction.as_sdp_attribute()),
            Attribute::flag("rtcp-mux"),
        ];
        let format = match lane.kind() {
            MediaKind::Audio => {
                attributes.push(Attribute::new("rtpmap", "111 opus/48000/2"));
                attributes.push(Attribute::new(
                    "fmtp",
                    "111 minptime=10;useinbandfec=1",
                ));
                "111"
            }
            MediaKind::Video => {
                attributes.push(Attribute::new("rtpmap", "96 VP8/90000"));
                attributes.push(Attribute::new("rtcp-fb", "96 nack"));
                attributes.push(Attribute::new("rtcp-fb", "96 nack pli"));
                "96"
            }
        };
        if lane == Lane::ScreenShareVideo {
            attributes.push(Attribute::new("content", "slides"));
        }
        Self {
            media: lane.kind().to_string(),
            port: 9,
            protocol: "UDP/TLS/RTP/SAVPF".to_owned(),
            formats: vec![format.to_owned()],
            connection: Some("IN IP4 0.0.0.0".to_owned()),
            lines: Vec::new(),
            attributes,
        }
    }

    /// Returns value of the first [`Attribute`] with the provided name.
    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        Attributes::attribute(self, name)
    }

    /// Indicates whether an [`Attribute`] with the provided name exists.
    #[inline]
    pub fn has_attribute(&self, name: &str) -> bool {
        Attributes::has_attribute(self, name)
    }

    /// Returns `a=mid` of this [`MediaSection`].
    #[inline]
    pub fn mid(&self) -> Option<&str> {
        self.attribute("mid")
    }

    /// Returns [`MediaKind`] of this [`MediaSection`], if it is a supported
    /// one.
    pub fn kind(&self) -> Option<MediaKind> {
        match self.media.as_str() {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Returns [`Lane`] this [`MediaSection`] describes.
    ///
    /// Screen-share video is told apart by its `a=content:slides` attribute.
    pub fn lane(&self) -> Option<Lane> {
        Some(match self.kind()? {
            MediaKind::Audio => Lane::Audio,
            MediaKind::Video if self.attribute("content") == Some("slides") => {
                Lane::ScreenShareVideo
            }
            MediaKind::Video => Lane::Video,
        })
    }

    /// Returns [`LaneDirection`] declared by this [`MediaSection`].
    ///
    /// Defaults to `sendrecv` if no direction attribute is present.
    pub fn direction(&self) -> LaneDirection {
        self.attributes
            .iter()
            .filter(|a| a.value.is_none())
            .find_map(|a| LaneDirection::from_sdp_attribute(&a.name))
            .unwrap_or_else(LaneDirection::all)
    }

    /// Replaces direction attribute of this [`MediaSection`].
    pub fn set_direction(&mut self, direction: LaneDirection) {
        let new = Attribute::flag(direction.as_sdp_attribute());
        let existing = self.attributes.iter_mut().find(|a| {
            a.value.is_none()
                && LaneDirection::from_sdp_attribute(&a.name).is_some()
        });
        match existing {
            Some(attr) => *attr = new,
            None => self.attributes.push(new),
        }
    }

    /// Returns `a=candidate` lines of this [`MediaSection`].
    pub fn candidates(&self) -> impl Iterator<Item = String> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.name == "candidate")
            .filter_map(|a| a.value.as_ref())
            .map(|v| format!("candidate:{}", v))
    }

    fn parse_media_line(value: &str) -> Result<Self, SdpParseError> {
        let invalid = || SdpParseError::InvalidMedia(value.to_owned());

        let parts: Vec<_> = value.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(invalid());
        }
        // Port may carry `/<number of ports>` suffix.
        let port = parts[1]
            .split('/')
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        Ok(Self {
            media: parts[0].to_owned(),
            port,
            protocol: parts[2].to_owned(),
            formats: parts[3..].iter().map(|f| (*f).to_owned()).collect(),
            connection: None,
            lines: Vec::new(),
            attributes: Vec::new(),
        })
    }
}

impl fmt::Display for MediaSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m={} {} {} {}{}",
            self.media,
            self.port,
            self.protocol,
            self.formats.join(" "),
            CRLF,
        )?;
        if let Some(conn) = &self.connection {
            write!(f, "c={}{}", conn, CRLF)?;
        }
        for line in &self.lines {
            write!(f, "{}={}{}", line.kind, line.value, CRLF)?;
        }
        for attr in &self.attributes {
            write!(f, "{}{}", attr, CRLF)?;
        }
        Ok(())
    }
}

/// Parsed [SDP] session description.
///
/// [SDP]: https://webrtcglossary.com/sdp
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionDescription {
    pub origin: Origin,
    pub session_name: String,

    /// `t=` line value.
    pub timing: String,

    /// Session-level lines other than `v=`, `o=`, `s=`, `t=` and `a=`,
    /// preserved verbatim.
    pub lines: Vec<Line>,
    pub attributes: Vec<Attribute>,
    pub media: Vec<MediaSection>,
}

impl Attributes for SessionDescription {
    fn attrs(&self) -> &[Attribute] {
        &self.attributes
    }
}

impl SessionDescription {
    /// Creates new [`SessionDescription`] without any [`MediaSection`]s.
    pub fn new(session_id: u64, session_version: u64) -> Self {
        Self {
            origin: Origin {
                username: "-".to_owned(),
                session_id,
                session_version,
                address: "127.0.0.1".to_owned(),
            },
            session_name: "-".to_owned(),
            timing: "0 0".to_owned(),
            lines: Vec::new(),
            attributes: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Returns value of the first session-level [`Attribute`] with the
    /// provided name.
    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        Attributes::attribute(self, name)
    }

    /// Returns the first value of the provided [`Attribute`] looking at the
    /// session level first and then at every [`MediaSection`].
    fn lookup(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .or_else(|| self.media.iter().find_map(|m| m.attribute(name)))
    }

    /// Returns `(ice-ufrag, ice-pwd)` of this [`SessionDescription`].
    pub fn ice_credentials(&self) -> Option<(&str, &str)> {
        Some((self.lookup("ice-ufrag")?, self.lookup("ice-pwd")?))
    }

    /// Indicates whether this [`SessionDescription`] declares that no more
    /// candidates will be sent.
    pub fn end_of_candidates(&self) -> bool {
        self.has_attribute("end-of-candidates")
            || self.media.iter().any(|m| m.has_attribute("end-of-candidates"))
    }

    #[inline]
    fn has_attribute(&self, name: &str) -> bool {
        Attributes::has_attribute(self, name)
    }

    /// Returns `mid`s listed in the `BUNDLE` group of this
    /// [`SessionDescription`].
    pub fn bundle(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.name == "group")
            .filter_map(|a| a.value.as_deref())
            .find_map(|group| {
                let mut mids = group.split_whitespace();
                if mids.next() == Some("BUNDLE") {
                    Some(mids.collect())
                } else {
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Indicates whether the provided [`MediaSection`] of this
    /// [`SessionDescription`] is rejected.
    ///
    /// A section is rejected if its port is `0` and it is not listed in the
    /// `BUNDLE` group. Munged sections have port `0` while bundled.
    pub fn is_rejected(&self, section: &MediaSection) -> bool {
        let bundled = section
            .mid()
            .map_or(false, |mid| self.bundle().contains(&mid));
        section.port == 0 && !bundled
    }

    /// Returns all the `a=candidate` lines of this [`SessionDescription`],
    /// each paired with the `mid` of the [`MediaSection`] it belongs to.
    pub fn candidates(&self) -> Vec<(Option<String>, String)> {
        self.media
            .iter()
            .flat_map(|m| {
                let mid = m.mid().map(ToOwned::to_owned);
                m.candidates().map(move |c| (mid.clone(), c))
            })
            .collect()
    }
}

impl FromStr for SessionDescription {
    type Err = SdpParseError;

    fn from_str(sdp: &str) -> Result<Self, Self::Err> {
        use SdpParseError as E;

        let mut lines = sdp
            .lines()
            .map(str::trim_end)
            .enumerate()
            .filter(|(_, l)| !l.is_empty())
            .peekable();

        match lines.next() {
            None => return Err(E::Empty),
            Some((_, "v=0")) => {}
            Some(_) => return Err(E::InvalidVersion),
        }

        let mut origin = None;
        let mut session_name = "-".to_owned();
        let mut timing = "0 0".to_owned();
        let mut session_lines = Vec::new();
        let mut attributes = Vec::new();
        let mut media: Vec<MediaSection> = Vec::new();

        for (n, line) in lines {
            let mut split = line.splitn(2, '=');
            let kind = split.next().filter(|k| k.len() == 1);
            let value = split.next();
            let (kind, value) = match kind.zip(value) {
                Some((k, v)) => (k.chars().next().unwrap_or_default(), v),
                None => return Err(E::InvalidLine(n + 1, line.to_owned())),
            };

            if kind == 'm' {
                media.push(MediaSection::parse_media_line(value)?);
                continue;
            }
            match media.last_mut() {
                Some(m) => match kind {
                    'a' => m.attributes.push(Attribute::parse(value)),
                    'c' => m.connection = Some(value.to_owned()),
                    _ => m.lines.push(Line {
                        kind,
                        value: value.to_owned(),
                    }),
                },
                None => match kind {
                    'o' => origin = Some(value.parse()?),
                    's' => session_name = value.to_owned(),
                    't' => timing = value.to_owned(),
                    'a' => attributes.push(Attribute::parse(value)),
                    _ => session_lines.push(Line {
                        kind,
                        value: value.to_owned(),
                    }),
                },
            }
        }

        Ok(Self {
            origin: origin.ok_or(E::MissingOrigin)?,
            session_name,
            timing,
            lines: session_lines,
            attributes,
            media,
        })
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v=0{}", CRLF)?;
        write!(f, "{}{}", self.origin, CRLF)?;
        write!(f, "s={}{}", self.session_name, CRLF)?;
        for line in &self.lines {
            write!(f, "{}={}{}", line.kind, line.value, CRLF)?;
        }
        write!(f, "t={}{}", self.timing, CRLF)?;
        for attr in &self.attributes {
            write!(f, "{}{}", attr, CRLF)?;
        }
        for m in &self.media {
            write!(f, "{}", m)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_OFFER: &str = "v=0\r\n\
        o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        a=group:BUNDLE 0 1 2\r\n\
        a=ice-options:trickle\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111 103\r\n\
        c=IN IP4 0.0.0.0\r\n\
        b=AS:64\r\n\
        a=ice-ufrag:EsAw\r\n\
        a=ice-pwd:bP+XJMM09aR8AiX1jdukzR6Y\r\n\
        a=mid:0\r\n\
        a=sendrecv\r\n\
        a=rtcp-mux\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host\r\n\
        m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=mid:1\r\n\
        a=recvonly\r\n\
        a=rtpmap:96 VP8/90000\r\n\
        m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=mid:2\r\n\
        a=sendonly\r\n\
        a=content:slides\r\n\
        a=end-of-candidates\r\n";

    #[test]
    fn parses_browser_offer() {
        let sdp: SessionDescription = CHROME_OFFER.parse().unwrap();

        assert_eq!(sdp.origin.session_id, 4_611_731_400_430_051_336);
        assert_eq!(sdp.origin.session_version, 2);
        assert_eq!(sdp.attribute("group"), Some("BUNDLE 0 1 2"));
        assert_eq!(sdp.media.len(), 3);

        let audio = &sdp.media[0];
        assert_eq!(audio.lane(), Some(Lane::Audio));
        assert_eq!(audio.formats, vec!["111", "103"]);
        assert_eq!(audio.direction(), LaneDirection::all());
        assert_eq!(audio.lines[0].value, "AS:64");

        assert_eq!(sdp.media[1].lane(), Some(Lane::Video));
        assert_eq!(sdp.media[1].direction(), LaneDirection::RECV);
        assert_eq!(sdp.media[2].lane(), Some(Lane::ScreenShareVideo));
        assert_eq!(sdp.media[2].direction(), LaneDirection::SEND);

        assert_eq!(
            sdp.ice_credentials(),
            Some(("EsAw", "bP+XJMM09aR8AiX1jdukzR6Y")),
        );
        assert!(sdp.end_of_candidates());
        assert_eq!(
            sdp.candidates(),
            vec![(
                Some("0".to_owned()),
                "candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host"
                    .to_owned(),
            )],
        );
    }

    #[test]
    fn serializes_back_unchanged() {
        let sdp: SessionDescription = CHROME_OFFER.parse().unwrap();

        assert_eq!(sdp.to_string(), CHROME_OFFER);
    }

    #[test]
    fn accepts_lf_line_endings() {
        let sdp: SessionDescription = CHROME_OFFER
            .replace("\r\n", "\n")
            .parse()
            .unwrap();

        assert_eq!(sdp.media.len(), 3);
    }

    #[test]
    fn rejects_malformed_sdp() {
        use SdpParseError as E;

        for (sdp, err) in &[
            ("", E::Empty),
            ("\r\n\r\n", E::Empty),
            ("v=1\r\n", E::InvalidVersion),
            ("hello world", E::InvalidVersion),
            ("v=0\r\ns=-\r\n", E::MissingOrigin),
            (
                "v=0\r\no=- 1 1 IN IP4\r\n",
                E::InvalidOrigin("- 1 1 IN IP4".to_owned()),
            ),
            (
                "v=0\r\no=- x 1 IN IP4 127.0.0.1\r\n",
                E::InvalidOrigin("- x 1 IN IP4 127.0.0.1".to_owned()),
            ),
            (
                "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\nm=audio\r\n",
                E::InvalidMedia("audio".to_owned()),
            ),
            (
                "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\nm=audio x RTP 0\r\n",
                E::InvalidMedia("audio x RTP 0".to_owned()),
            ),
            (
                "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ngarbage\r\n",
                E::InvalidLine(3, "garbage".to_owned()),
            ),
        ] {
            assert_eq!(sdp.parse::<SessionDescription>().unwrap_err(), *err);
        }
    }

    #[test]
    fn lane_sections() {
        let audio = MediaSection::for_lane(Lane::Audio, LaneDirection::SEND);
        assert_eq!(audio.media, "audio");
        assert_eq!(audio.mid(), Some("audio"));
        assert_eq!(audio.direction(), LaneDirection::SEND);
        assert_eq!(audio.lane(), Some(Lane::Audio));

        let screen = MediaSection::for_lane(
            Lane::ScreenShareVideo,
            LaneDirection::RECV,
        );
        assert_eq!(screen.media, "video");
        assert_eq!(screen.lane(), Some(Lane::ScreenShareVideo));
        assert_eq!(screen.direction(), LaneDirection::RECV);
    }

    #[test]
    fn rejected_sections_are_out_of_bundle() {
        let sdp: SessionDescription = CHROME_OFFER
            .replace("BUNDLE 0 1 2", "BUNDLE 0 1")
            .replace(" 9 UDP", " 0 UDP")
            .parse()
            .unwrap();

        assert_eq!(sdp.bundle(), vec!["0", "1"]);
        assert!(!sdp.is_rejected(&sdp.media[0]));
        assert!(!sdp.is_rejected(&sdp.media[1]));
        assert!(sdp.is_rejected(&sdp.media[2]));

        let mut sdp = sdp;
        sdp.attributes.retain(|a| a.name != "group");
        sdp.media[0].port = 9;
        assert!(sdp.bundle().is_empty());
        assert!(!sdp.is_rejected(&sdp.media[0]));
        assert!(sdp.is_rejected(&sdp.media[1]));
    }

    #[test]
    fn replaces_direction() {
        let mut video =
            MediaSection::for_lane(Lane::Video, LaneDirection::all());

        video.set_direction(LaneDirection::NONE);
        video.port = 0;

        assert_eq!(video.direction(), LaneDirection::NONE);
        assert_eq!(
            video.attributes.iter().filter(|a| a.name == "inactive").count(),
            1,
        );
        assert!(!video.has_attribute("sendrecv"));
    }

    #[test]
    fn blob_wire_format() {
        let blob = SdpBlob {
            round: RoundId(3),
            kind: SdpType::Offer,
            sdp: "v=0".to_owned(),
        };

        let json = serde_json::to_value(&blob).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"round": 3, "type": "offer", "sdp": "v=0"}),
        );
        assert_eq!(serde_json::from_value::<SdpBlob>(json).unwrap(), blob);
    }
}
