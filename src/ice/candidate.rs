//! ICE candidates and their [RFC 8839] SDP grammar.
//!
//! [RFC 8839]: https://tools.ietf.org/html/rfc8839#section-5.1

use std::{fmt, net::IpAddr, str::FromStr};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// ICE candidate as it is exchanged over signalling.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IceCandidate {
    /// `candidate:` line of this [`IceCandidate`].
    pub candidate: String,

    /// SDP `mid` of the media section this [`IceCandidate`] belongs to.
    #[serde(default, alias = "sdpMid")]
    pub sdp_mid: Option<String>,

    /// Index of the SDP media section this [`IceCandidate`] belongs to.
    #[serde(default, alias = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    /// Creates new [`IceCandidate`] bound to the first bundled media section.
    pub fn new(candidate: String, sdp_mid: Option<String>) -> Self {
        Self {
            candidate,
            sdp_mid,
            sdp_m_line_index: Some(0),
        }
    }
}

/// Maximum [RFC 8445] candidate priority.
///
/// [RFC 8445]: https://tools.ietf.org/html/rfc8445#section-5.1.2
pub const MAX_PRIORITY: u32 = (1 << 31) - 1;

/// Error of parsing a [`Candidate`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum CandidateParseError {
    /// Candidate line has less fields than required.
    #[display(fmt = "candidate has {} fields, at least 8 required", _0)]
    NotEnoughFields(usize),

    /// Component ID is not a number in `1..=256` range.
    #[display(fmt = "invalid component ID: {}", _0)]
    InvalidComponent(String),

    /// Unknown transport protocol.
    #[display(fmt = "invalid transport: {}", _0)]
    InvalidTransport(String),

    /// Priority is not a number in `1..=2^31-1` range.
    #[display(fmt = "invalid priority: {}", _0)]
    InvalidPriority(String),

    /// Connection address is neither an IP address nor an mDNS name.
    #[display(fmt = "invalid address: {}", _0)]
    InvalidAddress(String),

    /// Port is not a 16-bit number.
    #[display(fmt = "invalid port: {}", _0)]
    InvalidPort(String),

    /// `typ` keyword is missing.
    #[display(fmt = "`typ` keyword is missing")]
    MissingType,

    /// Unknown candidate type.
    #[display(fmt = "invalid candidate type: {}", _0)]
    InvalidType(String),
}

/// Type of a [`Candidate`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum CandidateType {
    /// Candidate obtained from a local interface.
    #[display(fmt = "host")]
    Host,

    /// Candidate learned from a peer during connectivity checks.
    #[display(fmt = "prflx")]
    PeerReflexive,

    /// Candidate obtained from a STUN server.
    #[display(fmt = "srflx")]
    ServerReflexive,

    /// Candidate allocated on a TURN server.
    #[display(fmt = "relay")]
    Relay,
}

impl CandidateType {
    /// Returns [RFC 8445] recommended type preference.
    ///
    /// [RFC 8445]: https://tools.ietf.org/html/rfc8445#section-5.1.2.2
    pub fn type_preference(self) -> u8 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::ServerReflexive => 100,
            Self::Relay => 0,
        }
    }
}

impl FromStr for CandidateType {
    type Err = CandidateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "host" => Self::Host,
            "prflx" => Self::PeerReflexive,
            "srflx" => Self::ServerReflexive,
            "relay" => Self::Relay,
            _ => return Err(CandidateParseError::InvalidType(s.to_owned())),
        })
    }
}

/// Transport protocol of a [`Candidate`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum TransportProtocol {
    #[display(fmt = "UDP")]
    Udp,

    #[display(fmt = "TCP")]
    Tcp,
}

/// Parsed ICE candidate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub foundation: String,
    pub component: u16,
    pub transport: TransportProtocol,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub kind: CandidateType,

    /// `raddr`/`rport` of reflexive and relayed candidates.
    pub related: Option<(String, u16)>,

    /// Trailing `<name> <value>` extension pairs, preserved verbatim.
    pub extensions: Vec<(String, String)>,
}

impl Candidate {
    /// Calculates [RFC 8445] candidate priority.
    ///
    /// [RFC 8445]: https://tools.ietf.org/html/rfc8445#section-5.1.2.1
    ///
    /// Components above `256` are treated as `256`.
    pub fn calculate_priority(
        type_preference: u8,
        local_preference: u16,
        component: u16,
    ) -> u32 {
        (u32::from(type_preference) << 24)
            + (u32::from(local_preference) << 8)
            + (256 - u32::from(component.min(256)))
    }

    /// Returns the `ip:port` transport address of this [`Candidate`].
    pub fn transport_address(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.address, self.port),
        }
    }
}

impl FromStr for Candidate {
    type Err = CandidateParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        use CandidateParseError as E;

        let line = line.trim();
        let line = line.strip_prefix("a=").unwrap_or(line);
        let line = line.strip_prefix("candidate:").unwrap_or(line);

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            return Err(E::NotEnoughFields(parts.len()));
        }

        let component = parts[1]
            .parse::<u16>()
            .ok()
            .filter(|c| (1..=256).contains(c))
            .ok_or_else(|| E::InvalidComponent(parts[1].to_owned()))?;
        let transport = match parts[2].to_ascii_lowercase().as_str() {
            "udp" => TransportProtocol::Udp,
            "tcp" => TransportProtocol::Tcp,
            _ => return Err(E::InvalidTransport(parts[2].to_owned())),
        };
        let priority = parts[3]
            .parse::<u32>()
            .ok()
            .filter(|p| (1..=MAX_PRIORITY).contains(p))
            .ok_or_else(|| E::InvalidPriority(parts[3].to_owned()))?;
        let address = parts[4];
        if address.parse::<IpAddr>().is_err() && !address.ends_with(".local")
        {
            return Err(E::InvalidAddress(address.to_owned()));
        }
        let port = parts[5]
            .parse()
            .map_err(|_| E::InvalidPort(parts[5].to_owned()))?;
        if parts[6] != "typ" {
            return Err(E::MissingType);
        }
        let kind = parts[7].parse()?;

        let mut raddr = None;
        let mut rport = None;
        let mut extensions = Vec::new();
        for pair in parts[8..].chunks(2) {
            match pair {
                ["raddr", addr] => raddr = Some((*addr).to_owned()),
                ["rport", port] => {
                    rport = Some(
                        port.parse::<u16>()
                            .map_err(|_| E::InvalidPort((*port).to_owned()))?,
                    );
                }
                [name, value] => {
                    extensions.push(((*name).to_owned(), (*value).to_owned()));
                }
                // Dangling name without value is ignored.
                _ => {}
            }
        }

        Ok(Self {
            foundation: parts[0].to_owned(),
            component,
            transport,
            priority,
            address: address.to_owned(),
            port,
            kind,
            related: raddr.zip(rport),
            extensions,
        })
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.kind,
        )?;
        if let Some((addr, port)) = &self.related {
            write!(f, " raddr {} rport {}", addr, port)?;
        }
        for (name, value) in &self.extensions {
            write!(f, " {} {}", name, value)?;
        }
        Ok(())
    }
}
