//! Core of a WebRTC media connection: SDP offer/answer negotiation, [ICE]
//! connectivity, connection lifecycle and bindings of media tracks to
//! negotiated lanes.
//!
//! [ICE]: https://webrtcglossary.com/ice

#[macro_use]
pub mod utils;

pub mod conf;
pub mod events;
pub mod ice;
pub mod log;
pub mod media;
pub mod peer;
pub mod platform;
pub mod sdp;

#[doc(inline)]
pub use self::{
    conf::ConnectionConfig,
    ice::IceCandidate,
    media::{Lane, LaneDirection, MediaLaneSet},
    peer::{ConnectionError, ConnectionState, MediaConnection},
    sdp::{RoundId, SdpBlob, SdpMungingPolicy},
};
