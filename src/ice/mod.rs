//! [ICE] candidates, their pairing and the [`IceAgent`] checking them.
//!
//! [ICE]: https://webrtcglossary.com/ice

mod agent;
mod candidate;
mod check_list;

#[doc(inline)]
pub use self::{
    agent::{
        Connectivity, IceAgent, IceCredentials, IceEvent, LocalIceParameters,
        RemoteIceParameters,
    },
    candidate::{
        Candidate, CandidateParseError, CandidateType, IceCandidate,
        TransportProtocol, MAX_PRIORITY,
    },
    check_list::{pair_priority, CandidatePair, CheckList, PairId, PairState},
};
