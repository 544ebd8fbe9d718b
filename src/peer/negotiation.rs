//! Offer/answer negotiation rounds.

use std::collections::{HashMap, HashSet};

use derive_more::Display;
use tracerr::Traced;

use crate::{
    ice::{
        IceCandidate, IceCredentials, LocalIceParameters, RemoteIceParameters,
    },
    media::{Lane, LaneDirection, MediaLaneSet},
    sdp::{
        Attribute, MediaSection, RoundId, SdpBlob, SdpMungingPolicy,
        SdpParseError, SdpType, SessionDescription,
    },
};

/// Errors of [`NegotiationEngine`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum NegotiationError {
    /// Another negotiation round is in flight.
    #[display(fmt = "Negotiation round {} is already in flight", _0)]
    Conflict(RoundId),

    /// Answer does not belong to the outstanding negotiation round.
    #[display(
        fmt = "Answer of round {} does not match outstanding round {:?}",
        got,
        expected
    )]
    Stale {
        expected: Option<RoundId>,
        got: RoundId,
    },

    /// Remote SDP cannot be parsed or does not match the local one.
    #[display(fmt = "Malformed SDP: {}", _0)]
    Malformed(String),
}

impl From<SdpParseError> for NegotiationError {
    #[inline]
    fn from(err: SdpParseError) -> Self {
        Self::Malformed(err.to_string())
    }
}

type Result<T> = std::result::Result<T, Traced<NegotiationError>>;

/// Outcome of a renegotiation request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Renegotiation {
    /// No round is in flight, so a new one should start right away.
    Start,

    /// Request is queued until the in-flight round settles.
    Queued,

    /// Nothing has been negotiated yet, so the next offer picks the request
    /// up.
    Idle,
}

/// Negotiation round started by a local offer.
#[derive(Debug)]
struct PendingRound {
    id: RoundId,
    offer: SessionDescription,

    /// Desired lanes the offer was built from.
    lanes: MediaLaneSet,
    muted: HashSet<Lane>,
}

/// Result of applying a remote answer.
#[derive(Debug)]
pub struct Answered {
    /// Negotiated direction of every accepted [`Lane`].
    pub negotiated: HashMap<Lane, LaneDirection>,
    pub ice: RemoteIceParameters,
}

/// Validated remote offer, ready to be answered.
#[derive(Debug)]
pub struct RemoteOffer {
    pub round: RoundId,
    pub ice: RemoteIceParameters,
    description: SessionDescription,
}

/// Local answer to a [`RemoteOffer`].
#[derive(Debug)]
pub struct LocalAnswer {
    pub blob: SdpBlob,

    /// Negotiated direction of every accepted [`Lane`].
    pub negotiated: HashMap<Lane, LaneDirection>,

    /// `mid` of the first accepted media section.
    pub bundle_mid: Option<String>,
}

/// Owner of negotiation rounds of a single [`MediaConnection`].
///
/// Keeps the desired [`MediaLaneSet`] and session mute state. At most one
/// round is in flight, and at most one renegotiation is queued behind it.
/// Since requests only update the desired state, a queued renegotiation
/// always reflects the latest one.
///
/// [`MediaConnection`]: super::MediaConnection
#[derive(Debug)]
pub struct NegotiationEngine {
    lanes: MediaLaneSet,
    muted: HashSet<Lane>,
    policy: SdpMungingPolicy,
    last_round: RoundId,
    in_flight: Option<PendingRound>,
    renegotiation_queued: bool,
    ice_restart: bool,
    session_id: u64,
    session_version: u64,

    /// Whether some round has completed successfully.
    completed: bool,
}

impl NegotiationEngine {
    /// Creates new [`NegotiationEngine`] negotiating the provided
    /// [`MediaLaneSet`].
    pub fn new(lanes: MediaLaneSet, policy: SdpMungingPolicy) -> Self {
        Self {
            lanes,
            muted: HashSet::new(),
            policy,
            last_round: RoundId(0),
            in_flight: None,
            renegotiation_queued: false,
            ice_restart: false,
            session_id: u64::from(rand::random::<u32>()),
            session_version: 0,
            completed: false,
        }
    }

    /// Indicates whether the provided [`Lane`] is muted at the session level.
    #[inline]
    pub fn is_muted(&self, lane: Lane) -> bool {
        self.muted.contains(&lane)
    }

    /// Returns [`RoundId`] of the round in flight, if any.
    #[inline]
    pub fn in_flight(&self) -> Option<RoundId> {
        self.in_flight.as_ref().map(|r| r.id)
    }

    /// Indicates whether some round has completed successfully.
    #[inline]
    pub fn has_completed(&self) -> bool {
        self.completed
    }

    /// Returns `mid` of the first section the next local offer will have.
    pub fn offer_mid(&self) -> Option<String> {
        self.lanes.offered().next().map(|(lane, _)| lane.mid().to_owned())
    }

    /// Ensures no round is in flight.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::Conflict`] if some round is in flight.
    pub fn ensure_idle(&self) -> Result<()> {
        match &self.in_flight {
            Some(round) => {
                Err(tracerr::new!(NegotiationError::Conflict(round.id)))
            }
            None => Ok(()),
        }
    }

    /// Takes the ICE restart request, if any.
    pub fn take_ice_restart(&mut self) -> bool {
        std::mem::take(&mut self.ice_restart)
    }

    /// Takes the queued renegotiation, if any and no round is in flight.
    pub fn take_queued(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        std::mem::take(&mut self.renegotiation_queued)
    }

    /// Replaces the desired [`MediaLaneSet`].
    pub fn update_lanes(&mut self, lanes: MediaLaneSet) -> Renegotiation {
        if self.lanes == lanes {
            return Renegotiation::Idle;
        }
        self.lanes = lanes;
        self.request()
    }

    /// Mutes or unmutes sending of the provided [`Lane`].
    ///
    /// Returns `None` if nothing has changed.
    pub fn set_muted(
        &mut self,
        lane: Lane,
        muted: bool,
    ) -> Option<Renegotiation> {
        let changed = if muted {
            self.muted.insert(lane)
        } else {
            self.muted.remove(&lane)
        };
        if changed {
            Some(self.request())
        } else {
            None
        }
    }

    /// Requests ICE restart with the next offer.
    pub fn restart_ice(&mut self) -> Renegotiation {
        self.ice_restart = true;
        self.request()
    }

    /// Starts a new round with a local offer.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::Conflict`] if some round is in flight.
    pub fn create_offer(
        &mut self,
        ice: &LocalIceParameters,
    ) -> Result<SdpBlob> {
        self.ensure_idle()?;

        let id = RoundId(self.last_round.0 + 1);
        let mut offer = self.description(ice);
        for (lane, direction) in self.lanes.offered() {
            offer.media.push(MediaSection::for_lane(
                lane,
                self.wire_direction(lane, direction),
            ));
        }
        finish(&mut offer, ice);
        let sdp = self.munged(&offer);

        log::debug!("Starting negotiation round {}", id);
        self.last_round = id;
        self.renegotiation_queued = false;
        self.in_flight = Some(PendingRound {
            id,
            offer,
            lanes: self.lanes,
            muted: self.muted.clone(),
        });
        Ok(SdpBlob {
            round: id,
            kind: SdpType::Offer,
            sdp,
        })
    }

    /// Completes the in-flight round with the provided remote answer.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::Stale`] if the answer does not belong to the
    /// in-flight round, leaving the round intact.
    ///
    /// With [`NegotiationError::Malformed`] if the answer cannot be parsed or
    /// does not match the offer, aborting the round.
    pub fn apply_answer(&mut self, blob: &SdpBlob) -> Result<Answered> {
        let round = match self.in_flight.take() {
            Some(round) if round.id == blob.round => round,
            other => {
                let expected = other.as_ref().map(|r| r.id);
                self.in_flight = other;
                return Err(tracerr::new!(NegotiationError::Stale {
                    expected,
                    got: blob.round,
                }));
            }
        };
        log::debug!("Applying answer of round {}", round.id);

        if blob.kind != SdpType::Answer {
            return Err(tracerr::new!(NegotiationError::Malformed(format!(
                "expected answer, got {}",
                blob.kind,
            ))));
        }
        let answer: SessionDescription = blob
            .sdp
            .parse()
            .map_err(tracerr::from_and_wrap!(=> NegotiationError))?;
        let negotiated =
            match_answer(&round, &answer).map_err(tracerr::wrap!())?;

        self.completed = true;
        Ok(Answered {
            negotiated,
            ice: remote_ice(&answer),
        })
    }

    /// Validates the provided remote offer.
    ///
    /// # Errors
    ///
    /// With [`NegotiationError::Conflict`] if a local round is in flight.
    ///
    /// With [`NegotiationError::Malformed`] if the offer cannot be parsed or
    /// some of its media sections has no `mid`.
    pub fn parse_remote_offer(&self, blob: &SdpBlob) -> Result<RemoteOffer> {
        self.ensure_idle()?;
        if blob.kind != SdpType::Offer {
            return Err(tracerr::new!(NegotiationError::Malformed(format!(
                "expected offer, got {}",
                blob.kind,
            ))));
        }
        let description: SessionDescription = blob
            .sdp
            .parse()
            .map_err(tracerr::from_and_wrap!(=> NegotiationError))?;
        let missing = description.media.iter().position(|m| m.mid().is_none());
        if let Some(n) = missing {
            return Err(tracerr::new!(NegotiationError::Malformed(format!(
                "media section {} has no mid",
                n,
            ))));
        }
        Ok(RemoteOffer {
            round: blob.round,
            ice: remote_ice(&description),
            description,
        })
    }

    /// Answers the provided [`RemoteOffer`], completing its round.
    ///
    /// Sections of unsupported media, duplicated [`Lane`]s and [`Lane`]s
    /// having no common direction are rejected.
    pub fn answer(
        &mut self,
        offer: RemoteOffer,
        ice: &LocalIceParameters,
    ) -> LocalAnswer {
        let mut answer = self.description(ice);
        let mut negotiated = HashMap::new();
        let mut seen = HashSet::new();

        for remote in &offer.description.media {
            let mut section = answer_section(remote);
            let lane = remote.lane().filter(|lane| seen.insert(*lane));
            let description = &offer.description;
            let accepted = lane.and_then(|lane| {
                if description.is_rejected(remote) {
                    return None;
                }
                let configured = self.lanes.direction(lane);
                let offered = remote.direction();
                // Inactive but not rejected section keeps its lane.
                let direction = if offered.is_empty() {
                    configured
                } else {
                    configured & offered.reversed()
                };
                if direction.is_empty() {
                    return None;
                }
                negotiated.insert(lane, direction);
                Some(if offered.is_empty() {
                    LaneDirection::NONE
                } else {
                    self.wire_direction(lane, direction)
                })
            });
            match accepted {
                Some(direction) => section.set_direction(direction),
                None => {
                    section.port = 0;
                    section.set_direction(LaneDirection::NONE);
                }
            }
            answer.media.push(section);
        }
        finish(&mut answer, ice);

        log::debug!("Answering remote round {}", offer.round);
        self.last_round = self.last_round.max(offer.round);
        self.completed = true;
        self.renegotiation_queued = false;
        LocalAnswer {
            blob: SdpBlob {
                round: offer.round,
                kind: SdpType::Answer,
                sdp: self.munged(&answer),
            },
            negotiated,
            bundle_mid: answer
                .media
                .iter()
                .find(|m| m.port != 0)
                .and_then(MediaSection::mid)
                .map(ToOwned::to_owned),
        }
    }

    fn request(&mut self) -> Renegotiation {
        if self.in_flight.is_some() {
            self.renegotiation_queued = true;
            Renegotiation::Queued
        } else if self.completed {
            Renegotiation::Start
        } else {
            Renegotiation::Idle
        }
    }

    /// Returns [`LaneDirection`] put into SDP, with sending dropped for
    /// muted [`Lane`]s.
    fn wire_direction(
        &self,
        lane: Lane,
        direction: LaneDirection,
    ) -> LaneDirection {
        if self.is_muted(lane) {
            direction - LaneDirection::SEND
        } else {
            direction
        }
    }

    /// Creates new [`SessionDescription`] carrying session-level ICE
    /// parameters.
    fn description(&mut self, ice: &LocalIceParameters) -> SessionDescription {
        self.session_version += 1;
        let mut sdp =
            SessionDescription::new(self.session_id, self.session_version);
        if ice.trickle {
            sdp.attributes.push(Attribute::new("ice-options", "trickle"));
        }
        sdp.attributes
            .push(Attribute::new("ice-ufrag", &ice.credentials.ufrag));
        sdp.attributes
            .push(Attribute::new("ice-pwd", &ice.credentials.pwd));
        sdp
    }

    fn munged(&self, sdp: &SessionDescription) -> String {
        let mut sdp = sdp.clone();
        self.policy.apply(&mut sdp);
        sdp.to_string()
    }
}

/// Adds `BUNDLE` group of accepted sections, and embeds local candidates
/// unless they are trickled.
fn finish(sdp: &mut SessionDescription, ice: &LocalIceParameters) {
    let mids: Vec<_> = sdp
        .media
        .iter()
        .filter(|m| m.port != 0)
        .filter_map(MediaSection::mid)
        .collect();
    if !mids.is_empty() {
        let group = format!("BUNDLE {}", mids.join(" "));
        sdp.attributes.insert(0, Attribute::new("group", group));
    }

    if ice.trickle {
        return;
    }
    if let Some(first) = sdp.media.iter_mut().find(|m| m.port != 0) {
        for candidate in &ice.candidates {
            let value = candidate.trim_start_matches("candidate:");
            first.attributes.push(Attribute::new("candidate", value));
        }
        if ice.gathering_complete {
            first.attributes.push(Attribute::flag("end-of-candidates"));
        }
    }
}

/// Creates answer [`MediaSection`] mirroring codecs of the provided remote
/// one, without any direction.
fn answer_section(remote: &MediaSection) -> MediaSection {
    const KEPT: &[&str] =
        &["mid", "rtcp-mux", "rtpmap", "fmtp", "rtcp-fb", "content"];

    MediaSection {
        media: remote.media.clone(),
        port: 9,
        protocol: remote.protocol.clone(),
        formats: remote.formats.clone(),
        connection: Some("IN IP4 0.0.0.0".to_owned()),
        lines: Vec::new(),
        attributes: remote
            .attributes
            .iter()
            .filter(|a| KEPT.contains(&a.name.as_str()))
            .cloned()
            .collect(),
    }
}

/// Matches the remote answer against the offer of the provided round,
/// returning negotiated direction of every accepted [`Lane`].
fn match_answer(
    round: &PendingRound,
    answer: &SessionDescription,
) -> std::result::Result<HashMap<Lane, LaneDirection>, NegotiationError> {
    if round.offer.media.len() != answer.media.len() {
        return Err(NegotiationError::Malformed(format!(
            "answer has {} media sections, while offer has {}",
            answer.media.len(),
            round.offer.media.len(),
        )));
    }

    let mut negotiated = HashMap::new();
    for (offered, answered) in round.offer.media.iter().zip(&answer.media) {
        if offered.mid() != answered.mid() {
            return Err(NegotiationError::Malformed(format!(
                "answer section {:?} does not match offered {:?}",
                answered.mid(),
                offered.mid(),
            )));
        }
        let lane = match offered.lane() {
            Some(lane) => lane,
            None => continue,
        };
        let wire = offered.direction();
        let remote = answered.direction();
        if answer.is_rejected(answered)
            || (remote.is_empty() && !wire.is_empty())
        {
            log::debug!("Remote side rejected `{}` lane", lane);
            continue;
        }

        let mut accepted = remote.reversed();
        if round.muted.contains(&lane) {
            accepted |= LaneDirection::SEND;
        }
        let direction = round.lanes.direction(lane) & accepted;
        if !direction.is_empty() {
            negotiated.insert(lane, direction);
        }
    }
    Ok(negotiated)
}

/// Extracts [`RemoteIceParameters`] of the provided remote description.
fn remote_ice(sdp: &SessionDescription) -> RemoteIceParameters {
    RemoteIceParameters {
        credentials: sdp.ice_credentials().map(|(ufrag, pwd)| {
            IceCredentials {
                ufrag: ufrag.to_owned(),
                pwd: pwd.to_owned(),
            }
        }),
        candidates: sdp
            .candidates()
            .into_iter()
            .map(|(mid, candidate)| IceCandidate::new(candidate, mid))
            .collect(),
        end_of_candidates: sdp.end_of_candidates(),
    }
}
