//! [`MediaConnection`] negotiating and maintaining media exchange with a
//! single remote peer.

mod negotiation;
mod state;
mod tracks;

use std::{cell::RefCell, rc::Rc};

use derive_more::Display;
use futures::{
    channel::{mpsc, oneshot},
    future::{self, AbortHandle},
    stream::{self, LocalBoxStream},
    FutureExt as _, StreamExt as _,
};
use tracerr::Traced;

use crate::{
    conf::{ConnectionConfig, Ice},
    events::Event,
    ice::{Connectivity, IceAgent, IceCandidate, IceEvent},
    media::{Lane, MediaLaneSet},
    platform::{self, EventPublisher, IceTransport, MediaSink},
    sdp::{RoundId, SdpBlob, SdpParseError},
    utils::{spawn_abortable, TaskHandle},
};

#[doc(inline)]
pub use self::{
    negotiation::{
        Answered, LocalAnswer, NegotiationEngine, NegotiationError,
        Renegotiation, RemoteOffer,
    },
    state::{ConnectionState, Signal, StateMachine, Transition},
    tracks::{TrackError, TrackRegistry},
};

/// Errors of [`MediaConnection`] operations.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ConnectionError {
    /// Another negotiation round is in flight.
    #[display(fmt = "Negotiation round {} is already in flight", _0)]
    NegotiationConflict(RoundId),

    /// Answer does not belong to the outstanding negotiation round.
    #[display(
        fmt = "Answer of round {} is stale, outstanding round is {:?}",
        got,
        expected
    )]
    StaleAnswer {
        expected: Option<RoundId>,
        got: RoundId,
    },

    /// Remote SDP cannot be parsed or does not match the local one.
    #[display(fmt = "Malformed SDP: {}", _0)]
    MalformedSdp(String),

    /// [`Lane`] has no negotiated SDP section.
    #[display(fmt = "Lane `{}` is not negotiated", _0)]
    LaneNotNegotiated(Lane),

    /// [`MediaConnection`] is closed or failed.
    #[display(fmt = "Connection is {}", _0)]
    ConnectionTerminated(ConnectionState),
}

impl From<NegotiationError> for ConnectionError {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::Conflict(round) => {
                Self::NegotiationConflict(round)
            }
            NegotiationError::Stale { expected, got } => {
                Self::StaleAnswer { expected, got }
            }
            NegotiationError::Malformed(reason) => Self::MalformedSdp(reason),
        }
    }
}

impl From<SdpParseError> for ConnectionError {
    #[inline]
    fn from(err: SdpParseError) -> Self {
        Self::MalformedSdp(err.to_string())
    }
}

impl From<TrackError> for ConnectionError {
    #[inline]
    fn from(err: TrackError) -> Self {
        match err {
            TrackError::LaneNotNegotiated(lane) => {
                Self::LaneNotNegotiated(lane)
            }
        }
    }
}

type Result<T> = std::result::Result<T, Traced<ConnectionError>>;

/// Channel to reply to a [`Command`] with.
type Reply<T> = oneshot::Sender<Result<T>>;

/// Operation requested from the [`Owner`] of a [`MediaConnection`].
enum Command {
    CreateOffer(Reply<SdpBlob>),
    ApplyAnswer(SdpBlob, Reply<()>),
    ApplyRemoteOffer(SdpBlob, Reply<SdpBlob>),
    GatherCandidates(oneshot::Sender<LocalBoxStream<'static, IceCandidate>>),
    AddRemoteCandidate(IceCandidate, Reply<()>),
    EndOfRemoteCandidates(Reply<()>),
    AttachTrack(Lane, Rc<dyn MediaSink>, Reply<()>),
    DetachTrack(Lane, Reply<bool>),
    UpdateLanes(MediaLaneSet, Reply<Option<SdpBlob>>),
    SetMuted(Lane, bool, Reply<Option<SdpBlob>>),
    RestartIce(Reply<Option<SdpBlob>>),
    Close,
}

impl Command {
    /// Replies to this [`Command`] with the provided error.
    fn reject(self, err: Traced<ConnectionError>) {
        match self {
            Self::CreateOffer(tx) | Self::ApplyRemoteOffer(_, tx) => {
                let _ = tx.send(Err(err));
            }
            Self::ApplyAnswer(_, tx)
            | Self::AddRemoteCandidate(_, tx)
            | Self::EndOfRemoteCandidates(tx)
            | Self::AttachTrack(_, _, tx) => {
                let _ = tx.send(Err(err));
            }
            Self::DetachTrack(_, tx) => {
                let _ = tx.send(Err(err));
            }
            Self::UpdateLanes(_, tx)
            | Self::SetMuted(_, _, tx)
            | Self::RestartIce(tx) => {
                let _ = tx.send(Err(err));
            }
            // Dropped sender ends the candidates stream.
            Self::GatherCandidates(_) | Self::Close => {}
        }
    }
}

/// Input of the [`Owner`] task.
enum Message {
    Command(Command),
    Ice(IceEvent),

    /// Disconnect timer of the provided generation has fired.
    DisconnectTimeout(u64),
}

/// Connection to a single remote peer.
///
/// All the state is owned by a single local task, processing operations and
/// internal events one at a time, in the order they are issued. Must be
/// created inside a [`tokio::task::LocalSet`].
///
/// Dropping a [`MediaConnection`] closes it.
pub struct MediaConnection {
    state: Rc<StateMachine>,
    commands: mpsc::UnboundedSender<Command>,

    /// [`AbortHandle`] of the operation being executed right now.
    current: Rc<RefCell<Option<AbortHandle>>>,
}

impl MediaConnection {
    /// Creates new [`MediaConnection`] in [`ConnectionState::New`].
    pub fn new(
        config: ConnectionConfig,
        lanes: MediaLaneSet,
        transport: Rc<dyn IceTransport>,
        publisher: Rc<dyn EventPublisher>,
    ) -> Self {
        let state = Rc::new(StateMachine::new(Rc::clone(&publisher)));
        let current = Rc::new(RefCell::new(None));
        let (commands_tx, commands_rx) = mpsc::unbounded();
        let (ice_tx, ice_rx) = mpsc::unbounded();
        let (timer_tx, timer_rx) = mpsc::unbounded();

        let owner = Owner {
            state: Rc::clone(&state),
            negotiation: NegotiationEngine::new(lanes, config.sdp_munging),
            ice: IceAgent::new(
                transport,
                &config.ice_servers,
                config.ice.clone(),
                ice_tx,
            ),
            tracks: TrackRegistry::new(Rc::clone(&publisher)),
            publisher,
            settings: config.ice,
            timer_tx,
            disconnect_timer: None,
            timer_generation: 0,
            released: false,
        };
        let messages = stream::select(
            commands_rx.map(Message::Command),
            stream::select(
                ice_rx.map(Message::Ice),
                timer_rx.map(Message::DisconnectTimeout),
            ),
        );
        platform::spawn(owner.run(messages.boxed_local(), Rc::clone(&current)));

        Self {
            state,
            commands: commands_tx,
            current,
        }
    }

    /// Returns the current [`ConnectionState`].
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    /// Returns [`LocalBoxStream`] of [`ConnectionState`] updates, starting
    /// with the current one.
    #[inline]
    pub fn on_state_change(&self) -> LocalBoxStream<'static, ConnectionState> {
        self.state.subscribe()
    }

    /// Starts a new negotiation round, returning the local offer.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::NegotiationConflict`] if some round is in
    /// flight already.
    pub async fn create_offer(&self) -> Result<SdpBlob> {
        self.request(Command::CreateOffer).await
    }

    /// Completes the in-flight round with the provided remote answer.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::StaleAnswer`] if the answer does not belong
    /// to the in-flight round.
    ///
    /// With [`ConnectionError::MalformedSdp`] if the answer is invalid. If it
    /// answers the very first offer, the connection fails.
    pub async fn apply_answer(&self, answer: SdpBlob) -> Result<()> {
        self.request(|tx| Command::ApplyAnswer(answer, tx)).await
    }

    /// Answers the provided remote offer.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::NegotiationConflict`] if a local round is in
    /// flight.
    ///
    /// With [`ConnectionError::MalformedSdp`] if the offer is invalid.
    pub async fn apply_remote_offer(&self, offer: SdpBlob) -> Result<SdpBlob> {
        self.request(|tx| Command::ApplyRemoteOffer(offer, tx)).await
    }

    /// Returns [`LocalBoxStream`] of local candidates to be trickled to the
    /// remote side.
    ///
    /// Candidates gathered earlier are replayed first. The stream ends once
    /// gathering completes or this [`MediaConnection`] terminates.
    pub fn gather_candidates(&self) -> LocalBoxStream<'static, IceCandidate> {
        let (tx, rx) = oneshot::channel();
        if self.state().is_terminated()
            || self
                .commands
                .unbounded_send(Command::GatherCandidates(tx))
                .is_err()
        {
            return stream::empty().boxed_local();
        }
        rx.into_stream()
            .filter_map(|candidates| future::ready(candidates.ok()))
            .flatten()
            .boxed_local()
    }

    /// Adds the provided remote candidate.
    ///
    /// Candidates received before the remote description are buffered.
    /// Invalid ones are logged and dropped.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::ConnectionTerminated`] only.
    pub async fn add_remote_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<()> {
        self.request(|tx| Command::AddRemoteCandidate(candidate, tx))
            .await
    }

    /// Marks the remote candidates set as complete.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::ConnectionTerminated`] only.
    pub async fn end_of_remote_candidates(&self) -> Result<()> {
        self.request(Command::EndOfRemoteCandidates).await
    }

    /// Binds the provided [`MediaSink`] to the provided negotiated [`Lane`].
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::LaneNotNegotiated`] if the [`Lane`] has no
    /// negotiated SDP section.
    pub async fn attach_track(
        &self,
        lane: Lane,
        sink: Rc<dyn MediaSink>,
    ) -> Result<()> {
        self.request(|tx| Command::AttachTrack(lane, sink, tx)).await
    }

    /// Unbinds and releases the [`MediaSink`] bound to the provided [`Lane`].
    ///
    /// Returns `false` if nothing was bound.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::ConnectionTerminated`] only.
    pub async fn detach_track(&self, lane: Lane) -> Result<bool> {
        self.request(|tx| Command::DetachTrack(lane, tx)).await
    }

    /// Replaces the negotiated [`MediaLaneSet`].
    ///
    /// Returns the renegotiation offer if it has started right away. If a
    /// round is in flight, the renegotiation starts once it settles and its
    /// offer is published as an [`Event::RenegotiationOffer`].
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::ConnectionTerminated`] only.
    pub async fn update_lanes(
        &self,
        lanes: MediaLaneSet,
    ) -> Result<Option<SdpBlob>> {
        self.request(|tx| Command::UpdateLanes(lanes, tx)).await
    }

    /// Mutes or unmutes sending of the provided [`Lane`] at the session
    /// level, renegotiating its direction the same way as
    /// [`MediaConnection::update_lanes()`] does.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::ConnectionTerminated`] only.
    pub async fn set_muted(
        &self,
        lane: Lane,
        muted: bool,
    ) -> Result<Option<SdpBlob>> {
        self.request(|tx| Command::SetMuted(lane, muted, tx)).await
    }

    /// Restarts ICE with fresh credentials, renegotiating the same way as
    /// [`MediaConnection::update_lanes()`] does.
    ///
    /// # Errors
    ///
    /// With [`ConnectionError::ConnectionTerminated`] only.
    pub async fn restart_ice(&self) -> Result<Option<SdpBlob>> {
        self.request(Command::RestartIce).await
    }

    /// Closes this [`MediaConnection`] right away.
    ///
    /// Cancels the operation being executed, and releases all the resources
    /// once. Pending operations fail with
    /// [`ConnectionError::ConnectionTerminated`]. Closing twice is no-op.
    pub fn close(&self) {
        if self.state.close().is_none() {
            return;
        }
        log::info!("Closing connection");
        if let Some(current) = self.current.borrow_mut().take() {
            current.abort();
        }
        let _ = self.commands.unbounded_send(Command::Close);
    }

    fn terminated(&self) -> Traced<ConnectionError> {
        tracerr::new!(ConnectionError::ConnectionTerminated(self.state()))
    }

    /// Sends the [`Command`] to the [`Owner`] and awaits its reply.
    async fn request<T, F>(&self, command: F) -> Result<T>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        if self.state().is_terminated() {
            return Err(self.terminated());
        }
        let (tx, rx) = oneshot::channel();
        if self.commands.unbounded_send(command(tx)).is_err() {
            return Err(self.terminated());
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(self.terminated()),
        }
    }
}

impl Drop for MediaConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Single owner of all the state of a [`MediaConnection`].
struct Owner {
    state: Rc<StateMachine>,
    negotiation: NegotiationEngine,
    ice: IceAgent,
    tracks: TrackRegistry,
    publisher: Rc<dyn EventPublisher>,
    settings: Ice,
    timer_tx: mpsc::UnboundedSender<u64>,

    /// Runs while the connection is [`ConnectionState::Disconnected`].
    disconnect_timer: Option<TaskHandle>,
    timer_generation: u64,

    /// Whether tracks and ICE resources have been released already.
    released: bool,
}

impl Owner {
    /// Processes [`Message`]s until the [`MediaConnection`] is closed.
    async fn run(
        mut self,
        mut messages: LocalBoxStream<'static, Message>,
        current: Rc<RefCell<Option<AbortHandle>>>,
    ) {
        while let Some(msg) = messages.next().await {
            match msg {
                Message::Command(Command::Close) => break,
                Message::Command(command) => {
                    let (op, abort) = future::abortable(self.execute(command));
                    drop(current.borrow_mut().replace(abort));
                    if op.await.is_err() {
                        log::debug!("Operation aborted");
                    }
                    drop(current.borrow_mut().take());
                }
                Message::Ice(event) => {
                    if let Some(connectivity) = self.ice.handle(event) {
                        self.connectivity(connectivity);
                    }
                }
                Message::DisconnectTimeout(generation) => {
                    if generation == self.timer_generation {
                        log::warn!("Connection stayed disconnected too long");
                        self.signal(Signal::DisconnectTimeout);
                    }
                }
            }
            if self.state.state() == ConnectionState::Closed {
                break;
            }
        }
        self.release();
        log::debug!("Connection owner task finished");
    }

    async fn execute(&mut self, command: Command) {
        let state = self.state.state();
        if state.is_terminated() {
            command.reject(tracerr::new!(
                ConnectionError::ConnectionTerminated(state)
            ));
            return;
        }
        match command {
            Command::CreateOffer(tx) => {
                let _ = tx.send(self.create_offer().await);
            }
            Command::ApplyAnswer(answer, tx) => {
                let _ = tx.send(self.apply_answer(answer).await);
            }
            Command::ApplyRemoteOffer(offer, tx) => {
                let _ = tx.send(self.apply_remote_offer(offer).await);
            }
            Command::GatherCandidates(tx) => {
                let _ = tx.send(self.ice.gather_candidates());
            }
            Command::AddRemoteCandidate(candidate, tx) => {
                self.ice.add_remote_candidate(&candidate);
                let _ = tx.send(Ok(()));
            }
            Command::EndOfRemoteCandidates(tx) => {
                if let Some(c) = self.ice.end_of_remote_candidates() {
                    self.connectivity(c);
                }
                let _ = tx.send(Ok(()));
            }
            Command::AttachTrack(lane, sink, tx) => {
                let attached = self
                    .tracks
                    .attach(lane, sink)
                    .map_err(tracerr::map_from_and_wrap!(=> ConnectionError));
                let _ = tx.send(attached);
            }
            Command::DetachTrack(lane, tx) => {
                let _ = tx.send(Ok(self.tracks.detach(lane)));
            }
            Command::UpdateLanes(lanes, tx) => {
                let requested = self.negotiation.update_lanes(lanes);
                let _ = tx.send(self.renegotiate(requested).await);
            }
            Command::SetMuted(lane, muted, tx) => {
                let result = match self.negotiation.set_muted(lane, muted) {
                    Some(requested) => {
                        self.tracks.session_muted(lane, muted);
                        self.renegotiate(requested).await
                    }
                    None => Ok(None),
                };
                let _ = tx.send(result);
            }
            Command::RestartIce(tx) => {
                let requested = self.negotiation.restart_ice();
                let _ = tx.send(self.renegotiate(requested).await);
            }
            Command::Close => {}
        }
    }

    async fn create_offer(&mut self) -> Result<SdpBlob> {
        self.negotiation
            .ensure_idle()
            .map_err(tracerr::map_from_and_wrap!(=> ConnectionError))?;
        self.start_round().await
    }

    /// Starts a new round with a local offer, restarting ICE if requested.
    async fn start_round(&mut self) -> Result<SdpBlob> {
        if self.negotiation.take_ice_restart() {
            log::info!("Restarting ICE");
            self.ice.restart();
        }
        self.ice.set_controlling(true);
        self.ice.set_local_mid(self.negotiation.offer_mid());
        self.prepare_candidates().await;

        let offer = self
            .negotiation
            .create_offer(&self.ice.local_parameters())
            .map_err(tracerr::map_from_and_wrap!(=> ConnectionError))?;
        self.signal(Signal::NegotiationStarted);
        Ok(offer)
    }

    /// Starts trickling local candidates, or gathers all of them if they are
    /// embedded into SDP.
    async fn prepare_candidates(&mut self) {
        if self.settings.trickle {
            self.ice.start_gathering();
        } else if let Some(connectivity) = self.ice.gather_all().await {
            self.connectivity(connectivity);
        }
    }

    async fn apply_answer(&mut self, answer: SdpBlob) -> Result<()> {
        let err = match self.negotiation.apply_answer(&answer) {
            Ok(answered) => {
                self.tracks.set_negotiated(answered.negotiated);
                if let Some(c) = self.ice.set_remote_description(answered.ice)
                {
                    self.connectivity(c);
                }
                self.signal(Signal::NegotiationCompleted);
                self.start_queued().await;
                return Ok(());
            }
            Err(err) => err,
        };

        if let NegotiationError::Malformed(_) = err.as_ref() {
            log::warn!("Round {} aborted: {}", answer.round, err.as_ref());
            if self.negotiation.has_completed() {
                self.start_queued().await;
            } else {
                self.signal(Signal::NegotiationFailed);
            }
        }
        Err(err).map_err(tracerr::map_from_and_wrap!(=> ConnectionError))
    }

    async fn apply_remote_offer(&mut self, offer: SdpBlob) -> Result<SdpBlob> {
        let mut offer = self
            .negotiation
            .parse_remote_offer(&offer)
            .map_err(tracerr::map_from_and_wrap!(=> ConnectionError))?;
        let remote_ice = std::mem::take(&mut offer.ice);
        if self.ice.is_remote_restart(&remote_ice) {
            log::info!("Remote side restarts ICE");
            self.ice.restart();
        }
        self.ice.set_controlling(false);
        self.signal(Signal::NegotiationStarted);
        self.prepare_candidates().await;

        let local = self.ice.local_parameters();
        let answer = self.negotiation.answer(offer, &local);
        self.ice.set_local_mid(answer.bundle_mid);
        self.tracks.set_negotiated(answer.negotiated);
        if let Some(c) = self.ice.set_remote_description(remote_ice) {
            self.connectivity(c);
        }
        self.signal(Signal::NegotiationCompleted);
        Ok(answer.blob)
    }

    /// Starts the requested renegotiation, if it can start right away.
    async fn renegotiate(
        &mut self,
        requested: Renegotiation,
    ) -> Result<Option<SdpBlob>> {
        match requested {
            Renegotiation::Start => self.start_round().await.map(Some),
            Renegotiation::Queued => {
                log::debug!("Renegotiation queued");
                Ok(None)
            }
            Renegotiation::Idle => Ok(None),
        }
    }

    /// Starts the queued renegotiation, publishing its offer.
    async fn start_queued(&mut self) {
        if !self.negotiation.take_queued() {
            return;
        }
        match self.start_round().await {
            Ok(offer) => Event::RenegotiationOffer { offer }
                .publish_with(self.publisher.as_ref()),
            Err(e) => {
                log::error!("Failed to start renegotiation: {}", e.as_ref())
            }
        }
    }

    fn connectivity(&mut self, connectivity: Connectivity) {
        if let Some(pair) = self.ice.selected_pair() {
            log::debug!(
                "ICE {:?} over {} -> {}",
                connectivity,
                pair.local.transport_address(),
                pair.remote.transport_address(),
            );
        }
        self.signal(match connectivity {
            Connectivity::Connected => Signal::IceConnected,
            Connectivity::Disconnected => Signal::IceDisconnected,
            Connectivity::Failed => Signal::IceFailed,
        });
    }

    /// Applies the provided [`Signal`] and reacts on the resulting
    /// [`Transition`].
    fn signal(&mut self, signal: Signal) {
        let transition = match self.state.signal(signal) {
            Some(transition) => transition,
            None => return,
        };
        match transition.to {
            ConnectionState::Disconnected => self.start_disconnect_timer(),
            ConnectionState::Failed => self.release(),
            _ => self.disconnect_timer = None,
        }
    }

    fn start_disconnect_timer(&mut self) {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let timeout = self.settings.disconnect_timeout;
        let timer_tx = self.timer_tx.clone();
        self.disconnect_timer = Some(spawn_abortable(async move {
            platform::delay_for(timeout).await;
            let _ = timer_tx.unbounded_send(generation);
        }));
    }

    /// Releases tracks and ICE resources, once.
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        log::debug!("Releasing connection resources");
        self.disconnect_timer = None;
        self.ice.stop();
        self.tracks.clear();
    }
}
