//! [`IceAgent`] driving candidates exchange and connectivity checks.

use std::rc::Rc;

use backoff::backoff::Backoff as _;
use futures::{
    channel::mpsc,
    stream::{LocalBoxStream, StreamExt as _},
};
use rand::{distributions::Alphanumeric, Rng as _};

use crate::{
    conf::{Ice, IceServer},
    platform::{self, IceTransport, IceTransportError},
    utils::{spawn_abortable, TaskHandle},
};

use super::{
    candidate::{Candidate, IceCandidate},
    check_list::{CandidatePair, CheckList, PairId, PairState},
};

/// Outcome of connectivity checks reported by an [`IceAgent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Connectivity {
    /// Some candidate pair has been selected and media can flow.
    Connected,

    /// Consent of the selected pair has been lost. Remaining pairs are being
    /// re-checked.
    Disconnected,

    /// Every candidate pair has failed, and no more candidates are expected.
    Failed,
}

/// Message sent by [`IceAgent`]'s helper tasks back into its owner.
///
/// Every message carries the generation of the [`IceAgent`] it is produced
/// for, so the messages of a restarted or stopped [`IceAgent`] are ignored.
#[derive(Clone, Debug, PartialEq)]
pub enum IceEvent {
    /// New local candidate has been gathered.
    LocalCandidate { generation: u64, candidate: String },

    /// Local candidates gathering has finished.
    GatheringComplete { generation: u64 },

    /// Candidate pair passed its connectivity check.
    CheckSucceeded { generation: u64, pair: PairId },

    /// Candidate pair exhausted all its check attempts.
    CheckFailed {
        generation: u64,
        pair: PairId,
        error: IceTransportError,
    },

    /// Consent of the selected candidate pair has been lost.
    ConsentLost { generation: u64, pair: PairId },
}

impl IceEvent {
    fn generation(&self) -> u64 {
        match self {
            Self::LocalCandidate { generation, .. }
            | Self::GatheringComplete { generation }
            | Self::CheckSucceeded { generation, .. }
            | Self::CheckFailed { generation, .. }
            | Self::ConsentLost { generation, .. } => *generation,
        }
    }
}

/// `ice-ufrag` and `ice-pwd` pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IceCredentials {
    pub ufrag: String,
    pub pwd: String,
}

impl IceCredentials {
    /// Generates new random [`IceCredentials`].
    pub fn generate() -> Self {
        fn random(len: usize) -> String {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        }
        Self {
            ufrag: random(8),
            pwd: random(24),
        }
    }
}

/// ICE parameters of the local side, put into local SDP.
#[derive(Clone, Debug)]
pub struct LocalIceParameters {
    pub credentials: IceCredentials,

    /// `candidate:` lines gathered so far.
    pub candidates: Vec<String>,

    /// Whether gathering has finished, so no more candidates will follow.
    pub gathering_complete: bool,

    /// Whether candidates are trickled.
    pub trickle: bool,
}

/// ICE parameters of the remote side, taken from remote SDP.
#[derive(Clone, Debug, Default)]
pub struct RemoteIceParameters {
    pub credentials: Option<IceCredentials>,

    /// Candidates embedded into remote SDP.
    pub candidates: Vec<IceCandidate>,

    /// Whether remote SDP declares `a=end-of-candidates`.
    pub end_of_candidates: bool,
}

/// Performs connectivity checks of the provided [`CandidatePair`] until the
/// first success, retrying with an exponential backoff up to
/// [`Ice::max_check_attempts`] times.
async fn check_with_retries(
    transport: Rc<dyn IceTransport>,
    pair: CandidatePair,
    settings: Ice,
) -> Result<(), IceTransportError> {
    let mut backoff = settings.check_backoff();
    let mut attempt = 1;
    loop {
        match transport.check(&pair).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= settings.max_check_attempts => return Err(e),
            Err(e) => {
                log::debug!(
                    "Check attempt {} of pair {} failed: {}",
                    attempt,
                    pair.id,
                    e,
                );
                attempt += 1;
                if let Some(delay) = backoff.next_backoff() {
                    platform::delay_for(delay).await;
                }
            }
        }
    }
}

/// [ICE] agent of a single [`MediaConnection`].
///
/// Exclusively owns the local and remote candidates and the [`CheckList`].
/// Long-running work is performed by helper tasks which report back with
/// [`IceEvent`]s, that the owner must feed into [`IceAgent::handle()`].
///
/// [ICE]: https://webrtcglossary.com/ice
/// [`MediaConnection`]: crate::peer::MediaConnection
pub struct IceAgent {
    transport: Rc<dyn IceTransport>,
    servers: Vec<IceServer>,
    settings: Ice,
    events: mpsc::UnboundedSender<IceEvent>,

    /// Incremented on every restart, invalidating in-flight [`IceEvent`]s.
    generation: u64,
    credentials: IceCredentials,
    remote_credentials: Option<IceCredentials>,

    /// Whether this agent is the controlling one (the offerer).
    controlling: bool,

    /// `mid` local candidates are bound to.
    local_mid: Option<String>,
    local: Vec<Candidate>,
    remote: Vec<Candidate>,

    /// Remote candidates received before the remote description, in arrival
    /// order.
    pending_remote: Vec<Candidate>,
    remote_description_set: bool,
    gathering_complete: bool,
    remote_complete: bool,
    check_list: CheckList,
    selected: Option<PairId>,
    failed: bool,

    /// Receivers of [`IceAgent::gather_candidates()`] streams.
    subscribers: Vec<mpsc::UnboundedSender<IceCandidate>>,

    gathering: Option<TaskHandle>,
    checking: Option<TaskHandle>,
    monitoring: Option<TaskHandle>,
}

impl IceAgent {
    /// Creates new [`IceAgent`] reporting its [`IceEvent`]s into the
    /// provided channel.
    ///
    /// Invalid [`IceServer`]s are logged and skipped.
    pub fn new(
        transport: Rc<dyn IceTransport>,
        servers: &[IceServer],
        settings: Ice,
        events: mpsc::UnboundedSender<IceEvent>,
    ) -> Self {
        let servers = servers
            .iter()
            .filter(|s| match s.validate() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Skipping ICE server {:?}: {}", s.urls, e);
                    false
                }
            })
            .cloned()
            .collect();
        Self {
            transport,
            servers,
            settings,
            events,
            generation: 0,
            credentials: IceCredentials::generate(),
            remote_credentials: None,
            controlling: true,
            local_mid: None,
            local: Vec::new(),
            remote: Vec::new(),
            pending_remote: Vec::new(),
            remote_description_set: false,
            gathering_complete: false,
            remote_complete: false,
            check_list: CheckList::new(),
            selected: None,
            failed: false,
            subscribers: Vec::new(),
            gathering: None,
            checking: None,
            monitoring: None,
        }
    }

    /// Returns local [`IceCredentials`].
    #[cfg(test)]
    pub fn credentials(&self) -> &IceCredentials {
        &self.credentials
    }

    /// Returns remote candidates applied so far, in the order they were
    /// applied.
    #[cfg(test)]
    pub fn remote_candidates(&self) -> &[Candidate] {
        &self.remote
    }

    /// Indicates whether some candidate pair is selected.
    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.selected.is_some()
    }

    /// Returns the selected [`CandidatePair`], if any.
    pub fn selected_pair(&self) -> Option<&CandidatePair> {
        self.selected.and_then(|id| self.check_list.get(id))
    }

    /// Sets the ICE role of this [`IceAgent`].
    pub fn set_controlling(&mut self, controlling: bool) {
        if self.controlling != controlling {
            self.controlling = controlling;
            self.check_list.set_controlling(controlling);
        }
    }

    /// Sets `mid` of the media section local candidates are bound to.
    pub fn set_local_mid(&mut self, mid: Option<String>) {
        self.local_mid = mid;
    }

    /// Returns [`LocalIceParameters`] to be put into local SDP.
    pub fn local_parameters(&self) -> LocalIceParameters {
        LocalIceParameters {
            credentials: self.credentials.clone(),
            candidates: self.local.iter().map(ToString::to_string).collect(),
            gathering_complete: self.gathering_complete,
            trickle: self.settings.trickle,
        }
    }

    /// Indicates whether the provided [`RemoteIceParameters`] restart ICE,
    /// meaning that the remote side changed its [`IceCredentials`].
    pub fn is_remote_restart(&self, remote: &RemoteIceParameters) -> bool {
        match (&self.remote_credentials, &remote.credentials) {
            (Some(current), Some(new)) => current != new,
            _ => false,
        }
    }

    /// Starts local candidates gathering, unless it is already started.
    pub fn start_gathering(&mut self) {
        if self.gathering.is_some() || self.gathering_complete {
            return;
        }
        let generation = self.generation;
        let events = self.events.clone();
        let mut candidates = self.transport.gather(&self.servers);
        self.gathering = Some(spawn_abortable(async move {
            while let Some(candidate) = candidates.next().await {
                let _ = events.unbounded_send(IceEvent::LocalCandidate {
                    generation,
                    candidate,
                });
            }
            let _ = events
                .unbounded_send(IceEvent::GatheringComplete { generation });
        }));
    }

    /// Returns [`LocalBoxStream`] of local candidates, starting gathering if
    /// needed.
    ///
    /// Candidates gathered earlier are replayed first. The stream ends once
    /// gathering completes or this [`IceAgent`] is stopped or restarted.
    pub fn gather_candidates(
        &mut self,
    ) -> LocalBoxStream<'static, IceCandidate> {
        self.start_gathering();
        let (tx, rx) = mpsc::unbounded();
        for c in &self.local {
            let _ = tx.unbounded_send(self.to_ice_candidate(c));
        }
        if !self.gathering_complete {
            self.subscribers.push(tx);
        }
        rx.boxed_local()
    }

    /// Gathers all the local candidates, resolving once gathering is
    /// complete.
    ///
    /// Used when candidates are not trickled but embedded into SDP.
    pub async fn gather_all(&mut self) -> Option<Connectivity> {
        if self.gathering_complete {
            return None;
        }
        drop(self.gathering.take());
        let mut candidates = self.transport.gather(&self.servers);
        while let Some(candidate) = candidates.next().await {
            self.add_local(&candidate);
        }
        self.complete_gathering()
    }

    /// Adds the provided remote [`IceCandidate`].
    ///
    /// Buffers it until the remote description is set. Candidates that fail
    /// to parse are logged and dropped.
    pub fn add_remote_candidate(&mut self, candidate: &IceCandidate) {
        let parsed = match candidate.candidate.parse::<Candidate>() {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!(
                    "Dropping remote ICE candidate `{}`: {}",
                    candidate.candidate,
                    e,
                );
                return;
            }
        };
        if self.remote_description_set {
            self.add_remote(parsed);
            self.schedule_checks();
        } else {
            self.pending_remote.push(parsed);
        }
    }

    /// Marks the remote candidates set as complete.
    pub fn end_of_remote_candidates(&mut self) -> Option<Connectivity> {
        self.remote_complete = true;
        self.evaluate()
    }

    /// Applies [`RemoteIceParameters`] of the remote description, flushing
    /// all the buffered remote candidates in their arrival order.
    pub fn set_remote_description(
        &mut self,
        params: RemoteIceParameters,
    ) -> Option<Connectivity> {
        if self.is_remote_restart(&params) {
            log::debug!("Remote side restarted ICE");
            self.reset_remote();
        }
        if params.credentials.is_some() {
            self.remote_credentials = params.credentials;
        }
        self.remote_description_set = true;

        for c in &params.candidates {
            match c.candidate.parse() {
                Ok(parsed) => self.add_remote(parsed),
                Err(e) => log::warn!(
                    "Dropping SDP ICE candidate `{}`: {}",
                    c.candidate,
                    e,
                ),
            }
        }
        for c in std::mem::take(&mut self.pending_remote) {
            self.add_remote(c);
        }
        if params.end_of_candidates {
            self.remote_complete = true;
        }

        self.schedule_checks();
        self.evaluate()
    }

    /// Handles [`IceEvent`] reported by a helper task, returning the
    /// resulting [`Connectivity`] change, if any.
    pub fn handle(&mut self, event: IceEvent) -> Option<Connectivity> {
        if event.generation() != self.generation {
            log::trace!("Ignoring stale {:?}", event);
            return None;
        }
        match event {
            IceEvent::LocalCandidate { candidate, .. } => {
                self.add_local(&candidate);
                None
            }
            IceEvent::GatheringComplete { .. } => self.complete_gathering(),
            IceEvent::CheckSucceeded { pair, .. } => {
                self.checking = None;
                self.check_list.set_state(pair, PairState::Succeeded);
                self.select(pair);
                Some(Connectivity::Connected)
            }
            IceEvent::CheckFailed { pair, error, .. } => {
                log::debug!("Candidate pair {} failed: {}", pair, error);
                self.checking = None;
                self.check_list.set_state(pair, PairState::Failed);
                self.schedule_checks();
                self.evaluate()
            }
            IceEvent::ConsentLost { pair, .. } => {
                if self.selected != Some(pair) {
                    return None;
                }
                log::info!("Consent of selected pair {} lost", pair);
                self.selected = None;
                self.monitoring = None;
                self.check_list.set_state(pair, PairState::Waiting);
                self.schedule_checks();
                Some(Connectivity::Disconnected)
            }
        }
    }

    /// Restarts ICE with new local [`IceCredentials`], discarding all the
    /// candidates and checks.
    pub fn restart(&mut self) {
        self.stop();
        self.credentials = IceCredentials::generate();
        self.remote_credentials = None;
        self.remote_description_set = false;
        self.gathering_complete = false;
        self.remote_complete = false;
        self.failed = false;
    }

    /// Stops all the helper tasks and discards all the candidates, including
    /// the buffered ones.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.gathering = None;
        self.checking = None;
        self.monitoring = None;
        self.subscribers.clear();
        self.local.clear();
        self.remote.clear();
        self.pending_remote.clear();
        self.check_list.clear();
        self.selected = None;
    }

    fn to_ice_candidate(&self, candidate: &Candidate) -> IceCandidate {
        IceCandidate::new(candidate.to_string(), self.local_mid.clone())
    }

    fn add_local(&mut self, line: &str) {
        let candidate = match line.parse::<Candidate>() {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Dropping local ICE candidate `{}`: {}", line, e);
                return;
            }
        };
        if self.local.contains(&candidate) {
            return;
        }
        log::debug!("Gathered local ICE candidate: {}", candidate);

        let ice_candidate = self.to_ice_candidate(&candidate);
        self.subscribers
            .retain(|s| s.unbounded_send(ice_candidate.clone()).is_ok());

        if self.remote_description_set {
            for remote in &self.remote {
                self.check_list.add(&candidate, remote, self.controlling);
            }
        }
        self.local.push(candidate);
        self.schedule_checks();
    }

    fn add_remote(&mut self, candidate: Candidate) {
        if self.remote.contains(&candidate) {
            return;
        }
        log::debug!("Applying remote ICE candidate: {}", candidate);
        for local in &self.local {
            self.check_list.add(local, &candidate, self.controlling);
        }
        self.remote.push(candidate);
    }

    fn reset_remote(&mut self) {
        self.checking = None;
        self.monitoring = None;
        self.selected = None;
        self.failed = false;
        self.remote_complete = false;
        self.remote.clear();
        self.check_list.clear();
    }

    fn complete_gathering(&mut self) -> Option<Connectivity> {
        self.gathering_complete = true;
        self.gathering = None;
        // Dropping senders ends the `gather_candidates()` streams.
        self.subscribers.clear();
        self.evaluate()
    }

    /// Starts checking the highest-priority waiting pair, unless some check
    /// is running already or some pair is selected.
    fn schedule_checks(&mut self) {
        if self.checking.is_some()
            || self.selected.is_some()
            || self.failed
            || !self.remote_description_set
        {
            return;
        }
        let pair = match self.check_list.next_waiting() {
            Some(pair) => pair,
            None => return,
        };
        log::debug!(
            "Checking pair {}: {} -> {}",
            pair.id,
            pair.local.transport_address(),
            pair.remote.transport_address(),
        );

        let generation = self.generation;
        let events = self.events.clone();
        let transport = Rc::clone(&self.transport);
        let settings = self.settings.clone();
        self.checking = Some(spawn_abortable(async move {
            let id = pair.id;
            let result = check_with_retries(transport, pair, settings).await;
            let event = match result {
                Ok(()) => IceEvent::CheckSucceeded {
                    generation,
                    pair: id,
                },
                Err(error) => IceEvent::CheckFailed {
                    generation,
                    pair: id,
                    error,
                },
            };
            let _ = events.unbounded_send(event);
        }));
    }

    fn select(&mut self, id: PairId) {
        self.selected = Some(id);
        let pair = match self.check_list.get(id) {
            Some(pair) => pair,
            None => return,
        };
        log::info!(
            "Selected candidate pair {}: {} -> {}",
            id,
            pair.local.transport_address(),
            pair.remote.transport_address(),
        );

        let generation = self.generation;
        let events = self.events.clone();
        let mut lost = self.transport.monitor(pair);
        self.monitoring = Some(spawn_abortable(async move {
            while lost.next().await.is_some() {
                let _ = events.unbounded_send(IceEvent::ConsentLost {
                    generation,
                    pair: id,
                });
            }
        }));
    }

    /// Decides whether connectivity has failed for good.
    fn evaluate(&mut self) -> Option<Connectivity> {
        let exhausted = !self.failed
            && self.selected.is_none()
            && self.checking.is_none()
            && self.remote_description_set
            && self.gathering_complete
            && self.remote_complete
            && !self.check_list.has_pending();
        if exhausted {
            log::warn!(
                "All {} candidate pairs failed",
                self.check_list.len(),
            );
            self.failed = true;
            Some(Connectivity::Failed)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, time::Duration};

    use futures::{
        future::{self, LocalBoxFuture},
        stream, FutureExt as _, StreamExt as _,
    };
    use tokio::task::LocalSet;

    use super::*;

    /// [`IceTransport`] with scripted candidates and check results.
    #[derive(Default)]
    struct FakeTransport {
        local: Vec<String>,

        /// Remote addresses which pass checks.
        reachable: Vec<String>,

        /// Remote addresses of every check performed, in order.
        checks: RefCell<Vec<String>>,

        /// Number of consent losses to report for the first monitoring.
        consent_losses: RefCell<usize>,
    }

    impl IceTransport for FakeTransport {
        fn gather(
            &self,
            _: &[IceServer],
        ) -> LocalBoxStream<'static, String> {
            stream::iter(self.local.clone()).boxed_local()
        }

        fn check(
            &self,
            pair: &CandidatePair,
        ) -> LocalBoxFuture<'static, Result<(), IceTransportError>> {
            self.checks.borrow_mut().push(pair.remote.address.clone());
            let res = if self.reachable.contains(&pair.remote.address) {
                Ok(())
            } else {
                Err(IceTransportError::Timeout)
            };
            future::ready(res).boxed_local()
        }

        fn monitor(&self, _: &CandidatePair) -> LocalBoxStream<'static, ()> {
            let losses = self.consent_losses.replace(0);
            stream::iter(vec![(); losses])
                .chain(stream::pending())
                .boxed_local()
        }
    }

    fn host(addr: &str, priority: u32) -> String {
        format!("candidate:1 1 UDP {} {} 5000 typ host", priority, addr)
    }

    fn remote(addr: &str, priority: u32) -> IceCandidate {
        IceCandidate::new(host(addr, priority), Some("audio".to_owned()))
    }

    fn settings() -> Ice {
        Ice {
            max_check_attempts: 2,
            check_initial_interval: Duration::from_millis(1),
            check_max_interval: Duration::from_millis(2),
            ..Ice::default()
        }
    }

    fn agent(
        transport: FakeTransport,
    ) -> (IceAgent, mpsc::UnboundedReceiver<IceEvent>, Rc<FakeTransport>) {
        let transport = Rc::new(transport);
        let (tx, rx) = mpsc::unbounded();
        let agent = IceAgent::new(
            Rc::clone(&transport) as Rc<dyn IceTransport>,
            &[],
            settings(),
            tx,
        );
        (agent, rx, transport)
    }

    /// Feeds [`IceEvent`]s into the [`IceAgent`] until it reports some
    /// [`Connectivity`].
    async fn drive(
        agent: &mut IceAgent,
        events: &mut mpsc::UnboundedReceiver<IceEvent>,
    ) -> Connectivity {
        loop {
            let event = events.next().await.unwrap();
            if let Some(connectivity) = agent.handle(event) {
                return connectivity;
            }
        }
    }

    #[tokio::test]
    async fn buffers_remote_candidates_until_description() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, _rx, _) = agent(FakeTransport::default());

                agent.add_remote_candidate(&remote("10.0.0.3", 10));
                agent.add_remote_candidate(&remote("10.0.0.1", 30));
                agent.add_remote_candidate(&IceCandidate::new(
                    "candidate:garbage".to_owned(),
                    None,
                ));
                agent.add_remote_candidate(&remote("10.0.0.2", 20));
                assert!(agent.remote_candidates().is_empty());

                agent.set_remote_description(RemoteIceParameters::default());

                let applied: Vec<_> = agent
                    .remote_candidates()
                    .iter()
                    .map(|c| c.address.as_str())
                    .collect();
                assert_eq!(applied, vec!["10.0.0.3", "10.0.0.1", "10.0.0.2"]);
            })
            .await;
    }

    #[tokio::test]
    async fn sdp_candidates_go_before_buffered_ones() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, _rx, _) = agent(FakeTransport::default());
                agent.add_remote_candidate(&remote("10.0.0.2", 10));

                agent.set_remote_description(RemoteIceParameters {
                    credentials: None,
                    candidates: vec![remote("10.0.0.1", 10)],
                    end_of_candidates: false,
                });

                let applied: Vec<_> = agent
                    .remote_candidates()
                    .iter()
                    .map(|c| c.address.as_str())
                    .collect();
                assert_eq!(applied, vec!["10.0.0.1", "10.0.0.2"]);
            })
            .await;
    }

    #[tokio::test]
    async fn trickles_gathered_candidates() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, mut rx, _) = agent(FakeTransport {
                    local: vec![host("10.0.0.1", 100), host("10.0.0.2", 90)],
                    ..FakeTransport::default()
                });
                agent.set_local_mid(Some("audio".to_owned()));

                let gathered = agent.gather_candidates();
                for _ in 0..3 {
                    let event = rx.next().await.unwrap();
                    assert_eq!(agent.handle(event), None);
                }
                let gathered: Vec<_> = gathered.collect().await;

                assert_eq!(gathered.len(), 2);
                assert_eq!(gathered[0].candidate, host("10.0.0.1", 100));
                assert_eq!(gathered[0].sdp_mid.as_deref(), Some("audio"));

                // Late subscribers get a replay.
                let replay: Vec<_> = agent.gather_candidates().collect().await;
                assert_eq!(replay, gathered);
                assert!(agent.local_parameters().gathering_complete);
            })
            .await;
    }

    #[tokio::test]
    async fn checks_pairs_by_priority_with_retries() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, mut rx, transport) = agent(FakeTransport {
                    local: vec![host("10.0.0.1", 100)],
                    reachable: vec!["10.0.0.5".to_owned()],
                    ..FakeTransport::default()
                });
                assert_eq!(agent.gather_all().await, None);

                agent.add_remote_candidate(&remote("10.0.0.5", 10));
                agent.add_remote_candidate(&remote("10.0.0.9", 1000));
                agent.set_remote_description(RemoteIceParameters::default());

                assert_eq!(
                    drive(&mut agent, &mut rx).await,
                    Connectivity::Connected,
                );
                assert_eq!(
                    *transport.checks.borrow(),
                    vec!["10.0.0.9", "10.0.0.9", "10.0.0.5"],
                );
                assert_eq!(
                    agent.selected_pair().unwrap().remote.address,
                    "10.0.0.5",
                );
            })
            .await;
    }

    #[tokio::test]
    async fn fails_once_everything_is_exhausted() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, mut rx, _) = agent(FakeTransport {
                    local: vec![host("10.0.0.1", 100)],
                    ..FakeTransport::default()
                });
                assert_eq!(agent.gather_all().await, None);
                agent.set_remote_description(RemoteIceParameters {
                    credentials: None,
                    candidates: vec![remote("10.0.0.7", 10)],
                    end_of_candidates: false,
                });

                // Remote side may still trickle more candidates.
                let event = rx.next().await.unwrap();
                assert_eq!(agent.handle(event), None);

                assert_eq!(
                    agent.end_of_remote_candidates(),
                    Some(Connectivity::Failed),
                );
                assert_eq!(agent.end_of_remote_candidates(), None);
            })
            .await;
    }

    #[tokio::test]
    async fn recovers_after_consent_loss() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, mut rx, transport) = agent(FakeTransport {
                    local: vec![host("10.0.0.1", 100)],
                    reachable: vec!["10.0.0.5".to_owned()],
                    consent_losses: RefCell::new(1),
                    ..FakeTransport::default()
                });
                agent.gather_all().await;
                agent.set_remote_description(RemoteIceParameters {
                    credentials: None,
                    candidates: vec![remote("10.0.0.5", 10)],
                    end_of_candidates: true,
                });

                assert_eq!(
                    drive(&mut agent, &mut rx).await,
                    Connectivity::Connected,
                );
                assert_eq!(
                    drive(&mut agent, &mut rx).await,
                    Connectivity::Disconnected,
                );
                assert!(!agent.is_connected());
                assert_eq!(
                    drive(&mut agent, &mut rx).await,
                    Connectivity::Connected,
                );
                assert_eq!(transport.checks.borrow().len(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn restart_discards_everything() {
        LocalSet::new()
            .run_until(async {
                let (mut agent, mut rx, _) = agent(FakeTransport {
                    local: vec![host("10.0.0.1", 100)],
                    ..FakeTransport::default()
                });
                let old = agent.credentials().clone();
                agent.start_gathering();
                let stale = rx.next().await.unwrap();
                agent.add_remote_candidate(&remote("10.0.0.5", 10));

                agent.restart();

                assert_ne!(agent.credentials(), &old);
                assert_eq!(agent.handle(stale), None);
                assert!(agent.local_parameters().candidates.is_empty());
                agent.set_remote_description(RemoteIceParameters::default());
                assert!(agent.remote_candidates().is_empty());
            })
            .await;
    }

    #[test]
    fn detects_remote_restart() {
        let (tx, _rx) = mpsc::unbounded();
        let mut agent = IceAgent::new(
            Rc::new(FakeTransport::default()),
            &[],
            settings(),
            tx,
        );
        let creds = |ufrag: &str| RemoteIceParameters {
            credentials: Some(IceCredentials {
                ufrag: ufrag.to_owned(),
                pwd: "pwd".to_owned(),
            }),
            ..RemoteIceParameters::default()
        };
        assert!(!agent.is_remote_restart(&creds("a")));

        agent.remote_credentials = creds("a").credentials;

        assert!(!agent.is_remote_restart(&creds("a")));
        assert!(agent.is_remote_restart(&creds("b")));
    }
}
