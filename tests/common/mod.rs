//! Collaborator doubles shared by integration tests.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    rc::Rc,
    time::Duration,
};

use futures::{
    channel::mpsc,
    future::{self, LocalBoxFuture},
    stream::{self, LocalBoxStream},
    FutureExt as _, StreamExt as _,
};
use media_connection::{
    conf::IceServer,
    ice::CandidatePair,
    platform::{
        loopback::LogPublisher, IceTransport, IceTransportError, MediaSink,
    },
    ConnectionConfig, ConnectionState, MediaConnection, MediaLaneSet,
};

/// [`IceTransport`] gathering the provided candidates and succeeding checks
/// towards reachable addresses only.
#[derive(Default)]
pub struct FakeTransport {
    local: Vec<String>,
    reachable: RefCell<HashSet<String>>,
    checked: RefCell<Vec<String>>,

    /// Senders of every consent monitoring started so far.
    consent: RefCell<Vec<mpsc::UnboundedSender<()>>>,

    /// Whether gathering never completes.
    stalled: bool,
}

impl FakeTransport {
    pub fn new(local: &[&str], reachable: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            local: local.iter().map(|c| (*c).to_owned()).collect(),
            reachable: RefCell::new(
                reachable.iter().map(|a| (*a).to_owned()).collect(),
            ),
            ..Self::default()
        })
    }

    /// Creates [`FakeTransport`] which never completes gathering.
    pub fn stalled() -> Rc<Self> {
        Rc::new(Self {
            stalled: true,
            ..Self::default()
        })
    }

    /// Returns remote addresses checked so far, in the order of checks.
    pub fn checked(&self) -> Vec<String> {
        self.checked.borrow().clone()
    }

    /// Makes checks towards the provided address fail or succeed.
    pub fn set_reachable(&self, address: &str, reachable: bool) {
        let mut addresses = self.reachable.borrow_mut();
        if reachable {
            addresses.insert(address.to_owned());
        } else {
            addresses.remove(address);
        }
    }

    /// Reports consent loss of every monitored pair.
    pub fn lose_consent(&self) {
        self.consent
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(()).is_ok());
    }
}

impl IceTransport for FakeTransport {
    fn gather(&self, _: &[IceServer]) -> LocalBoxStream<'static, String> {
        let gathered = stream::iter(self.local.clone());
        if self.stalled {
            gathered.chain(stream::pending()).boxed_local()
        } else {
            gathered.boxed_local()
        }
    }

    fn check(
        &self,
        pair: &CandidatePair,
    ) -> LocalBoxFuture<'static, Result<(), IceTransportError>> {
        let address = pair.remote.address.clone();
        self.checked.borrow_mut().push(address.clone());
        let result = if self.reachable.borrow().contains(&address) {
            Ok(())
        } else {
            Err(IceTransportError::Timeout)
        };
        future::ready(result).boxed_local()
    }

    fn monitor(&self, _: &CandidatePair) -> LocalBoxStream<'static, ()> {
        let (tx, rx) = mpsc::unbounded();
        self.consent.borrow_mut().push(tx);
        rx.boxed_local()
    }
}

/// [`MediaSink`] counting its releases.
#[derive(Default)]
pub struct FakeSink {
    pub releases: Cell<u32>,
}

impl MediaSink for FakeSink {
    fn id(&self) -> String {
        "fake".to_owned()
    }

    fn on_mute(&self) -> LocalBoxStream<'static, bool> {
        stream::pending().boxed_local()
    }

    fn on_ended(&self) -> LocalBoxFuture<'static, ()> {
        future::pending().boxed_local()
    }

    fn release(&self) {
        self.releases.set(self.releases.get() + 1);
    }
}

/// Returns host candidate line of the provided address.
pub fn host(address: &str, port: u16) -> String {
    format!("candidate:1 1 udp 2130706431 {} {} typ host", address, port)
}

/// [`ConnectionConfig`] failing connectivity checks fast.
pub fn config() -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    config.ice.max_check_attempts = 1;
    config.ice.check_initial_interval = Duration::from_millis(1);
    config.ice.check_max_interval = Duration::from_millis(1);
    config
}

/// Creates [`MediaConnection`] along with its [`LogPublisher`].
pub fn connection(
    lanes: MediaLaneSet,
    transport: Rc<FakeTransport>,
) -> (MediaConnection, Rc<LogPublisher>) {
    connection_with(config(), lanes, transport)
}

/// Creates [`MediaConnection`] with the provided [`ConnectionConfig`] along
/// with its [`LogPublisher`].
pub fn connection_with(
    config: ConnectionConfig,
    lanes: MediaLaneSet,
    transport: Rc<FakeTransport>,
) -> (MediaConnection, Rc<LogPublisher>) {
    let publisher = LogPublisher::new("test");
    let conn = MediaConnection::new(
        config,
        lanes,
        transport,
        Rc::clone(&publisher) as _,
    );
    (conn, publisher)
}

/// Waits until the provided [`MediaConnection`] reaches the provided
/// [`ConnectionState`], returning `false` on timeout.
pub async fn reaches(conn: &MediaConnection, state: ConnectionState) -> bool {
    let mut reached = conn
        .on_state_change()
        .filter(move |s| future::ready(*s == state));
    tokio::time::timeout(Duration::from_secs(2), reached.next())
        .await
        .is_ok()
}

/// Returns every published connection state change, as `current` state
/// names.
pub fn transitions(publisher: &LogPublisher) -> Vec<String> {
    publisher
        .published()
        .into_iter()
        .filter(|(event, _)| event == "connectionStateChange")
        .map(|(_, payload)| payload["current"].as_str().unwrap().to_owned())
        .collect()
}

/// Returns count of published events with the provided name.
pub fn count(publisher: &LogPublisher, name: &str) -> usize {
    publisher
        .published()
        .iter()
        .filter(|(event, _)| event == name)
        .count()
}
