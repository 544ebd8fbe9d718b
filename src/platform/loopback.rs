//! In-process implementations of the collaborators, connecting peers living
//! in the same process.

use std::{cell::RefCell, rc::Rc};

use futures::{
    future::{self, LocalBoxFuture},
    stream::{self, LocalBoxStream},
    FutureExt as _, StreamExt as _,
};

use crate::{
    conf::IceServer,
    ice::{Candidate, CandidatePair, CandidateType},
};

use super::{EventPublisher, IceTransport, IceTransportError};

/// [`IceTransport`] gathering a single loopback host candidate and
/// succeeding every connectivity check towards a loopback address.
#[derive(Debug)]
pub struct LoopbackTransport {
    /// Port of the gathered host candidate.
    port: u16,
}

impl LoopbackTransport {
    /// Creates new [`LoopbackTransport`] gathering a candidate with the
    /// provided port.
    #[inline]
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl IceTransport for LoopbackTransport {
    fn gather(
        &self,
        servers: &[IceServer],
    ) -> LocalBoxStream<'static, String> {
        if !servers.is_empty() {
            log::debug!(
                "Loopback transport ignores {} ICE servers",
                servers.len(),
            );
        }
        let priority = Candidate::calculate_priority(
            CandidateType::Host.type_preference(),
            u16::MAX,
            1,
        );
        let candidate = format!(
            "candidate:1 1 udp {} 127.0.0.1 {} typ host",
            priority, self.port,
        );
        stream::once(future::ready(candidate)).boxed_local()
    }

    fn check(
        &self,
        pair: &CandidatePair,
    ) -> LocalBoxFuture<'static, Result<(), IceTransportError>> {
        let result = if pair.remote.address == "127.0.0.1" {
            Ok(())
        } else {
            Err(IceTransportError::Rejected(format!(
                "{} is not a loopback address",
                pair.remote.address,
            )))
        };
        future::ready(result).boxed_local()
    }

    fn monitor(&self, _: &CandidatePair) -> LocalBoxStream<'static, ()> {
        stream::pending().boxed_local()
    }
}

/// [`EventPublisher`] writing every event into the log and keeping it in
/// memory.
#[derive(Debug, Default)]
pub struct LogPublisher {
    /// Name of the connection the events belong to.
    name: String,

    /// Every published `(event, payload)` pair.
    published: RefCell<Vec<(String, serde_json::Value)>>,
}

impl LogPublisher {
    /// Creates new [`LogPublisher`] tagging log records with the provided
    /// connection name.
    pub fn new<N: Into<String>>(name: N) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            published: RefCell::default(),
        })
    }

    /// Returns all the events published so far.
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.borrow().clone()
    }
}

impl EventPublisher for LogPublisher {
    fn publish(&self, event: &str, payload: serde_json::Value) {
        log::info!("[{}] {}: {}", self.name, event, payload);
        self.published.borrow_mut().push((event.to_owned(), payload));
    }
}
