//! [`ConnectionState`] and the rules of its transitions.

use std::{cell::Cell, rc::Rc};

use derive_more::Display;
use futures::stream::LocalBoxStream;
use medea_reactive::ObservableCell;
use serde::{Deserialize, Serialize};

use crate::{events::Event, platform::EventPublisher};

/// Overall state of a [`MediaConnection`].
///
/// [`MediaConnection`]: super::MediaConnection
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Nothing has been negotiated yet.
    #[display(fmt = "new")]
    New,

    /// Negotiation or connectivity checks are in progress.
    #[display(fmt = "connecting")]
    Connecting,

    /// Negotiation is complete and some candidate pair is selected.
    #[display(fmt = "connected")]
    Connected,

    /// Connectivity of the selected candidate pair has been lost.
    #[display(fmt = "disconnected")]
    Disconnected,

    /// Connection cannot be established or recovered.
    #[display(fmt = "failed")]
    Failed,

    /// Connection has been closed locally.
    #[display(fmt = "closed")]
    Closed,
}

impl ConnectionState {
    /// Indicates whether no operations can be performed in this
    /// [`ConnectionState`] anymore.
    #[inline]
    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// Input affecting [`ConnectionState`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Signal {
    /// Offer has been created or a remote offer has been received.
    NegotiationStarted,

    /// Offer/answer round has completed successfully.
    NegotiationCompleted,

    /// Initial offer/answer round has failed.
    NegotiationFailed,

    /// Some candidate pair has been selected.
    IceConnected,

    /// Consent of the selected candidate pair has been lost.
    IceDisconnected,

    /// Every candidate pair has failed.
    IceFailed,

    /// Connection has stayed disconnected for too long.
    DisconnectTimeout,
}

/// Performed change of [`ConnectionState`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Owner of [`ConnectionState`], deciding its transitions.
///
/// Every actual transition is published exactly once, in the order it
/// happens. Repeated [`Signal`]s not changing anything are no-ops.
pub struct StateMachine {
    state: ObservableCell<ConnectionState>,

    /// Whether the current negotiation round has completed.
    sdp_complete: Cell<bool>,

    /// Whether ICE has a selected candidate pair.
    ice_connected: Cell<bool>,

    publisher: Rc<dyn EventPublisher>,
}

impl StateMachine {
    /// Creates new [`StateMachine`] in [`ConnectionState::New`].
    pub fn new(publisher: Rc<dyn EventPublisher>) -> Self {
        Self {
            state: ObservableCell::new(ConnectionState::New),
            sdp_complete: Cell::new(false),
            ice_connected: Cell::new(false),
            publisher,
        }
    }

    /// Returns the current [`ConnectionState`].
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Returns [`LocalBoxStream`] of [`ConnectionState`] updates, starting
    /// with the current one.
    #[inline]
    pub fn subscribe(&self) -> LocalBoxStream<'static, ConnectionState> {
        self.state.subscribe()
    }

    /// Applies the provided [`Signal`], returning the performed
    /// [`Transition`], if any.
    pub fn signal(&self, signal: Signal) -> Option<Transition> {
        use ConnectionState as S;

        let current = self.state();
        if current.is_terminated() {
            log::debug!("Ignoring {} in {} state", signal, current);
            return None;
        }

        match signal {
            Signal::NegotiationStarted => match current {
                S::New => self.transition(S::Connecting),
                S::Disconnected => {
                    self.sdp_complete.set(false);
                    self.transition(S::Connecting)
                }
                _ => None,
            },
            Signal::NegotiationCompleted => {
                self.sdp_complete.set(true);
                self.try_connect()
            }
            Signal::NegotiationFailed => match current {
                S::New | S::Connecting => self.transition(S::Failed),
                _ => None,
            },
            Signal::IceConnected => {
                self.ice_connected.set(true);
                match current {
                    S::Disconnected => self.transition(S::Connected),
                    _ => self.try_connect(),
                }
            }
            Signal::IceDisconnected => {
                self.ice_connected.set(false);
                match current {
                    S::Connected => self.transition(S::Disconnected),
                    _ => None,
                }
            }
            Signal::IceFailed => {
                self.ice_connected.set(false);
                match current {
                    S::Connecting | S::Disconnected => {
                        self.transition(S::Failed)
                    }
                    S::Connected => self.transition(S::Disconnected),
                    S::New | S::Failed | S::Closed => None,
                }
            }
            Signal::DisconnectTimeout => match current {
                S::Disconnected => self.transition(S::Failed),
                _ => None,
            },
        }
    }

    /// Switches into [`ConnectionState::Closed`] right away.
    ///
    /// Returns `None` if already closed.
    pub fn close(&self) -> Option<Transition> {
        if self.state() == ConnectionState::Closed {
            None
        } else {
            self.transition(ConnectionState::Closed)
        }
    }

    fn try_connect(&self) -> Option<Transition> {
        let ready = self.sdp_complete.get() && self.ice_connected.get();
        if ready && self.state() == ConnectionState::Connecting {
            self.transition(ConnectionState::Connected)
        } else {
            None
        }
    }

    fn transition(&self, to: ConnectionState) -> Option<Transition> {
        let from = self.state.replace(to);
        if from == to {
            return None;
        }
        log::debug!("Connection state: {} -> {}", from, to);
        Event::ConnectionStateChanged {
            previous: from,
            current: to,
        }
        .publish_with(self.publisher.as_ref());
        Some(Transition { from, to })
    }
}
