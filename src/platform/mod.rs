//! Collaborators a [`MediaConnection`] talks to, along with the runtime
//! primitives it is driven by.
//!
//! [`MediaConnection`]: crate::peer::MediaConnection

pub mod loopback;

use std::{future::Future, time::Duration};

use derive_more::Display;
use futures::{future::LocalBoxFuture, stream::LocalBoxStream};

use crate::{conf::IceServer, ice::CandidatePair};

/// Spawns the provided [`Future`] on the current thread.
///
/// # Panics
///
/// If called outside of a [`tokio::task::LocalSet`] context.
#[inline]
pub fn spawn<F>(task: F)
where
    F: Future<Output = ()> + 'static,
{
    drop(tokio::task::spawn_local(task));
}

/// [`Future`] which resolves after the provided [`Duration`].
#[inline]
pub async fn delay_for(delay: Duration) {
    tokio::time::sleep(delay).await;
}

/// Error of a connectivity check performed by an [`IceTransport`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum IceTransportError {
    /// No response received within the check timeout.
    #[display(fmt = "connectivity check timed out")]
    Timeout,

    /// Remote side explicitly rejected the check.
    #[display(fmt = "connectivity check rejected: {}", _0)]
    Rejected(String),
}

/// Underlying media-transport engine performing the actual network I/O of
/// [ICE].
///
/// [ICE]: https://webrtcglossary.com/ice
#[cfg_attr(any(test, feature = "mockable"), mockall::automock)]
pub trait IceTransport {
    /// Starts gathering local candidates against the provided
    /// [`IceServer`]s.
    ///
    /// Yields `candidate:` lines and ends once gathering is complete.
    fn gather(
        &self,
        servers: &[IceServer],
    ) -> LocalBoxStream<'static, String>;

    /// Performs a single connectivity check of the provided
    /// [`CandidatePair`].
    fn check(
        &self,
        pair: &CandidatePair,
    ) -> LocalBoxFuture<'static, Result<(), IceTransportError>>;

    /// Monitors consent of the selected [`CandidatePair`], yielding every
    /// time it is lost.
    fn monitor(&self, pair: &CandidatePair) -> LocalBoxStream<'static, ()>;
}

/// Sink of a local or remote media track bound to a [`Lane`].
///
/// [`Lane`]: crate::media::Lane
#[cfg_attr(any(test, feature = "mockable"), mockall::automock)]
pub trait MediaSink {
    /// Returns unique ID of the underlying track.
    fn id(&self) -> String;

    /// Returns [`LocalBoxStream`] emitting `true` when the hardware source
    /// gets muted, and `false` when it gets unmuted.
    fn on_mute(&self) -> LocalBoxStream<'static, bool>;

    /// Returns [`LocalBoxFuture`] resolving once the underlying track ends.
    fn on_ended(&self) -> LocalBoxFuture<'static, ()>;

    /// Releases the underlying track. Called exactly once, when the sink is
    /// unbound.
    fn release(&self);
}

/// Fire-and-forget publisher of the events happening on a
/// [`MediaConnection`].
///
/// [`MediaConnection`]: crate::peer::MediaConnection
#[cfg_attr(any(test, feature = "mockable"), mockall::automock)]
pub trait EventPublisher {
    /// Publishes the provided event.
    fn publish(&self, event: &str, payload: serde_json::Value);
}
