//! Bindings of media sinks to negotiated [`Lane`]s.

use std::{collections::HashMap, rc::Rc};

use derive_more::Display;
use futures::{future::FutureExt as _, stream, StreamExt as _};
use tracerr::Traced;

use crate::{
    events::{Event, MuteSource},
    media::{Lane, LaneDirection},
    platform::{EventPublisher, MediaSink},
    utils::{spawn_abortable, TaskHandle},
};

/// Errors of binding media sinks.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TrackError {
    /// [`Lane`] has no negotiated SDP section.
    #[display(fmt = "Lane `{}` is not negotiated", _0)]
    LaneNotNegotiated(Lane),
}

type Result<T> = std::result::Result<T, Traced<TrackError>>;

/// Sink bound to a [`Lane`] along with the task forwarding its signals.
struct Binding {
    sink: Rc<dyn MediaSink>,

    /// Dropping aborts the forwarding.
    _forwarder: TaskHandle,
}

/// Signal of a bound [`MediaSink`].
enum SinkSignal {
    Muted(bool),
    Ended,
}

/// Exclusive owner of all the [`MediaSink`] bindings of a
/// [`MediaConnection`].
///
/// [`MediaConnection`]: super::MediaConnection
pub struct TrackRegistry {
    /// Negotiated direction of every [`Lane`] having an accepted SDP
    /// section.
    negotiated: HashMap<Lane, LaneDirection>,
    bindings: HashMap<Lane, Binding>,
    publisher: Rc<dyn EventPublisher>,
}

impl TrackRegistry {
    /// Creates new [`TrackRegistry`] without any negotiated [`Lane`]s.
    pub fn new(publisher: Rc<dyn EventPublisher>) -> Self {
        Self {
            negotiated: HashMap::new(),
            bindings: HashMap::new(),
            publisher,
        }
    }

    /// Returns negotiated [`LaneDirection`] of the provided [`Lane`].
    pub fn negotiated(&self, lane: Lane) -> LaneDirection {
        self.negotiated
            .get(&lane)
            .copied()
            .unwrap_or(LaneDirection::NONE)
    }

    /// Indicates whether some [`MediaSink`] is bound to the provided
    /// [`Lane`].
    #[inline]
    pub fn is_attached(&self, lane: Lane) -> bool {
        self.bindings.contains_key(&lane)
    }

    /// Binds the provided [`MediaSink`] to the provided [`Lane`], releasing
    /// the previously bound one.
    ///
    /// # Errors
    ///
    /// With [`TrackError::LaneNotNegotiated`] if the [`Lane`] has no
    /// negotiated SDP section.
    pub fn attach(
        &mut self,
        lane: Lane,
        sink: Rc<dyn MediaSink>,
    ) -> Result<()> {
        if self.negotiated(lane).is_empty() {
            return Err(tracerr::new!(TrackError::LaneNotNegotiated(lane)));
        }
        self.detach(lane);
        log::debug!("Binding track {} to `{}` lane", sink.id(), lane);

        let publisher = Rc::clone(&self.publisher);
        let signals = stream::select(
            sink.on_mute().map(SinkSignal::Muted),
            sink.on_ended().map(|()| SinkSignal::Ended).into_stream(),
        );
        let forwarder = spawn_abortable(async move {
            futures::pin_mut!(signals);
            while let Some(signal) = signals.next().await {
                match signal {
                    SinkSignal::Muted(muted) => Event::TrackMuted {
                        lane,
                        muted,
                        source: MuteSource::Hardware,
                    }
                    .publish_with(publisher.as_ref()),
                    SinkSignal::Ended => {
                        Event::TrackEnded { lane }
                            .publish_with(publisher.as_ref());
                        break;
                    }
                }
            }
        });

        self.bindings.insert(
            lane,
            Binding {
                sink,
                _forwarder: forwarder,
            },
        );
        Ok(())
    }

    /// Unbinds and releases the [`MediaSink`] bound to the provided [`Lane`].
    ///
    /// Returns `false` if nothing was bound.
    pub fn detach(&mut self, lane: Lane) -> bool {
        match self.bindings.remove(&lane) {
            Some(binding) => {
                log::debug!(
                    "Releasing track {} of `{}` lane",
                    binding.sink.id(),
                    lane,
                );
                binding.sink.release();
                true
            }
            None => false,
        }
    }

    /// Replaces negotiated [`Lane`]s with the provided ones, releasing sinks
    /// of the [`Lane`]s negotiated away.
    pub fn set_negotiated(
        &mut self,
        negotiated: HashMap<Lane, LaneDirection>,
    ) {
        self.negotiated = negotiated;
        let gone: Vec<_> = self
            .bindings
            .keys()
            .filter(|lane| self.negotiated(**lane).is_empty())
            .copied()
            .collect();
        for lane in gone {
            self.detach(lane);
        }
    }

    /// Publishes session-level mute state change of the provided [`Lane`].
    pub fn session_muted(&self, lane: Lane, muted: bool) {
        Event::TrackMuted {
            lane,
            muted,
            source: MuteSource::Session,
        }
        .publish_with(self.publisher.as_ref());
    }

    /// Releases all the bound sinks and forgets negotiated [`Lane`]s.
    pub fn clear(&mut self) {
        self.negotiated.clear();
        for lane in Lane::ALL.iter() {
            self.detach(*lane);
        }
    }
}
