//! Runs an in-process session between two [`MediaConnection`]s over the
//! loopback interface.

use std::{rc::Rc, time::Duration};

use futures::{future, StreamExt as _};
use media_connection::{
    log::prelude::*,
    platform::loopback::{LogPublisher, LoopbackTransport},
    ConnectionConfig, ConnectionError, ConnectionState, Lane, LaneDirection,
    MediaConnection, MediaLaneSet,
};
use tokio::task::LocalSet;
use tracerr::Traced;

/// Time the session is given to connect.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _log_guard = match media_connection::log::init() {
        Ok(guard) => guard,
        Err(e) => panic!("Failed to initialize logger: {}", e),
    };
    let config = match ConnectionConfig::parse() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse config: {}", e);
            return;
        }
    };

    LocalSet::new()
        .run_until(async move {
            match run(config).await {
                Ok(()) => info!("Loopback session finished"),
                Err(e) => error!("Loopback session failed: {}", e.as_ref()),
            }
        })
        .await;
}

/// Negotiates a session between an offerer sending audio and video, and an
/// answerer receiving video, then waits for it to connect.
async fn run(config: ConnectionConfig) -> Result<(), Traced<ConnectionError>> {
    let offerer = MediaConnection::new(
        config.clone(),
        MediaLaneSet::new()
            .with(Lane::Audio, LaneDirection::all())
            .with(Lane::Video, LaneDirection::SEND),
        Rc::new(LoopbackTransport::new(50_000)),
        LogPublisher::new("offerer"),
    );
    let answerer = MediaConnection::new(
        config,
        MediaLaneSet::new()
            .with(Lane::Audio, LaneDirection::all())
            .with(Lane::Video, LaneDirection::RECV),
        Rc::new(LoopbackTransport::new(50_001)),
        LogPublisher::new("answerer"),
    );

    let offer = offerer.create_offer().await?;
    let answer = answerer.apply_remote_offer(offer).await?;
    offerer.apply_answer(answer).await?;

    let mut offered = offerer.gather_candidates();
    while let Some(candidate) = offered.next().await {
        answerer.add_remote_candidate(candidate).await?;
    }
    answerer.end_of_remote_candidates().await?;

    let mut answered = answerer.gather_candidates();
    while let Some(candidate) = answered.next().await {
        offerer.add_remote_candidate(candidate).await?;
    }
    offerer.end_of_remote_candidates().await?;

    let mut connected = offerer
        .on_state_change()
        .filter(|s| future::ready(*s == ConnectionState::Connected));
    match tokio::time::timeout(CONNECT_TIMEOUT, connected.next()).await {
        Ok(_) => info!("Offerer connected, answerer is {}", answerer.state()),
        Err(_) => warn!("Offerer is still {}", offerer.state()),
    }

    offerer.close();
    answerer.close();
    Ok(())
}
