//! Provides [`MediaConnection`] configuration options.
//!
//! Configuration options can be parsed from config files in TOML or JSON
//! format and overridden with environment variables.
//!
//! [`MediaConnection`]: crate::peer::MediaConnection

pub mod ice;

use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

#[doc(inline)]
pub use self::ice::{Ice, IceServer, IceServerError};
#[doc(inline)]
pub use crate::sdp::SdpMungingPolicy;

/// CLI argument that is responsible for holding application configuration
/// file path.
static APP_CONF_PATH_CMD_ARG_NAME: &str = "--conf";

/// Environment variable that is responsible for holding application
/// configuration file path.
static APP_CONF_PATH_ENV_VAR_NAME: &str = "MEDIA_CONNECTION_CONF";

/// Prefix of environment variables overriding configuration options.
static APP_CONF_ENV_PREFIX: &str = "MEDIA_CONNECTION";

/// Settings of a single [`MediaConnection`].
///
/// Immutable once the [`MediaConnection`] is created.
///
/// [`MediaConnection`]: crate::peer::MediaConnection
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct ConnectionConfig {
    /// [STUN]/[TURN] servers used for candidates gathering, in the order of
    /// preference.
    ///
    /// [STUN]: https://webrtcglossary.com/stun
    /// [TURN]: https://webrtcglossary.com/turn
    #[serde(alias = "iceServers")]
    pub ice_servers: Vec<IceServer>,

    /// Transformations applied to every locally generated SDP.
    #[serde(alias = "sdpMunging")]
    pub sdp_munging: SdpMungingPolicy,

    /// [ICE] connectivity settings.
    ///
    /// [ICE]: https://webrtcglossary.com/ice
    pub ice: Ice,
}

impl ConnectionConfig {
    /// Creates new [`ConnectionConfig`] and applies values from such sources
    /// and in that order:
    /// - default values;
    /// - configuration file, the name of which is given as a command line
    ///   parameter or environment variable;
    /// - environment variables.
    ///
    /// # Errors
    ///
    /// If some of the sources cannot be read or contain invalid values.
    pub fn parse() -> Result<Self, ConfigError> {
        let mut cfg = Config::new();

        if let Some(path) = get_conf_file_name(
            env::var(APP_CONF_PATH_ENV_VAR_NAME),
            env::args(),
        ) {
            cfg.merge(File::with_name(&path))?;
        }

        cfg.merge(
            Environment::with_prefix(APP_CONF_ENV_PREFIX).separator("__"),
        )?;

        cfg.try_into()
    }
}

/// Returns the name of the configuration file, if defined.
fn get_conf_file_name<T>(
    env_var: Result<String, env::VarError>,
    cmd_args: T,
) -> Option<String>
where
    T: Iterator<Item = String>,
{
    if let Ok(path) = env_var {
        Some(path)
    } else {
        let mut args = cmd_args.skip_while(|x| x != APP_CONF_PATH_CMD_ARG_NAME);
        if args.next().is_some() {
            args.next()
        } else {
            None
        }
    }
}
