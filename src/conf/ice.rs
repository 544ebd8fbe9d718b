//! [ICE] settings.
//!
//! [ICE]: https://webrtcglossary.com/ice

use std::time::Duration;

use backoff::ExponentialBackoff;
use derive_more::Display;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use smart_default::SmartDefault;
use url::Url;

/// [ICE] connectivity settings.
///
/// [ICE]: https://webrtcglossary.com/ice
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Ice {
    /// Whether local candidates are trickled one by one, rather than
    /// embedded into SDP once gathering completes.
    ///
    /// Defaults to `true`.
    #[default = true]
    pub trickle: bool,

    /// Number of connectivity check attempts performed on a single candidate
    /// pair before it is considered failed.
    ///
    /// Defaults to `5`.
    #[default = 5]
    pub max_check_attempts: u32,

    /// Delay before the second check attempt of a candidate pair.
    ///
    /// Defaults to `100ms`.
    #[default(Duration::from_millis(100))]
    #[serde(with = "humantime_serde")]
    pub check_initial_interval: Duration,

    /// Upper bound of the delay between check attempts.
    ///
    /// Defaults to `2s`.
    #[default(Duration::from_secs(2))]
    #[serde(with = "humantime_serde")]
    pub check_max_interval: Duration,

    /// Factor the delay between check attempts grows with.
    ///
    /// Defaults to `2.0`.
    #[default = 2.0]
    pub check_multiplier: f64,

    /// Randomization applied to the delay between check attempts.
    ///
    /// Defaults to `0.0`.
    #[default = 0.0]
    pub check_randomization_factor: f64,

    /// Duration a connection may stay disconnected before it fails.
    ///
    /// Defaults to `10s`.
    #[default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub disconnect_timeout: Duration,
}

impl Ice {
    /// Returns [`ExponentialBackoff`] pacing check attempts of a single
    /// candidate pair.
    pub fn check_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            current_interval: self.check_initial_interval,
            initial_interval: self.check_initial_interval,
            randomization_factor: self.check_randomization_factor,
            multiplier: self.check_multiplier,
            max_interval: self.check_max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        backoff::backoff::Backoff::reset(&mut backoff);
        backoff
    }
}

/// Invalid [`IceServer`] configuration.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum IceServerError {
    /// URL cannot be parsed.
    #[display(fmt = "invalid ICE server URL `{}`", _0)]
    InvalidUrl(String),

    /// URL scheme is not one of `stun`, `stuns`, `turn` or `turns`.
    #[display(fmt = "unsupported ICE server URL scheme `{}`", _0)]
    UnsupportedScheme(String),

    /// [TURN] server is configured without credentials.
    ///
    /// [TURN]: https://webrtcglossary.com/turn
    #[display(fmt = "TURN server `{}` requires username and credential", _0)]
    MissingCredentials(String),
}

/// [STUN]/[TURN] server used for candidates gathering.
///
/// [STUN]: https://webrtcglossary.com/stun
/// [TURN]: https://webrtcglossary.com/turn
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IceServer {
    /// URLs of this [STUN]/[TURN] server.
    ///
    /// [STUN]: https://webrtcglossary.com/stun
    /// [TURN]: https://webrtcglossary.com/turn
    #[serde(deserialize_with = "IceServer::parse_urls")]
    pub urls: Vec<String>,

    /// Username to use during the authentication process.
    #[serde(default)]
    pub username: Option<String>,

    /// The credential to use when logging into the server.
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServer {
    /// Checks that all [`IceServer::urls`] are valid [STUN]/[TURN] URLs and
    /// that [TURN] ones have credentials.
    ///
    /// # Errors
    ///
    /// With the first [`IceServerError`] found.
    ///
    /// [STUN]: https://webrtcglossary.com/stun
    /// [TURN]: https://webrtcglossary.com/turn
    pub fn validate(&self) -> Result<(), IceServerError> {
        for raw in &self.urls {
            let url = Url::parse(raw)
                .map_err(|_| IceServerError::InvalidUrl(raw.clone()))?;
            match url.scheme() {
                "stun" | "stuns" => {}
                "turn" | "turns" => {
                    if self.username.is_none() || self.credential.is_none() {
                        return Err(IceServerError::MissingCredentials(
                            raw.clone(),
                        ));
                    }
                }
                scheme => {
                    return Err(IceServerError::UnsupportedScheme(
                        scheme.to_owned(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Parses [`IceServer::urls`] from the provided [`Deserializer`] as CSV
    /// (comma-separated values) string or a list of such strings.
    ///
    /// # Errors
    ///
    /// - If cannot parse CSV strings.
    /// - If parsed [`IceServer::urls`] is empty or contains empty values.
    fn parse_urls<'de, D>(d: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde_json as json;

        let out: Vec<String> = match json::Value::deserialize(d)? {
            json::Value::String(urls) => {
                urls.split(',').map(|u| u.trim().to_owned()).collect()
            }
            json::Value::Array(list) => {
                let mut out = Vec::new();
                for val in list {
                    match val {
                        json::Value::String(urls) => out.extend(
                            urls.split(',').map(|u| u.trim().to_owned()),
                        ),
                        _ => return Err(D::Error::custom("Unexpected value")),
                    }
                }
                out
            }
            _ => return Err(D::Error::custom("Unexpected value")),
        };

        if out.is_empty() || out.iter().any(String::is_empty) {
            return Err(D::Error::custom("Empty values are not allowed"));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod ice_conf_specs {
    use std::time::Duration;

    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn parses_csv_and_list_urls() {
        let csv: IceServer = serde_json::from_str(
            r#"{"urls": "stun:a.example.com:3478, stun:b.example.com"}"#,
        )
        .unwrap();
        assert_eq!(
            csv.urls,
            vec!["stun:a.example.com:3478", "stun:b.example.com"],
        );

        let list: IceServer = serde_json::from_str(
            r#"{
                "urls": ["turn:t.example.com", "turns:t.example.com"],
                "username": "u",
                "credential": "p"
            }"#,
        )
        .unwrap();
        assert_eq!(list.urls.len(), 2);
        assert!(list.validate().is_ok());
    }

    #[test]
    fn rejects_empty_urls() {
        assert!(serde_json::from_str::<IceServer>(r#"{"urls": ""}"#).is_err());
        assert!(serde_json::from_str::<IceServer>(r#"{"urls": []}"#).is_err());
    }

    #[test]
    fn validates_urls() {
        let server = |url: &str| IceServer {
            urls: vec![url.to_owned()],
            username: None,
            credential: None,
        };

        assert_eq!(server("stun:stun.l.google.com:19302").validate(), Ok(()));
        assert_eq!(
            server("turn:turn.example.com").validate(),
            Err(IceServerError::MissingCredentials(
                "turn:turn.example.com".to_owned()
            )),
        );
        assert_eq!(
            server("http://example.com").validate(),
            Err(IceServerError::UnsupportedScheme("http".to_owned())),
        );
        assert_eq!(
            server("no scheme").validate(),
            Err(IceServerError::InvalidUrl("no scheme".to_owned())),
        );
    }

    #[test]
    fn check_backoff_grows_up_to_max() {
        let ice = Ice {
            check_initial_interval: Duration::from_millis(100),
            check_max_interval: Duration::from_millis(300),
            ..Ice::default()
        };
        let mut backoff = ice.check_backoff();

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(300)));
    }
}
