use std::env;

use url::Url;

use crate::Result;

pub const SOCKET_URL_VAR: &str = "MINESWEEPER_SOCKET_URL";
pub const TOPIC_PREFIX_VAR: &str = "MINESWEEPER_TOPIC_PREFIX";

const DEFAULT_SOCKET_URL: &str = "ws://localhost:4000/field";
const DEFAULT_TOPIC_PREFIX: &str = "field:";

/// Where the field server lives and how fields are addressed on it.
///
/// The socket speaks plain JSON envelopes tagged by `type` (server) and
/// `action` (client), one per text frame. It is not a Phoenix channel
/// socket and does not send join/heartbeat frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub socket_url: Url,
    pub topic_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_url: Url::parse(DEFAULT_SOCKET_URL).expect("default socket url is valid"),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `socket_url`.
    pub fn new(socket_url: &str) -> Result<Self> {
        Ok(Self {
            socket_url: Self::parse_socket_url(socket_url)?,
            ..Self::default()
        })
    }

    /// Reads the configuration from the environment, falling back to the
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(SOCKET_URL_VAR) {
            Some(url) => Self::new(&url)?,
            None => Self::default(),
        };
        if let Some(prefix) = lookup(TOPIC_PREFIX_VAR) {
            config.topic_prefix = prefix;
        }
        Ok(config)
    }

    /// http(s) URLs are accepted and switched to ws(s).
    fn parse_socket_url(raw: &str) -> Result<Url> {
        let mut url = Url::parse(raw)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(format!("Unsupported socket scheme: {other}").into()),
        };
        url.set_scheme(scheme)
            .map_err(|_| "Failed to set WebSocket scheme")?;
        Ok(url)
    }

    /// Socket URL for a single field.
    pub fn field_url(&self, field_id: &str) -> String {
        let mut url = self.socket_url.clone();
        url.query_pairs_mut()
            .append_pair("field", &format!("{}{}", self.topic_prefix, field_id));
        url.to_string()
    }
}
