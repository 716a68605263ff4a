use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters allowed verbatim in the userinfo part of a proxy URL.
const USERINFO_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One outbound proxy. Identified by its position in the configured pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "http".to_string()
}

impl ProxyEndpoint {
    /// Render as `protocol://[user:pass@]host:port`. Credentials are only
    /// included when both parts are present.
    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!(
                "{}://{}:{}@{}:{}",
                self.protocol,
                utf8_percent_encode(user, USERINFO_SET),
                utf8_percent_encode(pass, USERINFO_SET),
                self.host,
                self.port
            ),
            _ => format!("{}://{}:{}", self.protocol, self.host, self.port),
        }
    }

    /// Same as `url` with the password masked, for logs.
    pub fn redacted(&self) -> String {
        match &self.username {
            Some(user) if self.password.is_some() => {
                format!("{}://{}:***@{}:{}", self.protocol, user, self.host, self.port)
            }
            _ => format!("{}://{}:{}", self.protocol, self.host, self.port),
        }
    }
}
