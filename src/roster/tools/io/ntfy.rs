use std::fmt;

use reqwest::Url;
use reqwest::blocking::Client;
use tracing::instrument;

use crate::roster::tools::error::{Result, ToolError};

/// Public ntfy server.
pub const DEFAULT_NTFY_URL: &str = "https://ntfy.sh";

/// Destination for the run summary.
pub trait NotificationSink {
    /// Delivers `message`. A rejected message surfaces as
    /// [`ToolError::NotificationDelivery`].
    fn send(&self, message: &str) -> Result<()>;
}

/// Publishes messages to one ntfy topic with bearer-token auth.
#[derive(Clone)]
pub struct NtfySink {
    http: Client,
    endpoint: Url,
    token: String,
}

impl fmt::Debug for NtfySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtfySink")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl NtfySink {
    pub fn new(http: Client, server: &str, topic: &str, token: impl Into<String>) -> Result<Self> {
        let invalid = |reason: String| {
            ToolError::Configuration(format!("invalid notification server '{server}': {reason}"))
        };
        let mut endpoint = Url::parse(server).map_err(|err| invalid(err.to_string()))?;
        endpoint
            .path_segments_mut()
            .map_err(|()| invalid("cannot carry a path".into()))?
            .pop_if_empty()
            .push(topic);
        Ok(Self {
            http,
            endpoint,
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl NotificationSink for NtfySink {
    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint))]
    fn send(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .body(message.as_bytes().to_vec())
            .send()?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ToolError::NotificationDelivery {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_topic() {
        let sink = NtfySink::new(Client::new(), "https://ntfy.sh", "BBYO", "tk").expect("sink");
        assert_eq!(sink.endpoint().as_str(), "https://ntfy.sh/BBYO");

        let sink = NtfySink::new(Client::new(), "https://push.example.org/base/", "roster", "tk")
            .expect("sink");
        assert_eq!(sink.endpoint().as_str(), "https://push.example.org/base/roster");
    }

    #[test]
    fn debug_output_redacts_token() {
        let sink = NtfySink::new(Client::new(), DEFAULT_NTFY_URL, "BBYO", "tk_secret").expect("sink");
        assert!(!format!("{sink:?}").contains("tk_secret"));
    }

    #[test]
    fn invalid_server_is_configuration_error() {
        let err = NtfySink::new(Client::new(), "not a url", "BBYO", "tk").expect_err("invalid");
        assert!(matches!(err, ToolError::Configuration(_)));
    }
}
