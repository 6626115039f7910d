use crate::{RemoteError, Transport, TransportConfig};
use std::io::Read;
use tracing::debug;

pub(crate) fn is_http(uri: &str) -> bool {
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Plain `GET` transport over `ureq`.
///
/// Any 2xx response is a success; every other status becomes
/// [`RemoteError::Http`] carrying the code. Requests are not retried.
pub struct HttpTransport {
    config: TransportConfig,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { config, agent }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, uri: &str) -> Result<Box<dyn Read>, RemoteError> {
        debug!("GET {uri}");
        let resp = match self
            .agent
            .get(uri)
            .header("User-Agent", &self.config.user_agent)
            .call()
        {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http {
                    uri: uri.to_owned(),
                    status: code,
                });
            }
            Err(e) => {
                return Err(RemoteError::Network {
                    uri: uri.to_owned(),
                    message: e.to_string(),
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Http {
                uri: uri.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(Box::new(resp.into_body().into_reader()))
    }
}
