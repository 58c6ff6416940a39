//! Remote byte stream transport.

use crate::error::IngestionCause;
use std::io::Read;
use std::time::Duration;
use url::Url;

/// Opens remote locators for ingestion.
pub trait RemoteFetcher: Send + Sync {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>, IngestionCause>;
}

/// HTTP(S) transport backed by a `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_timeouts(Self::DEFAULT_TIMEOUT, Self::DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFetcher for HttpFetcher {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>, IngestionCause> {
        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| IngestionCause::Transport(e.to_string()))?;
        Ok(Box::new(response.into_reader()))
    }
}
