//! Script download.
//!
//! The catalog URLs resolve to plain UTF-8 script text over HTTP GET. The
//! session controller only sees the [`ScriptFetcher`] trait, so tests can
//! substitute an in-memory fetcher.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;
use ureq::Agent;

/// Timeout applied to the whole request, connect included.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves a script body for a catalog URL.
pub trait ScriptFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Production fetcher: HTTP GET with a global timeout. A non-success status
/// is an error.
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "Downloading script");

        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("GET {} failed", url))?;

        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("reading response body from {} failed", url))?;

        debug!(url, bytes = body.len(), "Script downloaded");
        Ok(body)
    }
}
