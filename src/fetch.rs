//! Resolution of remote script bodies.
//!
//! The pipeline never performs network I/O on its own; script stages
//! configured with `mode: link` are resolved through a [`ScriptFetcher`].

use std::time::Duration;

use crate::{Error, Result};

/// Collaborator that turns a script URL into its body.
pub trait ScriptFetcher {
    /// Fetch the body at `url`.
    fn fetch(&self, url: &str) -> Result<String>;
}

impl<F> ScriptFetcher for F
where
    F: Fn(&str) -> Result<String>,
{
    fn fetch(&self, url: &str) -> Result<String> {
        self(url)
    }
}

/// Blocking HTTP fetcher backed by `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher with a 30 second timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
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
        let fetch_error = |reason: String| Error::ScriptFetch {
            url: url.to_string(),
            reason,
        };

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => fetch_error(format!("HTTP error: {}", code)),
            ureq::Error::Transport(t) => fetch_error(format!("Transport error: {}", t)),
        })?;

        let body = response
            .into_string()
            .map_err(|e| fetch_error(e.to_string()))?;
        log::debug!("Downloaded remote script: {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |url: &str| -> Result<String> { Ok(format!("# from {}", url)) };
        assert_eq!(fetcher.fetch("https://example.com/a").unwrap(), "# from https://example.com/a");
    }
}
