//! Network existence checks for external links.
//!
//! The [`LinkProbe`] trait is the only place the validation pass touches the
//! network, so tests can swap in a recording mock and assert exactly which
//! URLs were probed.
//!
//! The production implementation, [`HttpProbe`], sends a `HEAD` request with
//! an explicit timeout. Redirects are followed; the final status decides:
//! 2xx/3xx means alive, anything else means dead. Transient failures
//! (connection errors, timeouts, 5xx, 429) are retried with doubling backoff
//! a bounded number of times before the link is declared dead. A definitive
//! 4xx is not retried.

use crate::config::LinksConfig;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of checking one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered with a 2xx/3xx status.
    Alive(u16),
    /// The URL could not be confirmed; the string says why.
    Dead(String),
}

/// Something that can tell whether a URL currently resolves.
pub trait LinkProbe: Sync {
    fn probe(&self, url: &str) -> ProbeOutcome;
}

/// `HEAD`-based probe over HTTP(S).
pub struct HttpProbe {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl HttpProbe {
    pub fn new(config: &LinksConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    fn attempt(&self, url: &str) -> Attempt {
        match self.client.head(url).send() {
            Ok(resp) => classify_status(resp.status()),
            Err(e) if e.is_timeout() => Attempt::Retry("timed out".to_string()),
            Err(e) => Attempt::Retry(e.to_string()),
        }
    }
}

impl LinkProbe for HttpProbe {
    fn probe(&self, url: &str) -> ProbeOutcome {
        let mut delay = self.backoff;
        let mut attempt = 0;
        loop {
            match self.attempt(url) {
                Attempt::Done(outcome) => return outcome,
                Attempt::Retry(reason) if attempt >= self.retries => {
                    return ProbeOutcome::Dead(reason);
                }
                Attempt::Retry(reason) => {
                    debug!(url, attempt, %reason, "retrying link probe");
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

enum Attempt {
    Done(ProbeOutcome),
    Retry(String),
}

fn classify_status(status: StatusCode) -> Attempt {
    if status.is_success() || status.is_redirection() {
        Attempt::Done(ProbeOutcome::Alive(status.as_u16()))
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Attempt::Retry(format!("HTTP {}", status.as_u16()))
    } else {
        Attempt::Done(ProbeOutcome::Dead(format!("HTTP {}", status.as_u16())))
    }
}
