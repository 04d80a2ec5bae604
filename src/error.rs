//! Service error types.

use thiserror::Error;

/// Errors surfaced by the proxy.
///
/// Attempt-level upstream errors are recorded into the performance tracker
/// and swallowed by the race; only race-level failures and invalid inbound
/// queries reach the HTTP layer.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound query was missing, undecodable, or out of size bounds.
    #[error("invalid dns query: {0}")]
    InvalidQuery(&'static str),

    /// An upstream answered with a non-success HTTP status.
    #[error("upstream {url} returned status {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// The upstream request failed at the transport level.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The candidate set was empty before any race started.
    #[error("no upstreams available")]
    NoUpstreams,

    /// Both race rounds ended without a successful answer.
    #[error("all upstreams failed")]
    AllUpstreamsFailed,
}
