//! Upstream DoH transport (RFC 8484).
//!
//! Carries one raw DNS message to a resolver URL and returns the raw
//! answer. Queries go out as POST bodies or as GET requests with a
//! base64url payload parameter, both with `application/dns-message`
//! content negotiation.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::debug;

use crate::error::ProxyError;

/// MIME type for DoH payloads (RFC 8484).
const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// How queries are carried to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Get,
    Post,
}

/// A transport capable of one DoH round-trip to a resolver URL.
///
/// The race coordinator only sees this trait; tests script it.
#[async_trait]
pub trait DohTransport: Send + Sync {
    async fn send(&self, url: &str, query: &[u8]) -> Result<Vec<u8>, ProxyError>;
}

/// reqwest-backed transport with one shared connection pool.
pub struct DohClient {
    client: reqwest::Client,
    method: QueryMethod,
}

impl DohClient {
    pub fn new(method: QueryMethod) -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, method }
    }
}

/// base64url (unpadded) form of a query for GET requests.
fn encode_query(query: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(query)
}

#[async_trait]
impl DohTransport for DohClient {
    async fn send(&self, url: &str, query: &[u8]) -> Result<Vec<u8>, ProxyError> {
        debug!(url, query_len = query.len(), "sending upstream query");

        let request = match self.method {
            QueryMethod::Post => self
                .client
                .post(url)
                .header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
                .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                .body(query.to_vec()),
            QueryMethod::Get => self
                .client
                .get(url)
                .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                .query(&[("dns", encode_query(query))]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let payload = response.bytes().await?;
        debug!(url, response_len = payload.len(), "upstream answered");
        Ok(payload.to_vec())
    }
}


#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by race, resolver, and handler tests.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::DohTransport;
    use crate::error::ProxyError;

    /// Per-endpoint scripted behavior.
    #[derive(Clone)]
    pub enum Behavior {
        /// Answer with `payload` after `delay_ms`.
        Respond { delay_ms: u64, payload: Vec<u8> },
        /// Fail with an HTTP 503 after `delay_ms`.
        Fail { delay_ms: u64 },
        /// Never complete; only timeouts end this attempt.
        Hang,
    }

    pub struct ScriptedTransport {
        behaviors: HashMap<String, Behavior>,
        pub hits: AtomicUsize,
    }

    impl ScriptedTransport {
        pub fn new(entries: &[(&str, Behavior)]) -> Arc<Self> {
            Arc::new(Self {
                behaviors: entries
                    .iter()
                    .map(|(url, behavior)| (url.to_string(), behavior.clone()))
                    .collect(),
                hits: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DohTransport for ScriptedTransport {
        async fn send(&self, url: &str, _query: &[u8]) -> Result<Vec<u8>, ProxyError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            match self.behaviors.get(url).cloned().unwrap_or(Behavior::Hang) {
                Behavior::Respond { delay_ms, payload } => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(payload)
                }
                Behavior::Fail { delay_ms } => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Err(ProxyError::UpstreamStatus {
                        url: url.to_string(),
                        status: 503,
                    })
                }
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    pub fn urls(list: &[&str]) -> Vec<Arc<str>> {
        list.iter().map(|&url| Arc::from(url)).collect()
    }
}
