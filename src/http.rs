//! HTTP front end for DoH queries.
//!
//! Accepts RFC 8484 GET and POST requests on `/dns-query`, validates the
//! payload, consults the edge cache, and hands the query to the resolver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::error::ProxyError;
use crate::race::RaceOutcome;
use crate::region::Region;
use crate::resolver::Resolver;
use crate::stats::Stats;

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Largest DNS message accepted from a client.
const MAX_QUERY_LEN: usize = 512;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub cache: Arc<ResponseCache>,
    pub stats: Arc<Stats>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dns-query", get(handle_get).post(handle_post))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

async fn handle_get(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ProxyError> {
    let started = Instant::now();
    let encoded = params
        .get("dns")
        .ok_or(ProxyError::InvalidQuery("missing dns parameter"))?;
    let query = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| ProxyError::InvalidQuery("dns parameter is not base64url"))?;

    answer(state, uri, headers, query, started).await
}

async fn handle_post(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let started = Instant::now();
    answer(state, uri, headers, body.to_vec(), started).await
}

/// Shared query path: cache lookup, race, response assembly.
async fn answer(
    state: AppState,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<u8>,
    started: Instant,
) -> Result<Response, ProxyError> {
    if query.is_empty() || query.len() > MAX_QUERY_LEN {
        return Err(ProxyError::InvalidQuery("dns message must be 1-512 bytes"));
    }

    // The cache key is the request URI alone. POST bodies never contribute,
    // so distinct payloads POSTed to one URL share an entry.
    let cache_key = uri.to_string();
    if let Some(payload) = state.cache.get(&cache_key) {
        state.stats.record_cache_hit(elapsed_ms(started));
        return Ok(dns_response(payload, None));
    }

    let region = region_hint(&headers);
    debug!(?region, query_len = query.len(), "forwarding query");

    match state.resolver.resolve(&query, region).await {
        RaceOutcome::Success {
            endpoint,
            latency_ms,
            payload,
        } => {
            state.cache.put(&cache_key, &payload);
            state.stats.record_answered(elapsed_ms(started));
            Ok(dns_response(payload, Some((endpoint, latency_ms))))
        }
        RaceOutcome::NoUpstreams => {
            state.stats.record_failure(elapsed_ms(started));
            warn!("no upstreams available");
            Err(ProxyError::NoUpstreams)
        }
        outcome => {
            state.stats.record_failure(elapsed_ms(started));
            warn!(?outcome, "query failed on both race rounds");
            Err(ProxyError::AllUpstreamsFailed)
        }
    }
}

fn region_hint(headers: &HeaderMap) -> Region {
    headers
        .get("cf-ipcountry")
        .and_then(|value| value.to_str().ok())
        .map(Region::from_country)
        .unwrap_or(Region::Na)
}

fn dns_response(payload: Vec<u8>, winner: Option<(Arc<str>, u64)>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE);
    if let Some((endpoint, latency_ms)) = winner {
        builder = builder
            .header("X-Upstream", endpoint.as_ref())
            .header("X-Latency", latency_ms.to_string());
    }
    builder
        .body(Body::from(payload))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CACHE_TTL;
    use crate::tracker::PerformanceTracker;
    use crate::upstream::testing::{Behavior, ScriptedTransport, urls};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::atomic::Ordering;
    use tower::util::ServiceExt;

    const UP: &str = "https://upstream.test/dns-query";

    fn sample_query() -> Vec<u8> {
        let mut query = Vec::new();
        query.extend_from_slice(&[0x12, 0x34]); // Query ID
        query.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
        query.extend_from_slice(&[0x00, 0x01]); // Questions: 1
        query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        query.extend_from_slice(&[0x07]);
        query.extend_from_slice(b"example");
        query.extend_from_slice(&[0x03]);
        query.extend_from_slice(b"com");
        query.extend_from_slice(&[0x00]);
        query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A, IN
        query
    }

    fn app(transport: Arc<ScriptedTransport>) -> Router {
        let tracker = Arc::new(PerformanceTracker::new());
        let stats = Arc::new(Stats::new());
        let regional = Region::ALL.iter().map(|&r| (r, Vec::new())).collect();
        let resolver = Arc::new(Resolver::with_pools(
            transport,
            tracker,
            Arc::clone(&stats),
            urls(&[UP]),
            regional,
        ));
        router(AppState {
            resolver,
            cache: Arc::new(ResponseCache::new(CACHE_TTL)),
            stats,
        })
    }

    fn answering_app() -> Router {
        app(ScriptedTransport::new(&[(
            UP,
            Behavior::Respond {
                delay_ms: 0,
                payload: b"dns-answer".to_vec(),
            },
        )]))
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn get_round_trip() {
        let encoded = URL_SAFE_NO_PAD.encode(sample_query());
        let request = Request::builder()
            .uri(format!("/dns-query?dns={encoded}"))
            .body(Body::empty())
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            DNS_MESSAGE_CONTENT_TYPE
        );
        assert_eq!(response.headers()["X-Upstream"], UP);
        let latency = response.headers()["X-Latency"].to_str().unwrap().to_owned();
        assert!(latency.parse::<u64>().is_ok());
        assert_eq!(body_bytes(response).await, b"dns-answer");
    }

    #[tokio::test]
    async fn post_round_trip() {
        let request = Request::builder()
            .method("POST")
            .uri("/dns-query")
            .header(header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .body(Body::from(sample_query()))
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"dns-answer");
    }

    #[tokio::test]
    async fn missing_dns_param_is_bad_request() {
        let request = Request::builder()
            .uri("/dns-query")
            .body(Body::empty())
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_base64_is_bad_request() {
        let request = Request::builder()
            .uri("/dns-query?dns=not%20base64!")
            .body(Body::empty())
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_query_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/dns-query")
            .body(Body::from(vec![0u8; MAX_QUERY_LEN + 1]))
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/dns-query")
            .body(Body::empty())
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failing_upstreams_map_to_bad_gateway() {
        let app = app(ScriptedTransport::new(&[(
            UP,
            Behavior::Fail { delay_ms: 0 },
        )]));
        let request = Request::builder()
            .method("POST")
            .uri("/dns-query")
            .body(Body::from(sample_query()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn cached_get_skips_the_race() {
        let transport = ScriptedTransport::new(&[(
            UP,
            Behavior::Respond {
                delay_ms: 0,
                payload: b"dns-answer".to_vec(),
            },
        )]);
        let app = app(Arc::clone(&transport));
        let encoded = URL_SAFE_NO_PAD.encode(sample_query());
        let uri = format!("/dns-query?dns={encoded}");

        for _ in 0..2 {
            let request = Request::builder()
                .uri(&uri)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(transport.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn post_cache_key_ignores_the_body() {
        let transport = ScriptedTransport::new(&[(
            UP,
            Behavior::Respond {
                delay_ms: 0,
                payload: b"first-answer".to_vec(),
            },
        )]);
        let app = app(Arc::clone(&transport));

        let mut other_query = sample_query();
        other_query[13] = b'x'; // different domain bytes, same URL

        for body in [sample_query(), other_query] {
            let request = Request::builder()
                .method("POST")
                .uri("/dns-query")
                .body(Body::from(body))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_bytes(response).await, b"first-answer");
        }

        // Only the first POST reached an upstream; the second hit the
        // URL-keyed cache despite carrying a different DNS message.
        assert_eq!(transport.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/dns-query")
            .header("Origin", "https://client.example")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = answering_app().oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }

    #[tokio::test]
    async fn region_hint_reads_country_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(region_hint(&headers), Region::Na);

        headers.insert("cf-ipcountry", "DE".parse().unwrap());
        assert_eq!(region_hint(&headers), Region::Eu);
    }
}
