use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use serde::Serialize;

use reqgate_core::clock::{now_ms, random_base36, to_base36};

use super::route::normalize_route;

pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";
/// Checked when the configured header is absent.
pub const FALLBACK_REQUEST_ID_HEADER: &str = "x-correlation-id";
/// Edge platform trace id, last inbound source before synthesizing.
pub const PLATFORM_TRACE_HEADER: &str = "cf-ray";
/// Inbound ids longer than this are ignored.
pub const MAX_REQUEST_ID_LEN: usize = 128;

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Immutable per-request metadata, available to handlers as
/// `Extension<RequestContext>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub request_id: String,
    pub started_at_ms: i64,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Normalized route template.
    pub route: Option<String>,
    pub method: String,
    pub path: String,
    #[serde(skip)]
    started: Instant,
}

impl RequestContext {
    /// Milliseconds since the context was created (monotonic clock).
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Route used as the metrics key.
    pub fn route_key(&self) -> &str {
        self.route.as_deref().unwrap_or("/")
    }
}

/// Trimmed, non-blank header value.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Request id from the configured header, the fallback header or the platform
/// trace header; synthesized (`base36(now_ms)-xxxxxxxx`) if none is usable.
pub fn make_request_id(headers: &HeaderMap, configured_header: &str) -> String {
    [configured_header, FALLBACK_REQUEST_ID_HEADER, PLATFORM_TRACE_HEADER]
        .into_iter()
        .filter_map(|name| header_str(headers, name))
        .find(|v| v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(synthesize_request_id)
}

pub fn synthesize_request_id() -> String {
    let ts = u64::try_from(now_ms()).unwrap_or_default();
    format!("{}-{}", to_base36(ts), random_base36(8))
}

/// Best-effort client address. Proxy headers count only when the socket peer
/// is one of `trusted_proxies`; any other peer is the client itself.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<String> {
    let peer_ip = peer.map(|p| p.ip());
    let via_proxy = peer_ip.is_some_and(|ip| trusted_proxies.contains(&ip));
    via_proxy
        .then(|| forwarded_client(headers, trusted_proxies))
        .flatten()
        .or_else(|| peer_ip.map(|ip| ip.to_string()))
}

/// Client address as reported by a trusted proxy.
fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<String> {
    if let Some(v) = header_str(headers, CF_CONNECTING_IP) {
        return Some(v.to_string());
    }
    // entries left of the last untrusted hop are client-supplied
    let hop = header_str(headers, X_FORWARDED_FOR).and_then(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .rev()
            .find(|s| s.parse::<IpAddr>().map_or(true, |ip| !trusted_proxies.contains(&ip)))
    });
    hop.or_else(|| header_str(headers, X_REAL_IP)).map(str::to_string)
}

pub fn build_request_context<B>(
    req: &Request<B>,
    request_id_header: &str,
    trusted_proxies: &[IpAddr],
) -> RequestContext {
    let headers = req.headers();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    RequestContext {
        request_id: make_request_id(headers, request_id_header),
        started_at_ms: now_ms(),
        client_ip: client_ip(headers, peer, trusted_proxies),
        user_agent: header_str(headers, "user-agent").map(str::to_string),
        route: Some(normalize_route(req.uri().path())),
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        started: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn configured_header_wins() {
        let h = headers(&[
            ("x-request-id", " abc "),
            ("x-correlation-id", "corr"),
            ("cf-ray", "ray"),
        ]);
        assert_eq!(make_request_id(&h, "x-request-id"), "abc");
    }

    #[test]
    fn custom_configured_header() {
        let h = headers(&[("x-trace", "t-1"), ("x-request-id", "ignored")]);
        assert_eq!(make_request_id(&h, "x-trace"), "t-1");
    }

    #[test]
    fn falls_back_in_order() {
        let h = headers(&[
            ("x-request-id", "   "),
            ("x-correlation-id", "corr"),
            ("cf-ray", "ray"),
        ]);
        assert_eq!(make_request_id(&h, "x-request-id"), "corr");
        let h = headers(&[("cf-ray", "ray-hkg")]);
        assert_eq!(make_request_id(&h, "x-request-id"), "ray-hkg");
    }

    #[test]
    fn oversized_inbound_id_skipped() {
        let long: &'static str = Box::leak("a".repeat(MAX_REQUEST_ID_LEN + 1).into_boxed_str());
        let h = headers(&[("x-request-id", long), ("cf-ray", "ray")]);
        assert_eq!(make_request_id(&h, "x-request-id"), "ray");
    }

    #[test]
    fn synthesized_ids_are_distinct() {
        let h = HeaderMap::new();
        let a = make_request_id(&h, "x-request-id");
        let b = make_request_id(&h, "x-request-id");
        assert!(!a.is_empty());
        assert_ne!(a, b);
        let (ts, rand) = a.split_once('-').unwrap();
        assert!(!ts.is_empty());
        assert_eq!(rand.len(), 8);
    }

    #[test]
    fn non_visible_ascii_inbound_id_skipped() {
        let mut h = HeaderMap::new();
        h.insert("x-request-id", HeaderValue::from_bytes(b"id-\xfe\xff").unwrap());
        h.insert("x-correlation-id", HeaderValue::from_static("corr"));
        assert_eq!(make_request_id(&h, "x-request-id"), "corr");

        let mut h = HeaderMap::new();
        h.insert("x-request-id", HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap());
        let id = make_request_id(&h, "x-request-id");
        assert_ne!(id, "caf\u{e9}");
        assert!(id.is_ascii());
    }

    fn trusted() -> Vec<IpAddr> {
        vec!["10.0.0.1".parse().unwrap()]
    }

    #[test]
    fn proxy_headers_from_trusted_peer() {
        let proxy: SocketAddr = "10.0.0.1:443".parse().unwrap();

        let h = headers(&[("x-forwarded-for", "203.0.113.9")]);
        assert_eq!(client_ip(&h, Some(proxy), &trusted()).as_deref(), Some("203.0.113.9"));

        let h = headers(&[("cf-connecting-ip", "198.51.100.2"), ("x-real-ip", "10.0.0.2")]);
        assert_eq!(client_ip(&h, Some(proxy), &trusted()).as_deref(), Some("198.51.100.2"));

        let h = headers(&[("x-real-ip", "192.0.2.7")]);
        assert_eq!(client_ip(&h, Some(proxy), &trusted()).as_deref(), Some("192.0.2.7"));
    }

    #[test]
    fn forwarded_for_takes_last_untrusted_hop() {
        let proxy: SocketAddr = "10.0.0.1:443".parse().unwrap();
        // the client wrote the first entry itself; the proxy appended the real one
        let h = headers(&[("x-forwarded-for", "1.2.3.4, 203.0.113.9, 10.0.0.1")]);
        assert_eq!(client_ip(&h, Some(proxy), &trusted()).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn proxy_headers_ignored_from_untrusted_peer() {
        let peer: SocketAddr = "198.51.100.50:5000".parse().unwrap();
        let h = headers(&[("x-forwarded-for", "203.0.113.9"), ("cf-connecting-ip", "1.1.1.1")]);
        assert_eq!(client_ip(&h, Some(peer), &trusted()).as_deref(), Some("198.51.100.50"));
        assert_eq!(client_ip(&h, Some(peer), &[]).as_deref(), Some("198.51.100.50"));
        assert_eq!(client_ip(&h, None, &trusted()), None);
        assert_eq!(client_ip(&HeaderMap::new(), None, &[]), None);
    }

    #[test]
    fn context_from_request() {
        let req = Request::builder()
            .method("GET")
            .uri("/tasks/42?full=1")
            .header("user-agent", "curl/8")
            .header("x-request-id", "rid-1")
            .body(())
            .unwrap();
        let ctx = build_request_context(&req, "x-request-id", &[]);
        assert_eq!(ctx.request_id, "rid-1");
        assert_eq!(ctx.route.as_deref(), Some("/tasks/:id"));
        assert_eq!(ctx.path, "/tasks/42");
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(ctx.client_ip, None);
        assert!(ctx.started_at_ms > 0);
    }
}
