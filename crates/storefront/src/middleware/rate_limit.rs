//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for login and registration (~10/min)
//! - `api_rate_limiter`: relaxed limits for order creation and estimates,
//!   which each fan out to an external service (~60/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client address, in order of trust.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "x-forwarded-for"];

/// Key extractor that reads the client IP from reverse proxy headers, then
/// from the peer address.
///
/// Proxy headers are only read when `trust_proxy_headers` is set; otherwise
/// any client could rotate them to dodge the limit. `x-forwarded-for` may
/// hold a chain; the first entry is the client. The peer address is only
/// available when the server is started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Clone, Copy)]
pub struct ProxyIpKeyExtractor {
    pub trust_proxy_headers: bool,
}

fn client_ip(headers: &axum::http::HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

impl tower_governor::key_extractor::KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        self.trust_proxy_headers
            .then(|| client_ip(req.headers()))
            .flatten()
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// positive and always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn auth_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor { trust_proxy_headers })
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for payment and estimate endpoints: ~60 requests per
/// minute per IP.
///
/// Configuration: 1 request per second (replenish), burst of 20.
///
/// # Panics
///
/// This function will not panic. `per_second(1)` and `burst_size(20)` are
/// positive and always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor { trust_proxy_headers })
        .per_second(1)
        .burst_size(20)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(20) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(forwarded_for: &str, peer: Option<[u8; 4]>) -> Request<()> {
        let mut req = Request::builder()
            .header("x-forwarded-for", forwarded_for)
            .body(())
            .unwrap();
        if let Some(peer) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((peer, 40_000))));
        }
        req
    }

    #[test]
    fn test_proxy_headers_ignored_unless_trusted() {
        let untrusted = ProxyIpKeyExtractor {
            trust_proxy_headers: false,
        };
        let req = request("1.2.3.4", Some([10, 0, 0, 7]));
        assert_eq!(untrusted.extract(&req).unwrap(), IpAddr::from([10, 0, 0, 7]));

        // Rotating the header does not change the key
        let rotated = request("5.6.7.8", Some([10, 0, 0, 7]));
        assert_eq!(untrusted.extract(&rotated).unwrap(), IpAddr::from([10, 0, 0, 7]));

        assert!(untrusted.extract(&request("1.2.3.4", None)).is_err());
    }

    #[test]
    fn test_proxy_headers_used_when_trusted() {
        let trusted = ProxyIpKeyExtractor {
            trust_proxy_headers: true,
        };
        let req = request("1.2.3.4", Some([10, 0, 0, 7]));
        assert_eq!(trusted.extract(&req).unwrap(), IpAddr::from([1, 2, 3, 4]));

        let garbage = request("not-an-ip", Some([10, 0, 0, 7]));
        assert_eq!(trusted.extract(&garbage).unwrap(), IpAddr::from([10, 0, 0, 7]));
    }

    #[test]
    fn test_client_ip_prefers_cloudflare_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("200.150.1.9"));
        assert_eq!(client_ip(&headers), Some("200.150.1.9".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 177.10.2.3 , 10.0.0.2"));
        assert_eq!(client_ip(&headers), Some("177.10.2.3".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_missing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers), None);
    }
}
