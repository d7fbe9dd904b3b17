//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limits for login and registration (~10/min)
//! - `upload_rate_limiter`: limits for image uploads (~30/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor using the client IP.
///
/// Uses the peer address of the connection. When the server sits behind a
/// reverse proxy (`trust_proxy`), the first `X-Forwarded-For` hop or
/// `X-Real-IP` is used instead, since every request then arrives from the
/// proxy. Without a proxy those headers are client-controlled and ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIpKeyExtractor {
    trust_proxy: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }
}

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn peer_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let forwarded = if self.trust_proxy {
            ["x-forwarded-for", "x-real-ip"]
                .into_iter()
                .find_map(|name| header_ip(req, name))
        } else {
            None
        };

        forwarded
            .or_else(|| peer_ip(req))
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
/// See [`ClientIpKeyExtractor`] for `trust_proxy`.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn auth_rate_limiter(trust_proxy: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy))
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for uploads: ~30 requests per minute per IP.
///
/// # Panics
///
/// This function will not panic. `per_second(2)` and `burst_size(10)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn upload_rate_limiter(trust_proxy: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy))
        .per_second(2)
        .burst_size(10)
        .finish()
        .expect("rate limiter config with per_second(2) and burst_size(10) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request_from(peer: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        let peer: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        req
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_forwarded_headers_ignored_without_proxy() {
        let extractor = ClientIpKeyExtractor::new(false);
        for spoofed in ["203.0.113.7", "203.0.113.8", "198.51.100.1"] {
            let req = request_from(
                "192.0.2.4:51000",
                &[
                    ("x-forwarded-for", spoofed),
                    ("x-real-ip", spoofed),
                    ("cf-connecting-ip", spoofed),
                ],
            );
            assert_eq!(extractor.extract(&req).unwrap(), ip("192.0.2.4"));
        }
    }

    #[test]
    fn test_forwarded_header_used_behind_proxy() {
        let extractor = ClientIpKeyExtractor::new(true);
        let req = request_from(
            "10.0.0.1:443",
            &[("x-forwarded-for", "203.0.113.7, 10.0.0.1")],
        );
        assert_eq!(extractor.extract(&req).unwrap(), ip("203.0.113.7"));

        let req = request_from("10.0.0.1:443", &[("x-real-ip", "198.51.100.9")]);
        assert_eq!(extractor.extract(&req).unwrap(), ip("198.51.100.9"));
    }

    #[test]
    fn test_proxy_mode_falls_back_to_peer_address() {
        let req = request_from("192.0.2.4:51000", &[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(
            ClientIpKeyExtractor::new(true).extract(&req).unwrap(),
            ip("192.0.2.4")
        );
    }

    #[test]
    fn test_no_address_is_an_error() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        assert!(ClientIpKeyExtractor::new(false).extract(&req).is_err());
    }
}
