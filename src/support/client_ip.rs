use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Picks the first `X-Forwarded-For` entry, falling back to the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers.get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(v), _) => v.to_owned(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_owned(),
    }
}

pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state).await
            .ok()
            .map(|ConnectInfo(addr)| addr);

        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([10, 0, 0, 7], 4321)))
    }

    #[test]
    fn prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 70.41.3.18, 150.172.238.178"));

        assert_eq!(client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_peer_address() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.0.0.7");

        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(" "));
        assert_eq!(client_ip(&headers, peer()), "10.0.0.7");
    }

    #[test]
    fn unknown_without_any_source() {
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
