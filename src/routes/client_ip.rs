use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Address of the calling client.
///
/// Taken from the first `X-Forwarded-For` entry, else the socket peer, with the IPv4-mapped
/// `::ffff:` prefix removed. Falls back to `unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientIp(resolve(&parts.headers, peer)))
    }
}

fn resolve(headers: &HeaderMap, peer: Option<String>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    match forwarded.or(peer) {
        Some(ip) => normalize(&ip),
        None => UNKNOWN_CLIENT.into(),
    }
}

fn normalize(ip: &str) -> String {
    ip.strip_prefix("::ffff:").unwrap_or(ip).to_owned()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("::ffff:1.2.3.4, 10.0.0.1"),
        );
        assert_eq!(resolve(&headers, Some("127.0.0.1".into())), "1.2.3.4");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(resolve(&headers, Some("::ffff:5.6.7.8".into())), "5.6.7.8");
        assert_eq!(resolve(&headers, None), "unknown");
    }
}
