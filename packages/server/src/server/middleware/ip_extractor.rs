use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Extension key for the resolved client address
#[derive(Clone, Debug)]
pub struct ClientIp(pub IpAddr);

/// Middleware that resolves the client IP once per request.
///
/// Resolution order: X-Forwarded-For (first entry), then X-Real-IP, then the
/// socket address. A present but unparseable header wins over the socket
/// fallback, so a garbled proxy header leaves the request without a
/// [`ClientIp`] rather than attributing it to the proxy itself.
pub async fn extract_client_ip(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(ip) = client_ip_from(request.headers(), addr) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}

fn client_ip_from(headers: &HeaderMap, socket: SocketAddr) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        return forwarded
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        return real_ip.to_str().ok().and_then(|s| s.parse::<IpAddr>().ok());
    }

    Some(socket.ip())
}
