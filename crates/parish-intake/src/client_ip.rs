//! Client address derivation behind reverse proxies.

use std::net::SocketAddr;

/// The address a request is attributed to for rate limiting: the first hop
/// of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer. Returns an
/// empty string when none is known, which the rate limiter refuses.
pub fn client_ip(
  forwarded_for: Option<&str>,
  real_ip: Option<&str>,
  peer: Option<SocketAddr>,
) -> String {
  if let Some(first) = forwarded_for
    .filter(|v| !v.is_empty())
    .and_then(|v| v.split(',').next())
  {
    return first.trim().to_owned();
  }
  if let Some(real) = real_ip.filter(|v| !v.is_empty()) {
    return real.to_owned();
  }
  peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}
