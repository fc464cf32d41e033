//! Host name resolution.

use std::net::SocketAddr;

use tracing::debug;

use crate::error::RelayError;
use crate::Result;

/// Resolve `host` to a connectable address on `port`.
///
/// IPv4 results are preferred; an IPv6 address is only returned when the
/// host has no IPv4 record.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            debug!("lookup of {} failed: {}", host, e);
            RelayError::Resolve(host.to_string())
        })?
        .collect();

    let addr = addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| RelayError::Resolve(host.to_string()))?;

    debug!("Hostname {} resolved to {}", host, addr);
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let addr = resolve("127.0.0.1", 8080).await.unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve("localhost", 9000).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9000);
    }

    #[tokio::test]
    async fn test_resolve_unknown_host() {
        let err = resolve("no-such-host.invalid", 8080).await.unwrap_err();
        assert!(matches!(err, RelayError::Resolve(_)));
        assert!(err.is_setup());
    }
}
