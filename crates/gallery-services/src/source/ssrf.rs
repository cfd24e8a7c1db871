//! Address checks for URL sources.
//!
//! A remote picture is only fetched when its host is a public address. The
//! host name is resolved here so a public name pointing at an internal address
//! is refused as well.

use gallery_core::AppError;
use reqwest::Url;
use std::net::{IpAddr, Ipv6Addr};
use tokio::net::lookup_host;

const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".corp", ".localhost"];

fn refused(reason: impl Into<String>) -> AppError {
    AppError::InvalidParams(format!("URL not allowed: {}", reason.into()))
}

/// Refuse URLs whose host is, or resolves to, a private or loopback address.
pub async fn ensure_public_host(url: &Url) -> Result<(), AppError> {
    let host = url
        .host_str()
        .ok_or_else(|| refused("missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_lowercase();

    if host == "localhost" || INTERNAL_SUFFIXES.iter().any(|s| host.ends_with(s)) {
        return Err(refused("internal host name"));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(refused("private or loopback address"));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let resolved = lookup_host((host.as_str(), port)).await.map_err(|e| {
        tracing::warn!(host = %host, error = %e, "DNS resolution failed for URL source");
        refused(format!("host {} could not be resolved", host))
    })?;

    for addr in resolved {
        if is_private_ip(&addr.ip()) {
            return Err(refused(format!("{} resolves to {}", host, addr.ip())));
        }
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || is_unique_local(v6)
                || is_link_local(v6)
        }
    }
}

fn is_link_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

fn is_unique_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xfe00 == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check(url: &str) -> Result<(), AppError> {
        ensure_public_host(&Url::parse(url).unwrap()).await
    }

    #[tokio::test]
    async fn test_rejects_loopback_and_private_literals() {
        for url in [
            "http://127.0.0.1/a.png",
            "http://10.1.2.3/a.png",
            "http://192.168.0.10/a.png",
            "http://172.20.0.1/a.png",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]/a.png",
            "http://[::ffff:10.0.0.1]/a.png",
        ] {
            assert!(
                matches!(check(url).await, Err(AppError::InvalidParams(_))),
                "{} should be refused",
                url
            );
        }
    }

    #[tokio::test]
    async fn test_rejects_internal_names() {
        assert!(check("http://localhost:8080/a.png").await.is_err());
        assert!(check("http://nas.local/a.png").await.is_err());
        assert!(check("https://build.corp/a.png").await.is_err());
    }

    #[tokio::test]
    async fn test_accepts_public_literal() {
        assert!(check("https://8.8.8.8/a.png").await.is_ok());
    }

    #[test]
    fn test_private_ranges() {
        assert!(is_private_ip(&"172.31.255.255".parse().unwrap()));
        assert!(!is_private_ip(&"172.32.0.1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
        assert!(!is_private_ip(&"2606:4700::1111".parse().unwrap()));
    }
}
