use crate::error::StitchError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Check that an upstream playlist URL is safe to fetch (SSRF protection).
///
/// Source, rendition and ad playlist URLs all arrive inside client-supplied
/// tokens. Only `http`/`https` URLs whose host is a domain name or a public
/// IP literal pass. Domain names are not resolved, so DNS rebinding is not
/// covered.
///
/// # Errors
/// [`StitchError::InvalidOrigin`] for unparsable URLs, other schemes,
/// missing hosts and private or reserved IP literals.
pub fn validate_origin_url(url: &str) -> Result<Url, StitchError> {
    let parsed =
        Url::parse(url).map_err(|_| StitchError::InvalidOrigin(format!("Invalid URL: {url}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StitchError::InvalidOrigin(format!(
            "Scheme '{}' not allowed, only http/https",
            parsed.scheme()
        )));
    }

    let blocked = match parsed.host() {
        None => {
            return Err(StitchError::InvalidOrigin(format!("No host in URL: {url}")));
        }
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => is_blocked_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_blocked_ipv6(ip),
    };

    if blocked {
        return Err(StitchError::InvalidOrigin(format!(
            "Private or reserved host not allowed: {}",
            parsed.host_str().unwrap_or_default()
        )));
    }

    Ok(parsed)
}

/// Unspecified, private (RFC 1918), loopback, link-local (cloud metadata),
/// shared CGNAT space and broadcast
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();

    a == 0
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || (a == 100 && (64..=127).contains(&b))
}

/// Loopback, unspecified, link-local (`fe80::/10`), unique-local
/// (`fc00::/7`) and IPv4-mapped addresses of blocked IPv4 hosts
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }
    let first = ip.segments()[0];

    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80
        || (first & 0xfe00) == 0xfc00
}
