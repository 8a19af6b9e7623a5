//! 客户端 IP 提取
//!
//! - 未配置 trusted_proxies：优先使用转发头（X-Forwarded-For 首跳，其次 X-Real-IP）
//! - 配置了 trusted_proxies：仅当连接来自这些代理（IP 或 CIDR）时才采用转发头
//! - 其余情况：使用连接对端地址

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// 解析 `ip` 或 `ip:port`
fn parse_peer(ip: &str) -> Option<IpAddr> {
    ip.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| ip.parse::<IpAddr>())
        .ok()
}

/// 检查 IP 是否在可信代理列表中
pub fn is_trusted_proxy(ip: &str, trusted_proxies: &[String]) -> bool {
    let Some(ip_addr) = parse_peer(ip) else {
        return false;
    };

    trusted_proxies.iter().any(|proxy| {
        if proxy.contains('/') {
            ip_in_cidr(&ip_addr, proxy)
        } else {
            proxy.parse::<IpAddr>().is_ok_and(|p| p == ip_addr)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(prefix_len) = prefix_len.parse::<u32>() else {
        return false;
    };
    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix_len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix_len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix_len).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

/// 从请求头提取转发的 IP（X-Forwarded-For 首跳，其次 X-Real-IP）
///
/// 无法解析为 IP 的值视为不存在。
pub fn forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    let header_ip = |name: &str, first_hop: bool| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(|s| if first_hop { s.split(',').next().unwrap_or_default() } else { s })
            .and_then(|s| parse_peer(s.trim()))
            .map(|ip| ip.to_string())
    };

    header_ip("x-forwarded-for", true).or_else(|| header_ip("x-real-ip", false))
}

/// 根据对端地址与转发头决定客户端 IP
pub fn resolve_client_ip(
    peer: Option<&str>,
    forwarded: Option<String>,
    trusted_proxies: &[String],
) -> Option<String> {
    let peer_ip = peer.and_then(parse_peer).map(|ip| ip.to_string());

    if trusted_proxies.is_empty() {
        return forwarded.or(peer_ip);
    }

    match peer {
        Some(peer) if is_trusted_proxy(peer, trusted_proxies) => {
            let real_ip = forwarded.or(peer_ip);
            debug!("Trusted proxy {}: client ip {:?}", peer, real_ip);
            real_ip
        }
        _ => peer_ip,
    }
}

/// 从 HttpRequest 提取客户端 IP
pub fn extract_client_ip(req: &HttpRequest, trusted_proxies: &[String]) -> Option<String> {
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    resolve_client_ip(
        peer.as_deref(),
        forwarded_ip_from_headers(req.headers()),
        trusted_proxies,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn test_ip_in_cidr() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        assert!(ip_in_cidr(&ip, "192.168.1.0/24"));
        assert!(!ip_in_cidr(&ip, "10.0.0.0/8"));
        assert!(ip_in_cidr(&ip, "0.0.0.0/0"));
        assert!(!ip_in_cidr(&ip, "192.168.1.0/33"));

        let ip6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(ip_in_cidr(&ip6, "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip6, "192.168.1.0/24"));
    }

    #[test]
    fn test_is_trusted_proxy() {
        let proxies = vec!["127.0.0.1".to_string(), "10.0.0.0/8".to_string()];
        assert!(is_trusted_proxy("127.0.0.1:8080", &proxies));
        assert!(is_trusted_proxy("10.2.3.4", &proxies));
        assert!(!is_trusted_proxy("8.8.8.8", &proxies));
        assert!(!is_trusted_proxy("garbage", &proxies));
    }

    #[test]
    fn test_forwarded_ip_prefers_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.9, 10.0.0.2"),
        );
        headers.insert(
            HeaderName::from_static("x-real-ip"),
            HeaderValue::from_static("198.51.100.1"),
        );
        assert_eq!(
            forwarded_ip_from_headers(&headers).as_deref(),
            Some("203.0.113.9")
        );

        headers.remove("x-forwarded-for");
        assert_eq!(
            forwarded_ip_from_headers(&headers).as_deref(),
            Some("198.51.100.1")
        );
    }

    #[test]
    fn test_forwarded_ip_ignores_malformed_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("<script>, 10.0.0.2"),
        );
        assert_eq!(forwarded_ip_from_headers(&headers), None);

        headers.insert(
            HeaderName::from_static("x-real-ip"),
            HeaderValue::from_static("198.51.100.1:443"),
        );
        assert_eq!(
            forwarded_ip_from_headers(&headers).as_deref(),
            Some("198.51.100.1")
        );

        // 转发头无效时回落到对端地址
        assert_eq!(
            resolve_client_ip(Some("10.0.0.2"), forwarded_ip_from_headers(&HeaderMap::new()), &[])
                .as_deref(),
            Some("10.0.0.2")
        );
    }

    #[test]
    fn test_resolve_client_ip() {
        let fwd = || Some("203.0.113.9".to_string());

        // 未配置可信代理：转发头优先
        assert_eq!(resolve_client_ip(Some("10.0.0.2"), fwd(), &[]).as_deref(), Some("203.0.113.9"));
        assert_eq!(resolve_client_ip(Some("10.0.0.2"), None, &[]).as_deref(), Some("10.0.0.2"));

        // 配置了可信代理：只信任来自代理的转发头
        let proxies = vec!["10.0.0.0/8".to_string()];
        assert_eq!(
            resolve_client_ip(Some("10.0.0.2"), fwd(), &proxies).as_deref(),
            Some("203.0.113.9")
        );
        assert_eq!(
            resolve_client_ip(Some("8.8.4.4"), fwd(), &proxies).as_deref(),
            Some("8.8.4.4")
        );
        assert_eq!(resolve_client_ip(None, fwd(), &proxies), None);
    }
}
