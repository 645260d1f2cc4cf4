//! Hop-by-hop header scrubbing and forwarding headers.

use std::net::IpAddr;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, TRAILER, UPGRADE};

/// Hop-by-hop headers, removed before a request or response crosses the
/// proxy. Per RFC 7230 these are required to appear in `Connection`; the
/// fixed list covers the RFC 2616 set still sent for backward
/// compatibility ("Proxy-Connection" is non-standard but common).
const HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Delete every header named by a `Connection` token (RFC 7230 §6.1).
pub(crate) fn remove_connection_headers(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
}

pub(crate) fn remove_hop_headers(headers: &mut HeaderMap) {
    for name in HOP_HEADERS {
        headers.remove(name);
    }
}

pub(crate) fn header_contains_token(headers: &HeaderMap, name: &HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// The lower-cased `Upgrade` protocol, present only when `Connection`
/// actually names the Upgrade token.
pub(crate) fn upgrade_type(headers: &HeaderMap) -> Option<String> {
    if !header_contains_token(headers, &CONNECTION, "upgrade") {
        return None;
    }

    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
}

/// Distinct trailer names declared by the upstream `Trailer` header.
pub(crate) fn trailer_names(headers: &HeaderMap) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for value in headers.get_all(TRAILER) {
        let Ok(value) = value.to_str() else { continue };

        for token in value.split(',') {
            let token = token.trim();

            if !token.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(token)) {
                names.push(token.to_string());
            }
        }
    }

    names
}

/// Fold the client address onto any prior `X-Forwarded-For` values as one
/// comma+space separated header.
pub(crate) fn fold_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let prior: Vec<String> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect();

    let folded = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client)
    };

    if let Ok(value) = HeaderValue::from_str(&folded) {
        headers.insert(&X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_fixed_hop_headers() {
        let mut h = HeaderMap::new();
        h.insert("keep-alive", "timeout=5".parse().unwrap());
        h.insert("transfer-encoding", "chunked".parse().unwrap());
        h.insert("content-type", "text/plain".parse().unwrap());

        remove_hop_headers(&mut h);

        assert!(h.get("keep-alive").is_none());
        assert!(h.get("transfer-encoding").is_none());
        assert!(h.get("content-type").is_some());
    }

    #[test]
    fn scrubs_headers_named_in_connection() {
        let mut h = HeaderMap::new();
        h.insert(CONNECTION, "close, X-Internal-Secret".parse().unwrap());
        h.insert("x-internal-secret", "shh".parse().unwrap());
        h.insert("x-public", "ok".parse().unwrap());

        remove_connection_headers(&mut h);

        assert!(h.get("x-internal-secret").is_none());
        assert!(h.get("x-public").is_some());
    }

    #[test]
    fn upgrade_type_needs_connection_token() {
        let mut h = HeaderMap::new();
        h.insert(UPGRADE, "WebSocket".parse().unwrap());
        assert_eq!(upgrade_type(&h), None);

        h.insert(CONNECTION, "keep-alive, Upgrade".parse().unwrap());
        assert_eq!(upgrade_type(&h).as_deref(), Some("websocket"));
    }

    #[test]
    fn folds_forwarded_for() {
        let mut h = HeaderMap::new();
        h.insert(&X_FORWARDED_FOR, "203.0.113.1, 203.0.113.2".parse().unwrap());

        fold_forwarded_for(&mut h, "10.0.0.7".parse().unwrap());

        assert_eq!(
            h.get(&X_FORWARDED_FOR).unwrap(),
            "203.0.113.1, 203.0.113.2, 10.0.0.7"
        );
    }

    #[test]
    fn forwarded_for_starts_fresh_without_prior() {
        let mut h = HeaderMap::new();
        fold_forwarded_for(&mut h, "10.0.0.7".parse().unwrap());
        assert_eq!(h.get(&X_FORWARDED_FOR).unwrap(), "10.0.0.7");
    }

    #[test]
    fn trailer_names_deduplicate() {
        let mut h = HeaderMap::new();
        h.append(TRAILER, "X-Checksum, X-Count".parse().unwrap());
        h.append(TRAILER, "x-checksum".parse().unwrap());

        assert_eq!(trailer_names(&h), vec!["X-Checksum", "X-Count"]);
    }
}
