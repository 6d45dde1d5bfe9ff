//! Canonical resource URI normalization (spec §4.5 step 1) and the
//! strict-HTTPS allowlist (spec §4.5 "HTTPS enforcement" / §3 invariant).

use url::Url;

/// Lowercase scheme/host, keep optional port and path, discard fragment and
/// query. Used to bind an MCP server to an OAuth token audience.
pub fn canonical_resource_uri(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);
    url.set_query(None);
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str()?.to_ascii_lowercase();
    let port_part = url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    let path = url.path();
    let path = if path == "/" { "" } else { path };
    Some(format!("{scheme}://{host}{port_part}{path}"))
}

/// True if `url` is HTTPS, or HTTP against localhost/127.0.0.1/::1 (the
/// spec's strict-HTTPS exceptions for local development).
pub fn is_https_or_local_exception(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if url.scheme() == "https" {
        return true;
    }
    if url.scheme() != "http" {
        return false;
    }
    matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_host_case_and_drops_fragment() {
        assert_eq!(
            canonical_resource_uri("HTTPS://Example.COM:8443/a/b#frag"),
            Some("https://example.com:8443/a/b".to_string())
        );
    }

    #[test]
    fn root_path_is_dropped() {
        assert_eq!(
            canonical_resource_uri("https://example.com/"),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn https_is_always_allowed() {
        assert!(is_https_or_local_exception("https://auth.example.com"));
    }

    #[test]
    fn localhost_http_is_allowed() {
        assert!(is_https_or_local_exception("http://localhost:8080/authorize"));
        assert!(is_https_or_local_exception("http://127.0.0.1:8080/authorize"));
    }

    #[test]
    fn non_local_http_is_rejected() {
        assert!(!is_https_or_local_exception("http://auth.example.com"));
    }
}
