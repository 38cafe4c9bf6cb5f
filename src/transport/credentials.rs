//! Credentials policy for the XHR-shaped transports.
//!
//! fetch takes the `credentials` option as-is. XMLHttpRequest only has a
//! `withCredentials` flag, so the mode is resolved here first.

use crate::http::options::{CredentialsMode, RequestMode};
use url::Url;

/// Resolve the effective credentials mode.
///
/// An explicit option wins, `navigate` implies `include`, a target on the
/// document's own origin gets `same-origin`, anything else is `omit`.
pub fn resolve_credentials(
    explicit: Option<CredentialsMode>,
    mode: RequestMode,
    target: &Url,
    document: Option<&Url>,
) -> CredentialsMode {
    if let Some(credentials) = explicit {
        return credentials;
    }
    if mode == RequestMode::Navigate {
        return CredentialsMode::Include;
    }
    match document {
        Some(document) if document.origin() == target.origin() => CredentialsMode::SameOrigin,
        _ => CredentialsMode::Omit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_explicit_wins() {
        let mode = resolve_credentials(
            Some(CredentialsMode::Omit),
            RequestMode::Navigate,
            &url("https://a.example/x"),
            Some(&url("https://a.example/")),
        );
        assert_eq!(mode, CredentialsMode::Omit);
    }

    #[test]
    fn test_navigate_includes() {
        let mode = resolve_credentials(
            None,
            RequestMode::Navigate,
            &url("https://b.example/x"),
            Some(&url("https://a.example/")),
        );
        assert_eq!(mode, CredentialsMode::Include);
    }

    #[test]
    fn test_same_origin() {
        let mode = resolve_credentials(
            None,
            RequestMode::Cors,
            &url("https://a.example/api"),
            Some(&url("https://a.example/index.html")),
        );
        assert_eq!(mode, CredentialsMode::SameOrigin);
    }

    #[test]
    fn test_cross_origin_omits() {
        let port = resolve_credentials(
            None,
            RequestMode::Cors,
            &url("https://a.example:8443/api"),
            Some(&url("https://a.example/")),
        );
        assert_eq!(port, CredentialsMode::Omit);

        let no_document =
            resolve_credentials(None, RequestMode::Cors, &url("https://a.example/"), None);
        assert_eq!(no_document, CredentialsMode::Omit);
    }
}
