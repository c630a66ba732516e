//! Per-request credential resolution.

use std::fmt;

use super::error::{ExtractError, Result};

/// Outbound HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// Build a proxy only when both parts are configured.
    ///
    /// A host without a port (or the reverse) counts as no proxy at all.
    #[must_use]
    pub fn from_parts(host: Option<&str>, port: Option<u16>) -> Option<Self> {
        match (host.map(str::trim).filter(|h| !h.is_empty()), port) {
            (Some(host), Some(port)) => Some(Self {
                host: host.to_string(),
                port,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Session cookie and proxy that apply to one request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    cookies: String,
    proxy: Option<ProxyConfig>,
}

impl Credentials {
    #[must_use]
    pub fn cookies(&self) -> &str {
        &self.cookies
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }
}

// Cookie strings are session secrets; keep them out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("cookies", &format_args!("<{} bytes>", self.cookies.len()))
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Pick the cookie string and proxy for a request.
///
/// A non-blank request cookie string replaces the default entirely.
///
/// # Errors
///
/// Returns `AuthMissing` when neither source provides cookies.
pub fn resolve(
    request_cookies: Option<&str>,
    default_cookies: Option<&str>,
    proxy: Option<&ProxyConfig>,
) -> Result<Credentials> {
    let cookies = non_blank(request_cookies)
        .or_else(|| non_blank(default_cookies))
        .ok_or(ExtractError::AuthMissing)?;

    Ok(Credentials {
        cookies: cookies.to_string(),
        proxy: proxy.cloned(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> ProxyConfig {
        ProxyConfig {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }

    #[test]
    fn test_request_cookies_override_default() {
        let creds = resolve(Some("a1=req"), Some("a1=default; web_session=x"), None).unwrap();
        assert_eq!(creds.cookies(), "a1=req");
        assert!(creds.proxy().is_none());
    }

    #[test]
    fn test_falls_back_to_default() {
        let creds = resolve(None, Some("a1=default"), Some(&proxy())).unwrap();
        assert_eq!(creds.cookies(), "a1=default");
        assert_eq!(creds.proxy(), Some(&proxy()));
    }

    #[test]
    fn test_blank_request_cookies_fall_back() {
        let creds = resolve(Some("  "), Some("a1=default"), None).unwrap();
        assert_eq!(creds.cookies(), "a1=default");
    }

    #[test]
    fn test_missing_everywhere_is_auth_missing() {
        assert_eq!(resolve(None, None, None), Err(ExtractError::AuthMissing));
        assert_eq!(
            resolve(Some(""), Some(" "), Some(&proxy())),
            Err(ExtractError::AuthMissing)
        );
    }

    #[test]
    fn test_debug_hides_cookie_value() {
        let creds = resolve(Some("web_session=secret"), None, None).unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_partial_proxy_is_absent() {
        assert!(ProxyConfig::from_parts(Some("127.0.0.1"), None).is_none());
        assert!(ProxyConfig::from_parts(None, Some(7890)).is_none());
        assert!(ProxyConfig::from_parts(Some(""), Some(7890)).is_none());
        assert_eq!(
            ProxyConfig::from_parts(Some("127.0.0.1"), Some(7890)),
            Some(proxy())
        );
    }

    #[test]
    fn test_proxy_url() {
        assert_eq!(proxy().url(), "http://127.0.0.1:7890");
    }
}
