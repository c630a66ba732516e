//! Post URL interpretation.

use regex::Regex;
use url::{form_urlencoded, Url};

use super::error::{ExtractError, Result};

/// Hosts that serve post-detail pages.
const POST_HOSTS: &[&str] = &["www.xiaohongshu.com", "xiaohongshu.com"];

/// Post-detail path shapes; the last segment is the note identifier.
static POST_PATH: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"^/(?:explore|discovery/item|user/profile/[^/]+)/([^/]*)/?$").unwrap()
});

/// Note identifiers are 24 hexadecimal characters, lower-cased once parsed.
static NOTE_ID: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

const ACCESS_TOKEN_PARAM: &str = "xsec_token";
const SOURCE_TAG_PARAM: &str = "xsec_source";

/// Identifying information parsed out of a post URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDescriptor {
    pub raw_url: String,
    pub post_id: String,
    pub access_token: Option<String>,
    pub source_tag: Option<String>,
}

impl PostDescriptor {
    /// Canonical detail URL without query parameters.
    #[must_use]
    pub fn canonical_url(&self, web_base: &str) -> String {
        format!("{}/explore/{}", web_base.trim_end_matches('/'), self.post_id)
    }

    /// Detail-page URL carrying the access token and source tag, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if `web_base` is not an absolute URL.
    pub fn detail_url(&self, web_base: &str) -> Result<Url> {
        let mut url = Url::parse(&self.canonical_url(web_base))
            .map_err(|e| ExtractError::InvalidUrl(format!("bad web base {web_base}: {e}")))?;
        if self.access_token.is_some() || self.source_tag.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(token) = &self.access_token {
                pairs.append_pair(ACCESS_TOKEN_PARAM, token);
            }
            if let Some(source) = &self.source_tag {
                pairs.append_pair(SOURCE_TAG_PARAM, source);
            }
        }
        Ok(url)
    }
}

/// Parse a post URL into a [`PostDescriptor`].
///
/// # Errors
///
/// Returns `InvalidUrl` when the host or path is not a post-detail shape or
/// the identifier segment is empty or malformed.
pub fn parse_post_url(raw_url: &str) -> Result<PostDescriptor> {
    let trimmed = raw_url.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| ExtractError::InvalidUrl(format!("{trimmed}: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ExtractError::InvalidUrl(format!(
            "{trimmed}: unsupported scheme {}",
            parsed.scheme()
        )));
    }

    let host = parsed.host_str().unwrap_or_default();
    if !POST_HOSTS.contains(&host) {
        return Err(ExtractError::InvalidUrl(format!(
            "{trimmed}: not a post host"
        )));
    }

    let post_id = POST_PATH
        .captures(parsed.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ExtractError::InvalidUrl(format!("{trimmed}: not a post path")))?;

    if post_id.is_empty() {
        return Err(ExtractError::InvalidUrl(format!(
            "{trimmed}: missing post identifier"
        )));
    }
    if !NOTE_ID.is_match(post_id) {
        return Err(ExtractError::InvalidUrl(format!(
            "{trimmed}: malformed post identifier {post_id}"
        )));
    }

    let (access_token, source_tag) = parsed
        .query()
        .map(read_query_params)
        .unwrap_or_default();

    Ok(PostDescriptor {
        raw_url: trimmed.to_string(),
        post_id: post_id.to_ascii_lowercase(),
        access_token,
        source_tag,
    })
}

/// Pull the token and source tag out of a raw query string.
///
/// Tokens are base64 and may contain a literal `+`, which must not decode to
/// a space.
fn read_query_params(query: &str) -> (Option<String>, Option<String>) {
    let query = query.replace('+', "%2B");
    let mut token = None;
    let mut source = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            ACCESS_TOKEN_PARAM if token.is_none() => token = Some(value.into_owned()),
            SOURCE_TAG_PARAM if source.is_none() => source = Some(value.into_owned()),
            _ => {}
        }
    }
    (token, source)
}
