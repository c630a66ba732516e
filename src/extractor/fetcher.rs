//! Fetching raw note payloads from the platform.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER,
    UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::credentials::{Credentials, ProxyConfig};
use super::error::{ExtractError, Result};
use super::payload::RawPayload;
use super::url::PostDescriptor;
use crate::config::Config;
use crate::constants::{
    BROWSER_ACCEPT, BROWSER_ACCEPT_LANGUAGE, BROWSER_SEC_CH_UA, BROWSER_USER_AGENT,
};

/// Pause before the single retry of a network failure.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Statuses the platform uses for throttling and bot verification.
const THROTTLE_STATUSES: &[u16] = &[429, 461, 471];

const STATE_MARKER: &str = "window.__INITIAL_STATE__";

static SCRIPT_SELECTOR: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse("script").unwrap());

/// Source of raw note payloads.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// Fetch the raw payload for one post.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ExtractError`] describing why no payload could
    /// be obtained.
    async fn fetch(&self, descriptor: &PostDescriptor, creds: &Credentials) -> Result<RawPayload>;
}

/// Fetches note detail pages over HTTP while presenting as a desktop browser.
#[derive(Debug)]
pub struct NoteFetcher {
    web_base: String,
    timeout: Duration,
    clients: RwLock<HashMap<Option<ProxyConfig>, Client>>,
}

impl NoteFetcher {
    #[must_use]
    pub fn new(web_base: &str, timeout: Duration) -> Self {
        Self {
            web_base: web_base.trim_end_matches('/').to_string(),
            timeout,
            clients: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.web_base, config.request_timeout)
    }

    /// Get the client for a proxy, building it on first use.
    async fn client_for(&self, proxy: Option<&ProxyConfig>) -> Result<Client> {
        let key = proxy.cloned();
        {
            let read_guard = self.clients.read().await;
            if let Some(client) = read_guard.get(&key) {
                return Ok(client.clone());
            }
        }

        let mut write_guard = self.clients.write().await;
        if let Some(client) = write_guard.get(&key) {
            return Ok(client.clone());
        }

        let client = self.build_client(proxy)?;
        write_guard.insert(key, client.clone());
        Ok(client)
    }

    fn build_client(&self, proxy: Option<&ProxyConfig>) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .timeout(self.timeout)
            .gzip(true);

        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy.url())
                .map_err(|e| ExtractError::Network(format!("invalid proxy {}: {e}", proxy.url())))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| ExtractError::Network(format!("failed to build HTTP client: {e}")))
    }

    async fn fetch_once(
        &self,
        descriptor: &PostDescriptor,
        creds: &Credentials,
    ) -> Result<RawPayload> {
        let url = descriptor.detail_url(&self.web_base)?;
        let cookie = HeaderValue::from_str(creds.cookies()).map_err(|_| {
            ExtractError::Auth("cookie string contains characters not allowed in a header".into())
        })?;
        let client = self.client_for(creds.proxy()).await?;

        debug!(post_id = %descriptor.post_id, proxied = creds.proxy().is_some(), "Fetching note page");

        let response = client
            .get(url)
            .header(COOKIE, cookie)
            .header(REFERER, format!("{}/", self.web_base))
            .send()
            .await?;

        classify_final_url(response.url(), descriptor)?;
        classify_status(response.status())?;

        let body = response.text().await?;
        let Some(state) = extract_initial_state(&body)? else {
            if body.to_ascii_lowercase().contains("captcha") {
                return Err(ExtractError::RateLimited(
                    "served a verification page instead of the post".to_string(),
                ));
            }
            return Err(ExtractError::ParseFailure(
                "page has no initial state script".to_string(),
            ));
        };

        locate_note(&state, descriptor)
    }
}

#[async_trait]
impl NoteSource for NoteFetcher {
    async fn fetch(&self, descriptor: &PostDescriptor, creds: &Credentials) -> Result<RawPayload> {
        match self.fetch_once(descriptor, creds).await {
            Err(e) if e.is_retryable() => {
                warn!(post_id = %descriptor.post_id, error = %e, "Fetch failed, retrying once");
                tokio::time::sleep(RETRY_DELAY).await;
                self.fetch_once(descriptor, creds).await
            }
            other => other,
        }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    for (name, value) in [
        ("sec-ch-ua", BROWSER_SEC_CH_UA),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Windows\""),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "same-origin"),
        ("sec-fetch-user", "?1"),
    ] {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Classify where the platform redirected us.
fn classify_final_url(url: &Url, descriptor: &PostDescriptor) -> Result<()> {
    let path = url.path();

    if path.contains("captcha") {
        return Err(ExtractError::RateLimited(
            "redirected to a verification page".to_string(),
        ));
    }
    if path.contains("login") {
        return Err(ExtractError::Auth(
            "redirected to the login page; the session cookie is invalid or expired".to_string(),
        ));
    }
    if path == "/404" || path.starts_with("/404/") {
        let code = url
            .query_pairs()
            .find(|(key, _)| key == "error_code")
            .map_or_else(|| "none".to_string(), |(_, value)| value.into_owned());
        if descriptor.access_token.is_none() {
            return Err(ExtractError::Auth(format!(
                "post {} is not viewable without an access token (xsec_token), error code {code}",
                descriptor.post_id
            )));
        }
        return Err(ExtractError::NotFound(format!(
            "post {} is deleted, private or unavailable, error code {code}",
            descriptor.post_id
        )));
    }
    Ok(())
}

fn classify_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let code = status.as_u16();
    if THROTTLE_STATUSES.contains(&code) {
        return Err(ExtractError::RateLimited(format!("platform returned {status}")));
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ExtractError::Auth(format!("platform returned {status}")))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            Err(ExtractError::NotFound(format!("platform returned {status}")))
        }
        s if s.is_server_error() => Err(ExtractError::Network(format!("platform returned {s}"))),
        s => Err(ExtractError::ParseFailure(format!("unexpected status {s}"))),
    }
}

/// Find and decode the page-state JSON.
///
/// Returns `Ok(None)` when the page carries no state script at all.
///
/// # Errors
///
/// Returns `ParseFailure` when the state script is present but is not JSON.
fn extract_initial_state(html: &str) -> Result<Option<Value>> {
    let document = Html::parse_document(html);
    for script in document.select(&SCRIPT_SELECTOR) {
        let text: String = script.text().collect();
        let Some(start) = text.find(STATE_MARKER) else {
            continue;
        };
        let assignment = text[start + STATE_MARKER.len()..].trim_start();
        let json = assignment
            .strip_prefix('=')
            .unwrap_or(assignment)
            .trim()
            .trim_end_matches(';')
            .trim_end();
        let value = serde_json::from_str(&normalize_undefined(json)).map_err(|e| {
            ExtractError::ParseFailure(format!("initial state is not valid JSON: {e}"))
        })?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// Replace bare `undefined` literals (outside strings) with `null`.
fn normalize_undefined(script: &str) -> String {
    const UNDEFINED: &str = "undefined";

    let mut out = String::with_capacity(script.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut prev_ident = false;
    let mut rest = script;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if !prev_ident && rest.starts_with(UNDEFINED) {
            let next = rest[UNDEFINED.len()..].chars().next();
            if !next.is_some_and(is_ident_char) {
                out.push_str("null");
                rest = &rest[UNDEFINED.len()..];
                prev_ident = true;
                continue;
            }
        }
        out.push(c);
        prev_ident = !in_string && is_ident_char(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Pick the requested note out of the page state.
fn locate_note(state: &Value, descriptor: &PostDescriptor) -> Result<RawPayload> {
    let pointer = format!("/note/noteDetailMap/{}/note", descriptor.post_id);
    match state.pointer(&pointer) {
        Some(note @ Value::Object(fields)) if !fields.is_empty() => Ok(RawPayload::new(note.clone())),
        _ if state.pointer("/user/loggedIn") == Some(&Value::Bool(false)) => {
            Err(ExtractError::Auth(format!(
                "post {} was withheld because the session is not logged in",
                descriptor.post_id
            )))
        }
        _ => Err(ExtractError::NotFound(format!(
            "post {} is not present in the page state",
            descriptor.post_id
        ))),
    }
}
