//! Shared constants used across the application.

/// User agent string sent with every platform request.
///
/// This is a realistic desktop Chrome user agent; the platform serves its
/// login wall or a verification page to clients that do not look like one.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Client hints matching [`BROWSER_USER_AGENT`].
pub const BROWSER_SEC_CH_UA: &str =
    r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#;

pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

pub const BROWSER_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Default web origin of the platform.
pub const DEFAULT_WEB_BASE: &str = "https://www.xiaohongshu.com";

/// CDN origin serving unbranded, full-resolution images.
pub const IMAGE_ORIGIN_CDN: &str = "https://sns-img-bd.xhscdn.com";

/// CDN origin serving original (watermark-free) video streams.
pub const VIDEO_ORIGIN_CDN: &str = "https://sns-video-bd.xhscdn.com";

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "xhs-api";
