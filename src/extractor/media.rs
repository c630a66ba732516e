//! Watermark-free media URL resolution.
//!
//! The platform's default image URLs point at a preview host that serves a
//! resized, branded rendition keyed by an opaque path like
//! `/{yyyymmddHHMM}/{32-hex}/{token}!nd_dft_wlteh_webp_3`. The `token` part
//! addresses the original upload on the origin CDN. Videos carry an
//! `originVideoKey` that addresses the unbranded source file.
//!
//! Everything that depends on those URL conventions lives in this module so
//! that format drift is absorbed in one place.

use url::Url;

use super::payload::{ImagePayload, StreamVariant, VideoPayload};
use crate::constants::{IMAGE_ORIGIN_CDN, VIDEO_ORIGIN_CDN};

/// Scene tag of the full-size rendition in an image's `infoList`.
const DEFAULT_SCENE: &str = "WB_DFT";

/// Resolve the unbranded, original-resolution URL of an image.
///
/// Returns `None` when no listed URL carries a recognisable media token.
#[must_use]
pub fn unbranded_image_url(image: &ImagePayload) -> Option<String> {
    if let Some(trace_id) = non_empty(image.trace_id.as_deref()) {
        return Some(origin_image_url(trace_id));
    }

    let scene_default = image
        .info_list
        .iter()
        .find(|info| info.image_scene.as_deref() == Some(DEFAULT_SCENE))
        .and_then(|info| info.url.as_deref());
    let any_scene = image.info_list.iter().filter_map(|info| info.url.as_deref());

    [
        scene_default,
        image.url_default.as_deref(),
        image.url.as_deref(),
        image.url_pre.as_deref(),
    ]
    .into_iter()
    .flatten()
    .chain(any_scene)
    .filter_map(image_token)
    .map(|token| origin_image_url(&token))
    .next()
}

/// Resolve the unbranded URL of a video.
///
/// Prefers the origin key; otherwise falls back to the first transcoded
/// stream, checking codecs in order of player compatibility.
#[must_use]
pub fn unbranded_video_url(video: &VideoPayload) -> Option<String> {
    if let Some(key) = video
        .consumer
        .as_ref()
        .and_then(|c| non_empty(c.origin_video_key.as_deref()))
    {
        return Some(format!("{VIDEO_ORIGIN_CDN}/{}", key.trim_start_matches('/')));
    }

    let streams = video.media.as_ref()?.stream.as_ref()?;
    [&streams.h264, &streams.h265, &streams.av1, &streams.h266]
        .into_iter()
        .flat_map(|variants| variants.iter())
        .find_map(stream_url)
}

fn stream_url(variant: &StreamVariant) -> Option<String> {
    non_empty(variant.master_url.as_deref())
        .or_else(|| {
            variant
                .backup_urls
                .iter()
                .find_map(|u| non_empty(Some(u.as_str())))
        })
        .map(force_https)
}

/// Extract the media token from a platform image URL.
fn image_token(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let mut segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    // Drop the `{timestamp}/{signature}` prefix of preview-host URLs.
    if segments
        .first()
        .is_some_and(|s| s.len() >= 8 && s.bytes().all(|b| b.is_ascii_digit()))
    {
        segments.remove(0);
        if segments
            .first()
            .is_some_and(|s| s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            segments.remove(0);
        }
    }

    let joined = segments.join("/");
    // Rendition suffix: `!nd_dft_wlteh_webp_3` and friends.
    let token = joined.split('!').next().unwrap_or_default();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn origin_image_url(token: &str) -> String {
    format!("{IMAGE_ORIGIN_CDN}/{}", token.trim_start_matches('/'))
}

fn force_https(url: &str) -> String {
    url.strip_prefix("http://")
        .map_or_else(|| url.to_string(), |rest| format!("https://{rest}"))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
