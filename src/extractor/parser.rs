//! Raw payload to [`Note`] transformation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{ExtractError, Result};
use super::media::{unbranded_image_url, unbranded_video_url};
use super::models::{Note, NoteMedia, NoteUser, VideoMedia};
use super::payload::{NotePayload, RawPayload, UserPayload};
use super::url::PostDescriptor;

const VIDEO_TYPE: &str = "video";

/// Turns raw payloads into notes. Pure: no I/O, no shared state.
#[derive(Debug, Clone)]
pub struct NoteParser {
    web_base: String,
}

impl NoteParser {
    #[must_use]
    pub fn new(web_base: &str) -> Self {
        Self {
            web_base: web_base.trim_end_matches('/').to_string(),
        }
    }

    /// Parse the payload fetched for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` when the note id is missing or differs from the
    /// requested one, when both title and media are missing, when a field
    /// has an unexpected shape, or when the media cannot be resolved for the
    /// note's type.
    pub fn parse(&self, payload: &RawPayload, descriptor: &PostDescriptor) -> Result<Note> {
        let raw: NotePayload = serde_json::from_value(payload.as_value().clone())
            .map_err(|e| ExtractError::Parse(format!("note {}: {e}", descriptor.post_id)))?;

        let note_id = raw
            .note_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ExtractError::Parse("payload has no note id".to_string()))?;
        if note_id != descriptor.post_id {
            return Err(ExtractError::Parse(format!(
                "payload is for note {note_id}, requested {}",
                descriptor.post_id
            )));
        }

        if raw.title.is_none() && raw.image_list.is_none() && raw.video.is_none() {
            return Err(ExtractError::Parse(format!(
                "note {note_id} has neither a title nor a media section"
            )));
        }

        let media = resolve_media(&raw, note_id)?;
        let counts = raw.interact_info.unwrap_or_default();

        let note = Note {
            note_id: note_id.to_string(),
            note_url: descriptor.canonical_url(&self.web_base),
            title: raw.title.unwrap_or_default().trim().to_string(),
            desc: raw.desc.unwrap_or_default(),
            media,
            user: self.map_user(raw.user.unwrap_or_default()),
            liked_count: parse_count(counts.liked_count.as_ref()),
            collected_count: parse_count(counts.collected_count.as_ref()),
            comment_count: parse_count(counts.comment_count.as_ref()),
            share_count: parse_count(counts.share_count.as_ref()),
            published_at: raw.time.as_ref().and_then(parse_timestamp),
            ip_location: raw.ip_location.unwrap_or_default(),
            tags: collect_tags(raw.tag_list.into_iter().filter_map(|t| t.name)),
        };

        debug!(
            note_id = %note.note_id,
            note_type = ?note.note_type(),
            images = note.images().len(),
            "Parsed note"
        );
        Ok(note)
    }

    fn map_user(&self, user: UserPayload) -> NoteUser {
        let user_id = user.user_id.unwrap_or_default();
        let home_url = if user_id.is_empty() {
            None
        } else {
            Some(format!("{}/user/profile/{user_id}", self.web_base))
        };
        NoteUser {
            nickname: user.nickname.or(user.nick_name).unwrap_or_default(),
            avatar: user.avatar.unwrap_or_default(),
            user_id,
            home_url,
        }
    }
}

fn resolve_media(raw: &NotePayload, note_id: &str) -> Result<NoteMedia> {
    let listed = raw.image_list.as_deref().unwrap_or_default();
    let images: Vec<String> = listed.iter().filter_map(unbranded_image_url).collect();
    if images.len() < listed.len() {
        warn!(
            note_id,
            listed = listed.len(),
            resolved = images.len(),
            "Some images had no resolvable media URL"
        );
    }

    let declared_video = raw
        .note_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case(VIDEO_TYPE));

    match raw.video.as_ref().and_then(unbranded_video_url) {
        Some(url) => Ok(NoteMedia::Video {
            video: VideoMedia {
                url,
                cover: images.first().cloned(),
            },
            images,
        }),
        None if declared_video => Err(ExtractError::Parse(format!(
            "video note {note_id} has no playable stream"
        ))),
        None if images.is_empty() => Err(ExtractError::Parse(format!(
            "note {note_id} has no images"
        ))),
        None => Ok(NoteMedia::Normal { images }),
    }
}

/// Convert a rendered counter to an integer.
///
/// Accepts numbers and text such as `"1234"`, `"3,456"`, `"1.2万"`, `"10万+"`
/// or `"1.5亿"`. Anything else, including absence, counts as zero.
#[must_use]
fn parse_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => parse_count_text(s).unwrap_or(0),
        _ => 0,
    }
}

fn parse_count_text(text: &str) -> Option<u64> {
    let cleaned: String = text
        .trim()
        .trim_end_matches('+')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix('万') {
        (n, 10_000.0)
    } else if let Some(n) = cleaned.strip_suffix('亿') {
        (n, 100_000_000.0)
    } else if let Some(n) = cleaned.strip_suffix(['w', 'W']) {
        (n, 10_000.0)
    } else {
        return cleaned.parse().ok();
    };

    let value: f64 = number.parse().ok()?;
    if value.is_sign_negative() {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Publish time arrives as epoch milliseconds, as a number or a string.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

/// Tag names, trimmed, without blanks or repeats, in platform order.
fn collect_tags(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !tags.iter().any(|t| t == name) {
            tags.push(name.to_string());
        }
    }
    tags
}
