//! Typed view of a raw note payload.
//!
//! The platform serves the same note in two spellings: camelCase in the web
//! page state and snake_case in the feed API. Fields accept both. Values the
//! page state leaves `undefined` arrive as `null` and are treated as absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// The note object exactly as received, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload(Value);

impl RawPayload {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    #[serde(default, alias = "note_id")]
    pub note_id: Option<String>,
    #[serde(default, rename = "type")]
    pub note_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub user: Option<UserPayload>,
    #[serde(default, alias = "interact_info")]
    pub interact_info: Option<InteractInfo>,
    #[serde(default, alias = "image_list")]
    pub image_list: Option<Vec<ImagePayload>>,
    #[serde(default)]
    pub video: Option<VideoPayload>,
    #[serde(default, alias = "tag_list", deserialize_with = "null_as_default")]
    pub tag_list: Vec<TagPayload>,
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default, alias = "ip_location")]
    pub ip_location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    // Feed responses sometimes spell it this way instead of (or as well as) `nickname`.
    #[serde(default, rename = "nick_name")]
    pub nick_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractInfo {
    #[serde(default, alias = "liked_count")]
    pub liked_count: Option<Value>,
    #[serde(default, alias = "collected_count")]
    pub collected_count: Option<Value>,
    #[serde(default, alias = "comment_count")]
    pub comment_count: Option<Value>,
    #[serde(default, alias = "share_count")]
    pub share_count: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(default, alias = "url_default")]
    pub url_default: Option<String>,
    #[serde(default, alias = "url_pre")]
    pub url_pre: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "trace_id")]
    pub trace_id: Option<String>,
    #[serde(default, alias = "info_list", deserialize_with = "null_as_default")]
    pub info_list: Vec<ImageInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    #[serde(default, alias = "image_scene")]
    pub image_scene: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoPayload {
    #[serde(default)]
    pub consumer: Option<VideoConsumer>,
    #[serde(default)]
    pub media: Option<VideoMedia>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConsumer {
    #[serde(default, alias = "origin_video_key")]
    pub origin_video_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoMedia {
    #[serde(default)]
    pub stream: Option<VideoStreams>,
}

/// Transcoded stream variants by codec.
#[derive(Debug, Default, Deserialize)]
pub struct VideoStreams {
    #[serde(default, deserialize_with = "null_as_default")]
    pub h264: Vec<StreamVariant>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h265: Vec<StreamVariant>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h266: Vec<StreamVariant>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub av1: Vec<StreamVariant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamVariant {
    #[serde(default, alias = "master_url")]
    pub master_url: Option<String>,
    #[serde(default, alias = "backup_urls", deserialize_with = "null_as_default")]
    pub backup_urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagPayload {
    #[serde(default)]
    pub name: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
