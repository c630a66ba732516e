//! Normalized notes and batch outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, ExtractError};

/// A normalized post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub note_id: String,
    pub note_url: String,
    pub title: String,
    pub desc: String,
    #[serde(flatten)]
    pub media: NoteMedia,
    pub user: NoteUser,
    pub liked_count: u64,
    pub collected_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub ip_location: String,
    pub tags: Vec<String>,
}

impl Note {
    #[must_use]
    pub fn note_type(&self) -> NoteType {
        match self.media {
            NoteMedia::Normal { .. } => NoteType::Normal,
            NoteMedia::Video { .. } => NoteType::Video,
        }
    }

    #[must_use]
    pub fn images(&self) -> &[String] {
        match &self.media {
            NoteMedia::Normal { images } | NoteMedia::Video { images, .. } => images,
        }
    }

    #[must_use]
    pub fn video(&self) -> Option<&VideoMedia> {
        match &self.media {
            NoteMedia::Normal { .. } => None,
            NoteMedia::Video { video, .. } => Some(video),
        }
    }
}

/// Media of a note; the variant is the note type.
///
/// Serialized inline as `note_type` plus `images` (and `video` for videos).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "note_type", rename_all = "lowercase")]
pub enum NoteMedia {
    /// Image post. `images` is never empty.
    Normal { images: Vec<String> },
    /// Video post. `images` may be empty.
    Video {
        video: VideoMedia,
        images: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Normal,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMedia {
    pub url: String,
    pub cover: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUser {
    pub user_id: String,
    pub nickname: String,
    pub avatar: String,
    pub home_url: Option<String>,
}

/// Outcome of a batch extraction, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub successes: Vec<BatchSuccess>,
    pub failures: Vec<BatchFailure>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSuccess {
    pub url: String,
    pub note: Note,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub url: String,
    pub error_message: String,
    pub error_kind: ErrorKind,
}

impl BatchResult {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            total: 0,
        }
    }

    /// Split per-item outcomes into the two ordered sequences.
    ///
    /// `outcomes` must be in the same order as `urls`.
    #[must_use]
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<Note, ExtractError>)>,
    {
        let mut result = Self::empty();
        for (url, outcome) in outcomes {
            result.total += 1;
            match outcome {
                Ok(note) => result.successes.push(BatchSuccess { url, note }),
                Err(e) => result.failures.push(BatchFailure {
                    url,
                    error_message: e.to_string(),
                    error_kind: e.kind(),
                }),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_note(media: NoteMedia) -> Note {
        Note {
            note_id: "67d7c713000000000900e391".to_string(),
            note_url: "https://www.xiaohongshu.com/explore/67d7c713000000000900e391".to_string(),
            title: "title".to_string(),
            desc: String::new(),
            media,
            user: NoteUser::default(),
            liked_count: 0,
            collected_count: 0,
            comment_count: 0,
            share_count: 0,
            published_at: None,
            ip_location: String::new(),
            tags: vec![],
        }
    }

    #[test]
    fn test_media_serializes_inline() {
        let note = sample_note(NoteMedia::Video {
            video: VideoMedia {
                url: "https://v/1".to_string(),
                cover: None,
            },
            images: vec![],
        });
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["note_type"], json!("video"));
        assert_eq!(value["video"]["url"], json!("https://v/1"));
        assert_eq!(value["images"], json!([]));

        let note = sample_note(NoteMedia::Normal {
            images: vec!["https://i/1".to_string()],
        });
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["note_type"], json!("normal"));
        assert!(value.get("video").is_none());
    }

    #[test]
    fn test_note_round_trips_through_json() {
        let note = sample_note(NoteMedia::Normal {
            images: vec!["https://i/1".to_string()],
        });
        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn test_accessors() {
        let note = sample_note(NoteMedia::Normal {
            images: vec!["https://i/1".to_string()],
        });
        assert_eq!(note.note_type(), NoteType::Normal);
        assert_eq!(note.images().len(), 1);
        assert!(note.video().is_none());
    }

    #[test]
    fn test_from_outcomes_preserves_order() {
        let note = sample_note(NoteMedia::Normal {
            images: vec!["https://i/1".to_string()],
        });
        let result = BatchResult::from_outcomes(vec![
            ("a".to_string(), Ok(note.clone())),
            ("b".to_string(), Err(ExtractError::InvalidUrl("b".to_string()))),
            ("c".to_string(), Ok(note)),
            ("d".to_string(), Err(ExtractError::RateLimited("slow".to_string()))),
        ]);
        assert_eq!(result.total, 4);
        let ok: Vec<_> = result.successes.iter().map(|s| s.url.as_str()).collect();
        let failed: Vec<_> = result.failures.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(ok, ["a", "c"]);
        assert_eq!(failed, ["b", "d"]);
        assert_eq!(result.failures[1].error_kind, ErrorKind::RateLimited);
    }
}
