use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{EventCounters, Post, PostKind, PostStatus, RsvpChoice, Visibility};

// -- JWT Claims --

/// Bearer token claims. Tokens are issued by the campus identity service;
/// this backend only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Posts --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub image_ref: Option<String>,
    pub visibility: Visibility,
    /// Required for institution posts; for club posts it must match the club's institution if present.
    pub institution_id: Option<Uuid>,
    pub club_id: Option<Uuid>,
    /// Requested initial status. Honoured only for institution staff.
    pub status: Option<PostStatus>,
    /// Explicit allow-list for `restricted` posts.
    #[serde(default)]
    pub audience: Vec<Uuid>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub link: Option<String>,
    pub max_slots: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostRequest {
    pub fn announcement(title: &str, visibility: Visibility) -> Self {
        Self {
            kind: PostKind::Announcement,
            title: title.to_string(),
            body: String::new(),
            image_ref: None,
            visibility,
            institution_id: None,
            club_id: None,
            status: None,
            audience: Vec::new(),
            start_at: None,
            end_at: None,
            venue: None,
            link: None,
            max_slots: None,
            tags: Vec::new(),
        }
    }

    pub fn event(title: &str, visibility: Visibility, start_at: DateTime<Utc>, venue: &str) -> Self {
        Self {
            kind: PostKind::Event,
            start_at: Some(start_at),
            venue: Some(venue.to_string()),
            ..Self::announcement(title, visibility)
        }
    }
}

/// Content-only edit. Absent fields are left untouched; an explicit `null`
/// clears the optional ones (`image_ref`, `end_at`, `link`, `max_slots`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_ref: Option<Option<String>>,
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_at: Option<Option<DateTime<Utc>>>,
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub link: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_slots: Option<Option<u32>>,
    pub tags: Option<Vec<String>>,
}

/// Present fields become `Some`, so `null` reads as `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostAction {
    Submit,
    Publish,
    Approve,
    Reject,
    Hide,
    Show,
    Delete,
}

impl PostAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Publish => "publish",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Hide => "hide",
            Self::Show => "show",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for PostAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionRequest {
    pub action: PostAction,
}

/// A post as returned to a viewer: events carry the viewer's RSVP and live counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsvp: Option<RsvpChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<EventCounters>,
}

impl PostResponse {
    pub fn bare(post: Post) -> Self {
        Self {
            label: post.label().to_string(),
            post,
            rsvp: None,
            counters: None,
        }
    }
}

// -- Feed --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    #[default]
    ForYou,
    Global,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrder {
    /// Newest first.
    #[default]
    Recent,
    /// Events that have not finished yet, soonest first.
    Upcoming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<PostResponse>,
    /// Offset to request the following page with; absent on the last page.
    pub next_offset: Option<u32>,
}

// -- RSVP --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRsvpRequest {
    pub state: RsvpChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpResponse {
    pub event_id: Uuid,
    pub state: RsvpChoice,
    pub counters: EventCounters,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_tells_null_from_absent() {
        let req: UpdatePostRequest =
            serde_json::from_value(json!({ "link": null, "max_slots": 40 })).unwrap();
        assert_eq!(req.link, Some(None));
        assert_eq!(req.max_slots, Some(Some(40)));
        assert_eq!(req.end_at, None);
        assert_eq!(req.image_ref, None);

        assert!(serde_json::from_value::<UpdatePostRequest>(json!({ "title": null })).is_ok());
        assert!(serde_json::from_value::<UpdatePostRequest>(json!({ "status": "published" })).is_err());
    }
}
