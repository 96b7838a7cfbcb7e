use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Generates the string form used both on the wire and in SQLite columns.
macro_rules! labelled_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// -- Directory (read-only reference data) --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Employee,
    InstitutionAdmin,
    SuperAdmin,
}

labelled_enum!(Role, "role", {
    Student => "student",
    Employee => "employee",
    InstitutionAdmin => "institution_admin",
    SuperAdmin => "super_admin",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClubRole {
    Member,
    Officer,
    Advisor,
}

labelled_enum!(ClubRole, "club role", {
    Member => "member",
    Officer => "officer",
    Advisor => "advisor",
});

// -- Posts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Event,
    Announcement,
}

labelled_enum!(PostKind, "post type", {
    Event => "event",
    Announcement => "announcement",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Institution,
    Restricted,
}

labelled_enum!(Visibility, "visibility", {
    Public => "public",
    Institution => "institution",
    Restricted => "restricted",
});

/// Canonical lifecycle status. Moderator approval lands in `Published` with
/// [`Origin::Moderated`]; see [`Post::label`] for the external label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Pending,
    Published,
    Rejected,
    Hidden,
}

labelled_enum!(PostStatus, "status", {
    Draft => "draft",
    Pending => "pending",
    Published => "published",
    Rejected => "rejected",
    Hidden => "hidden",
});

impl PostStatus {
    /// Live posts are the only feed candidates.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// How a post reached (or will reach) the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    SelfPublished,
    Moderated,
}

labelled_enum!(Origin, "origin", {
    SelfPublished => "self_published",
    Moderated => "moderated",
});

/// Where a post comes from. Club posts always belong to the club's institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_scope", rename_all = "snake_case")]
pub enum PostScope {
    Institution,
    Club { club_id: Uuid },
}

impl PostScope {
    pub fn club_id(&self) -> Option<Uuid> {
        match self {
            Self::Institution => None,
            Self::Club { club_id } => Some(*club_id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Institution => "institution",
            Self::Club { .. } => "club",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub link: Option<String>,
    pub max_slots: Option<u32>,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostDetails {
    Event(EventDetails),
    Announcement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub image_ref: Option<String>,
    pub author_id: Uuid,
    pub institution_id: Uuid,
    #[serde(flatten)]
    pub scope: PostScope,
    pub visibility: Visibility,
    pub status: PostStatus,
    pub origin: Origin,
    #[serde(flatten)]
    pub details: PostDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn kind(&self) -> PostKind {
        match self.details {
            PostDetails::Event(_) => PostKind::Event,
            PostDetails::Announcement => PostKind::Announcement,
        }
    }

    pub fn event(&self) -> Option<&EventDetails> {
        match &self.details {
            PostDetails::Event(event) => Some(event),
            PostDetails::Announcement => None,
        }
    }

    pub fn club_id(&self) -> Option<Uuid> {
        self.scope.club_id()
    }

    /// External status label. A moderated live post reads as `approved`.
    pub fn label(&self) -> &'static str {
        match (self.status, self.origin) {
            (PostStatus::Published, Origin::Moderated) => "approved",
            (status, _) => status.as_str(),
        }
    }
}

// -- RSVP --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpState {
    Going,
    Interested,
}

labelled_enum!(RsvpState, "rsvp state", {
    Going => "going",
    Interested => "interested",
});

/// What a caller asks for. `None` clears any existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpChoice {
    Going,
    Interested,
    None,
}

impl RsvpChoice {
    pub fn state(self) -> Option<RsvpState> {
        match self {
            Self::Going => Some(RsvpState::Going),
            Self::Interested => Some(RsvpState::Interested),
            Self::None => None,
        }
    }
}

impl From<Option<RsvpState>> for RsvpChoice {
    fn from(state: Option<RsvpState>) -> Self {
        match state {
            Some(RsvpState::Going) => Self::Going,
            Some(RsvpState::Interested) => Self::Interested,
            None => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    pub going: u32,
    pub interested: u32,
}
