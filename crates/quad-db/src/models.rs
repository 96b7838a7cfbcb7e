//! Database row types. These map directly to SQLite rows and are converted
//! into quad-types models at the edge of this crate.

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use quad_types::models::{EventDetails, Post, PostDetails, PostKind, PostScope};
use rusqlite::Row;
use uuid::Uuid;

/// Column list matching [`PostRow::from_row`]. Queries alias `posts` as `p`.
pub const POST_COLUMNS: &str = "p.id, p.kind, p.title, p.body, p.image_ref, p.author_id, \
     p.institution_id, p.club_id, p.visibility, p.status, p.origin, p.start_at, p.end_at, \
     p.venue, p.link, p.max_slots, p.tags, p.created_at, p.updated_at";

pub struct PostRow {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub image_ref: Option<String>,
    pub author_id: String,
    pub institution_id: String,
    pub club_id: Option<String>,
    pub visibility: String,
    pub status: String,
    pub origin: String,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub venue: Option<String>,
    pub link: Option<String>,
    pub max_slots: Option<i64>,
    pub tags: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PostRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            image_ref: row.get(4)?,
            author_id: row.get(5)?,
            institution_id: row.get(6)?,
            club_id: row.get(7)?,
            visibility: row.get(8)?,
            status: row.get(9)?,
            origin: row.get(10)?,
            start_at: row.get(11)?,
            end_at: row.get(12)?,
            venue: row.get(13)?,
            link: row.get(14)?,
            max_slots: row.get(15)?,
            tags: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }

    pub fn into_post(self) -> Result<Post> {
        let id = parse_id(&self.id)?;

        let scope = match self.club_id.as_deref() {
            Some(club_id) => PostScope::Club {
                club_id: parse_id(club_id)?,
            },
            None => PostScope::Institution,
        };

        let details = match self.kind.parse::<PostKind>()? {
            PostKind::Announcement => PostDetails::Announcement,
            PostKind::Event => {
                let start_at = self
                    .start_at
                    .as_deref()
                    .ok_or_else(|| anyhow!("Event {} has no start_at", self.id))?;
                let tags: BTreeSet<String> = serde_json::from_str(&self.tags)
                    .with_context(|| format!("Corrupt tags on post {}", self.id))?;
                PostDetails::Event(EventDetails {
                    start_at: parse_ts(start_at)?,
                    end_at: self.end_at.as_deref().map(parse_ts).transpose()?,
                    venue: self.venue,
                    link: self.link,
                    max_slots: self.max_slots.map(u32::try_from).transpose()?,
                    tags,
                })
            }
        };

        Ok(Post {
            id,
            title: self.title,
            body: self.body,
            image_ref: self.image_ref,
            author_id: parse_id(&self.author_id)?,
            institution_id: parse_id(&self.institution_id)?,
            scope,
            visibility: self.visibility.parse()?,
            status: self.status.parse()?,
            origin: self.origin.parse()?,
            details,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

pub struct UserRow {
    pub id: String,
    pub institution_id: Option<String>,
    pub role: String,
}

pub struct MembershipRow {
    pub club_id: String,
    pub role: String,
}

/// Current time at storage precision (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width UTC timestamps, so TEXT ordering matches time ordering.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Corrupt timestamp '{}'", s))
}

pub fn parse_id(s: &str) -> Result<Uuid> {
    s.parse::<Uuid>()
        .with_context(|| format!("Corrupt id '{}'", s))
}
