use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use quad_types::api::{CreatePostRequest, UpdatePostRequest};
use quad_types::models::{EventDetails, Post, PostDetails, PostKind, PostScope, Visibility};
use uuid::Uuid;

use crate::capability::Viewer;
use crate::error::{Error, Result};
use crate::lifecycle;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 20_000;
pub const MAX_VENUE_LEN: usize = 200;
pub const MAX_TAGS: usize = 16;
pub const MAX_TAG_LEN: usize = 32;
pub const MAX_AUDIENCE: usize = 5_000;

/// A validated post ready to be inserted, with its explicit allow-list.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post: Post,
    pub audience: Vec<Uuid>,
}

/// Works out the scope of a submission. `club_institution` is the directory's
/// institution for `req.club_id`, or `None` if that club does not exist.
pub fn resolve_scope(
    req: &CreatePostRequest,
    club_institution: Option<Uuid>,
) -> Result<(PostScope, Uuid)> {
    match req.club_id {
        Some(club_id) => {
            let institution_id =
                club_institution.ok_or_else(|| Error::validation("unknown club"))?;
            if req.institution_id.is_some_and(|id| id != institution_id) {
                return Err(Error::validation("club does not belong to that institution"));
            }
            Ok((PostScope::Club { club_id }, institution_id))
        }
        None => req
            .institution_id
            .map(|institution_id| (PostScope::Institution, institution_id))
            .ok_or_else(|| Error::validation("institution_id or club_id is required")),
    }
}

/// Validates a submission and assigns its initial lifecycle state.
pub fn build_post(
    viewer: &Viewer,
    req: CreatePostRequest,
    club_institution: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<NewPost> {
    let (scope, institution_id) = resolve_scope(&req, club_institution)?;
    let (status, origin) = lifecycle::initial_status(viewer, scope, institution_id, req.status)?;

    let audience = normalize_audience(req.visibility, scope, &req.audience)?;

    let details = match req.kind {
        PostKind::Event => {
            let start_at = req
                .start_at
                .ok_or_else(|| Error::validation("events need start_at"))?;
            PostDetails::Event(EventDetails {
                start_at,
                end_at: req.end_at,
                venue: req.venue,
                link: req.link,
                max_slots: req.max_slots,
                tags: normalize_tags(&req.tags)?,
            })
        }
        PostKind::Announcement => {
            let has_event_fields = req.start_at.is_some()
                || req.end_at.is_some()
                || req.venue.is_some()
                || req.link.is_some()
                || req.max_slots.is_some()
                || !req.tags.is_empty();
            if has_event_fields {
                return Err(Error::validation("schedule, venue, link, slots and tags only apply to events"));
            }
            PostDetails::Announcement
        }
    };

    let post = Post {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        body: req.body,
        image_ref: req.image_ref,
        author_id: viewer.user_id,
        institution_id,
        scope,
        visibility: req.visibility,
        status,
        origin,
        details,
        created_at: now,
        updated_at: now,
    };
    validate(&post)?;

    Ok(NewPost { post, audience })
}

/// Applies a content edit in place. Status, scope and visibility are untouched.
pub fn apply_update(post: &mut Post, req: UpdatePostRequest, now: DateTime<Utc>) -> Result<()> {
    if let Some(title) = req.title {
        post.title = title.trim().to_string();
    }
    if let Some(body) = req.body {
        post.body = body;
    }
    if let Some(image_ref) = req.image_ref {
        post.image_ref = image_ref;
    }

    match &mut post.details {
        PostDetails::Event(event) => {
            if let Some(start_at) = req.start_at {
                event.start_at = start_at;
            }
            if let Some(end_at) = req.end_at {
                event.end_at = end_at;
            }
            if let Some(venue) = req.venue {
                event.venue = Some(venue);
            }
            if let Some(link) = req.link {
                event.link = link;
            }
            if let Some(max_slots) = req.max_slots {
                event.max_slots = max_slots;
            }
            if let Some(tags) = req.tags {
                event.tags = normalize_tags(&tags)?;
            }
        }
        PostDetails::Announcement => {
            let has_event_fields = req.start_at.is_some()
                || req.end_at.is_some()
                || req.venue.is_some()
                || req.link.is_some()
                || req.max_slots.is_some()
                || req.tags.is_some();
            if has_event_fields {
                return Err(Error::validation("announcements have no schedule, venue, link, slots or tags"));
            }
        }
    }

    validate(post)?;
    post.updated_at = now;
    Ok(())
}

fn validate(post: &Post) -> Result<()> {
    if post.title.is_empty() {
        return Err(Error::validation("title is required"));
    }
    if post.title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::validation(format!("title exceeds {MAX_TITLE_LEN} characters")));
    }
    if post.body.chars().count() > MAX_BODY_LEN {
        return Err(Error::validation(format!("body exceeds {MAX_BODY_LEN} characters")));
    }
    if post.image_ref.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(Error::validation("image_ref must not be blank"));
    }

    if let PostDetails::Event(event) = &post.details {
        let venue = event.venue.as_deref().map(str::trim).unwrap_or_default();
        if venue.is_empty() {
            return Err(Error::validation("events need a venue"));
        }
        if venue.chars().count() > MAX_VENUE_LEN {
            return Err(Error::validation(format!("venue exceeds {MAX_VENUE_LEN} characters")));
        }
        if event.end_at.is_some_and(|end_at| end_at < event.start_at) {
            return Err(Error::validation("end_at is before start_at"));
        }
        if event.max_slots == Some(0) {
            return Err(Error::validation("max_slots must be at least 1"));
        }
        if event.link.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(Error::validation("link must not be blank"));
        }
    }

    Ok(())
}

/// Tags are a set: trimmed, lowercased, deduplicated.
pub fn normalize_tags(tags: &[String]) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(Error::validation("tags must not be blank"));
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(Error::validation(format!("tag '{tag}' exceeds {MAX_TAG_LEN} characters")));
        }
        set.insert(tag);
    }
    if set.len() > MAX_TAGS {
        return Err(Error::validation(format!("at most {MAX_TAGS} tags")));
    }
    Ok(set)
}

fn normalize_audience(
    visibility: Visibility,
    scope: PostScope,
    audience: &[Uuid],
) -> Result<Vec<Uuid>> {
    if visibility != Visibility::Restricted {
        if !audience.is_empty() {
            return Err(Error::validation("audience only applies to restricted posts"));
        }
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let unique: Vec<Uuid> = audience.iter().copied().filter(|id| seen.insert(*id)).collect();

    if unique.len() > MAX_AUDIENCE {
        return Err(Error::validation(format!("audience exceeds {MAX_AUDIENCE} users")));
    }
    // Club posts fall back to club membership; institution posts have nothing to fall back to.
    if unique.is_empty() && scope == PostScope::Institution {
        return Err(Error::validation("restricted institution posts need an audience"));
    }
    Ok(unique)
}
