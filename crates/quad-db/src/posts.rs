use anyhow::Result;
use chrono::{DateTime, Utc};
use quad_types::models::{Origin, Post, PostDetails, PostStatus};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::Database;
use crate::models::{POST_COLUMNS, PostRow, fmt_ts};

/// Result of a compare-and-swap status update.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Post),
    /// Someone else moved the post first; it is now in `current`.
    Stale { current: PostStatus },
    Missing,
}

/// Result of a content edit guarded by the `updated_at` the editor read.
#[derive(Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The post was written after the editor read it.
    Stale,
    Missing,
}

impl Database {
    /// Inserts a post with its explicit allow-list in one transaction.
    pub fn insert_post(&self, post: &Post, audience: &[Uuid]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let event = post.event();
            let tags = match &post.details {
                PostDetails::Event(event) => serde_json::to_string(&event.tags)?,
                PostDetails::Announcement => "[]".to_string(),
            };

            tx.execute(
                "INSERT INTO posts (id, kind, title, body, image_ref, author_id, institution_id,
                    club_id, visibility, status, origin, start_at, end_at, venue, link, max_slots,
                    tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19)",
                rusqlite::params![
                    post.id.to_string(),
                    post.kind().as_str(),
                    post.title,
                    post.body,
                    post.image_ref,
                    post.author_id.to_string(),
                    post.institution_id.to_string(),
                    post.club_id().map(|c| c.to_string()),
                    post.visibility.as_str(),
                    post.status.as_str(),
                    post.origin.as_str(),
                    event.map(|e| fmt_ts(e.start_at)),
                    event.and_then(|e| e.end_at).map(fmt_ts),
                    event.and_then(|e| e.venue.clone()),
                    event.and_then(|e| e.link.clone()),
                    event.and_then(|e| e.max_slots),
                    tags,
                    fmt_ts(post.created_at),
                    fmt_ts(post.updated_at),
                ],
            )?;

            {
                let mut stmt =
                    tx.prepare("INSERT INTO post_audience (post_id, user_id) VALUES (?1, ?2)")?;
                for user_id in audience {
                    stmt.execute((post.id.to_string(), user_id.to_string()))?;
                }
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Writes content fields only, if the stored `updated_at` is still `read_at`.
    pub fn update_post_content(&self, post: &Post, read_at: DateTime<Utc>) -> Result<EditOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let event = post.event();
            let tags = match event {
                Some(event) => serde_json::to_string(&event.tags)?,
                None => "[]".to_string(),
            };

            let changed = tx.execute(
                "UPDATE posts SET title = ?1, body = ?2, image_ref = ?3, start_at = ?4,
                    end_at = ?5, venue = ?6, link = ?7, max_slots = ?8, tags = ?9, updated_at = ?10
                 WHERE id = ?11 AND updated_at = ?12",
                rusqlite::params![
                    post.title,
                    post.body,
                    post.image_ref,
                    event.map(|e| fmt_ts(e.start_at)),
                    event.and_then(|e| e.end_at).map(fmt_ts),
                    event.and_then(|e| e.venue.clone()),
                    event.and_then(|e| e.link.clone()),
                    event.and_then(|e| e.max_slots),
                    tags,
                    fmt_ts(post.updated_at),
                    post.id.to_string(),
                    fmt_ts(read_at),
                ],
            )?;

            let outcome = if changed > 0 {
                EditOutcome::Applied
            } else if query_post(&tx, post.id)?.is_some() {
                warn!("Post {} was written after {}; edit dropped", post.id, fmt_ts(read_at));
                EditOutcome::Stale
            } else {
                EditOutcome::Missing
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Moves `id` from `from` to `to`, only if it is still in `from`.
    pub fn transition_post(
        &self,
        id: Uuid,
        from: PostStatus,
        to: PostStatus,
        origin: Origin,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let changed = tx.execute(
                "UPDATE posts SET status = ?1, origin = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                rusqlite::params![
                    to.as_str(),
                    origin.as_str(),
                    fmt_ts(now),
                    id.to_string(),
                    from.as_str()
                ],
            )?;

            let outcome = match query_post(&tx, id)? {
                None => TransitionOutcome::Missing,
                Some(post) if changed == 0 => {
                    warn!(
                        "Post {} moved to {} before {} -> {} could apply",
                        id, post.status, from, to
                    );
                    TransitionOutcome::Stale {
                        current: post.status,
                    }
                }
                Some(post) => TransitionOutcome::Applied(post),
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Hard delete; RSVP rows and the allow-list go with the post.
    /// Returns false if nothing was deleted.
    pub fn delete_post(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = id.to_string();

            let rsvps = tx.execute("DELETE FROM rsvps WHERE event_id = ?1", [&id])?;
            tx.execute("DELETE FROM post_audience WHERE post_id = ?1", [&id])?;
            let removed = tx.execute("DELETE FROM posts WHERE id = ?1", [&id])?;

            tx.commit()?;

            if removed > 0 {
                info!("Post {} deleted ({} RSVPs removed)", id, rsvps);
            }
            Ok(removed > 0)
        })
    }

    /// Pending posts, oldest first. `institution_id = None` spans all institutions.
    pub fn pending_posts(
        &self,
        institution_id: Option<Uuid>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts p
                 WHERE p.status = 'pending' AND (?1 IS NULL OR p.institution_id = ?1)
                 ORDER BY p.created_at ASC, p.id ASC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![institution_id.map(|i| i.to_string()), limit, offset],
                    PostRow::from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(PostRow::into_post).collect()
        })
    }
}

pub(crate) fn query_post(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], PostRow::from_row)
        .optional()?;
    row.map(PostRow::into_post).transpose()
}
