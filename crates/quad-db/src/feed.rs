use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quad_policy::{AudienceFacts, Viewer};
use quad_types::api::{FeedMode, FeedOrder};
use quad_types::models::{Post, PostKind};
use rusqlite::types::Value;
use tracing::warn;
use uuid::Uuid;

use crate::Database;
use crate::ledger::{id_values, placeholders};
use crate::models::{POST_COLUMNS, PostRow, fmt_ts, parse_id};

/// One feed page request, already bounded by the caller.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub mode: FeedMode,
    pub order: FeedOrder,
    pub kind: Option<PostKind>,
    pub offset: u32,
    pub limit: u32,
    pub now: DateTime<Utc>,
}

impl Database {
    /// Live posts the audience rules may admit for `viewer`, in feed order.
    ///
    /// This is the coarse SQL filter; callers still run every row through the
    /// visibility resolver. Rows that fail to decode are skipped.
    pub fn feed_candidates(&self, viewer: &Viewer, query: &FeedQuery) -> Result<Vec<Post>> {
        let mut clauses = vec!["p.status = 'published'".to_string()];
        let mut params: Vec<Value> = Vec::new();

        match query.mode {
            FeedMode::Global => clauses.push("p.visibility = 'public'".into()),
            FeedMode::ForYou => {
                let user = viewer.user_id.to_string();
                let institution = match viewer.institution_id {
                    Some(id) => Value::Text(id.to_string()),
                    None => Value::Null,
                };
                clauses.push(
                    "(p.visibility = 'public'
                      OR p.author_id = ?
                      OR (p.visibility = 'institution' AND p.institution_id = ?)
                      OR (p.visibility = 'restricted' AND (
                            EXISTS (SELECT 1 FROM post_audience a
                                    WHERE a.post_id = p.id AND a.user_id = ?)
                            OR (p.club_id IS NOT NULL
                                AND NOT EXISTS (SELECT 1 FROM post_audience a
                                                WHERE a.post_id = p.id)
                                AND EXISTS (SELECT 1 FROM club_members m
                                            WHERE m.club_id = p.club_id AND m.user_id = ?)))))"
                        .into(),
                );
                params.push(Value::Text(user.clone()));
                params.push(institution);
                params.push(Value::Text(user.clone()));
                params.push(Value::Text(user));
            }
        }

        if let Some(kind) = query.kind {
            clauses.push("p.kind = ?".into());
            params.push(Value::Text(kind.as_str().to_string()));
        }

        let order_by = match query.order {
            FeedOrder::Recent => "p.created_at DESC, p.id DESC",
            FeedOrder::Upcoming => {
                // Still running counts as upcoming
                clauses.push("p.kind = 'event' AND COALESCE(p.end_at, p.start_at) >= ?".into());
                params.push(Value::Text(fmt_ts(query.now)));
                "p.start_at ASC, p.id ASC"
            }
        };

        params.push(Value::Integer(i64::from(query.limit)));
        params.push(Value::Integer(i64::from(query.offset)));

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE {} ORDER BY {order_by} LIMIT ? OFFSET ?",
            clauses.join(" AND ")
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), PostRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut posts = Vec::with_capacity(rows.len());
            for row in rows {
                let id = row.id.clone();
                match row.into_post() {
                    Ok(post) => posts.push(post),
                    Err(e) => warn!("Skipping corrupt post {} in feed: {:#}", id, e),
                }
            }
            Ok(posts)
        })
    }

    /// Allow-list facts for each post, relative to `viewer_id`.
    /// Posts without an explicit list map to the default (no list).
    pub fn audience_facts(
        &self,
        viewer_id: Uuid,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AudienceFacts>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT post_id, MAX(user_id = ?) FROM post_audience
                 WHERE post_id IN ({}) GROUP BY post_id",
                placeholders(post_ids.len())
            );

            let mut params = vec![Value::Text(viewer_id.to_string())];
            params.extend(id_values(post_ids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut facts = HashMap::with_capacity(rows.len());
            for (post_id, listed) in rows {
                facts.insert(
                    parse_id(&post_id)?,
                    AudienceFacts {
                        has_explicit_list: true,
                        viewer_listed: listed != 0,
                    },
                );
            }
            Ok(facts)
        })
    }

    /// Allow-list facts for a single post.
    pub fn audience_facts_for(&self, viewer_id: Uuid, post_id: Uuid) -> Result<AudienceFacts> {
        Ok(self
            .audience_facts(viewer_id, &[post_id])?
            .remove(&post_id)
            .unwrap_or_default())
    }
}
