use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use quad_db::models::now;
use quad_db::{Database, FeedQuery};
use quad_policy::visibility::is_visible;
use quad_policy::{Result, View, Viewer};
use quad_types::api::{FeedMode, FeedOrder, FeedPage};
use quad_types::models::PostKind;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::posts::annotate;
use crate::state::{AppState, Settings};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedParams {
    pub mode: FeedMode,
    pub order: FeedOrder,
    #[serde(rename = "type")]
    pub kind: Option<PostKind>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

/// Assembles one feed page for `viewer`.
///
/// Paging runs over the SQL candidates, so `next_offset` stays stable even
/// when the resolver drops a row and a page comes back short.
pub fn get_feed(
    db: &Database,
    settings: &Settings,
    viewer: &Viewer,
    params: FeedParams,
) -> Result<FeedPage> {
    let page = settings.feed_limits.page(params.offset, params.limit)?;
    let query = FeedQuery {
        mode: params.mode,
        order: params.order,
        kind: params.kind,
        offset: page.offset,
        limit: page.limit,
        now: now(),
    };

    let candidates = db.feed_candidates(viewer, &query)?;
    let fetched = candidates.len();

    let ids: Vec<_> = candidates.iter().map(|post| post.id).collect();
    let audience = db.audience_facts(viewer.user_id, &ids)?;

    let visible: Vec<_> = candidates
        .into_iter()
        .filter(|post| {
            let facts = audience.get(&post.id).copied().unwrap_or_default();
            is_visible(post, viewer, facts, View::Feed)
        })
        .collect();

    if visible.len() < fetched {
        debug!(
            "Feed for {} dropped {} of {} candidates",
            viewer.user_id,
            fetched - visible.len(),
            fetched
        );
    }

    Ok(FeedPage {
        items: annotate(db, viewer, visible)?,
        next_offset: page.next_offset(fetched),
    })
}

pub async fn list(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = crate::blocking(move || get_feed(&state.db, &state.settings, &viewer, params)).await?;
    Ok(Json(page))
}
