use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use quad_db::Database;
use quad_policy::{Error, Result, Viewer};
use quad_types::api::FeedPage;
use serde::Deserialize;

use crate::error::ApiError;
use crate::posts::annotate;
use crate::state::{AppState, Settings};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueueParams {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

/// Pending posts awaiting a decision from `viewer`, oldest first.
///
/// Super-admins see every institution's queue; institution admins their own.
pub fn moderation_queue(
    db: &Database,
    settings: &Settings,
    viewer: &Viewer,
    params: QueueParams,
) -> Result<FeedPage> {
    let scope = if viewer.is_super_admin() {
        None
    } else {
        match viewer.institution_id {
            Some(institution_id) if viewer.is_staff_of(institution_id) => Some(institution_id),
            _ => return Err(Error::Forbidden("only institution staff review the queue")),
        }
    };

    let page = settings.feed_limits.page(params.offset, params.limit)?;
    let pending = db.pending_posts(scope, page.limit, page.offset)?;
    let fetched = pending.len();

    let decidable = pending
        .into_iter()
        .filter(|post| viewer.can_decide(post))
        .collect();

    Ok(FeedPage {
        items: annotate(db, viewer, decidable)?,
        next_offset: page.next_offset(fetched),
    })
}

pub async fn queue(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<QueueParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page =
        crate::blocking(move || moderation_queue(&state.db, &state.settings, &viewer, params)).await?;
    Ok(Json(page))
}
