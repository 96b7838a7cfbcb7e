use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use quad_db::models::now;
use quad_db::{Database, RsvpOutcome};
use quad_policy::{Error, Result, View, Viewer};
use quad_types::api::{RsvpResponse, SetRsvpRequest};
use quad_types::models::RsvpChoice;
use uuid::Uuid;

use crate::error::ApiError;
use crate::posts::load_visible;
use crate::state::{AppState, Settings};

/// Records the viewer's RSVP. Repeating the held choice clears it.
pub fn set_rsvp(
    db: &Database,
    settings: &Settings,
    viewer: &Viewer,
    event_id: Uuid,
    desired: RsvpChoice,
) -> Result<RsvpResponse> {
    // Audience rules apply in full; no moderator bypass
    let post = load_visible(db, viewer, event_id, View::Feed)?;
    if post.event().is_none() {
        return Err(Error::NotFound);
    }

    match db.set_rsvp(viewer.user_id, event_id, desired, settings.enforce_capacity, now())? {
        RsvpOutcome::Committed { state, counters } => Ok(RsvpResponse {
            event_id,
            state: state.into(),
            counters,
        }),
        // Deleted between the visibility check and the write
        RsvpOutcome::EventMissing => Err(Error::NotFound),
        RsvpOutcome::NotLive { status } => Err(Error::validation(format!(
            "event is {status} and not accepting RSVPs"
        ))),
        RsvpOutcome::Refused(err) => Err(err),
    }
}

pub async fn put(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<SetRsvpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = crate::blocking(move || {
        set_rsvp(&state.db, &state.settings, &viewer, event_id, req.state)
    })
    .await?;
    Ok(Json(response))
}
