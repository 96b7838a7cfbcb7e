use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quad_db::models::now;
use quad_db::{Database, EditOutcome, TransitionOutcome};
use quad_policy::lifecycle::{self, Plan};
use quad_policy::visibility::is_visible;
use quad_policy::{Error, Result, View, Viewer, content};
use quad_types::api::{CreatePostRequest, PostAction, PostResponse, TransitionRequest, UpdatePostRequest};
use quad_types::models::{Post, RsvpChoice};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

// -- Operations --

pub fn create_post(db: &Database, viewer: &Viewer, req: CreatePostRequest) -> Result<PostResponse> {
    let club_institution = match req.club_id {
        Some(club_id) => db.club_institution(club_id)?,
        None => None,
    };

    let new = content::build_post(viewer, req, club_institution, now())?;
    db.insert_post(&new.post, &new.audience)?;

    info!(
        "Post {} created by {} ({}, {}, {})",
        new.post.id,
        viewer.user_id,
        new.post.scope.as_str(),
        new.post.visibility,
        new.post.label()
    );
    annotate_one(db, viewer, new.post)
}

/// Applies a lifecycle action. Returns `None` when the action deleted the post.
pub fn transition_post(
    db: &Database,
    viewer: &Viewer,
    id: Uuid,
    action: PostAction,
) -> Result<Option<PostResponse>> {
    let post = load_visible(db, viewer, id, View::Moderation)?;

    match lifecycle::plan(&post, viewer, action)? {
        Plan::Delete => {
            if !db.delete_post(id)? {
                return Err(Error::NotFound);
            }
            info!("Post {} deleted by {}", id, viewer.user_id);
            Ok(None)
        }
        Plan::Update { from, to, origin } => {
            match db.transition_post(id, from, to, origin, now())? {
                TransitionOutcome::Applied(post) => {
                    info!("Post {} {} by {}: {} -> {}", id, action, viewer.user_id, from, to);
                    annotate_one(db, viewer, post).map(Some)
                }
                // Lost a race; report against the state that won
                TransitionOutcome::Stale { current } => Err(Error::InvalidTransition {
                    from: current,
                    action,
                }),
                TransitionOutcome::Missing => Err(Error::NotFound),
            }
        }
    }
}

/// Content edit by the author or a moderator of the post's scope.
pub fn edit_post(
    db: &Database,
    viewer: &Viewer,
    id: Uuid,
    req: UpdatePostRequest,
) -> Result<PostResponse> {
    let mut post = load_visible(db, viewer, id, View::Moderation)?;
    if !viewer.can_edit(&post) {
        return Err(Error::Forbidden("only the author or a moderator may edit"));
    }

    let read_at = post.updated_at;
    content::apply_update(&mut post, req, now())?;
    match db.update_post_content(&post, read_at)? {
        EditOutcome::Applied => {}
        EditOutcome::Stale => return Err(Error::EditConflict),
        EditOutcome::Missing => return Err(Error::NotFound),
    }

    info!("Post {} edited by {}", id, viewer.user_id);
    annotate_one(db, viewer, post)
}

pub fn get_post(db: &Database, viewer: &Viewer, id: Uuid) -> Result<PostResponse> {
    let post = load_visible(db, viewer, id, View::Moderation)?;
    annotate_one(db, viewer, post)
}

/// Loads a post for single-post access. Invisible posts are indistinguishable from missing ones.
pub(crate) fn load_visible(db: &Database, viewer: &Viewer, id: Uuid, view: View) -> Result<Post> {
    let post = db.get_post(id)?.ok_or(Error::NotFound)?;
    let audience = db.audience_facts_for(viewer.user_id, id)?;
    if !is_visible(&post, viewer, audience, view) {
        return Err(Error::NotFound);
    }
    Ok(post)
}

/// Attaches the viewer's RSVP and live counters to every event, in two batched reads.
pub(crate) fn annotate(db: &Database, viewer: &Viewer, posts: Vec<Post>) -> Result<Vec<PostResponse>> {
    let event_ids: Vec<Uuid> = posts
        .iter()
        .filter(|post| post.event().is_some())
        .map(|post| post.id)
        .collect();

    let counters = db.event_counters(&event_ids)?;
    let states = db.rsvp_states(viewer.user_id, &event_ids)?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let is_event = post.event().is_some();
            let id = post.id;
            let mut item = PostResponse::bare(post);
            if is_event {
                item.rsvp = Some(RsvpChoice::from(states.get(&id).copied()));
                item.counters = Some(counters.get(&id).copied().unwrap_or_default());
            }
            item
        })
        .collect())
}

fn annotate_one(db: &Database, viewer: &Viewer, post: Post) -> Result<PostResponse> {
    annotate(db, viewer, vec![post])?
        .pop()
        .ok_or(Error::NotFound)
}

// -- Handlers --

pub async fn create(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = crate::blocking(move || create_post(&state.db, &viewer, req)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn transition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<TransitionRequest>,
) -> Result<Response, ApiError> {
    let item = crate::blocking(move || transition_post(&state.db, &viewer, id, req.action)).await?;
    Ok(match item {
        Some(item) => Json(item).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = crate::blocking(move || edit_post(&state.db, &viewer, id, req)).await?;
    Ok(Json(item))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    let item = crate::blocking(move || get_post(&state.db, &viewer, id)).await?;
    Ok(Json(item))
}
