use quad_types::api::PostAction;
use quad_types::models::{Origin, Post, PostScope, PostStatus};
use uuid::Uuid;

use crate::capability::Viewer;
use crate::error::{Error, Result};

/// A permitted change, to be applied with compare-and-swap on `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Update {
        from: PostStatus,
        to: PostStatus,
        origin: Origin,
    },
    Delete,
}

/// Initial status for a new post.
///
/// Institution staff pick from draft, pending or published. Club officers and
/// advisors always land in pending, whatever they asked for.
pub fn initial_status(
    viewer: &Viewer,
    scope: PostScope,
    institution_id: Uuid,
    requested: Option<PostStatus>,
) -> Result<(PostStatus, Origin)> {
    match scope {
        PostScope::Club { club_id } => {
            if !viewer.leads_club(club_id) {
                return Err(Error::Forbidden("only club officers and advisors post for a club"));
            }
            Ok((PostStatus::Pending, Origin::Moderated))
        }
        PostScope::Institution => {
            if !viewer.is_staff_of(institution_id) {
                return Err(Error::Forbidden("only institution staff post for an institution"));
            }
            match requested {
                Some(status @ (PostStatus::Draft | PostStatus::Pending | PostStatus::Published)) => {
                    Ok((status, Origin::SelfPublished))
                }
                Some(other) => Err(Error::validation(format!(
                    "a new post cannot start as {other}"
                ))),
                None => Err(Error::validation(
                    "status is required for institution posts (draft, pending or published)",
                )),
            }
        }
    }
}

/// Checks `action` against the transition table and the viewer's capabilities.
///
/// Capability is checked before state, so a non-moderator sees `Forbidden`
/// and a moderator acting on the wrong state sees `InvalidTransition`.
pub fn plan(post: &Post, viewer: &Viewer, action: PostAction) -> Result<Plan> {
    let from = post.status;
    let invalid = || Error::InvalidTransition { from, action };

    match action {
        PostAction::Delete => {
            if viewer.can_edit(post) {
                Ok(Plan::Delete)
            } else {
                Err(Error::Forbidden("only the author or a moderator may delete"))
            }
        }
        PostAction::Submit => {
            if !viewer.is_author(post) {
                return Err(Error::Forbidden("only the author may submit a draft"));
            }
            match from {
                PostStatus::Draft => Ok(Plan::Update {
                    from,
                    to: PostStatus::Pending,
                    origin: post.origin,
                }),
                _ => Err(invalid()),
            }
        }
        PostAction::Publish => {
            let self_publisher = viewer.is_author(post)
                && post.scope == PostScope::Institution
                && viewer.is_staff_of(post.institution_id);
            if !self_publisher {
                return Err(Error::Forbidden("only institution staff publish their own drafts"));
            }
            match from {
                PostStatus::Draft => Ok(Plan::Update {
                    from,
                    to: PostStatus::Published,
                    origin: Origin::SelfPublished,
                }),
                _ => Err(invalid()),
            }
        }
        PostAction::Approve | PostAction::Reject => {
            if !viewer.can_decide(post) {
                return Err(Error::Forbidden("only institution staff approve or reject"));
            }
            match (from, action) {
                (PostStatus::Pending, PostAction::Approve) => Ok(Plan::Update {
                    from,
                    to: PostStatus::Published,
                    origin: Origin::Moderated,
                }),
                (PostStatus::Pending, _) => Ok(Plan::Update {
                    from,
                    to: PostStatus::Rejected,
                    origin: post.origin,
                }),
                _ => Err(invalid()),
            }
        }
        PostAction::Hide | PostAction::Show => {
            if !viewer.can_moderate(post) {
                return Err(Error::Forbidden("only moderators of this scope may hide or show"));
            }
            match (from, action) {
                (PostStatus::Published, PostAction::Hide) => Ok(Plan::Update {
                    from,
                    to: PostStatus::Hidden,
                    origin: post.origin,
                }),
                (PostStatus::Hidden, PostAction::Show) => Ok(Plan::Update {
                    from,
                    to: PostStatus::Published,
                    origin: post.origin,
                }),
                _ => Err(invalid()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quad_types::models::{ClubRole, PostDetails, Role, Visibility};

    fn post(institution_id: Uuid, scope: PostScope, status: PostStatus) -> Post {
        Post {
            id: Uuid::new_v4(),
            title: "Open mic".into(),
            body: String::new(),
            image_ref: None,
            author_id: Uuid::new_v4(),
            institution_id,
            scope,
            visibility: Visibility::Public,
            status,
            origin: Origin::Moderated,
            details: PostDetails::Announcement,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn club_posts_always_start_pending() {
        let inst = Uuid::new_v4();
        let club = Uuid::new_v4();
        let officer = Viewer::new(Uuid::new_v4(), Some(inst), Role::Student)
            .with_club(club, ClubRole::Officer);

        for requested in [None, Some(PostStatus::Published), Some(PostStatus::Draft)] {
            let status = initial_status(&officer, PostScope::Club { club_id: club }, inst, requested)
                .unwrap();
            assert_eq!(status, (PostStatus::Pending, Origin::Moderated));
        }
    }

    #[test]
    fn club_members_cannot_post() {
        let inst = Uuid::new_v4();
        let club = Uuid::new_v4();
        let member = Viewer::new(Uuid::new_v4(), Some(inst), Role::Student)
            .with_club(club, ClubRole::Member);

        let err = initial_status(&member, PostScope::Club { club_id: club }, inst, None).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn staff_choose_their_initial_status() {
        let inst = Uuid::new_v4();
        let admin = Viewer::new(Uuid::new_v4(), Some(inst), Role::InstitutionAdmin);

        let status =
            initial_status(&admin, PostScope::Institution, inst, Some(PostStatus::Published)).unwrap();
        assert_eq!(status, (PostStatus::Published, Origin::SelfPublished));

        let missing = initial_status(&admin, PostScope::Institution, inst, None).unwrap_err();
        assert!(matches!(missing, Error::Validation(_)));

        let hidden =
            initial_status(&admin, PostScope::Institution, inst, Some(PostStatus::Hidden)).unwrap_err();
        assert!(matches!(hidden, Error::Validation(_)));
    }

    #[test]
    fn approve_requires_pending() {
        let inst = Uuid::new_v4();
        let admin = Viewer::new(Uuid::new_v4(), Some(inst), Role::InstitutionAdmin);

        for status in [
            PostStatus::Draft,
            PostStatus::Published,
            PostStatus::Rejected,
            PostStatus::Hidden,
        ] {
            let err = plan(&post(inst, PostScope::Institution, status), &admin, PostAction::Approve)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidTransition { from, .. } if from == status));
        }

        let approved = plan(
            &post(inst, PostScope::Institution, PostStatus::Pending),
            &admin,
            PostAction::Approve,
        )
        .unwrap();
        assert_eq!(
            approved,
            Plan::Update {
                from: PostStatus::Pending,
                to: PostStatus::Published,
                origin: Origin::Moderated,
            }
        );
    }

    #[test]
    fn officers_hide_but_cannot_approve() {
        let inst = Uuid::new_v4();
        let club = Uuid::new_v4();
        let officer = Viewer::new(Uuid::new_v4(), Some(inst), Role::Student)
            .with_club(club, ClubRole::Advisor);

        let pending = post(inst, PostScope::Club { club_id: club }, PostStatus::Pending);
        assert!(matches!(
            plan(&pending, &officer, PostAction::Approve),
            Err(Error::Forbidden(_))
        ));

        let live = post(inst, PostScope::Club { club_id: club }, PostStatus::Published);
        assert!(matches!(
            plan(&live, &officer, PostAction::Hide),
            Ok(Plan::Update { to: PostStatus::Hidden, .. })
        ));
        assert!(matches!(
            plan(&live, &officer, PostAction::Show),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn show_keeps_provenance() {
        let inst = Uuid::new_v4();
        let admin = Viewer::new(Uuid::new_v4(), Some(inst), Role::InstitutionAdmin);
        let mut hidden = post(inst, PostScope::Institution, PostStatus::Hidden);
        hidden.origin = Origin::SelfPublished;

        assert_eq!(
            plan(&hidden, &admin, PostAction::Show).unwrap(),
            Plan::Update {
                from: PostStatus::Hidden,
                to: PostStatus::Published,
                origin: Origin::SelfPublished,
            }
        );
    }

    #[test]
    fn authors_delete_in_any_state() {
        let inst = Uuid::new_v4();
        let target = post(inst, PostScope::Institution, PostStatus::Rejected);
        let author = Viewer::new(target.author_id, Some(inst), Role::Employee);
        let stranger = Viewer::new(Uuid::new_v4(), Some(inst), Role::Employee);

        assert_eq!(plan(&target, &author, PostAction::Delete).unwrap(), Plan::Delete);
        assert!(matches!(
            plan(&target, &stranger, PostAction::Delete),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn drafts_move_on_by_submit_or_publish() {
        let inst = Uuid::new_v4();
        let draft = post(inst, PostScope::Institution, PostStatus::Draft);
        let author = Viewer::new(draft.author_id, Some(inst), Role::InstitutionAdmin);

        assert!(matches!(
            plan(&draft, &author, PostAction::Submit),
            Ok(Plan::Update { to: PostStatus::Pending, .. })
        ));
        assert_eq!(
            plan(&draft, &author, PostAction::Publish).unwrap(),
            Plan::Update {
                from: PostStatus::Draft,
                to: PostStatus::Published,
                origin: Origin::SelfPublished,
            }
        );

        let other_admin = Viewer::new(Uuid::new_v4(), Some(inst), Role::InstitutionAdmin);
        assert!(matches!(
            plan(&draft, &other_admin, PostAction::Publish),
            Err(Error::Forbidden(_))
        ));
    }
}
