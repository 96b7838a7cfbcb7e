use quad_types::models::{Post, PostStatus, Visibility};

use crate::capability::Viewer;

/// Which surface is asking. Moderators may look past audience rules only when moderating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Feed,
    Moderation,
}

/// What the ledger knows about a restricted post's explicit allow-list, relative to one viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudienceFacts {
    pub has_explicit_list: bool,
    pub viewer_listed: bool,
}

/// Decides whether `viewer` may see `post`.
///
/// Drafts are private to their author. Pending, rejected and hidden posts are
/// visible to the author and to moderators of the post's scope. Live posts go
/// through the audience policy of their `visibility`.
pub fn is_visible(post: &Post, viewer: &Viewer, audience: AudienceFacts, view: View) -> bool {
    if viewer.is_author(post) {
        return true;
    }

    match post.status {
        PostStatus::Draft => false,
        PostStatus::Pending | PostStatus::Rejected | PostStatus::Hidden => viewer.can_moderate(post),
        PostStatus::Published => {
            (view == View::Moderation && viewer.can_moderate(post))
                || admits(post, viewer, audience)
        }
    }
}

/// Audience policy alone, ignoring status.
pub fn admits(post: &Post, viewer: &Viewer, audience: AudienceFacts) -> bool {
    match post.visibility {
        Visibility::Public => true,
        Visibility::Institution => viewer.belongs_to(post.institution_id),
        Visibility::Restricted => {
            if audience.has_explicit_list {
                audience.viewer_listed
            } else {
                post.club_id()
                    .is_some_and(|club_id| viewer.is_member_of(club_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quad_types::models::{ClubRole, Origin, PostDetails, PostScope, Role};
    use uuid::Uuid;

    struct Campus {
        inst: Uuid,
        club: Uuid,
    }

    impl Campus {
        fn new() -> Self {
            Self {
                inst: Uuid::new_v4(),
                club: Uuid::new_v4(),
            }
        }

        fn post(&self, visibility: Visibility, status: PostStatus, club: bool) -> Post {
            Post {
                id: Uuid::new_v4(),
                title: "Career fair".into(),
                body: String::new(),
                image_ref: None,
                author_id: Uuid::new_v4(),
                institution_id: self.inst,
                scope: if club {
                    PostScope::Club { club_id: self.club }
                } else {
                    PostScope::Institution
                },
                visibility,
                status,
                origin: Origin::SelfPublished,
                details: PostDetails::Announcement,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }

        fn student(&self) -> Viewer {
            Viewer::new(Uuid::new_v4(), Some(self.inst), Role::Student)
        }
    }

    fn outsider() -> Viewer {
        Viewer::new(Uuid::new_v4(), Some(Uuid::new_v4()), Role::Student)
    }

    #[test]
    fn public_posts_cross_institutions() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Public, PostStatus::Published, false);
        assert!(is_visible(&post, &outsider(), AudienceFacts::default(), View::Feed));
    }

    #[test]
    fn institution_posts_stay_home() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Institution, PostStatus::Published, false);
        assert!(is_visible(&post, &campus.student(), AudienceFacts::default(), View::Feed));
        assert!(!is_visible(&post, &outsider(), AudienceFacts::default(), View::Feed));
    }

    #[test]
    fn restricted_club_post_needs_membership() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Restricted, PostStatus::Published, true);
        let member = campus.student().with_club(campus.club, ClubRole::Member);

        assert!(is_visible(&post, &member, AudienceFacts::default(), View::Feed));
        assert!(!is_visible(&post, &campus.student(), AudienceFacts::default(), View::Feed));
    }

    #[test]
    fn explicit_list_overrides_club_membership() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Restricted, PostStatus::Published, true);
        let member = campus.student().with_club(campus.club, ClubRole::Member);
        let unlisted = AudienceFacts {
            has_explicit_list: true,
            viewer_listed: false,
        };
        let listed = AudienceFacts {
            has_explicit_list: true,
            viewer_listed: true,
        };

        assert!(!is_visible(&post, &member, unlisted, View::Feed));
        assert!(is_visible(&post, &campus.student(), listed, View::Feed));
    }

    #[test]
    fn staff_bypass_only_in_moderation_view() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Restricted, PostStatus::Published, false);
        let admin = Viewer::new(Uuid::new_v4(), Some(campus.inst), Role::InstitutionAdmin);
        let root = Viewer::new(Uuid::new_v4(), None, Role::SuperAdmin);
        let facts = AudienceFacts {
            has_explicit_list: true,
            viewer_listed: false,
        };

        assert!(!is_visible(&post, &admin, facts, View::Feed));
        assert!(is_visible(&post, &admin, facts, View::Moderation));
        assert!(!is_visible(&post, &root, facts, View::Feed));
        assert!(is_visible(&post, &root, facts, View::Moderation));
    }

    #[test]
    fn club_leaders_moderate_past_the_explicit_list() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Restricted, PostStatus::Published, true);
        let officer = campus.student().with_club(campus.club, ClubRole::Officer);
        let advisor = campus.student().with_club(campus.club, ClubRole::Advisor);
        let member = campus.student().with_club(campus.club, ClubRole::Member);
        let facts = AudienceFacts {
            has_explicit_list: true,
            viewer_listed: false,
        };

        assert!(is_visible(&post, &officer, facts, View::Moderation));
        assert!(is_visible(&post, &advisor, facts, View::Moderation));
        assert!(!is_visible(&post, &officer, facts, View::Feed));
        assert!(!is_visible(&post, &member, facts, View::Moderation));
    }

    #[test]
    fn unpublished_states_are_limited_to_author_and_moderators() {
        let campus = Campus::new();
        let officer = campus.student().with_club(campus.club, ClubRole::Officer);
        let admin = Viewer::new(Uuid::new_v4(), Some(campus.inst), Role::InstitutionAdmin);

        for status in [PostStatus::Pending, PostStatus::Rejected, PostStatus::Hidden] {
            let post = campus.post(Visibility::Public, status, true);
            let mut author = campus.student();
            author.user_id = post.author_id;

            assert!(is_visible(&post, &author, AudienceFacts::default(), View::Feed));
            assert!(is_visible(&post, &officer, AudienceFacts::default(), View::Feed));
            assert!(is_visible(&post, &admin, AudienceFacts::default(), View::Feed));
            assert!(!is_visible(&post, &campus.student(), AudienceFacts::default(), View::Feed));
        }
    }

    #[test]
    fn drafts_are_private_even_to_staff() {
        let campus = Campus::new();
        let post = campus.post(Visibility::Public, PostStatus::Draft, false);
        let admin = Viewer::new(Uuid::new_v4(), Some(campus.inst), Role::InstitutionAdmin);
        let mut author = admin.clone();
        author.user_id = post.author_id;

        assert!(!is_visible(&post, &admin, AudienceFacts::default(), View::Moderation));
        assert!(is_visible(&post, &author, AudienceFacts::default(), View::Feed));
    }
}
