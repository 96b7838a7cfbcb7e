use std::collections::HashMap;

use quad_types::models::{ClubRole, Post, Role};
use uuid::Uuid;

/// The acting user's capability set, resolved from the directory once per request.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: Uuid,
    /// Super-admins may not belong to any institution.
    pub institution_id: Option<Uuid>,
    pub role: Role,
    pub clubs: HashMap<Uuid, ClubRole>,
}

impl Viewer {
    pub fn new(user_id: Uuid, institution_id: Option<Uuid>, role: Role) -> Self {
        Self {
            user_id,
            institution_id,
            role,
            clubs: HashMap::new(),
        }
    }

    pub fn with_club(mut self, club_id: Uuid, role: ClubRole) -> Self {
        self.clubs.insert(club_id, role);
        self
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Institution staff: admins of that institution, plus super-admins everywhere.
    pub fn is_staff_of(&self, institution_id: Uuid) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::InstitutionAdmin => self.institution_id == Some(institution_id),
            Role::Student | Role::Employee => false,
        }
    }

    pub fn belongs_to(&self, institution_id: Uuid) -> bool {
        self.institution_id == Some(institution_id)
    }

    pub fn club_role(&self, club_id: Uuid) -> Option<ClubRole> {
        self.clubs.get(&club_id).copied()
    }

    pub fn is_member_of(&self, club_id: Uuid) -> bool {
        self.clubs.contains_key(&club_id)
    }

    /// Officers and advisors run a club's content.
    pub fn leads_club(&self, club_id: Uuid) -> bool {
        matches!(
            self.club_role(club_id),
            Some(ClubRole::Officer | ClubRole::Advisor)
        )
    }

    pub fn is_author(&self, post: &Post) -> bool {
        post.author_id == self.user_id
    }

    /// Moderation capability over the post's scope.
    pub fn can_moderate(&self, post: &Post) -> bool {
        self.is_staff_of(post.institution_id)
            || post.club_id().is_some_and(|club_id| self.leads_club(club_id))
    }

    /// Approve/reject is reserved for institution staff, including for club content.
    pub fn can_decide(&self, post: &Post) -> bool {
        self.is_staff_of(post.institution_id)
    }

    pub fn can_edit(&self, post: &Post) -> bool {
        self.is_author(post) || self.can_moderate(post)
    }
}
