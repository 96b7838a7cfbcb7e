#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use quad_api::Settings;
use quad_db::Database;
use quad_policy::Viewer;
use quad_types::api::{CreatePostRequest, PostAction, PostResponse};
use quad_types::models::{ClubRole, PostStatus, Role, Visibility};
use tempfile::TempDir;
use uuid::Uuid;

/// Two institutions, one club, and a cast of users on disk in a temp dir.
pub struct Campus {
    pub db: Database,
    pub settings: Settings,
    pub north: Uuid,
    pub south: Uuid,
    pub chess: Uuid,
    pub registrar: Uuid,
    pub officer: Uuid,
    pub member: Uuid,
    pub student: Uuid,
    pub outsider: Uuid,
    pub super_admin: Uuid,
    _dir: TempDir,
}

impl Campus {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("quad.db")).unwrap();

        let north = Uuid::new_v4();
        let south = Uuid::new_v4();
        db.insert_institution(north, "North University").unwrap();
        db.insert_institution(south, "South College").unwrap();

        let chess = Uuid::new_v4();
        db.insert_club(chess, north, "Chess Club").unwrap();

        let user = |institution, role, name| {
            let id = Uuid::new_v4();
            db.insert_user(id, institution, role, name).unwrap();
            id
        };
        let registrar = user(Some(north), Role::InstitutionAdmin, "registrar");
        let officer = user(Some(north), Role::Student, "officer");
        let member = user(Some(north), Role::Student, "member");
        let student = user(Some(north), Role::Student, "student");
        let outsider = user(Some(south), Role::Student, "outsider");
        let super_admin = user(None, Role::SuperAdmin, "root");

        db.add_club_member(chess, officer, ClubRole::Officer).unwrap();
        db.add_club_member(chess, member, ClubRole::Member).unwrap();

        Self {
            db,
            settings: Settings::default(),
            north,
            south,
            chess,
            registrar,
            officer,
            member,
            student,
            outsider,
            super_admin,
            _dir: dir,
        }
    }

    pub fn viewer(&self, user_id: Uuid) -> Viewer {
        self.db.load_viewer(user_id).unwrap().unwrap()
    }

    pub fn add_student(&self, institution: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.db.insert_user(id, Some(institution), Role::Student, "extra").unwrap();
        id
    }

    /// Registrar announcement for North, published immediately.
    pub fn staff_announcement(&self, title: &str, visibility: Visibility) -> PostResponse {
        let mut req = CreatePostRequest::announcement(title, visibility);
        req.institution_id = Some(self.north);
        req.status = Some(PostStatus::Published);
        quad_api::posts::create_post(&self.db, &self.viewer(self.registrar), req).unwrap()
    }

    /// Chess club event by the officer; lands in pending.
    pub fn club_event(&self, title: &str, visibility: Visibility) -> PostResponse {
        let mut req = CreatePostRequest::event(title, visibility, in_days(3), "Room 101");
        req.club_id = Some(self.chess);
        quad_api::posts::create_post(&self.db, &self.viewer(self.officer), req).unwrap()
    }

    pub fn act(&self, user_id: Uuid, post_id: Uuid, action: PostAction) -> quad_policy::Result<Option<PostResponse>> {
        quad_api::posts::transition_post(&self.db, &self.viewer(user_id), post_id, action)
    }

    /// A published public event with an optional slot limit.
    pub fn live_event(&self, max_slots: Option<u32>) -> PostResponse {
        let mut req = CreatePostRequest::event("Open day", Visibility::Public, in_days(2), "Main hall");
        req.institution_id = Some(self.north);
        req.status = Some(PostStatus::Published);
        req.max_slots = max_slots;
        quad_api::posts::create_post(&self.db, &self.viewer(self.registrar), req).unwrap()
    }
}

pub fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}
