//! Institution, user and club membership lookups.
//!
//! The inserts here are the provisioning hooks used by institution management
//! (and by tests); the content engine itself only reads these tables.

use anyhow::Result;
use quad_policy::Viewer;
use quad_types::models::{ClubRole, Role};
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;
use uuid::Uuid;

use crate::Database;
use crate::models::{MembershipRow, UserRow, parse_id};

impl Database {
    // -- Provisioning --

    pub fn insert_institution(&self, id: Uuid, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO institutions (id, name) VALUES (?1, ?2)",
                (id.to_string(), name),
            )?;
            Ok(())
        })
    }

    pub fn insert_user(
        &self,
        id: Uuid,
        institution_id: Option<Uuid>,
        role: Role,
        display_name: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, institution_id, role, display_name) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    id.to_string(),
                    institution_id.map(|i| i.to_string()),
                    role.as_str(),
                    display_name
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_club(&self, id: Uuid, institution_id: Uuid, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO clubs (id, institution_id, name) VALUES (?1, ?2, ?3)",
                (id.to_string(), institution_id.to_string(), name),
            )?;
            Ok(())
        })
    }

    /// Adds a member or changes their role.
    pub fn add_club_member(&self, club_id: Uuid, user_id: Uuid, role: ClubRole) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO club_members (club_id, user_id, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(club_id, user_id) DO UPDATE SET role = excluded.role",
                (club_id.to_string(), user_id.to_string(), role.as_str()),
            )?;
            Ok(())
        })
    }

    // -- Lookups --

    pub fn club_institution(&self, club_id: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let institution_id: Option<String> = conn
                .query_row(
                    "SELECT institution_id FROM clubs WHERE id = ?1",
                    [club_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            institution_id.as_deref().map(parse_id).transpose()
        })
    }

    /// Resolves a user's capability set. `None` if the user is not in the directory.
    pub fn load_viewer(&self, user_id: Uuid) -> Result<Option<Viewer>> {
        self.with_conn(|conn| query_viewer(conn, user_id))
    }
}

fn query_viewer(conn: &Connection, user_id: Uuid) -> Result<Option<Viewer>> {
    let user = conn
        .query_row(
            "SELECT id, institution_id, role FROM users WHERE id = ?1",
            [user_id.to_string()],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    institution_id: row.get(1)?,
                    role: row.get(2)?,
                })
            },
        )
        .optional()?;

    let Some(user) = user else {
        return Ok(None);
    };

    let mut viewer = Viewer::new(
        parse_id(&user.id)?,
        user.institution_id.as_deref().map(parse_id).transpose()?,
        user.role.parse()?,
    );

    let mut stmt = conn.prepare("SELECT club_id, role FROM club_members WHERE user_id = ?1")?;
    let memberships = stmt
        .query_map([&user.id], |row| {
            Ok(MembershipRow {
                club_id: row.get(0)?,
                role: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for membership in memberships {
        match (parse_id(&membership.club_id), membership.role.parse::<ClubRole>()) {
            (Ok(club_id), Ok(role)) => {
                viewer.clubs.insert(club_id, role);
            }
            (club, role) => {
                warn!(
                    "Skipping corrupt membership of user {} ({:?}, {:?})",
                    user.id,
                    club.err(),
                    role.err()
                );
            }
        }
    }

    Ok(Some(viewer))
}
