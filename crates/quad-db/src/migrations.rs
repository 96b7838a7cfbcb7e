use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (directory + content schema)");
        conn.execute_batch(
            "
            BEGIN;

            -- Directory: owned by institution management, read-only to the content engine

            CREATE TABLE institutions (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                institution_id  TEXT REFERENCES institutions(id),
                role            TEXT NOT NULL,
                display_name    TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE clubs (
                id              TEXT PRIMARY KEY,
                institution_id  TEXT NOT NULL REFERENCES institutions(id),
                name            TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE club_members (
                club_id     TEXT NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                PRIMARY KEY (club_id, user_id)
            );

            CREATE INDEX idx_club_members_user ON club_members(user_id);

            -- Content

            CREATE TABLE posts (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                body            TEXT NOT NULL,
                image_ref       TEXT,
                author_id       TEXT NOT NULL REFERENCES users(id),
                institution_id  TEXT NOT NULL REFERENCES institutions(id),
                club_id         TEXT REFERENCES clubs(id),
                visibility      TEXT NOT NULL,
                status          TEXT NOT NULL,
                origin          TEXT NOT NULL,
                start_at        TEXT,
                end_at          TEXT,
                venue           TEXT,
                link            TEXT,
                max_slots       INTEGER,
                tags            TEXT NOT NULL DEFAULT '[]',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_posts_feed ON posts(status, visibility, created_at);
            CREATE INDEX idx_posts_institution ON posts(institution_id, status, created_at);
            CREATE INDEX idx_posts_upcoming ON posts(kind, status, start_at);

            CREATE TABLE post_audience (
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id)
            );

            CREATE INDEX idx_post_audience_user ON post_audience(user_id);

            CREATE TABLE rsvps (
                user_id     TEXT NOT NULL REFERENCES users(id),
                event_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                state       TEXT NOT NULL CHECK (state IN ('going', 'interested')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, event_id)
            );

            CREATE INDEX idx_rsvps_event ON rsvps(event_id, state);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
