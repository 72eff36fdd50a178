//! v001 -- Initial schema creation.
//!
//! Creates the matchmaking core: `users`, `matchmaking_queue`, `calls`,
//! `friendships` and `reports`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email           TEXT UNIQUE,
    display_name    TEXT NOT NULL,
    bio             TEXT,
    interests       TEXT NOT NULL DEFAULT '[]', -- JSON array of strings
    gender          TEXT,
    pronouns        TEXT,
    date_of_birth   TEXT,                        -- YYYY-MM-DD
    selfie_verified INTEGER NOT NULL DEFAULT 0,
    is_online       INTEGER NOT NULL DEFAULT 0,
    last_seen       TEXT NOT NULL,               -- RFC-3339
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Matchmaking queue (one live row per user, FIFO by seq)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS matchmaking_queue (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL UNIQUE,
    preferences TEXT NOT NULL,                   -- JSON SearchFilters
    enqueued_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Calls
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS calls (
    id                  TEXT PRIMARY KEY NOT NULL,
    channel_name        TEXT NOT NULL UNIQUE,
    caller_id           TEXT NOT NULL,
    callee_id           TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'connecting', 'connected', 'ended', 'reported', 'canceled')),
    caller_joined       INTEGER NOT NULL DEFAULT 0,
    callee_joined       INTEGER NOT NULL DEFAULT 0,
    started_at          TEXT NOT NULL,
    ended_at            TEXT,
    duration_seconds    INTEGER NOT NULL DEFAULT 0,
    friend_press_caller INTEGER NOT NULL DEFAULT 0,
    friend_press_callee INTEGER NOT NULL DEFAULT 0,
    caller_rating       INTEGER CHECK (caller_rating BETWEEN 1 AND 5),
    callee_rating       INTEGER CHECK (callee_rating BETWEEN 1 AND 5),
    created_at          TEXT NOT NULL,

    FOREIGN KEY (caller_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (callee_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_calls_caller_status ON calls (caller_id, status);
CREATE INDEX IF NOT EXISTS idx_calls_callee_status ON calls (callee_id, status);

-- ----------------------------------------------------------------
-- Friendships (undirected, stored with user_a_id < user_b_id)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    id         TEXT PRIMARY KEY NOT NULL,
    user_a_id  TEXT NOT NULL,
    user_b_id  TEXT NOT NULL,
    call_id    TEXT,
    created_at TEXT NOT NULL,

    UNIQUE (user_a_id, user_b_id),
    CHECK (user_a_id < user_b_id),
    FOREIGN KEY (user_a_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (user_b_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (call_id)   REFERENCES calls(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_friendships_b ON friendships (user_b_id);

-- ----------------------------------------------------------------
-- Reports
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reports (
    id               TEXT PRIMARY KEY NOT NULL,
    reporter_id      TEXT NOT NULL,
    reported_user_id TEXT NOT NULL,
    call_id          TEXT,
    reason           TEXT NOT NULL,
    description      TEXT,
    created_at       TEXT NOT NULL,

    FOREIGN KEY (reporter_id)      REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (reported_user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (call_id)          REFERENCES calls(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_reported ON reports (reported_user_id);
"#;

/// Apply the v001 migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
