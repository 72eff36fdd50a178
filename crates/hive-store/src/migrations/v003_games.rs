//! v003 -- Mini-game sessions, sealed moves and the trivia question pool.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS mini_game_sessions (
    id          TEXT PRIMARY KEY NOT NULL,
    call_id     TEXT NOT NULL,
    game_type   TEXT NOT NULL
        CHECK (game_type IN ('rock_paper_scissors', 'trivia', 'emoji_guess')),
    game_state  TEXT NOT NULL,                   -- JSON, replaced wholesale
    game_result TEXT,                            -- JSON
    version     INTEGER NOT NULL DEFAULT 0,
    started_at  TEXT NOT NULL,
    ended_at    TEXT,
    created_at  TEXT NOT NULL,

    FOREIGN KEY (call_id) REFERENCES calls(id) ON DELETE CASCADE
);

-- At most one active session per call.
CREATE UNIQUE INDEX IF NOT EXISTS idx_one_active_game_per_call
    ON mini_game_sessions (call_id) WHERE ended_at IS NULL;

CREATE TABLE IF NOT EXISTS game_moves (
    session_id TEXT NOT NULL,
    round      INTEGER NOT NULL,
    player     TEXT NOT NULL CHECK (player IN ('a', 'b')),
    choice     TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (session_id, round, player),
    FOREIGN KEY (session_id) REFERENCES mini_game_sessions(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS trivia_questions (
    id             TEXT PRIMARY KEY NOT NULL,
    question       TEXT NOT NULL,
    options        TEXT NOT NULL,                -- JSON array of strings
    correct_answer TEXT NOT NULL,
    category       TEXT NOT NULL,
    difficulty     TEXT NOT NULL DEFAULT 'easy',
    language       TEXT NOT NULL DEFAULT 'en',
    created_at     TEXT NOT NULL
);

INSERT OR IGNORE INTO trivia_questions
    (id, question, options, correct_answer, category, difficulty, language, created_at)
VALUES
    ('00000000-0000-4000-8000-000000000001',
     'Which social media platform was originally called ''The Facebook''?',
     '["Instagram","Facebook","Twitter","Snapchat"]', 'Facebook',
     'tech', 'easy', 'en', '2024-01-01T00:00:00.000000Z'),
    ('00000000-0000-4000-8000-000000000002',
     'What does ''CPU'' stand for in computer terms?',
     '["Central Processing Unit","Computer Processing Unit","Central Program Unit","Computer Program Unit"]',
     'Central Processing Unit',
     'tech', 'easy', 'en', '2024-01-01T00:00:00.000000Z'),
    ('00000000-0000-4000-8000-000000000003',
     'Which streaming service created ''Stranger Things''?',
     '["Hulu","Amazon Prime","Netflix","Disney+"]', 'Netflix',
     'entertainment', 'easy', 'en', '2024-01-01T00:00:00.000000Z'),
    ('00000000-0000-4000-8000-000000000004',
     'What''s the most popular programming language for beginners?',
     '["Java","Python","C++","JavaScript"]', 'Python',
     'tech', 'easy', 'en', '2024-01-01T00:00:00.000000Z'),
    ('00000000-0000-4000-8000-000000000005',
     'Which app is known for its 15-second videos?',
     '["TikTok","Instagram","YouTube","Vine"]', 'TikTok',
     'social', 'easy', 'en', '2024-01-01T00:00:00.000000Z');
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
