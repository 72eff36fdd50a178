//! Mini-game sessions and sealed rock-paper-scissors moves.

use chrono::{DateTime, Utc};
use hive_shared::games::{GameRuleError, Outcome, PlayerSlot, RpsChoice, RpsState};
use hive_shared::models::{GameMove, GameSession};
use hive_shared::GameType;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::convert::{get_json, get_opt_json, get_opt_ts, get_parsed, get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::{is_constraint_violation, not_found, Result, StoreError};

const SESSION_COLUMNS: &str =
    "id, call_id, game_type, game_state, game_result, version, started_at, ended_at, created_at";

/// Result of submitting one sealed move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub session: GameSession,
    /// The round the move was recorded for.
    pub round: u32,
    /// Set once both players have moved and the round was resolved.
    pub resolved: Option<Outcome>,
}

impl Database {
    /// Start a session on `call_id`. Fails with [`StoreError::Conflict`]
    /// while another session of the same call is still active.
    pub fn create_game_session(
        &self,
        call_id: Uuid,
        game_type: GameType,
        initial_state: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<GameSession> {
        let now = stored(now);
        let session = GameSession {
            id: Uuid::new_v4(),
            call_id,
            game_type,
            game_state: initial_state.clone(),
            game_result: None,
            version: 0,
            started_at: now,
            ended_at: None,
            created_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO mini_game_sessions
                     (id, call_id, game_type, game_state, version, started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id.to_string(),
                    session.call_id.to_string(),
                    session.game_type.as_str(),
                    serde_json::to_string(&session.game_state)?,
                    session.version,
                    ts(&session.started_at),
                    ts(&session.created_at),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::Conflict("call already has an active game".into())
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        tracing::info!(session_id = %session.id, call_id = %call_id, game = %game_type, "game started");
        Ok(session)
    }

    pub fn get_game_session(&self, id: Uuid) -> Result<GameSession> {
        load_session(self.conn(), id)
    }

    pub fn active_game_for_call(&self, call_id: Uuid) -> Result<Option<GameSession>> {
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM mini_game_sessions
                     WHERE call_id = ?1 AND ended_at IS NULL"
                ),
                params![call_id.to_string()],
                row_to_session,
            )
            .optional()?)
    }

    /// Replace the state blob wholesale and bump the version.
    ///
    /// With `expected_version` the write is a compare-and-swap: it only
    /// lands if nobody wrote since that version was read.
    pub fn replace_game_state(
        &self,
        id: Uuid,
        state: &serde_json::Value,
        expected_version: Option<i64>,
    ) -> Result<GameSession> {
        let affected = self.conn().execute(
            "UPDATE mini_game_sessions
             SET game_state = ?2, version = version + 1
             WHERE id = ?1 AND ended_at IS NULL AND (?3 IS NULL OR version = ?3)",
            params![id.to_string(), serde_json::to_string(state)?, expected_version],
        )?;

        let session = self.get_game_session(id)?;
        if affected == 0 {
            if !session.is_active() {
                return Err(StoreError::GameEnded);
            }
            return Err(StoreError::Conflict(format!(
                "expected game version {}, found {}",
                expected_version.unwrap_or_default(),
                session.version
            )));
        }
        Ok(session)
    }

    /// Close the session with `result`. Idempotent: a second call returns
    /// the stored session unchanged with `false`.
    pub fn end_game_session(
        &self,
        id: Uuid,
        result: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(GameSession, bool)> {
        let affected = self.conn().execute(
            "UPDATE mini_game_sessions SET game_result = ?2, ended_at = ?3
             WHERE id = ?1 AND ended_at IS NULL",
            params![id.to_string(), serde_json::to_string(result)?, ts(&stored(now))],
        )?;
        let session = self.get_game_session(id)?;
        Ok((session, affected > 0))
    }

    /// Seal a rock-paper-scissors move for the current round.
    ///
    /// The move is stored without touching the visible state. When the
    /// second player's move arrives the round is resolved and the new state
    /// written, all in one transaction.
    pub fn submit_rps_move(
        &mut self,
        session_id: Uuid,
        player: PlayerSlot,
        choice: RpsChoice,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome> {
        let tx = self.write_tx()?;
        let mut session = load_session(&tx, session_id)?;

        if !session.is_active() {
            return Err(StoreError::GameEnded);
        }
        if session.game_type != GameType::RockPaperScissors {
            return Err(GameRuleError::MovesUnsupported(session.game_type).into());
        }
        let mut state = RpsState::from_value(&session.game_state)?;
        if state.is_finished() {
            return Err(GameRuleError::GameFinished.into());
        }
        let round = state.round;

        tx.execute(
            "INSERT INTO game_moves (session_id, round, player, choice, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id.to_string(),
                round,
                player.as_str(),
                choice.as_str(),
                ts(&stored(now)),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(format!("player {} already moved in round {round}", player.as_str()))
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        let moves = round_moves(&tx, session_id, round)?;
        let a = moves.iter().find(|m| m.player == PlayerSlot::A);
        let b = moves.iter().find(|m| m.player == PlayerSlot::B);

        let resolved = match (a, b) {
            (Some(a), Some(b)) => {
                let outcome =
                    state.resolve_round(RpsChoice::parse(&a.choice)?, RpsChoice::parse(&b.choice)?)?;
                session.game_state = state.to_value();
                session.version += 1;
                tx.execute(
                    "UPDATE mini_game_sessions SET game_state = ?2, version = ?3 WHERE id = ?1",
                    params![
                        session_id.to_string(),
                        serde_json::to_string(&session.game_state)?,
                        session.version,
                    ],
                )?;
                Some(outcome)
            }
            _ => None,
        };

        tx.commit()?;

        tracing::debug!(
            session_id = %session_id,
            round,
            player = player.as_str(),
            resolved = resolved.is_some(),
            "move sealed"
        );
        Ok(MoveOutcome {
            session,
            round,
            resolved,
        })
    }

    /// Moves recorded for a round. Only meaningful to callers once the
    /// round is resolved; the server never exposes an unresolved round.
    pub fn game_moves(&self, session_id: Uuid, round: u32) -> Result<Vec<GameMove>> {
        round_moves(self.conn(), session_id, round)
    }
}

fn load_session(conn: &Connection, id: Uuid) -> Result<GameSession> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM mini_game_sessions WHERE id = ?1"),
        params![id.to_string()],
        row_to_session,
    )
    .map_err(not_found)
}

fn round_moves(conn: &Connection, session_id: Uuid, round: u32) -> Result<Vec<GameMove>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, round, player, choice, created_at
         FROM game_moves
         WHERE session_id = ?1 AND round = ?2
         ORDER BY player",
    )?;
    let rows = stmt.query_map(params![session_id.to_string(), round], |row| {
        let player: String = row.get(2)?;
        Ok(GameMove {
            session_id: get_uuid(row, 0)?,
            round: row.get(1)?,
            player: PlayerSlot::parse(&player).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(2, "player".into(), rusqlite::types::Type::Text)
            })?,
            choice: row.get(3)?,
            created_at: get_ts(row, 4)?,
        })
    })?;

    let mut moves = Vec::new();
    for row in rows {
        moves.push(row?);
    }
    Ok(moves)
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameSession> {
    Ok(GameSession {
        id: get_uuid(row, 0)?,
        call_id: get_uuid(row, 1)?,
        game_type: get_parsed(row, 2)?,
        game_state: get_json(row, 3)?,
        game_result: get_opt_json(row, 4)?,
        version: row.get(5)?,
        started_at: get_ts(row, 6)?,
        ended_at: get_opt_ts(row, 7)?,
        created_at: get_ts(row, 8)?,
    })
}
