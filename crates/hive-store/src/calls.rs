//! Call records and their lifecycle transitions.
//!
//! Every transition runs inside an immediate transaction: the row is read,
//! checked against the state machine and written back while holding the
//! write lock, so two participants acting at once serialize cleanly.

use chrono::{DateTime, Utc};
use hive_shared::models::{Call, Friendship};
use hive_shared::types::generate_channel_name;
use hive_shared::{CallRole, CallStatus};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::convert::{get_opt_ts, get_parsed, get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::friendships::{find_friendship_between, insert_friendship};

const CALL_COLUMNS: &str = "id, channel_name, caller_id, callee_id, status, caller_joined, \
     callee_joined, started_at, ended_at, duration_seconds, friend_press_caller, \
     friend_press_callee, caller_rating, callee_rating, created_at";

/// Result of a friend press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendPress {
    pub call: Call,
    /// The flag was already set; nothing was written.
    pub already_pressed: bool,
    /// The friendship between the two participants, if both have pressed.
    pub friendship: Option<Friendship>,
    /// This press is the one that created `friendship`.
    pub formed: bool,
}

impl Database {
    pub fn get_call(&self, id: Uuid) -> Result<Call> {
        load_call(self.conn(), id)
    }

    /// The most recent live call this user was matched into but has not
    /// joined yet. The counterpart may have joined already.
    pub fn pending_call_for(&self, user_id: Uuid) -> Result<Option<Call>> {
        Ok(active_call(self.conn(), user_id)?
            .filter(|call| call.role_of(user_id).map_or(false, |role| !call.joined(role))))
    }

    /// The most recent non-terminal call this user takes part in.
    pub fn active_call_for(&self, user_id: Uuid) -> Result<Option<Call>> {
        active_call(self.conn(), user_id)
    }

    pub fn recent_calls_for(&self, user_id: Uuid, limit: u32) -> Result<Vec<Call>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE caller_id = ?1 OR callee_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![user_id.to_string(), limit], row_to_call)?;

        let mut calls = Vec::new();
        for row in rows {
            calls.push(row?);
        }
        Ok(calls)
    }

    /// Insert a `waiting` call between two users.
    pub fn create_call(&self, caller_id: Uuid, callee_id: Uuid, now: DateTime<Utc>) -> Result<Call> {
        insert_call(self.conn(), caller_id, callee_id, now)
    }

    /// Record that `user_id` joined the call.
    ///
    /// Without `require_both` the first join moves the call to `connected`.
    /// With it, the first join moves `waiting` to `connecting` and the call
    /// only becomes `connected` once both sides have joined.
    pub fn join_call(
        &mut self,
        call_id: Uuid,
        user_id: Uuid,
        require_both: bool,
    ) -> Result<Call> {
        let tx = self.write_tx()?;
        let mut call = load_call(&tx, call_id)?;
        let role = call.role_of(user_id).ok_or(StoreError::NotParticipant)?;

        if call.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                from: call.status,
                action: "join",
            });
        }

        match role {
            CallRole::Caller => call.caller_joined = true,
            CallRole::Callee => call.callee_joined = true,
        }
        let both_joined = call.caller_joined && call.callee_joined;
        let previous = call.status;
        call.status = if previous == CallStatus::Connected || !require_both || both_joined {
            CallStatus::Connected
        } else {
            CallStatus::Connecting
        };

        write_join_state(&tx, &call)?;
        tx.commit()?;

        if previous != call.status {
            tracing::info!(
                call_id = %call.id,
                user_id = %user_id,
                from = %previous,
                to = %call.status,
                "call transition"
            );
        }
        Ok(call)
    }

    /// The media transport reported that the counterpart of `user_id`
    /// arrived on the channel. Treated as the counterpart's join
    /// acknowledgement.
    pub fn acknowledge_peer(&mut self, call_id: Uuid, user_id: Uuid) -> Result<Call> {
        let tx = self.write_tx()?;
        let mut call = load_call(&tx, call_id)?;
        let role = call.role_of(user_id).ok_or(StoreError::NotParticipant)?;

        if call.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                from: call.status,
                action: "acknowledge",
            });
        }

        match role.other() {
            CallRole::Caller => call.caller_joined = true,
            CallRole::Callee => call.callee_joined = true,
        }
        if call.caller_joined && call.callee_joined {
            call.status = CallStatus::Connected;
        }

        write_join_state(&tx, &call)?;
        tx.commit()?;
        Ok(call)
    }

    /// End the call with `final_status` (`ended`, `reported` or `canceled`).
    ///
    /// Idempotent: on an already terminal call nothing changes and the
    /// stored call is returned with `false`. Any active game session of the
    /// call is closed in the same transaction.
    pub fn end_call(
        &mut self,
        call_id: Uuid,
        user_id: Uuid,
        final_status: CallStatus,
        now: DateTime<Utc>,
    ) -> Result<(Call, bool)> {
        debug_assert!(final_status.is_terminal());

        let tx = self.write_tx()?;
        let call = load_call(&tx, call_id)?;
        if call.role_of(user_id).is_none() {
            return Err(StoreError::NotParticipant);
        }
        if call.status.is_terminal() {
            return Ok((call, false));
        }

        let call = finish_call(&tx, call, final_status, now)?;
        tx.commit()?;

        tracing::info!(
            call_id = %call.id,
            status = %call.status,
            duration_seconds = call.duration_seconds,
            "call finished"
        );
        Ok((call, true))
    }

    /// Set this participant's friend flag. When both flags are set the
    /// friendship row is inserted in the same transaction; at most one
    /// friendship ever exists per pair.
    pub fn press_friend(
        &mut self,
        call_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FriendPress> {
        let tx = self.write_tx()?;
        let mut call = load_call(&tx, call_id)?;
        let role = call.role_of(user_id).ok_or(StoreError::NotParticipant)?;

        // A call that ended before anyone joined never connected the pair.
        if !call.status.has_started() || !(call.caller_joined || call.callee_joined) {
            return Err(StoreError::InvalidTransition {
                from: call.status,
                action: "press friend on",
            });
        }

        let already_pressed = call.friend_pressed(role);
        if !already_pressed {
            let column = match role {
                CallRole::Caller => "friend_press_caller",
                CallRole::Callee => "friend_press_callee",
            };
            tx.execute(
                &format!("UPDATE calls SET {column} = 1 WHERE id = ?1"),
                params![call.id.to_string()],
            )?;
            match role {
                CallRole::Caller => call.friend_press_caller = true,
                CallRole::Callee => call.friend_press_callee = true,
            }
        }

        let mut formed = false;
        let friendship = if call.friend_press_caller && call.friend_press_callee {
            formed = insert_friendship(&tx, call.caller_id, call.callee_id, Some(call.id), now)?;
            find_friendship_between(&tx, call.caller_id, call.callee_id)?
        } else {
            None
        };

        tx.commit()?;

        if formed {
            tracing::info!(
                call_id = %call.id,
                user_a = %call.caller_id,
                user_b = %call.callee_id,
                "friendship formed"
            );
        }

        Ok(FriendPress {
            call,
            already_pressed,
            friendship,
            formed,
        })
    }

    /// Store the rating `user_id` gave the counterpart. The rating lands in
    /// the rater's own column (`caller_rating` is the caller's verdict).
    pub fn rate_call(&mut self, call_id: Uuid, user_id: Uuid, rating: u8) -> Result<Call> {
        let tx = self.write_tx()?;
        let mut call = load_call(&tx, call_id)?;
        let role = call.role_of(user_id).ok_or(StoreError::NotParticipant)?;

        if !call.joined(role) {
            return Err(StoreError::InvalidTransition {
                from: call.status,
                action: "rate",
            });
        }

        let column = match role {
            CallRole::Caller => {
                call.caller_rating = Some(rating);
                "caller_rating"
            }
            CallRole::Callee => {
                call.callee_rating = Some(rating);
                "callee_rating"
            }
        };
        tx.execute(
            &format!("UPDATE calls SET {column} = ?2 WHERE id = ?1"),
            params![call.id.to_string(), rating],
        )?;
        tx.commit()?;
        Ok(call)
    }
}

// ---------------------------------------------------------------------------
// Helpers usable inside a transaction
// ---------------------------------------------------------------------------

pub(crate) fn insert_call(
    conn: &Connection,
    caller_id: Uuid,
    callee_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Call> {
    let now = stored(now);
    let call = Call {
        id: Uuid::new_v4(),
        channel_name: generate_channel_name(),
        caller_id,
        callee_id,
        status: CallStatus::Waiting,
        caller_joined: false,
        callee_joined: false,
        started_at: now,
        ended_at: None,
        duration_seconds: 0,
        friend_press_caller: false,
        friend_press_callee: false,
        caller_rating: None,
        callee_rating: None,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO calls (id, channel_name, caller_id, callee_id, status, started_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            call.id.to_string(),
            call.channel_name,
            call.caller_id.to_string(),
            call.callee_id.to_string(),
            call.status.as_str(),
            ts(&call.started_at),
            ts(&call.created_at),
        ],
    )?;

    tracing::info!(
        call_id = %call.id,
        channel = %call.channel_name,
        caller = %caller_id,
        callee = %callee_id,
        "call created"
    );
    Ok(call)
}

pub(crate) fn load_call(conn: &Connection, id: Uuid) -> Result<Call> {
    conn.query_row(
        &format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = ?1"),
        params![id.to_string()],
        row_to_call,
    )
    .map_err(not_found)
}

pub(crate) fn active_call(conn: &Connection, user_id: Uuid) -> Result<Option<Call>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE (caller_id = ?1 OR callee_id = ?1)
                   AND status IN ('waiting', 'connecting', 'connected')
                 ORDER BY created_at DESC
                 LIMIT 1"
            ),
            params![user_id.to_string()],
            row_to_call,
        )
        .optional()?)
}

/// Move a non-terminal call to `status`, stamping `ended_at` and the
/// duration, and close its active game session.
pub(crate) fn finish_call(
    conn: &Connection,
    mut call: Call,
    status: CallStatus,
    now: DateTime<Utc>,
) -> Result<Call> {
    let now = stored(now);
    call.status = status;
    call.ended_at = Some(now);
    call.duration_seconds = if call.status == CallStatus::Canceled {
        0
    } else {
        (now - call.started_at).num_seconds().max(0)
    };

    conn.execute(
        "UPDATE calls SET status = ?2, ended_at = ?3, duration_seconds = ?4
         WHERE id = ?1 AND ended_at IS NULL",
        params![
            call.id.to_string(),
            call.status.as_str(),
            ts(&now),
            call.duration_seconds,
        ],
    )?;
    conn.execute(
        "UPDATE mini_game_sessions SET ended_at = ?2
         WHERE call_id = ?1 AND ended_at IS NULL",
        params![call.id.to_string(), ts(&now)],
    )?;
    Ok(call)
}

fn write_join_state(conn: &Connection, call: &Call) -> Result<()> {
    conn.execute(
        "UPDATE calls SET status = ?2, caller_joined = ?3, callee_joined = ?4 WHERE id = ?1",
        params![
            call.id.to_string(),
            call.status.as_str(),
            call.caller_joined,
            call.callee_joined,
        ],
    )?;
    Ok(())
}

fn row_to_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<Call> {
    Ok(Call {
        id: get_uuid(row, 0)?,
        channel_name: row.get(1)?,
        caller_id: get_uuid(row, 2)?,
        callee_id: get_uuid(row, 3)?,
        status: get_parsed(row, 4)?,
        caller_joined: row.get(5)?,
        callee_joined: row.get(6)?,
        started_at: get_ts(row, 7)?,
        ended_at: get_opt_ts(row, 8)?,
        duration_seconds: row.get(9)?,
        friend_press_caller: row.get(10)?,
        friend_press_callee: row.get(11)?,
        caller_rating: row.get(12)?,
        callee_rating: row.get(13)?,
        created_at: get_ts(row, 14)?,
    })
}
