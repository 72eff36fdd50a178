//! The matchmaking queue and the atomic pairing claim.
//!
//! Pairing never reads and writes in separate steps: deleting the searcher's
//! previous row, picking the oldest compatible entry, removing it and
//! inserting the call all happen in one immediate transaction. A waiting
//! entry can therefore be claimed by exactly one newcomer.

use chrono::{DateTime, Utc};
use hive_shared::models::{Call, QueueEntry};
use hive_shared::{CallStatus, SearchFilters};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::calls::{active_call, finish_call, insert_call};
use crate::convert::{get_json, get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::Result;
use crate::users::load_user;

/// What happened when a user started searching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Nobody compatible was waiting; the user now has a live queue row.
    Queued(QueueEntry),
    /// A waiting user was claimed. Both queue rows are gone and a `waiting`
    /// call links the two, with the earlier entrant as caller.
    Matched(Call),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dequeued {
    /// A queue row existed and was deleted.
    pub removed: bool,
    /// A call created for this user that they had not joined yet, now
    /// `canceled`.
    pub canceled_call: Option<Call>,
}

impl Database {
    /// Start (or restart) a search for `user_id` and try to pair it at once.
    pub fn enqueue_and_match(
        &mut self,
        user_id: Uuid,
        preferences: &SearchFilters,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome> {
        let tx = self.write_tx()?;

        tx.execute(
            "DELETE FROM matchmaking_queue WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;

        let today = now.date_naive();
        let me = load_user(&tx, user_id)?.candidate_profile(today);

        for entry in waiting_entries(&tx, Some(user_id))? {
            let other = load_user(&tx, entry.user_id)?.candidate_profile(today);
            if !SearchFilters::mutually_compatible(
                (preferences, &me),
                (&entry.preferences, &other),
            ) {
                continue;
            }

            let claimed = tx.execute(
                "DELETE FROM matchmaking_queue WHERE seq = ?1",
                params![entry.seq],
            )?;
            if claimed != 1 {
                continue;
            }

            let call = insert_call(&tx, entry.user_id, user_id, now)?;
            tx.commit()?;

            tracing::info!(
                call_id = %call.id,
                waited_ms = (now - entry.enqueued_at).num_milliseconds(),
                "queue pair claimed"
            );
            return Ok(EnqueueOutcome::Matched(call));
        }

        let enqueued_at = stored(now);
        tx.execute(
            "INSERT INTO matchmaking_queue (user_id, preferences, enqueued_at)
             VALUES (?1, ?2, ?3)",
            params![
                user_id.to_string(),
                serde_json::to_string(preferences)?,
                ts(&enqueued_at),
            ],
        )?;
        let seq = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(user_id = %user_id, seq, "user queued");
        Ok(EnqueueOutcome::Queued(QueueEntry {
            seq,
            user_id,
            preferences: preferences.clone(),
            enqueued_at,
        }))
    }

    /// Stop searching. A match that raced with the cancellation loses: a
    /// call this user has not joined yet is marked `canceled`.
    pub fn dequeue(&mut self, user_id: Uuid, now: DateTime<Utc>) -> Result<Dequeued> {
        let tx = self.write_tx()?;

        let removed = tx.execute(
            "DELETE FROM matchmaking_queue WHERE user_id = ?1",
            params![user_id.to_string()],
        )? > 0;

        let canceled_call = match active_call(&tx, user_id)? {
            Some(call) => match call.role_of(user_id) {
                Some(role) if !call.joined(role) => {
                    Some(finish_call(&tx, call, CallStatus::Canceled, now)?)
                }
                _ => None,
            },
            None => None,
        };

        tx.commit()?;

        if let Some(call) = &canceled_call {
            tracing::info!(call_id = %call.id, user_id = %user_id, "match canceled by searcher");
        }
        Ok(Dequeued {
            removed,
            canceled_call,
        })
    }

    pub fn queue_entry(&self, user_id: Uuid) -> Result<Option<QueueEntry>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT seq, user_id, preferences, enqueued_at
                 FROM matchmaking_queue WHERE user_id = ?1",
                params![user_id.to_string()],
                row_to_entry,
            )
            .optional()?)
    }

    /// All live entries in pairing order.
    pub fn queued_entries(&self) -> Result<Vec<QueueEntry>> {
        waiting_entries(self.conn(), None)
    }

    /// Drop entries older than `cutoff`. Returns how many were removed.
    pub fn purge_queue_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self.conn().execute(
            "DELETE FROM matchmaking_queue WHERE enqueued_at < ?1",
            params![ts(&cutoff)],
        )?)
    }
}

fn waiting_entries(conn: &Connection, excluding: Option<Uuid>) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(
        "SELECT seq, user_id, preferences, enqueued_at
         FROM matchmaking_queue
         WHERE ?1 IS NULL OR user_id != ?1
         ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(
        params![excluding.map(|id| id.to_string())],
        row_to_entry,
    )?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        seq: row.get(0)?,
        user_id: get_uuid(row, 1)?,
        preferences: get_json(row, 2)?,
        enqueued_at: get_ts(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::profile;
    use chrono::{Duration, NaiveDate};
    use hive_shared::protocol::NewProfile;

    fn user(db: &Database, name: &str) -> Uuid {
        db.create_user(&profile(name), Utc::now()).unwrap().id
    }

    fn music() -> SearchFilters {
        SearchFilters {
            interests: vec!["Music".into()],
            ..Default::default()
        }
    }

    #[test]
    fn double_enqueue_leaves_one_row() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&db, "A");

        db.enqueue_and_match(a, &SearchFilters::default(), Utc::now()).unwrap();
        let second = db.enqueue_and_match(a, &music(), Utc::now()).unwrap();

        let entries = db.queued_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].preferences, music());
        assert!(matches!(second, EnqueueOutcome::Queued(_)));
    }

    #[test]
    fn dequeue_removes_row() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&db, "A");
        db.enqueue_and_match(a, &music(), Utc::now()).unwrap();

        let out = db.dequeue(a, Utc::now()).unwrap();
        assert!(out.removed);
        assert!(out.canceled_call.is_none());
        assert!(db.queue_entry(a).unwrap().is_none());

        assert!(!db.dequeue(a, Utc::now()).unwrap().removed);
    }

    #[test]
    fn pairing_creates_one_call_and_clears_both_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&db, "A");
        let b = user(&db, "B");

        assert!(matches!(
            db.enqueue_and_match(a, &music(), Utc::now()).unwrap(),
            EnqueueOutcome::Queued(_)
        ));
        let call = match db.enqueue_and_match(b, &SearchFilters::default(), Utc::now()).unwrap() {
            EnqueueOutcome::Matched(call) => call,
            other => panic!("expected match, got {other:?}"),
        };

        assert_eq!(call.caller_id, a);
        assert_eq!(call.callee_id, b);
        assert_eq!(call.status, CallStatus::Waiting);
        assert!(db.queued_entries().unwrap().is_empty());
        assert_eq!(db.pending_call_for(a).unwrap(), Some(call));
    }

    #[test]
    fn pairing_is_fifo() {
        let mut db = Database::open_in_memory().unwrap();
        let (a, b, c) = (user(&db, "A"), user(&db, "B"), user(&db, "C"));
        let now = Utc::now();

        db.enqueue_and_match(a, &SearchFilters::default(), now).unwrap();
        // b waits behind a without being paired with it
        db.conn()
            .execute(
                "INSERT INTO matchmaking_queue (user_id, preferences, enqueued_at)
                 VALUES (?1, '{}', ?2)",
                params![b.to_string(), ts(&now)],
            )
            .unwrap();

        match db.enqueue_and_match(c, &SearchFilters::default(), now).unwrap() {
            EnqueueOutcome::Matched(call) => assert_eq!(call.caller_id, a),
            other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(db.queued_entries().unwrap()[0].user_id, b);
    }

    #[test]
    fn hard_filters_block_pairing() {
        let mut db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let a = db
            .create_user(
                &NewProfile {
                    gender: Some("Female".into()),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
                    ..profile("A")
                },
                now,
            )
            .unwrap()
            .id;
        let b = user(&db, "B");

        db.enqueue_and_match(a, &SearchFilters::default(), now).unwrap();
        let wants_young_men = SearchFilters {
            genders: vec!["Male".into()],
            age_range: Some([18, 25]),
            ..Default::default()
        };
        assert!(matches!(
            db.enqueue_and_match(b, &wants_young_men, now).unwrap(),
            EnqueueOutcome::Queued(_)
        ));
        assert_eq!(db.queued_entries().unwrap().len(), 2);
    }

    #[test]
    fn cancel_wins_over_unjoined_match() {
        let mut db = Database::open_in_memory().unwrap();
        let (a, b) = (user(&db, "A"), user(&db, "B"));
        db.enqueue_and_match(a, &SearchFilters::default(), Utc::now()).unwrap();
        let EnqueueOutcome::Matched(call) =
            db.enqueue_and_match(b, &SearchFilters::default(), Utc::now()).unwrap()
        else {
            panic!("expected match");
        };

        let out = db.dequeue(a, Utc::now()).unwrap();
        assert!(!out.removed);
        let canceled = out.canceled_call.unwrap();
        assert_eq!(canceled.id, call.id);
        assert_eq!(canceled.status, CallStatus::Canceled);
        assert!(db.active_call_for(b).unwrap().is_none());
    }

    #[test]
    fn cancel_after_join_keeps_call() {
        let mut db = Database::open_in_memory().unwrap();
        let (a, b) = (user(&db, "A"), user(&db, "B"));
        db.enqueue_and_match(a, &SearchFilters::default(), Utc::now()).unwrap();
        let EnqueueOutcome::Matched(call) =
            db.enqueue_and_match(b, &SearchFilters::default(), Utc::now()).unwrap()
        else {
            panic!("expected match");
        };
        db.join_call(call.id, a, false).unwrap();

        assert!(db.dequeue(a, Utc::now()).unwrap().canceled_call.is_none());
        assert_eq!(db.get_call(call.id).unwrap().status, CallStatus::Connected);
    }

    #[test]
    fn purge_drops_stale_entries() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&db, "A");
        let long_ago = Utc::now() - Duration::hours(2);
        db.enqueue_and_match(a, &SearchFilters::default(), long_ago).unwrap();

        assert_eq!(db.purge_queue_older_than(Utc::now() - Duration::hours(1)).unwrap(), 1);
        assert!(db.queued_entries().unwrap().is_empty());
    }

    #[test]
    fn concurrent_newcomers_claim_waiting_user_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");

        let mut db = Database::open_at(&path).unwrap();
        let (a, b, c) = (user(&db, "A"), user(&db, "B"), user(&db, "C"));
        db.enqueue_and_match(a, &SearchFilters::default(), Utc::now()).unwrap();

        let handles: Vec<_> = [b, c]
            .into_iter()
            .map(|id| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut db = Database::open_at(&path).unwrap();
                    db.enqueue_and_match(id, &SearchFilters::default(), Utc::now())
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let matched: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                EnqueueOutcome::Matched(call) => Some(call),
                EnqueueOutcome::Queued(_) => None,
            })
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].caller_id, a);

        let calls_with_a: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM calls WHERE caller_id = ?1 OR callee_id = ?1",
                params![a.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(calls_with_a, 1);
        assert_eq!(db.queued_entries().unwrap().len(), 1);
    }
}
