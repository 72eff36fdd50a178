use chrono::{DateTime, Utc};
use hive_shared::models::{canonical_pair, Friendship};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::convert::{get_opt_uuid, get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn friendship_between(&self, a: Uuid, b: Uuid) -> Result<Option<Friendship>> {
        find_friendship_between(self.conn(), a, b)
    }

    pub fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        Ok(self.friendship_between(a, b)?.is_some())
    }

    /// All friendships of `user_id`, newest first.
    pub fn friendships_of(&self, user_id: Uuid) -> Result<Vec<Friendship>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_a_id, user_b_id, call_id, created_at
             FROM friendships
             WHERE user_a_id = ?1 OR user_b_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_friendship)?;

        let mut friendships = Vec::new();
        for row in rows {
            friendships.push(row?);
        }
        Ok(friendships)
    }
}

/// Insert the friendship if the pair has none yet. Returns whether a row
/// was written.
pub(crate) fn insert_friendship(
    conn: &Connection,
    a: Uuid,
    b: Uuid,
    call_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let (lo, hi) = canonical_pair(a, b);
    let affected = conn.execute(
        "INSERT OR IGNORE INTO friendships (id, user_a_id, user_b_id, call_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            Uuid::new_v4().to_string(),
            lo.to_string(),
            hi.to_string(),
            call_id.map(|id| id.to_string()),
            ts(&stored(now)),
        ],
    )?;
    Ok(affected > 0)
}

/// Checks both orderings so rows written by older clients are found too.
pub(crate) fn find_friendship_between(
    conn: &Connection,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Friendship>> {
    Ok(conn
        .query_row(
            "SELECT id, user_a_id, user_b_id, call_id, created_at
             FROM friendships
             WHERE (user_a_id = ?1 AND user_b_id = ?2)
                OR (user_a_id = ?2 AND user_b_id = ?1)",
            params![a.to_string(), b.to_string()],
            row_to_friendship,
        )
        .optional()?)
}

fn row_to_friendship(row: &rusqlite::Row<'_>) -> rusqlite::Result<Friendship> {
    Ok(Friendship {
        id: get_uuid(row, 0)?,
        user_a_id: get_uuid(row, 1)?,
        user_b_id: get_uuid(row, 2)?,
        call_id: get_opt_uuid(row, 3)?,
        created_at: get_ts(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::profile;

    #[test]
    fn insert_is_order_independent() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let a = db.create_user(&profile("A"), now).unwrap().id;
        let b = db.create_user(&profile("B"), now).unwrap().id;

        assert!(insert_friendship(db.conn(), b, a, None, now).unwrap());
        assert!(!insert_friendship(db.conn(), a, b, None, now).unwrap());

        let friendship = db.friendship_between(a, b).unwrap().unwrap();
        assert!(friendship.user_a_id < friendship.user_b_id);
        assert_eq!(db.friendship_between(b, a).unwrap(), Some(friendship));
        assert_eq!(db.friendships_of(b).unwrap().len(), 1);
    }
}
