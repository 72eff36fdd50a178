use chrono::{DateTime, Utc};
use hive_shared::models::User;
use hive_shared::protocol::{NewProfile, ProfileUpdate};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::convert::{get_json, get_opt_date, get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::{is_constraint_violation, not_found, Result, StoreError};

const USER_COLUMNS: &str = "id, email, display_name, bio, interests, gender, pronouns, \
     date_of_birth, selfie_verified, is_online, last_seen, created_at, updated_at";

impl Database {
    pub fn create_user(&self, profile: &NewProfile, now: DateTime<Utc>) -> Result<User> {
        let now = stored(now);
        let user = User {
            id: Uuid::new_v4(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            bio: profile.bio.clone(),
            interests: profile.interests.clone(),
            gender: profile.gender.clone(),
            pronouns: profile.pronouns.clone(),
            date_of_birth: profile.date_of_birth,
            selfie_verified: false,
            is_online: true,
            last_seen: now,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO users (id, email, display_name, bio, interests, gender, pronouns,
                                    date_of_birth, selfie_verified, is_online, last_seen,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.display_name,
                    user.bio,
                    serde_json::to_string(&user.interests)?,
                    user.gender,
                    user.pronouns,
                    user.date_of_birth.map(|d| d.to_string()),
                    user.selfie_verified,
                    user.is_online,
                    ts(&user.last_seen),
                    ts(&user.created_at),
                    ts(&user.updated_at),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::Conflict("email already registered".into())
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        load_user(self.conn(), id)
    }

    pub fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .optional()?)
    }

    /// Apply the fields present in `update`; absent fields keep their value.
    pub fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let mut user = self.get_user(id)?;

        if let Some(name) = &update.display_name {
            user.display_name = name.clone();
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(interests) = &update.interests {
            user.interests = interests.clone();
        }
        if let Some(gender) = &update.gender {
            user.gender = Some(gender.clone());
        }
        if let Some(pronouns) = &update.pronouns {
            user.pronouns = Some(pronouns.clone());
        }
        if let Some(dob) = update.date_of_birth {
            user.date_of_birth = Some(dob);
        }
        user.updated_at = stored(now);

        self.conn().execute(
            "UPDATE users
             SET display_name = ?2, bio = ?3, interests = ?4, gender = ?5,
                 pronouns = ?6, date_of_birth = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                user.id.to_string(),
                user.display_name,
                user.bio,
                serde_json::to_string(&user.interests)?,
                user.gender,
                user.pronouns,
                user.date_of_birth.map(|d| d.to_string()),
                ts(&user.updated_at),
            ],
        )?;

        Ok(user)
    }

    /// Set the online flag and stamp `last_seen`.
    pub fn set_presence(&self, id: Uuid, online: bool, now: DateTime<Utc>) -> Result<User> {
        let affected = self.conn().execute(
            "UPDATE users SET is_online = ?2, last_seen = ?3 WHERE id = ?1",
            params![id.to_string(), online, ts(&now)],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }

    pub fn set_selfie_verified(&self, id: Uuid, verified: bool) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET selfie_verified = ?2 WHERE id = ?1",
            params![id.to_string(), verified],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

pub(crate) fn load_user(conn: &Connection, id: Uuid) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        row_to_user,
    )
    .map_err(not_found)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        interests: get_json(row, 4)?,
        gender: row.get(5)?,
        pronouns: row.get(6)?,
        date_of_birth: get_opt_date(row, 7)?,
        selfie_verified: row.get(8)?,
        is_online: row.get(9)?,
        last_seen: get_ts(row, 10)?,
        created_at: get_ts(row, 11)?,
        updated_at: get_ts(row, 12)?,
    })
}
