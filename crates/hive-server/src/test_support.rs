use chrono::Utc;
use hive_shared::models::Call;
use hive_shared::protocol::NewProfile;
use hive_store::Database;
use uuid::Uuid;

use crate::db::Db;

pub(crate) fn memory_db() -> Db {
    Db::new(Database::open_in_memory().unwrap())
}

pub(crate) async fn user(db: &Db, name: &str, interests: &[&str]) -> Uuid {
    let profile = NewProfile {
        display_name: name.into(),
        interests: interests.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    db.call(move |db| Ok(db.create_user(&profile, Utc::now())?.id))
        .await
        .unwrap()
}

/// A `waiting` call between two fresh users.
pub(crate) async fn waiting_call(db: &Db) -> Call {
    let caller = user(db, "Caller", &["Music", "Art"]).await;
    let callee = user(db, "Callee", &["Music"]).await;
    db.call(move |db| Ok(db.create_call(caller, callee, Utc::now())?))
        .await
        .unwrap()
}
