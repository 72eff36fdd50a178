//! Shared handle to the SQLite store.
//!
//! `rusqlite` is blocking, so every access hops onto the blocking pool.

use std::sync::{Arc, Mutex};

use hive_store::Database;

use crate::error::ServerError;

#[derive(Clone)]
pub struct Db {
    inner: Arc<Mutex<Database>>,
}

impl Db {
    pub fn new(database: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(database)),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, ServerError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = inner
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
            f(&mut db)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?
    }
}
