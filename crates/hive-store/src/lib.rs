//! # hive-store
//!
//! SQLite persistence for the VideoHive matchmaking service.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! record. Operations that touch more than one row (queue pairing, call
//! transitions, friend-press reconciliation, sealed game moves) each run in
//! a single immediate transaction.

pub mod calls;
pub mod conversations;
pub mod database;
pub mod friendships;
pub mod games;
pub mod migrations;
pub mod queue;
pub mod reports;
pub mod trivia;
pub mod users;

mod convert;
mod error;

pub use calls::FriendPress;
pub use database::Database;
pub use error::{Result, StoreError};
pub use games::MoveOutcome;
pub use queue::{Dequeued, EnqueueOutcome};
