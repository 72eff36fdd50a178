//! # hive-server
//!
//! Matchmaking and call coordination service for VideoHive.
//!
//! - **Matchmaking queue** with atomic first-in first-out pairing
//! - **Call lifecycle** (join, end, friend press, report, rate) with pushed
//!   updates to the counterpart
//! - **Mini-game sessions** with sealed rock-paper-scissors moves
//! - **Friends and messaging** between users who met on a call
//! - **Signed tokens** for sessions and the video transport
//! - **Per-IP and per-user rate limiting**

pub mod api;
pub mod auth;
pub mod calls;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod games;
pub mod icebreaker;
pub mod matchmaker;
pub mod media;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{build_router, serve, serve_on, AppState};
pub use config::ServerConfig;
pub use error::ServerError;
