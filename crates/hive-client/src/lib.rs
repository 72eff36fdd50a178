//! # hive-client
//!
//! Client library for the VideoHive server: a typed HTTP client, the
//! session, call and game stores, and the background match search.

pub mod api;
pub mod call_store;
pub mod client;
pub mod config;
pub mod error;
pub mod game_store;
pub mod search;
pub mod session;

pub use api::ApiClient;
pub use call_store::{CallState, CallStore};
pub use client::HiveClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use game_store::{GameState, GameStore};
pub use search::{SearchState, SearchStatus};
pub use session::SessionStore;
