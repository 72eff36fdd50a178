//! # hive-shared
//!
//! Types shared by the VideoHive store, server and client: domain records,
//! the HTTP wire protocol, search filters, mini-game state shapes and the
//! signed token format.

pub mod constants;
pub mod error;
pub mod filters;
pub mod games;
pub mod models;
pub mod prompts;
pub mod protocol;
pub mod token;
pub mod types;
pub mod validation;

pub use error::{TokenError, ValidationError};
pub use filters::SearchFilters;
pub use types::{CallRole, CallStatus, GameType, MediaEvent, ReportReason};
