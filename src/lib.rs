//! Song-of-the-day log: a dated history of chosen tracks, persisted to a
//! spreadsheet-style table, with filtering and aggregation over it.

pub mod aggregate;
pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod log;
pub mod lookup;
pub mod semester;
pub mod session;
pub mod sheets;
pub mod spotify;
pub mod spotify_auth;
pub mod store;

pub use entry::{Entry, NewEntry};
pub use error::{Result, SotdError};
pub use log::SongLog;
pub use session::Session;
pub use store::{BackingTable, SongLogStore};
