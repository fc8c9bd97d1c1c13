//! The `persistence` module provides the save/restore codec for persisted
//! messages.
//!
//! On shutdown every still-alive persisted message is written as one text
//! line; on startup the same format is parsed back and each message's TTL
//! clock restarts against the reset tick counter.

pub mod file_store;

pub use file_store::{FileStore, StoredMessage};
