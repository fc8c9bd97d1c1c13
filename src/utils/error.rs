//! The `error` module defines the error types used within the `pipesub`
//! application.
//!
//! Setup failures (pipe creation, channel open, configuration) are fatal and
//! abort startup; everything else is a per-operation rejection that leaves the
//! rest of the broker untouched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A fixed-capacity collection (feeds, topics, subscribers) is full.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),

    /// A feed with the same username is already registered.
    #[error("feed '{0}' is already registered")]
    DuplicateFeed(String),

    /// The broker could not open a feed's delivery pipe for writing.
    #[error("failed to open delivery channel '{path}': {source}")]
    ChannelOpenFailed {
        path: String,
        source: std::io::Error,
    },

    /// A wire record could not be decoded.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("feed '{0}' not found")]
    FeedNotFound(String),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("feed '{user}' is not subscribed to topic '{topic}'")]
    NotSubscribed { user: String, topic: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
