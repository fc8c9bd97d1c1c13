//! The broker-side handle of a registered client session.

use tokio::sync::mpsc::UnboundedSender;

use crate::transport::record::Record;

/// A registered feed: its username, the path of its delivery pipe and the
/// queue drained by the dedicated writer task that owns the pipe's write end.
///
/// Queueing instead of writing the pipe directly keeps slow or dead clients
/// from stalling the broker while the state lock is held.
#[derive(Debug)]
pub struct Feed {
    pub username: String,
    pub pipe_path: String,
    pub sender: UnboundedSender<Record>,
}

impl Feed {
    pub fn new(username: &str, pipe_path: &str, sender: UnboundedSender<Record>) -> Self {
        Self {
            username: username.to_string(),
            pipe_path: pipe_path.to_string(),
            sender,
        }
    }

    /// Queue a record for delivery. Fails once the writer task has stopped,
    /// which the engine treats as a dead channel.
    pub fn send(&self, record: Record) -> Result<(), ()> {
        self.sender.send(record).map_err(|_| ())
    }
}
