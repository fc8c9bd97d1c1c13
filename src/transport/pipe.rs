//! Named-pipe plumbing for the broker side.
//!
//! The control pipe is opened read-write so the broker's read end never sees
//! EOF while clients come and go. Delivery pipes are opened write-only; the
//! client may not have reached its blocking read-open yet when the INIT
//! arrives, so `ENXIO` is retried for a short while before the registration
//! is rejected.

use std::path::Path;
use std::time::Duration;

use nix::libc;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;

use crate::transport::record::{Record, RECORD_LEN};
use crate::utils::error::{Error, Result};

/// Attempts to open a delivery pipe before giving up with `ChannelOpenFailed`.
const OPEN_RETRIES: u32 = 40;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Create a FIFO at `path`, replacing any stale one left by a crashed run.
pub fn create_fifo(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    mkfifo(path, Mode::from_bits_truncate(0o666)).map_err(|e| Error::Io(std::io::Error::other(e)))?;
    Ok(())
}

/// Remove a FIFO, tolerating one that is already gone.
pub fn remove_fifo(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(pipe = %path.display(), error = %e, "Failed to remove pipe");
        }
    }
}

/// Delivery pipe path for a username: fixed prefix + username.
pub fn delivery_path(prefix: &str, username: &str) -> String {
    format!("{prefix}{username}")
}

/// Open the control pipe for reading.
///
/// Read-write keeps at least one writer alive so reads block instead of
/// returning EOF between client sessions.
pub fn open_control(path: &Path) -> Result<pipe::Receiver> {
    let rx = pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(path)?;
    Ok(rx)
}

/// Open a feed's delivery pipe for writing, retrying while the client is
/// still on its way to the read-open rendezvous.
pub async fn open_delivery(path: &Path) -> Result<pipe::Sender> {
    let mut attempt = 0;
    loop {
        match pipe::OpenOptions::new().open_sender(path) {
            Ok(tx) => return Ok(tx),
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) && attempt < OPEN_RETRIES => {
                attempt += 1;
                tokio::time::sleep(OPEN_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(Error::ChannelOpenFailed {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        }
    }
}

/// Read exactly one record from the control pipe.
///
/// A short read is treated the same as peer closure: both yield `Ok(None)`.
pub async fn read_record(rx: &mut pipe::Receiver) -> Result<Option<Record>> {
    let mut buf = [0u8; RECORD_LEN];
    match rx.read_exact(&mut buf).await {
        Ok(_) => Ok(Some(Record::decode(&buf)?)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}
