//! The control-channel loop: reads one record at a time from the shared
//! control pipe and hands it to the broker, strictly in arrival order.
//!
//! INIT is the one action handled here rather than in the engine, because it
//! has to open the client's delivery pipe (an async operation that must not
//! happen under the state lock) and spawn the per-feed writer task before the
//! feed is registered. The successful open is itself the handshake ack the
//! client is blocked on.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::feed::Feed;
use crate::broker::Broker;
use crate::transport::pipe as fifo;
use crate::transport::record::{Action, Record};
use crate::utils::error::Error;

/// Runs until shutdown is signalled, the running flag clears or the control
/// pipe goes away.
pub async fn run_control_loop(
    mut rx: pipe::Receiver,
    broker: Arc<Mutex<Broker>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            // a record lost to cancellation here can only happen at shutdown
            res = fifo::read_record(&mut rx) => match res {
                Ok(Some(rec)) => handle_record(rec, &broker).await,
                Ok(None) => {
                    info!("Control pipe closed");
                    break;
                }
                Err(Error::MalformedRecord(reason)) => {
                    warn!(%reason, "Dropping undecodable control record");
                }
                Err(e) => {
                    error!(error = %e, "Control pipe read failed");
                    break;
                }
            }
        }
        if !broker.lock().unwrap().is_running() {
            break;
        }
    }
    debug!("Control loop stopped");
}

async fn handle_record(rec: Record, broker: &Arc<Mutex<Broker>>) {
    match rec.action {
        Action::Init => register_feed(rec, broker).await,
        _ => broker.lock().unwrap().dispatch(rec),
    }
}

/// INIT: precheck capacity and username, open the delivery pipe, spawn the
/// writer task, then register. A rejected feed never gets its pipe opened, so
/// its blocking read-open fails straight to EOF and the client exits.
async fn register_feed(rec: Record, broker: &Arc<Mutex<Broker>>) {
    let username = rec.username;
    let pipe_path = rec.body;

    if let Err(e) = broker.lock().unwrap().can_register(&username) {
        warn!(user = %username, error = %e, "Registration rejected");
        return;
    }

    let sender = match fifo::open_delivery(Path::new(&pipe_path)).await {
        Ok(sender) => sender,
        Err(e) => {
            error!(user = %username, error = %e, "Registration failed");
            return;
        }
    };

    let (tx, queue) = mpsc::unbounded_channel();
    spawn_delivery_writer(username.clone(), sender, queue);

    let mut broker = broker.lock().unwrap();
    if let Err(e) = broker.register_feed(Feed::new(&username, &pipe_path, tx)) {
        // races with an admin removal between precheck and insert; dropping
        // the queue sender closes the pipe and the client sees EOF
        warn!(user = %username, error = %e, "Registration rejected");
    }
}

/// One writer task per feed: drains the outbound queue into the delivery
/// pipe so no pipe write ever happens while the state lock is held. Stops on
/// the first write failure; the engine notices the closed queue on its next
/// send and drops the feed.
pub fn spawn_delivery_writer(
    username: String,
    mut sender: pipe::Sender,
    mut queue: mpsc::UnboundedReceiver<Record>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(rec) = queue.recv().await {
            if let Err(e) = sender.write_all(&rec.encode()).await {
                warn!(user = %username, error = %e, "Delivery write failed");
                break;
            }
        }
        debug!(user = %username, "Delivery writer stopped");
    })
}
