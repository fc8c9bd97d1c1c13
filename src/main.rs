use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use pipesub::broker::Broker;
use pipesub::config::load_config;
use pipesub::persistence::FileStore;
use pipesub::transport::{control, pipe};
use pipesub::{console, utils};

#[tokio::main]
async fn main() {
    utils::logging::init("info");

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let broker = Arc::new(Mutex::new(Broker::new(settings.broker.clone())));
    let store = FileStore::new(&settings.storage.store_path);

    // recover persisted messages from a previous run, if any
    match store.load() {
        Ok(messages) => broker.lock().unwrap().restore(messages),
        Err(e) => error!(error = %e, "Could not load message store"),
    }

    let control_path = Path::new(&settings.pipes.control_path).to_path_buf();
    if let Err(e) = pipe::create_fifo(&control_path) {
        error!(pipe = %control_path.display(), error = %e, "Failed to create control pipe");
        std::process::exit(1);
    }
    let control_rx = match pipe::open_control(&control_path) {
        Ok(rx) => rx,
        Err(e) => {
            error!(pipe = %control_path.display(), error = %e, "Failed to open control pipe");
            pipe::remove_fifo(&control_path);
            std::process::exit(1);
        }
    };

    info!(pipe = %control_path.display(), "Manager started, waiting for connections");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = tokio::spawn(control::run_control_loop(
        control_rx,
        broker.clone(),
        shutdown_rx.clone(),
    ));
    let evictor = tokio::spawn(Broker::run_evictor(
        broker.clone(),
        Duration::from_secs(settings.broker.tick_interval_secs),
        shutdown_rx,
    ));
    let admin = tokio::spawn(console::run(broker.clone(), shutdown_tx.clone()));

    // Ctrl-C takes the same cooperative path as the admin `close` command;
    // no cleanup ever runs in signal context.
    tokio::select! {
        _ = admin => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, closing platform");
            for path in broker.lock().unwrap().close_platform() {
                pipe::remove_fifo(Path::new(&path));
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = dispatcher.await;
    let _ = evictor.await;

    let snapshot = broker.lock().unwrap().snapshot();
    if let Err(e) = store.save(&snapshot) {
        error!(error = %e, "Could not save message store");
    }

    pipe::remove_fifo(&control_path);
    info!("Manager stopped");
}
