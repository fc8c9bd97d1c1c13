use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};

use super::control;
use super::pipe;
use super::record::{Action, Record, BODY_LEN, RECORD_LEN, TOPIC_LEN};
use crate::broker::feed::Feed;
use crate::broker::Broker;

#[test]
fn encode_produces_fixed_size_records() {
    let rec = Record::publish("alice", "news", "hello", 5);
    assert_eq!(rec.encode().len(), RECORD_LEN);

    let empty = Record::exit("bob");
    assert_eq!(empty.encode().len(), RECORD_LEN);
}

#[test]
fn record_round_trip() {
    let mut rec = Record::publish("alice", "news", "hello world", 30);
    rec.created_tick = 7;
    let decoded = Record::decode(&rec.encode()).unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn every_action_survives_the_wire() {
    for action in [
        Action::Init,
        Action::Msg,
        Action::Sub,
        Action::Unsub,
        Action::Exit,
        Action::Error,
    ] {
        let rec = Record::new(action, "t", "u", "b", 0);
        assert_eq!(Record::decode(&rec.encode()).unwrap().action, action);
    }
}

#[test]
fn long_fields_are_truncated_at_their_bound() {
    let topic = "x".repeat(TOPIC_LEN + 10);
    let body = "y".repeat(BODY_LEN + 50);
    let rec = Record::publish("alice", &topic, &body, 0);
    let decoded = Record::decode(&rec.encode()).unwrap();
    assert_eq!(decoded.topic.len(), TOPIC_LEN);
    assert_eq!(decoded.body.len(), BODY_LEN);
}

#[test]
fn unknown_action_is_rejected() {
    let mut buf = [0u8; RECORD_LEN];
    buf[..4].copy_from_slice(b"BOGU");
    assert!(Record::decode(&buf).is_err());
}

#[test]
fn error_records_come_from_system() {
    let rec = Record::error("topic locked");
    assert_eq!(rec.action, Action::Error);
    assert_eq!(rec.username, "SYSTEM");
    assert_eq!(rec.body, "topic locked");
}

#[test]
fn init_record_carries_pipe_path_in_body() {
    let rec = Record::init("alice", "/tmp/feed_alice");
    assert_eq!(rec.action, Action::Init);
    assert_eq!(rec.body, "/tmp/feed_alice");
}

#[tokio::test]
async fn control_fifo_carries_whole_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control");
    pipe::create_fifo(&path).unwrap();

    // read-write keeps the pipe alive with no other writer attached
    let mut rx = pipe::open_control(&path).unwrap();
    let mut tx = pipe::open_delivery(&path).await.unwrap();

    let rec = Record::subscribe("alice", "news");
    tx.write_all(&rec.encode()).await.unwrap();

    let read = pipe::read_record(&mut rx).await.unwrap().unwrap();
    assert_eq!(read, rec);
}

#[tokio::test]
async fn control_loop_drops_garbage_and_keeps_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control");
    pipe::create_fifo(&path).unwrap();
    let rx = pipe::open_control(&path).unwrap();

    let broker = Arc::new(Mutex::new(Broker::default()));
    let (queue_tx, _queue) = mpsc::unbounded_channel();
    broker
        .lock()
        .unwrap()
        .register_feed(Feed::new("alice", "/tmp/feed_alice", queue_tx))
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let control_loop = tokio::spawn(control::run_control_loop(rx, broker.clone(), shutdown_rx));

    // one record's worth of garbage, then a valid subscription
    let mut tx = pipe::open_delivery(&path).await.unwrap();
    tx.write_all(&[0xff; RECORD_LEN]).await.unwrap();
    tx.write_all(&Record::subscribe("alice", "news").encode())
        .await
        .unwrap();

    let mut subscribed = false;
    for _ in 0..250 {
        if broker
            .lock()
            .unwrap()
            .topic("news")
            .is_some_and(|t| t.is_subscribed("alice"))
        {
            subscribed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(subscribed, "subscription after the garbage record never landed");

    shutdown_tx.send(true).unwrap();
    control_loop.await.unwrap();
}
