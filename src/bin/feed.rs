//! The feed client: one named pipe of its own for deliveries, commands out
//! over the shared control pipe.
//!
//! Pipe I/O on the client side is plain blocking `File` I/O; the listener
//! runs on a blocking task while the command loop reads stdin.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;

use pipesub::config::load_config;
use pipesub::transport::pipe;
use pipesub::transport::record::{Action, Record, RECORD_LEN};
use pipesub::utils::logging;

#[derive(Debug, PartialEq, Eq)]
enum FeedCommand {
    Msg {
        topic: String,
        duration: u32,
        body: String,
    },
    Subscribe(String),
    Unsubscribe(String),
    Exit,
}

impl FeedCommand {
    fn into_record(self, username: &str) -> Record {
        match self {
            FeedCommand::Msg {
                topic,
                duration,
                body,
            } => Record::publish(username, &topic, &body, duration),
            FeedCommand::Subscribe(topic) => Record::subscribe(username, &topic),
            FeedCommand::Unsubscribe(topic) => Record::unsubscribe(username, &topic),
            FeedCommand::Exit => Record::exit(username),
        }
    }
}

fn parse_command(line: &str) -> Result<FeedCommand, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(' ') {
        Some((v, r)) => (v, r.trim()),
        None => (line, ""),
    };

    match verb {
        "exit" => Ok(FeedCommand::Exit),
        "subscribe" => {
            if rest.is_empty() {
                Err("Usage: subscribe <topic>".to_string())
            } else {
                Ok(FeedCommand::Subscribe(rest.to_string()))
            }
        }
        "unsubscribe" => {
            if rest.is_empty() {
                Err("Usage: unsubscribe <topic>".to_string())
            } else {
                Ok(FeedCommand::Unsubscribe(rest.to_string()))
            }
        }
        "msg" => {
            let usage = || "Usage: msg <topic> <duration> <message>".to_string();
            let mut parts = rest.splitn(3, ' ');
            let topic = parts.next().filter(|s| !s.is_empty()).ok_or_else(usage)?;
            let duration: u32 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(usage)?;
            let body = parts.next().filter(|s| !s.is_empty()).ok_or_else(usage)?;
            Ok(FeedCommand::Msg {
                topic: topic.to_string(),
                duration,
                body: body.to_string(),
            })
        }
        other => Err(format!(
            "Unknown command: {other}. Try one of: msg, subscribe, unsubscribe, exit"
        )),
    }
}

fn send(control: &mut File, record: &Record) -> std::io::Result<()> {
    control.write_all(&record.encode())
}

/// Prints deliveries until the manager says EXIT or closes the pipe.
fn listen(mut delivery: File, running: watch::Sender<bool>) {
    let mut buf = [0u8; RECORD_LEN];
    loop {
        match delivery.read_exact(&mut buf) {
            Ok(()) => match Record::decode(&buf) {
                Ok(rec) => match rec.action {
                    Action::Exit => {
                        println!("\nManager closed the session.");
                        break;
                    }
                    Action::Error => {
                        println!("\n[Error] {}", rec.body);
                        prompt();
                    }
                    _ => {
                        println!("\n[Message received]");
                        println!("Topic: {}", rec.topic);
                        println!("From: {}", rec.username);
                        println!("Body: {}", rec.body);
                        prompt();
                    }
                },
                Err(e) => eprintln!("Undecodable record: {e}"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                println!("\nManager connection closed.");
                break;
            }
            Err(e) => {
                eprintln!("Delivery pipe read failed: {e}");
                break;
            }
        }
    }
    let _ = running.send(false);
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() {
    logging::init("warn");

    let mut args = std::env::args().skip(1);
    let username = match (args.next(), args.next()) {
        (Some(username), None) => username,
        _ => {
            eprintln!("Usage: feed <username>");
            std::process::exit(1);
        }
    };

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let pipe_path = pipe::delivery_path(&settings.pipes.feed_prefix, &username);
    if let Err(e) = pipe::create_fifo(Path::new(&pipe_path)) {
        eprintln!("Failed to create delivery pipe '{pipe_path}': {e}");
        std::process::exit(1);
    }

    // blocks until the manager's reader exists
    let mut control = match OpenOptions::new()
        .write(true)
        .open(&settings.pipes.control_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Cannot open control pipe '{}': {e}. Is the manager running?",
                settings.pipes.control_path
            );
            pipe::remove_fifo(Path::new(&pipe_path));
            std::process::exit(1);
        }
    };

    if send(&mut control, &Record::init(&username, &pipe_path)).is_err() {
        eprintln!("Failed to send handshake to the manager");
        pipe::remove_fifo(Path::new(&pipe_path));
        std::process::exit(1);
    }

    println!("Waiting for manager confirmation...");
    // the manager opening our pipe for writing is the ack; this open blocks
    // until then, with no timeout
    let delivery = {
        let path = pipe_path.clone();
        tokio::task::spawn_blocking(move || File::open(path))
            .await
            .expect("blocking open task panicked")
    };
    let delivery = match delivery {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open delivery pipe for reading: {e}");
            pipe::remove_fifo(Path::new(&pipe_path));
            std::process::exit(1);
        }
    };
    println!("Connected to manager as '{username}'.");

    let (running_tx, mut running_rx) = watch::channel(true);
    tokio::task::spawn_blocking(move || listen(delivery, running_tx));

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !*running_rx.borrow() {
            break;
        }
        prompt();

        let line = tokio::select! {
            _ = running_rx.changed() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(FeedCommand::Exit) => {
                let _ = send(&mut control, &Record::exit(&username));
                println!("Leaving...");
                break;
            }
            Ok(cmd) => {
                let echo = match &cmd {
                    FeedCommand::Msg { topic, .. } => format!("Message sent to topic '{topic}'."),
                    FeedCommand::Subscribe(topic) => format!("Subscribed to topic '{topic}'."),
                    FeedCommand::Unsubscribe(topic) => {
                        format!("Unsubscribed from topic '{topic}'.")
                    }
                    FeedCommand::Exit => unreachable!(),
                };
                if let Err(e) = send(&mut control, &cmd.into_record(&username)) {
                    eprintln!("Failed to send command: {e}");
                    break;
                }
                println!("{echo}");
            }
            Err(usage) => println!("{usage}"),
        }
    }

    pipe::remove_fifo(Path::new(&pipe_path));
    // the listener may still be blocked in a pipe read; don't wait for it
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_msg_with_multiword_body() {
        let cmd = parse_command("msg news 30 hello out there").unwrap();
        assert_eq!(
            cmd,
            FeedCommand::Msg {
                topic: "news".to_string(),
                duration: 30,
                body: "hello out there".to_string(),
            }
        );
    }

    #[test]
    fn rejects_msg_with_bad_duration() {
        assert!(parse_command("msg news soon hello").is_err());
        assert!(parse_command("msg news").is_err());
        assert!(parse_command("msg news 5").is_err());
    }

    #[test]
    fn parses_subscription_commands() {
        assert_eq!(
            parse_command("subscribe news").unwrap(),
            FeedCommand::Subscribe("news".to_string())
        );
        assert_eq!(
            parse_command("unsubscribe news").unwrap(),
            FeedCommand::Unsubscribe("news".to_string())
        );
        assert_eq!(parse_command("exit").unwrap(), FeedCommand::Exit);
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse_command("shout news hello").is_err());
    }
}
