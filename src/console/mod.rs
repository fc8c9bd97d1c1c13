//! The `console` module implements the interactive admin surface of the
//! manager: line-oriented commands over stdin, each executed against the
//! shared broker state while holding its lock for the full operation.

use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::debug;

use crate::broker::Broker;
use crate::transport::pipe;

/// A parsed admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Users,
    Remove(String),
    Topics,
    Show(String),
    Lock(String),
    Unlock(String),
    Close,
}

/// Parses one console line. Errors are user-facing usage messages.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, arg) = match line.split_once(' ') {
        Some((v, a)) => (v, a.trim()),
        None => (line, ""),
    };

    let require_arg = |what: &str| -> Result<String, String> {
        if arg.is_empty() {
            Err(format!("The '{verb}' command requires a <{what}>. Usage: {verb} <{what}>"))
        } else {
            Ok(arg.to_string())
        }
    };

    match verb {
        "users" => Ok(Command::Users),
        "remove" => require_arg("username").map(Command::Remove),
        "topics" => Ok(Command::Topics),
        "show" => require_arg("topic").map(Command::Show),
        "lock" => require_arg("topic").map(Command::Lock),
        "unlock" => require_arg("topic").map(Command::Unlock),
        "close" => Ok(Command::Close),
        other => Err(format!(
            "Unknown command: {other}. Try one of: users, remove, topics, show, lock, unlock, close"
        )),
    }
}

/// The admin loop. Returns once the platform is closed (via the `close`
/// command or external shutdown) or stdin ends.
pub async fn run(broker: Arc<Mutex<Broker>>, shutdown: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if !broker.lock().unwrap().is_running() {
            break;
        }

        print!("Admin> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        if execute(&broker, command) == Flow::Stop {
            let _ = shutdown.send(true);
            break;
        }
    }
    debug!("Admin console stopped");
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

fn execute(broker: &Arc<Mutex<Broker>>, command: Command) -> Flow {
    let mut broker = broker.lock().unwrap();
    match command {
        Command::Users => {
            println!("Connected users:");
            for user in broker.list_feeds() {
                println!("- {user}");
            }
        }
        Command::Remove(user) => match broker.remove_feed(&user) {
            Ok(()) => println!("User '{user}' removed."),
            Err(e) => println!("{e}"),
        },
        Command::Topics => {
            println!("Existing topics:");
            for summary in broker.topics_overview() {
                println!(
                    "- {} (persisted messages: {}, locked: {})",
                    summary.name,
                    summary.persisted,
                    if summary.locked { "yes" } else { "no" }
                );
            }
        }
        Command::Show(topic) => match broker.topic_messages(&topic) {
            Ok(messages) => {
                println!("Messages in topic '{topic}':");
                for msg in messages {
                    println!("- {}: {}", msg.sender, msg.body);
                }
            }
            Err(e) => println!("{e}"),
        },
        Command::Lock(topic) => match broker.set_topic_lock(&topic, true) {
            Ok(()) => println!("Topic '{topic}' locked."),
            Err(e) => println!("{e}"),
        },
        Command::Unlock(topic) => match broker.set_topic_lock(&topic, false) {
            Ok(()) => println!("Topic '{topic}' unlocked."),
            Err(e) => println!("{e}"),
        },
        Command::Close => {
            // full teardown owns the delivery pipes, unlike plain unregister
            for path in broker.close_platform() {
                pipe::remove_fifo(Path::new(&path));
            }
            println!("Platform closed.");
            return Flow::Stop;
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_command("users").unwrap(), Command::Users);
        assert_eq!(parse_command("topics").unwrap(), Command::Topics);
        assert_eq!(parse_command("close").unwrap(), Command::Close);
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse_command("remove alice").unwrap(),
            Command::Remove("alice".to_string())
        );
        assert_eq!(
            parse_command("show news").unwrap(),
            Command::Show("news".to_string())
        );
        assert_eq!(
            parse_command("lock sports").unwrap(),
            Command::Lock("sports".to_string())
        );
        assert_eq!(
            parse_command("unlock sports").unwrap(),
            Command::Unlock("sports".to_string())
        );
    }

    #[test]
    fn missing_argument_is_a_usage_error() {
        assert!(parse_command("remove").is_err());
        assert!(parse_command("show ").is_err());
        assert!(parse_command("lock").is_err());
    }

    #[test]
    fn unknown_command_lists_the_alternatives() {
        let err = parse_command("reboot").unwrap_err();
        assert!(err.contains("users"));
        assert!(err.contains("close"));
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(
            parse_command("  remove   alice  ").unwrap(),
            Command::Remove("alice".to_string())
        );
    }
}
