//! A line based remote control on stdin/stdout.

use std::sync::Arc;
use btleplug::api::WriteType;
use futures::StreamExt;
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use log::{info, warn};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::device::btle::{BtleOptions, BtleTransport};
use crate::device::command::{Button, CommandCode, Edge};
use crate::device::session::{start_session, SessionHandle};
use crate::device::types::{ConnectionState, DeviceEvent, PeripheralHandle};
use crate::error::{AppRunError, CommandParseError, SessionError};

const HELP: &str = "\
Commands:
  press <button>     press a button, e.g. press u1
  release <button>   release a button, e.g. release u1
  u1n, u1f, ...      send the edge of a raw command token
  connect            reconnect to the robot
  disconnect         disconnect from the robot
  restart            start a new session
  status             show the connection state
  quit               exit
Buttons: u1 d1 l1 r1 (unit 1), u2 d2 l2 r2 (unit 2)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Restart,
    Status,
    Help,
    Quit,
    Edge(Button, Edge),
}

/// Parses one line of input. Returns None for blank lines.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, CommandParseError> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        None => return Ok(None),
        Some(word) => word.to_ascii_lowercase(),
    };
    let argument = words.next();

    let parsed = match (command.as_str(), argument) {
        ("connect", None) => ConsoleCommand::Connect,
        ("disconnect", None) => ConsoleCommand::Disconnect,
        ("restart", None) => ConsoleCommand::Restart,
        ("status", None) => ConsoleCommand::Status,
        ("help", None) | ("?", None) => ConsoleCommand::Help,
        ("quit", None) | ("exit", None) => ConsoleCommand::Quit,
        ("press", Some(button)) => ConsoleCommand::Edge(button.parse()?, Edge::Press),
        ("release", Some(button)) => ConsoleCommand::Edge(button.parse()?, Edge::Release),
        (token, None) if token.len() == 3 => {
            let code: CommandCode = token.parse()?;
            ConsoleCommand::Edge(code.button(), code.edge())
        },
        _ => return Err(CommandParseError::UnknownInput { input: line.trim().to_string() }),
    };

    if words.next().is_some() {
        return Err(CommandParseError::UnknownInput { input: line.trim().to_string() });
    }

    Ok(Some(parsed))
}

struct ConsoleSession {
    handle: SessionHandle,
    events: UnboundedReceiver<DeviceEvent>,
    cancel: CancellationToken,
    join: JoinHandle<Result<(), SessionError>>,
    state: ConnectionState,
}

impl ConsoleSession {
    fn start(peripheral: &PeripheralHandle, config: &Config) -> Self {
        let (transport_sender, transport_events) = unbounded();
        let (event_sender, events) = unbounded();
        let options = BtleOptions {
            scan_timeout: config.scan_timeout(),
            write_type: if config.write_without_response { WriteType::WithoutResponse } else { WriteType::WithResponse },
        };
        let transport = Arc::new(BtleTransport::new(transport_sender, options));
        let cancel = CancellationToken::new();

        info!("Starting session with {}", peripheral);
        let (handle, join) = start_session(transport, transport_events, peripheral.clone(), vec![event_sender], cancel.clone());

        ConsoleSession { handle, events, cancel, join, state: ConnectionState::Disconnected }
    }

    async fn stop(self) {
        let ConsoleSession { cancel, join, .. } = self;
        cancel.cancel();

        match join.await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => info!("Session ended: {}", err),
            Err(err) => warn!("Failed to join session task: {}", err),
        }
    }

    async fn send(&mut self, command: ConsoleCommand) {
        let result = match command {
            ConsoleCommand::Connect => self.handle.connect().await,
            ConsoleCommand::Disconnect => self.handle.disconnect().await,
            ConsoleCommand::Edge(button, edge) => self.handle.edge(button, edge).await,
            _ => Ok(()),
        };

        if result.is_err() {
            println!("The session has ended, type \"restart\" to start a new one");
        }
    }
}

fn show_event(event: &DeviceEvent) {
    match event {
        DeviceEvent::StateChange(ConnectionState::Disconnected) => {
            println!("[{}]", ConnectionState::Disconnected);
            println!("< (no data)");
        },
        DeviceEvent::StateChange(state) => println!("[{}]", state),
        DeviceEvent::Data(data) => println!("< {}", String::from_utf8_lossy(data)),
        DeviceEvent::Fatal(reason) => {
            println!("{}", reason);
            println!("Type \"restart\" to start a new session");
        },
    }
}

pub async fn run_console(peripheral: PeripheralHandle, config: Config) -> Result<(), AppRunError> {
    let mut lines = BufReader::new(stdin()).lines();
    let mut session = ConsoleSession::start(&peripheral, &config);
    println!("{}", HELP);

    'mainloop: loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break 'mainloop,
                };

                match parse_line(&line) {
                    Ok(None) => {},
                    Ok(Some(ConsoleCommand::Quit)) => break 'mainloop,
                    Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
                    Ok(Some(ConsoleCommand::Status)) => println!("[{}]", session.state),
                    Ok(Some(ConsoleCommand::Restart)) => {
                        session.stop().await;
                        session = ConsoleSession::start(&peripheral, &config);
                    },
                    Ok(Some(command)) => session.send(command).await,
                    Err(err) => println!("{}", err),
                }
            },
            Some(event) = session.events.next() => {
                if let DeviceEvent::StateChange(state) = event {
                    session.state = state;
                }
                show_event(&event);
            },
        }
    }

    session.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::command::{Axis, Unit};

    #[test]
    fn parse_keywords() {
        assert_eq!(parse_line("connect"), Ok(Some(ConsoleCommand::Connect)));
        assert_eq!(parse_line("  Disconnect "), Ok(Some(ConsoleCommand::Disconnect)));
        assert_eq!(parse_line("restart"), Ok(Some(ConsoleCommand::Restart)));
        assert_eq!(parse_line("quit"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn parse_press_and_release() {
        let up2 = Button::new(Axis::Up, Unit::Two);
        assert_eq!(parse_line("press u2"), Ok(Some(ConsoleCommand::Edge(up2, Edge::Press))));
        assert_eq!(parse_line("release u2"), Ok(Some(ConsoleCommand::Edge(up2, Edge::Release))));
        assert!(matches!(parse_line("press x9"), Err(CommandParseError::InvalidButton { .. })));
    }

    #[test]
    fn parse_raw_tokens() {
        let left1 = Button::new(Axis::Left, Unit::One);
        assert_eq!(parse_line("l1f"), Ok(Some(ConsoleCommand::Edge(left1, Edge::Release))));
        assert!(matches!(parse_line("l1x"), Err(CommandParseError::InvalidCommand { .. })));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_line("jump"), Err(CommandParseError::UnknownInput { .. })));
        assert!(matches!(parse_line("fly"), Err(CommandParseError::InvalidCommand { .. })));
        assert!(matches!(parse_line("press"), Err(CommandParseError::UnknownInput { .. })));
        assert!(matches!(parse_line("press u1 now"), Err(CommandParseError::UnknownInput { .. })));
        assert!(matches!(parse_line("connect now"), Err(CommandParseError::UnknownInput { .. })));
    }
}
