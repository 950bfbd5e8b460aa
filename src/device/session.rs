//! The control loop of a session with one robot.
//!
//! A single task owns the connection state machine and the command throttler. Button edges,
//! connect/disconnect requests, transport events and expired timers all arrive at that task over
//! channels, so each gate is only ever touched from one place.
//!
//! The task never waits for the radio. Connecting and service discovery run on their own tasks and
//! report back, and commands are handed to a writer task that sends them to the robot in order.
//! All of these belong to the current link and are cancelled when it goes down.

use std::sync::Arc;
use futures::channel::mpsc::{channel, unbounded, Receiver, SendError, Sender, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::device::command::{Button, CommandCode, Edge};
use crate::device::connection::{ConnectionMachine, LinkAction, Transmission};
use crate::device::throttle::{CommandThrottler, ThrottleDecision};
use crate::device::transport::Transport;
use crate::device::types::{ConnectionState, DeviceEvent, PeripheralHandle, TransportEvent};
use crate::error::{DispatchError, SessionError};

#[derive(Debug)]
enum SessionCommand {
    Connect,
    Disconnect,
    /// An edge and the moment it was issued
    Edge(Button, Edge, Instant),
    SendPending(Button),
    ClearGate(Button, u64),
    /// Outcome of a link action started for link `generation`
    Link { generation: u64, event: TransportEvent },
}

/// Used by the user interface to drive a running session.
#[derive(Clone)]
pub struct SessionHandle {
    sender: Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn connect(&mut self) -> Result<(), SendError> {
        self.sender.send(SessionCommand::Connect).await
    }

    pub async fn disconnect(&mut self) -> Result<(), SendError> {
        self.sender.send(SessionCommand::Disconnect).await
    }

    pub async fn edge(&mut self, button: Button, edge: Edge) -> Result<(), SendError> {
        self.sender.send(SessionCommand::Edge(button, edge, Instant::now())).await
    }

    pub async fn press(&mut self, button: Button) -> Result<(), SendError> {
        self.edge(button, Edge::Press).await
    }

    pub async fn release(&mut self, button: Button) -> Result<(), SendError> {
        self.edge(button, Edge::Release).await
    }
}

fn schedule(cancel: CancellationToken, mut sender: Sender<SessionCommand>, deadline: Instant, command: SessionCommand) {
    spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {},
            _ = sleep_until(deadline) => {
                if let Err(err) = sender.send(command).await {
                    debug!("Session stopped before timer fired: {:?}", err);
                }
            },
        }
    });
}

fn spawn_writer<T: Transport + 'static>(transport: Arc<T>, cancel: CancellationToken) -> UnboundedSender<Transmission> {
    let (sender, mut receiver) = unbounded::<Transmission>();

    spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {},
            _ = async {
                while let Some(transmission) = receiver.next().await {
                    transmission.send(transport.as_ref()).await;
                }
            } => {},
        }
    });

    sender
}

struct Session<T: Transport> {
    machine: ConnectionMachine<T>,
    throttler: CommandThrottler,
    transport: Arc<T>,
    // cancelled on teardown, which also drops all pending timers
    timers: CancellationToken,
    self_sender: Sender<SessionCommand>,
    // child of `timers`, cancelled whenever the link goes down
    link: CancellationToken,
    generation: u64,
    writer: Option<UnboundedSender<Transmission>>,
}

impl<T: Transport + 'static> Session<T> {
    fn reset_link(&mut self) {
        self.link.cancel();
        self.link = self.timers.child_token();
        self.generation += 1;
        self.writer = None;
    }

    fn start_action(&mut self, action: Option<LinkAction>) {
        let action = match action {
            Some(action) => action,
            None => return,
        };

        let transport = self.transport.clone();
        let cancel = self.link.clone();
        let mut sender = self.self_sender.clone();
        let generation = self.generation;

        spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {},
                event = action.run(transport.as_ref()) => {
                    if let Some(event) = event {
                        if let Err(err) = sender.send(SessionCommand::Link { generation, event }).await {
                            debug!("Session stopped before link action finished: {:?}", err);
                        }
                    }
                },
            }
        });
    }

    fn handle_event(&mut self, event: TransportEvent) {
        let link_lost = matches!(event, TransportEvent::Disconnected | TransportEvent::ConnectFailed(_));
        let action = self.machine.handle_event(event);
        if link_lost && self.machine.state() == ConnectionState::Disconnected {
            self.reset_link();
        }
        self.start_action(action);
    }

    fn transmit(&mut self, transmission: Transmission) {
        let transport = &self.transport;
        let link = &self.link;
        let writer = self
            .writer
            .get_or_insert_with(|| spawn_writer(transport.clone(), link.clone()));

        if let Err(err) = writer.unbounded_send(transmission) {
            warn!("Writer is gone, dropping {}", err.into_inner().code);
        }
    }

    fn dispatch(&mut self, button: Button, code: CommandCode) {
        match self.machine.prepare(&code) {
            Ok(transmission) => self.transmit(transmission),
            Err(DispatchError::NotReady { .. }) => {
                debug!("Command {} for {} dropped, not connected", code, button);
            },
            Err(DispatchError::CharacteristicUnavailable) => {
                warn!("Command {} for {} dropped, characteristic unavailable", code, button);
            },
        }
    }

    fn schedule_at(&self, deadline: Instant, command: SessionCommand) {
        schedule(self.timers.clone(), self.self_sender.clone(), deadline, command);
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect => {
                let action = self.machine.connect();
                self.start_action(action);
            },
            SessionCommand::Disconnect => {
                self.reset_link();
                self.machine.disconnect().await;
            },
            SessionCommand::Edge(button, edge, issued) => {
                match self.throttler.edge(button, edge) {
                    ThrottleDecision::Immediate { code, clear_after, epoch } => {
                        self.dispatch(button, code);
                        self.schedule_at(issued + clear_after, SessionCommand::ClearGate(button, epoch));
                    },
                    ThrottleDecision::Deferred { delay } => {
                        debug!("{} is busy, deferring {:?} by {:?}", button, edge, delay);
                        self.schedule_at(issued + delay, SessionCommand::SendPending(button));
                    },
                    ThrottleDecision::Coalesced { replaced } => {
                        debug!("{} is busy, {:?} replaced {}", button, edge, replaced);
                    },
                }
            },
            SessionCommand::SendPending(button) => {
                if let Some(code) = self.throttler.take_pending(button) {
                    self.dispatch(button, code);
                }
            },
            SessionCommand::ClearGate(button, epoch) => {
                self.throttler.clear(button, epoch);
            },
            SessionCommand::Link { generation, event } => {
                if generation == self.generation {
                    self.handle_event(event);
                } else {
                    debug!("Ignoring {:?} from an earlier link", event);
                }
            },
        }
    }

    async fn teardown(&mut self) {
        info!("Stopping session");
        self.timers.cancel();
        self.throttler.reset();
        self.writer = None;
        self.machine.disconnect().await;
    }

    async fn run(
        mut self,
        cancel: CancellationToken,
        mut transport_events: UnboundedReceiver<TransportEvent>,
        mut commands: Receiver<SessionCommand>,
    ) -> Result<(), SessionError> {
        if let Err(source) = self.transport.initialize().await {
            self.machine.fail(format!("Unable to initialize bluetooth: {}", source));
            return Err(SessionError::TransportInit { source });
        }

        let action = self.machine.connect();
        self.start_action(action);

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(event) = transport_events.next() => {
                    self.handle_event(event);
                },
                Some(command) = commands.next() => {
                    self.handle_command(command).await;
                },
            }
        }

        self.teardown().await;
        Ok(())
    }
}

/// Starts a session with `peripheral`: initializes the transport and connects right away.
///
/// `transport_events` must be the receiving end of the channel that `transport` emits its events
/// into. Cancelling `cancel` ends the session and disconnects.
pub fn start_session<T: Transport + 'static>(
    transport: Arc<T>,
    transport_events: UnboundedReceiver<TransportEvent>,
    peripheral: PeripheralHandle,
    senders: Vec<UnboundedSender<DeviceEvent>>,
    cancel: CancellationToken,
) -> (SessionHandle, JoinHandle<Result<(), SessionError>>) {
    let (sender, receiver) = channel::<SessionCommand>(32);
    let timers = cancel.child_token();

    let session = Session {
        machine: ConnectionMachine::new(transport.clone(), peripheral, senders),
        throttler: CommandThrottler::new(),
        transport,
        link: timers.child_token(),
        timers,
        self_sender: sender.clone(),
        generation: 0,
        writer: None,
    };

    let handle = spawn(session.run(cancel, transport_events, receiver));

    (SessionHandle { sender }, handle)
}
