//! Relaying notification interactions from the worker context to every window.
//!
//! Each window gets the message together with its own reply channel, so one
//! unresponsive window never holds up the others.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::communication::Command;

pub const STOP_ALARM: &str = "stopAlarm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub text: String,
}

impl RelayMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn stop_alarm() -> Self {
        Self::new(STOP_ALARM)
    }

    #[must_use]
    pub fn is_stop_alarm(&self) -> bool {
        self.text == STOP_ALARM
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    Click,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Window,
    Worker,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientQuery {
    /// also match windows this worker version doesn't control
    pub include_uncontrolled: bool,
    pub kind: ClientKind,
}

/// A context the worker can post messages to.
pub trait Client: Send {
    fn id(&self) -> &str;
    /// Posts `message`; the client answers exactly once on `reply`.
    fn post_message(&self, message: RelayMessage, reply: Sender<Reply>);
}

pub trait Clients {
    fn match_all(&self, query: ClientQuery) -> Vec<Box<dyn Client>>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("client {client} rejected the message: {reason}")]
    Rejected { client: String, reason: String },
    #[error("client {client} didn't answer within {timeout:?}")]
    Timeout { client: String, timeout: Duration },
    #[error("client {0} went away without answering")]
    Disconnected(String),
}

/// One message on its way to one client.
#[derive(Debug)]
pub struct Delivery {
    client: String,
    reply: Receiver<Reply>,
    timeout: Option<Duration>,
}

impl Delivery {
    #[must_use]
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Waits for the client's answer.
    ///
    /// # Errors
    /// when the client answers with an error, doesn't answer within the
    /// timeout, or drops its reply channel
    pub fn wait(self) -> Result<String, DeliveryError> {
        let reply = match self.timeout {
            Some(timeout) => self.reply.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => DeliveryError::Timeout {
                    client: self.client.clone(),
                    timeout,
                },
                RecvTimeoutError::Disconnected => DeliveryError::Disconnected(self.client.clone()),
            })?,
            None => self
                .reply
                .recv()
                .map_err(|_| DeliveryError::Disconnected(self.client.clone()))?,
        };
        match reply {
            Reply::Ack(text) => Ok(text),
            Reply::Error(reason) => Err(DeliveryError::Rejected {
                client: self.client,
                reason,
            }),
        }
    }
}

pub fn send_message_to_client(
    client: &dyn Client,
    message: RelayMessage,
    timeout: Option<Duration>,
) -> Delivery {
    let (reply, receiver) = crossbeam_channel::bounded(1);
    client.post_message(message, reply);
    Delivery {
        client: client.id().to_string(),
        reply: receiver,
        timeout,
    }
}

/// Turns notification interactions into stop instructions for every window.
#[derive(Debug)]
pub struct Relay<C> {
    clients: C,
    ack_timeout: Option<Duration>,
}

impl<C: Clients> Relay<C> {
    pub const fn new(clients: C) -> Self {
        Self {
            clients,
            ack_timeout: None,
        }
    }

    #[must_use]
    pub const fn with_ack_timeout(mut self, ack_timeout: Option<Duration>) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn broadcast(&self, message: &RelayMessage) -> Vec<Delivery> {
        let query = ClientQuery {
            include_uncontrolled: true,
            kind: ClientKind::Window,
        };
        self.clients
            .match_all(query)
            .iter()
            .map(|client| send_message_to_client(client.as_ref(), message.clone(), self.ack_timeout))
            .collect()
    }

    pub fn handle(&self, event: NotificationEvent) {
        let deliveries = self.broadcast(&RelayMessage::stop_alarm());
        log::info!(
            "notification {event:?}, sent stop to {} window(s)",
            deliveries.len()
        );
        // without a timeout a silent window would park the watcher forever
        if self.ack_timeout.is_some() && !deliveries.is_empty() {
            thread::spawn(move || {
                for delivery in deliveries {
                    if let Err(e) = delivery.wait() {
                        log::warn!("{e}");
                    }
                }
            });
        }
    }
}

/// A window's end of the relay: turns the stop instruction into a
/// [`Command::StopAlarm`] for that window.
#[derive(Debug, Clone)]
pub struct WindowClient {
    id: String,
    commands: Sender<Command>,
    controlled: bool,
}

impl WindowClient {
    pub fn new(id: impl Into<String>, commands: Sender<Command>) -> Self {
        Self {
            id: id.into(),
            commands,
            controlled: true,
        }
    }

    /// A window opened before the current worker version took over.
    pub fn uncontrolled(id: impl Into<String>, commands: Sender<Command>) -> Self {
        Self {
            controlled: false,
            ..Self::new(id, commands)
        }
    }
}

impl Client for WindowClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn post_message(&self, message: RelayMessage, reply: Sender<Reply>) {
        let answer = if !message.is_stop_alarm() {
            Reply::Error(format!("unknown instruction `{}`", message.text))
        } else if self.commands.send(Command::StopAlarm).is_err() {
            Reply::Error(format!("window {} is closed", self.id))
        } else {
            Reply::Ack(message.text)
        };
        // nobody may be waiting, that's fine
        reply.send(answer).ok();
    }
}

/// The open windows, as seen from the worker.
#[derive(Debug, Clone, Default)]
pub struct WindowRegistry {
    windows: Arc<Mutex<Vec<WindowClient>>>,
}

impl WindowRegistry {
    pub fn register(&self, window: WindowClient) {
        match self.windows.lock() {
            Ok(mut windows) => windows.push(window),
            Err(e) => log::error!("window registry poisoned: {e}"),
        }
    }

    pub fn unregister(&self, id: &str) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.retain(|w| w.id != id);
        }
    }
}

impl Clients for WindowRegistry {
    fn match_all(&self, query: ClientQuery) -> Vec<Box<dyn Client>> {
        if query.kind == ClientKind::Worker {
            return Vec::new();
        }
        let Ok(windows) = self.windows.lock() else {
            return Vec::new();
        };
        windows
            .iter()
            .filter(|w| w.controlled || query.include_uncontrolled)
            .map(|w| Box::new(w.clone()) as Box<dyn Client>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Silent {
        parked: Mutex<Vec<Sender<Reply>>>,
    }

    impl Client for Silent {
        fn id(&self) -> &str {
            "silent"
        }

        fn post_message(&self, _message: RelayMessage, reply: Sender<Reply>) {
            self.parked.lock().unwrap().push(reply);
        }
    }

    #[test]
    fn window_acknowledges_stop_and_queues_command() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let window = WindowClient::new("w1", tx);
        let delivery = send_message_to_client(&window, RelayMessage::stop_alarm(), None);
        assert_eq!(delivery.client(), "w1");
        assert_eq!(delivery.wait().unwrap(), STOP_ALARM);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Command::StopAlarm]);
    }

    #[test]
    fn window_rejects_unknown_text() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let window = WindowClient::new("w1", tx);
        let err = send_message_to_client(&window, RelayMessage::new("dance"), None)
            .wait()
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { ref client, .. } if client == "w1"));
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn closed_window_rejects() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let window = WindowClient::new("gone", tx);
        let err = send_message_to_client(&window, RelayMessage::stop_alarm(), None)
            .wait()
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { .. }));
    }

    #[test]
    fn silent_client_times_out() {
        let client = Silent::default();
        let timeout = Duration::from_millis(20);
        let err = send_message_to_client(&client, RelayMessage::stop_alarm(), Some(timeout))
            .wait()
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Timeout {
                client: "silent".into(),
                timeout
            }
        );
    }

    #[test]
    fn broadcast_reaches_uncontrolled_windows() {
        let registry = WindowRegistry::default();
        let (tx1, rx1) = crossbeam_channel::unbounded();
        let (tx2, rx2) = crossbeam_channel::unbounded();
        registry.register(WindowClient::new("controlled", tx1));
        registry.register(WindowClient::uncontrolled("stale", tx2));

        let relay = Relay::new(registry.clone());
        let deliveries = relay.broadcast(&RelayMessage::stop_alarm());
        assert_eq!(deliveries.len(), 2);
        for delivery in deliveries {
            delivery.wait().unwrap();
        }
        assert_eq!(rx1.try_iter().count(), 1);
        assert_eq!(rx2.try_iter().count(), 1);

        let controlled_only = registry.match_all(ClientQuery {
            include_uncontrolled: false,
            kind: ClientKind::Window,
        });
        assert_eq!(controlled_only.len(), 1);
        assert_eq!(controlled_only[0].id(), "controlled");
    }

    #[test]
    fn handle_is_fire_and_forget() {
        let registry = WindowRegistry::default();
        let (tx, rx) = crossbeam_channel::unbounded();
        registry.register(WindowClient::new("w", tx));
        registry.unregister("nobody");

        Relay::new(registry.clone()).handle(NotificationEvent::Click);
        Relay::new(registry.clone())
            .with_ack_timeout(Some(Duration::from_millis(50)))
            .handle(NotificationEvent::Close);
        assert_eq!(rx.try_iter().count(), 2);

        registry.unregister("w");
        Relay::new(registry).handle(NotificationEvent::Click);
        assert!(rx.try_iter().next().is_none());
    }
}
