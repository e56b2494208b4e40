use std::{fmt, sync::Arc};

use log::{info, warn};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityState {
    Initializing,
    Available,
    Unavailable,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Initializing => "initializing",
            AvailabilityState::Available => "available",
            AvailabilityState::Unavailable => "unavailable",
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            AvailabilityState::Initializing => "not yet resolved",
            AvailabilityState::Available => "in service",
            AvailabilityState::Unavailable => "election in progress or all backends down",
        }
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddress {
    pub host: String,
    pub port: u16,
}

impl BackendAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

/// What the watcher observed on one resolve cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    Resolved(BackendAddress),
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    BecameAvailable(BackendAddress),
    LeaderMoved {
        from: BackendAddress,
        to: BackendAddress,
    },
    BecameUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: AvailabilityState,
    pub address: Option<BackendAddress>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: AvailabilityState::Initializing,
            address: None,
        }
    }
}

impl Snapshot {
    /// The address to forward to, if requests can be routed at all.
    pub fn routable(&self) -> Option<&BackendAddress> {
        match (self.state, &self.address) {
            (AvailabilityState::Available, Some(address)) => Some(address),
            _ => None,
        }
    }

    pub fn apply(&mut self, event: StateEvent) -> Option<Transition> {
        match event {
            StateEvent::Resolved(address) => {
                let previous_state = self.state;
                let previous_address = self.address.replace(address.clone());
                self.state = AvailabilityState::Available;

                if previous_state != AvailabilityState::Available {
                    return Some(Transition::BecameAvailable(address));
                }

                match previous_address {
                    Some(from) if from != address => Some(Transition::LeaderMoved { from, to: address }),
                    _ => None,
                }
            }
            StateEvent::Lost => {
                if self.state == AvailabilityState::Unavailable {
                    return None;
                }
                // the last known address is kept for diagnostics
                self.state = AvailabilityState::Unavailable;
                Some(Transition::BecameUnavailable)
            }
        }
    }
}

struct Signal {
    event: StateEvent,
    applied: Option<oneshot::Sender<()>>,
}

/// Read side of the state. Cheap to clone; never writes.
#[derive(Clone)]
pub struct StateReader {
    snapshot: Arc<RwLock<Snapshot>>,
}

impl StateReader {
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    pub fn state(&self) -> AvailabilityState {
        self.snapshot.read().state
    }
}

/// Queue into the owning task.
#[derive(Clone)]
pub struct StateSender {
    signals: mpsc::UnboundedSender<Signal>,
}

impl StateSender {
    /// Returns false once the owner has stopped.
    pub fn send(&self, event: StateEvent) -> bool {
        self.signals
            .send(Signal {
                event,
                applied: None,
            })
            .is_ok()
    }

    /// Sends `event` and waits until the owner has applied it.
    pub async fn send_and_wait(&self, event: StateEvent) -> bool {
        let (tx, rx) = oneshot::channel();
        let sent = self
            .signals
            .send(Signal {
                event,
                applied: Some(tx),
            })
            .is_ok();
        sent && rx.await.is_ok()
    }
}

/// The single writer of a provider's [`Snapshot`].
///
/// Events are applied strictly in the order they were queued.
pub struct StateOwner {
    label: String,
    snapshot: Arc<RwLock<Snapshot>>,
    signals: mpsc::UnboundedReceiver<Signal>,
}

impl StateOwner {
    pub fn new(label: impl Into<String>) -> (Self, StateReader, StateSender) {
        let snapshot = Arc::new(RwLock::new(Snapshot::default()));
        let (tx, rx) = mpsc::unbounded_channel();

        let owner = Self {
            label: label.into(),
            snapshot: snapshot.clone(),
            signals: rx,
        };
        (owner, StateReader { snapshot }, StateSender { signals: tx })
    }

    pub fn spawn(label: impl Into<String>) -> (JoinHandle<()>, StateReader, StateSender) {
        let (owner, reader, sender) = Self::new(label);
        (tokio::spawn(owner.run()), reader, sender)
    }

    /// Drains the queue until every sender is gone.
    pub async fn run(mut self) {
        while self.next_transition().await.is_some() {}
    }

    /// Applies queued events until one changes the snapshot and returns that
    /// change. `None` once every sender is gone.
    pub async fn next_transition(&mut self) -> Option<Transition> {
        while let Some(signal) = self.signals.recv().await {
            let transition = self.snapshot.write().apply(signal.event);
            if let Some(applied) = signal.applied {
                let _ = applied.send(());
            }
            if let Some(transition) = transition {
                self.log_transition(&transition);
                return Some(transition);
            }
        }
        None
    }

    fn log_transition(&self, transition: &Transition) {
        match transition {
            Transition::BecameAvailable(address) => {
                info!("{}: active backend {} in service", self.label, address);
            }
            Transition::LeaderMoved { from, to } => {
                info!("{}: active backend address changes from {} to {}", self.label, from, to);
            }
            Transition::BecameUnavailable => {
                warn!("{}: no active backend, election may be taking place", self.label);
            }
        }
    }
}
