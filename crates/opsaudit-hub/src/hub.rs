//! The event hub actor.
//!
//! One owner task holds the registry of connected viewers and processes
//! register / unregister / broadcast messages strictly sequentially, so the
//! registry needs no lock. Callers only ever enqueue messages through a
//! [`HubHandle`]; nothing outside the owner loop touches the registry.
//!
//! Back-pressure is drop-based at both levels: the hub's inbound queue and
//! each client's outbound queue are bounded, and a full queue drops the
//! event (logged) rather than blocking the producer. A slow viewer only ever
//! loses its own events.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::events::{Event, EventKind};

/// Default capacity for the hub inbound queue and per-client queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A connected viewer as the hub sees it.
///
/// `page` and `filters` are advisory display state carried for diagnostics;
/// the hub does not filter events server-side.
pub struct ClientSubscription {
    pub id: String,
    pub user_id: i64,
    pub page: i64,
    pub filters: HashMap<String, String>,
    pub sender: mpsc::Sender<Event>,
}

enum HubMessage {
    Register(ClientSubscription),
    Unregister(String),
    Broadcast(Event),
}

/// Cloneable entry point to the hub. Everything goes through the message
/// queue; `broadcast` never blocks.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubMessage>,
}

impl HubHandle {
    /// Register a viewer. Awaits queue space; the owner loop confirms
    /// registration by accepting the message.
    pub async fn register(&self, client: ClientSubscription) {
        if self.tx.send(HubMessage::Register(client)).await.is_err() {
            tracing::warn!("hub is gone; register dropped");
        }
    }

    /// Unregister a viewer by id. Dropping the client's receiver alone is
    /// enough to stop delivery; this removes the registry entry too.
    pub async fn unregister(&self, client_id: &str) {
        if self
            .tx
            .send(HubMessage::Unregister(client_id.to_string()))
            .await
            .is_err()
        {
            tracing::warn!("hub is gone; unregister dropped");
        }
    }

    /// Enqueue an event for fan-out. Non-blocking: if the hub queue is full
    /// the event is dropped and logged — persisted state is already correct,
    /// only live viewers miss the notification.
    pub fn broadcast(&self, event: Event) {
        if let Err(e) = self.tx.try_send(HubMessage::Broadcast(event)) {
            match e {
                mpsc::error::TrySendError::Full(HubMessage::Broadcast(ev)) => {
                    tracing::warn!(kind = ?ev.kind, task_id = ev.task_id, "hub queue full, event dropped");
                }
                _ => tracing::warn!("hub is gone; broadcast dropped"),
            }
        }
    }

    pub fn task_created(&self, task_id: i64, data: serde_json::Value) {
        self.broadcast(Event::new(EventKind::TaskCreated, task_id, data));
    }

    pub fn task_updated(&self, task_id: i64, data: serde_json::Value) {
        self.broadcast(Event::new(EventKind::TaskUpdated, task_id, data));
    }

    pub fn task_deleted(&self, task_id: i64) {
        self.broadcast(Event::new(EventKind::TaskDeleted, task_id, serde_json::json!({})));
    }

    pub fn task_sampled(&self, task_id: i64, data: serde_json::Value) {
        self.broadcast(Event::new(EventKind::TaskSampled, task_id, data));
    }

    /// Ask every viewer to refresh its whole list.
    pub fn refresh(&self) {
        self.broadcast(Event::new(EventKind::TaskRefreshed, 0, serde_json::json!({})));
    }
}

/// The hub actor. Construct with [`EventHub::new`], then hand `run()` to a
/// spawned task; keep the [`HubHandle`] for producers and viewers.
pub struct EventHub {
    rx: mpsc::Receiver<HubMessage>,
    clients: HashMap<String, ClientSubscription>,
}

impl EventHub {
    pub fn new() -> (Self, HubHandle) {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(queue_capacity: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        (
            Self {
                rx,
                clients: HashMap::new(),
            },
            HubHandle { tx },
        )
    }

    /// Owner loop. Runs until every `HubHandle` is dropped.
    pub async fn run(mut self) {
        tracing::info!("event hub started");
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg);
        }
        tracing::info!("event hub stopped");
    }

    fn handle(&mut self, msg: HubMessage) {
        match msg {
            HubMessage::Register(client) => {
                tracing::info!(
                    client = %client.id,
                    user_id = client.user_id,
                    "viewer connected (total: {})",
                    self.clients.len() + 1
                );
                self.clients.insert(client.id.clone(), client);
            }
            HubMessage::Unregister(id) => {
                // Removing the subscription drops its sender, which closes
                // the viewer's queue.
                if self.clients.remove(&id).is_some() {
                    tracing::info!(client = %id, "viewer disconnected (remaining: {})", self.clients.len());
                }
            }
            HubMessage::Broadcast(event) => self.dispatch(event),
        }
    }

    /// Fan an event out to every connected viewer, non-blocking per client.
    fn dispatch(&mut self, event: Event) {
        if self.clients.is_empty() {
            tracing::debug!(kind = ?event.kind, "no viewers connected, event discarded");
            return;
        }
        let total = self.clients.len();
        let mut sent = 0usize;
        for client in self.clients.values() {
            match client.sender.try_send(event.clone()) {
                Ok(()) => sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client = %client.id, kind = ?event.kind, "viewer queue full, event dropped for it");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Viewer went away without unregistering yet; the
                    // unregister message will clean the entry up.
                }
            }
        }
        tracing::debug!(kind = ?event.kind, task_id = event.task_id, "event delivered to {sent}/{total} viewers");
    }
}
