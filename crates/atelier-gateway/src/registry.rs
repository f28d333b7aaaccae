use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use atelier_types::events::{EventReply, ServerEvent};

/// Frames queued for delivery to one connection. Replies answer an inbound
/// event; events are server pushes (fan-out, ready).
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(ServerEvent),
    Reply(EventReply),
}

struct ConnectionEntry {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

/// Maps live connection handles to authenticated users and owns the
/// per-user fan-out channels. Both maps live under one lock so a reader
/// can never observe a handle in one and not the other.
#[derive(Default)]
struct RegistryState {
    connections: HashMap<Uuid, ConnectionEntry>,
    /// user_id -> handles currently bound to that user. Rebuilt purely
    /// from live connections; never persisted.
    channels: HashMap<Uuid, HashSet<Uuid>>,
}

#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<RegistryState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    /// Bind a handle to a user and join the user's channel. Re-registering
    /// an existing handle overwrites its binding.
    pub async fn register(&self, handle: Uuid, user_id: Uuid, tx: mpsc::UnboundedSender<Outbound>) {
        let mut state = self.inner.write().await;

        if let Some(old) = state.connections.remove(&handle) {
            detach(&mut state.channels, old.user_id, handle);
        }

        state.connections.insert(handle, ConnectionEntry { user_id, tx });
        state.channels.entry(user_id).or_default().insert(handle);
    }

    /// Remove a handle. Idempotent; absent handles are a no-op.
    pub async fn unregister(&self, handle: Uuid) {
        let mut state = self.inner.write().await;
        if let Some(entry) = state.connections.remove(&handle) {
            detach(&mut state.channels, entry.user_id, handle);
        }
    }

    /// Resolve a handle to its authenticated user, if registered.
    pub async fn lookup(&self, handle: Uuid) -> Option<Uuid> {
        self.inner
            .read()
            .await
            .connections
            .get(&handle)
            .map(|e| e.user_id)
    }

    /// Queue an event on every connection currently bound to `user_id`.
    /// Best-effort: a closed receiver is skipped, never an error, and the
    /// unbounded queue means no consumer can stall the caller. Returns the
    /// number of connections the event was queued on.
    pub async fn fan_out(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let state = self.inner.read().await;
        let Some(handles) = state.channels.get(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        for handle in handles {
            if let Some(entry) = state.connections.get(handle) {
                if entry.tx.send(Outbound::Event(event.clone())).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Number of live connections, for shutdown logging.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Drop every binding. Called once on server shutdown.
    pub async fn clear(&self) {
        let mut state = self.inner.write().await;
        state.connections.clear();
        state.channels.clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn detach(channels: &mut HashMap<Uuid, HashSet<Uuid>>, user_id: Uuid, handle: Uuid) {
    if let Some(handles) = channels.get_mut(&user_id) {
        handles.remove(&handle);
        if handles.is_empty() {
            channels.remove(&user_id);
        }
    }
}
