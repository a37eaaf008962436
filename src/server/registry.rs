use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::broadcast::OutboundFrame;
use crate::protocol::ClientId;

/// Number of recipients kept inline before a snapshot spills to the heap.
pub const TYPICAL_SESSION_SIZE: usize = 8;

/// Lifecycle of a single connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Failure to place a frame on one recipient's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("connection is closed")]
    Closed,
}

#[derive(Debug)]
struct ConnectionInner {
    id: ClientId,
    sender: mpsc::Sender<OutboundFrame>,
    state: AtomicU8,
    remote_addr: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    epoch: Instant,
    /// Milliseconds since `epoch` of the last inbound activity.
    last_activity_ms: AtomicU64,
    /// Cancelled once the connection is unregistered.
    closed: CancellationToken,
}

/// Cheaply clonable handle to a live connection's outbound side.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

impl ConnectionHandle {
    fn new(
        id: ClientId,
        sender: mpsc::Sender<OutboundFrame>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id,
                sender,
                state: AtomicU8::new(ConnectionState::Connecting as u8),
                remote_addr,
                connected_at: Utc::now(),
                epoch: Instant::now(),
                last_activity_ms: AtomicU64::new(0),
                closed: CancellationToken::new(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> &ClientId {
        &self.inner.id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.inner.connected_at
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Ready predicate used before every write: open state and a live writer.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open && !self.inner.sender.is_closed()
    }

    /// Enqueue a frame without waiting. A slow reader fills its own queue and
    /// only its own frames are dropped.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<(), SendError> {
        if self.state() == ConnectionState::Closed {
            return Err(SendError::Closed);
        }
        self.inner.sender.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Record inbound activity for idle tracking.
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.inner.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.inner
            .last_activity_ms
            .store(elapsed, Ordering::Relaxed);
    }

    /// Time since the last inbound activity (or since accept).
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.inner.last_activity_ms.load(Ordering::Relaxed));
        self.inner.epoch.elapsed().saturating_sub(last)
    }

    /// Resolves once the connection has been unregistered, whoever did it.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.state.store(state as u8, Ordering::Release);
        if state == ConnectionState::Closed {
            self.inner.closed.cancel();
        }
    }
}

/// Recipients captured at the moment a broadcast starts.
///
/// Iteration can be restarted any number of times; connections that close
/// after the snapshot was taken are still listed and fail the open check.
#[derive(Debug, Default)]
pub struct RecipientSnapshot {
    recipients: SmallVec<[ConnectionHandle; TYPICAL_SESSION_SIZE]>,
}

impl RecipientSnapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, ConnectionHandle> {
        self.recipients.iter()
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ClientId> + '_ {
        self.recipients.iter().map(ConnectionHandle::id)
    }
}

impl<'a> IntoIterator for &'a RecipientSnapshot {
    type Item = &'a ConnectionHandle;
    type IntoIter = std::slice::Iter<'a, ConnectionHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.recipients.iter()
    }
}

/// Live connection set.
///
/// Insertions and removals are atomic per entry, so a broadcast snapshot sees
/// every connection either fully registered or not at all.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, ConnectionHandle>,
    next_sequence: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh id to an accepted connection and mark it open.
    pub fn register(
        &self,
        sender: mpsc::Sender<OutboundFrame>,
        remote_addr: Option<SocketAddr>,
    ) -> ConnectionHandle {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = ConnectionHandle::new(ClientId::generate(sequence), sender, remote_addr);

        self.clients.insert(handle.id().clone(), handle.clone());
        handle.set_state(ConnectionState::Open);

        info!(client_id = %handle.id(), ?remote_addr, "Client registered");
        handle
    }

    /// Mark a connection closed and drop it from the set.
    ///
    /// Returns the removed handle; `None` when the id was already gone, which
    /// is not an error.
    pub fn unregister(&self, client_id: &str) -> Option<ConnectionHandle> {
        let (_, handle) = self.clients.remove(client_id)?;
        handle.set_state(ConnectionState::Closed);
        info!(client_id = %handle.id(), "Client unregistered");
        Some(handle)
    }

    /// Every registered connection except `client_id`, captured now.
    pub fn others_except(&self, client_id: &str) -> RecipientSnapshot {
        let recipients = self
            .clients
            .iter()
            .filter(|entry| entry.key().as_str() != client_id)
            .map(|entry| entry.value().clone())
            .collect();
        RecipientSnapshot { recipients }
    }

    pub fn get(&self, client_id: &str) -> Option<ConnectionHandle> {
        self.clients.get(client_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Sorted ids of all registered connections.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Ids of connections with no inbound activity for longer than `timeout`.
    pub fn idle_clients(&self, timeout: Duration) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|entry| entry.value().idle_for() > timeout)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RelayPayload;

    fn register(registry: &ClientRegistry) -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        (registry.register(tx, None), rx)
    }

    #[test]
    fn register_assigns_unique_open_connections() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = register(&registry);
        let (b, _rx_b) = register(&registry);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), ConnectionState::Open);
        assert!(a.is_open());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ClientRegistry::new();
        let (a, _rx) = register(&registry);
        let id = a.id().clone();

        assert!(registry.unregister(&id).is_some());
        assert!(registry.unregister(&id).is_none());
        assert!(registry.is_empty());
        assert_eq!(a.state(), ConnectionState::Closed);
        assert!(!a.is_open());
    }

    #[test]
    fn others_except_excludes_only_the_sender() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = register(&registry);
        let (b, _rx_b) = register(&registry);
        let (c, _rx_c) = register(&registry);

        let snapshot = registry.others_except(a.id());
        let mut ids: Vec<_> = snapshot.ids().cloned().collect();
        ids.sort();
        let mut expected = vec![b.id().clone(), c.id().clone()];
        expected.sort();
        assert_eq!(ids, expected);

        // Restartable: a second pass yields the same recipients
        assert_eq!(snapshot.iter().count(), 2);
        assert_eq!((&snapshot).into_iter().count(), 2);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_changes() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = register(&registry);
        let (b, _rx_b) = register(&registry);

        let snapshot = registry.others_except(a.id());
        registry.unregister(b.id());
        let (_c, _rx_c) = register(&registry);

        assert_eq!(snapshot.len(), 1);
        let recipient = snapshot.iter().next().unwrap();
        assert_eq!(recipient.id(), b.id());
        assert!(!recipient.is_open());
    }

    #[test]
    fn try_send_reports_full_and_closed_queues() {
        let registry = ClientRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        let handle = registry.register(tx, None);
        let frame = OutboundFrame::Payload(RelayPayload::text("{}"));

        assert_eq!(handle.try_send(frame.clone()), Ok(()));
        assert_eq!(handle.try_send(frame.clone()), Err(SendError::QueueFull));

        drop(rx);
        assert_eq!(handle.try_send(frame.clone()), Err(SendError::Closed));
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn unregister_wakes_closed_waiters() {
        let registry = ClientRegistry::new();
        let (a, _rx) = register(&registry);
        let waiter = tokio::spawn({
            let a = a.clone();
            async move { a.closed().await }
        });

        registry.unregister(a.id());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn unknown_ids_are_absent() {
        let registry = ClientRegistry::new();
        assert!(registry.get("nobody").is_none());
        assert!(!registry.contains("nobody"));
        assert!(registry.others_except("nobody").is_empty());
    }

    #[test]
    fn idle_clients_reports_silent_connections() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = register(&registry);
        std::thread::sleep(Duration::from_millis(30));
        let (b, _rx_b) = register(&registry);
        b.touch();

        let idle = registry.idle_clients(Duration::from_millis(20));
        assert_eq!(idle, vec![a.id().clone()]);

        a.touch();
        assert!(registry.idle_clients(Duration::from_millis(20)).is_empty());
    }

    #[test]
    fn client_ids_are_sorted() {
        let registry = ClientRegistry::new();
        let handles: Vec<_> = (0..5).map(|_| register(&registry)).collect();
        let ids = registry.client_ids();
        assert_eq!(ids.len(), handles.len());
        assert!(ids.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
