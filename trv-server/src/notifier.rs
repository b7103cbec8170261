//! Change notifier
//!
//! Keeps the set of connected real-time channels and, on a fixed interval,
//! sends the literal text `"update"` to each of them. Broadcasts are not
//! tied to row writes; clients simply refetch whenever they hear one.
//!
//! Each subscriber owns a small bounded queue. A broadcast takes a snapshot
//! of the subscriber list, offers the message to every queue in
//! registration order, and drops any subscriber whose queue is closed or
//! full. One dead channel never stops delivery to the rest.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message broadcast on every tick
pub const UPDATE_MESSAGE: &str = "update";

/// Undelivered messages a subscriber may hold before it is dropped
const SUBSCRIBER_QUEUE_CAPACITY: usize = 16;

/// Receiving half handed to a newly registered channel
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<String>,
}

#[derive(Debug)]
struct Subscriber {
    id: Uuid,
    sender: mpsc::Sender<String>,
}

/// Registry of connected channels plus the broadcast loop
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel; it is appended after every existing subscriber
    pub async fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers.push(Subscriber { id, sender });
        debug!("Notifier: subscriber {} registered ({} connected)", id, subscribers.len());

        Subscription { id, receiver }
    }

    /// Remove a channel. Returns false if it was already gone.
    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;

        if removed {
            debug!("Notifier: subscriber {} removed ({} connected)", id, subscribers.len());
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver `message` to every subscriber, returning how many accepted it
    ///
    /// Subscribers whose delivery fails are removed after the pass.
    pub async fn broadcast(&self, message: &str) -> usize {
        let snapshot: Vec<(Uuid, mpsc::Sender<String>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|s| (s.id, s.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, sender) in snapshot {
            match sender.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Notifier: subscriber {} is not draining its queue, dropping it", id);
                    failed.push(id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Notifier: subscriber {} closed", id);
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            self.subscribers
                .write()
                .await
                .retain(|s| !failed.contains(&s.id));
        }

        delivered
    }

    /// Broadcast [`UPDATE_MESSAGE`] every `interval` while anyone is connected
    ///
    /// Runs until `cancel` fires.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Notifier started (interval {:?})", interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.subscriber_count().await > 0 {
                        let delivered = self.broadcast(UPDATE_MESSAGE).await;
                        debug!("Notifier: update sent to {} subscribers", delivered);
                    }
                }
            }
        }

        info!("Notifier stopped");
    }

    /// Spawn [`Notifier::run`] on the runtime
    pub fn spawn(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.run(interval, cancel).await })
    }

    /// Drop every subscriber, closing their channels
    pub async fn shutdown(&self) {
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len();
        subscribers.clear();
        info!("Notifier: closed {} channels", count);
    }
}
