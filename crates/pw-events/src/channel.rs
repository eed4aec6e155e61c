// channel.rs — SyncChannel: subscriber registry with per-subscriber heartbeat.
//
// Each subscriber gets:
//   - a bounded mpsc queue (publisher side uses try_send, never awaits)
//   - a heartbeat task that pushes `heartbeat` every interval
//
// The heartbeat task is owned by the registry entry. Removing the entry
// (client disconnect, queue overflow, channel shutdown) aborts it, so no
// heartbeat can fire for a subscriber that is gone. Heartbeat tasks only
// hold a Weak reference to the registry; dropping the last SyncChannel
// handle aborts every remaining task.
//
// Missed events are not buffered for reconnecting clients; they re-pull
// full state instead.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::message::PushMessage;

#[derive(Debug, Clone, Copy)]
pub struct SyncChannelConfig {
    pub heartbeat_interval: Duration,
    /// Per-subscriber queue capacity.
    pub buffer: usize,
}

impl Default for SyncChannelConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            buffer: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ChannelStats {
    pub subscribers: usize,
    pub heartbeats_sent: u64,
    /// Subscribers closed because their queue overflowed.
    pub dropped: u64,
}

struct Subscriber {
    tx: mpsc::Sender<PushMessage>,
    heartbeat: JoinHandle<()>,
}

struct Inner {
    config: SyncChannelConfig,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
    heartbeats_sent: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, HashMap<u64, Subscriber>> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64, reason: &'static str) -> bool {
        let removed = self.registry().remove(&id);
        match removed {
            Some(sub) => {
                sub.heartbeat.abort();
                tracing::info!(subscriber_id = id, reason, "subscriber removed");
                true
            }
            None => false,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let subscribers = self
            .subscribers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, sub) in subscribers.drain() {
            sub.heartbeat.abort();
        }
    }
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct SyncChannel {
    inner: Arc<Inner>,
}

impl SyncChannel {
    pub fn new(config: SyncChannelConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                heartbeats_sent: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Register a subscriber. It immediately receives `connection_established`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.config.buffer.max(1));

        let _ = tx.try_send(PushMessage::ConnectionEstablished {
            message: "Connected to patchwire".to_string(),
            subscriber_id: id,
        });

        let heartbeat = spawn_heartbeat(
            id,
            tx.clone(),
            Arc::downgrade(&self.inner),
            self.inner.config.heartbeat_interval,
        );
        self.inner.registry().insert(id, Subscriber { tx, heartbeat });
        tracing::info!(subscriber_id = id, "subscriber connected");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Push a message to every open subscriber. Returns how many accepted it.
    ///
    /// Never blocks: a subscriber whose queue is full is closed.
    pub fn publish(&self, message: PushMessage) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let registry = self.inner.registry();
            for (id, sub) in registry.iter() {
                match sub.tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => closed.push((*id, "queue overflow")),
                    Err(TrySendError::Closed(_)) => closed.push((*id, "receiver closed")),
                }
            }
        }
        for (id, reason) in closed {
            if self.inner.remove(id, reason) && reason == "queue overflow" {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        tracing::debug!(event = message.event_type(), delivered, "published");
        delivered
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        self.inner.remove(id, "unsubscribed")
    }

    /// Close every subscriber and cancel every heartbeat.
    pub fn shutdown(&self) {
        let drained: Vec<(u64, Subscriber)> = self.inner.registry().drain().collect();
        for (_, sub) in &drained {
            sub.heartbeat.abort();
        }
        tracing::info!(closed = drained.len(), "sync channel shut down");
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry().len()
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            subscribers: self.subscriber_count(),
            heartbeats_sent: self.inner.heartbeats_sent.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

fn spawn_heartbeat(
    id: u64,
    tx: mpsc::Sender<PushMessage>,
    registry: Weak<Inner>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let Some(inner) = registry.upgrade() else {
                return;
            };
            match tx.try_send(PushMessage::heartbeat()) {
                Ok(()) => {
                    inner.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(subscriber_id = id, "heartbeat sent");
                }
                Err(TrySendError::Full(_)) => {
                    inner.dropped.fetch_add(1, Ordering::Relaxed);
                    inner.remove(id, "queue overflow");
                    return;
                }
                Err(TrySendError::Closed(_)) => {
                    inner.remove(id, "receiver closed");
                    return;
                }
            }
        }
    })
}

/// The receiving end of one subscriber. Dropping it disconnects.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<PushMessage>,
    registry: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next message, or `None` once the subscriber has been closed.
    pub async fn recv(&mut self) -> Option<PushMessage> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = PushMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(self.id, "disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_changeset::{NewTask, Task, TaskKind};
    use tokio::time::{sleep, timeout};

    const INTERVAL: Duration = Duration::from_millis(30);

    fn channel(buffer: usize) -> SyncChannel {
        SyncChannel::new(SyncChannelConfig {
            heartbeat_interval: INTERVAL,
            buffer,
        })
    }

    fn task_update() -> PushMessage {
        PushMessage::TaskUpdate(Task::new(NewTask::new(TaskKind::Feature, "x")))
    }

    #[tokio::test(start_paused = true)]
    async fn first_message_is_connection_established() {
        let channel = channel(8);
        let mut sub = channel.subscribe();
        let first = sub.recv().await.unwrap();
        assert_eq!(first.event_type(), "connection_established");
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_every_interval_on_idle_subscriber() {
        let channel = channel(8);
        let mut sub = channel.subscribe();
        sub.recv().await.unwrap();

        for _ in 0..3 {
            let msg = timeout(INTERVAL + Duration::from_millis(5), sub.recv())
                .await
                .expect("heartbeat within one interval")
                .unwrap();
            assert_eq!(msg.event_type(), "heartbeat");
        }
        assert_eq!(channel.stats().heartbeats_sent, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_after_disconnect() {
        let channel = channel(8);
        let mut sub = channel.subscribe();
        sub.recv().await.unwrap();
        sub.recv().await.unwrap();
        let sent = channel.stats().heartbeats_sent;
        assert_eq!(sent, 1);

        drop(sub);
        assert_eq!(channel.subscriber_count(), 0);

        sleep(INTERVAL + INTERVAL / 2).await;
        assert_eq!(channel.stats().heartbeats_sent, sent);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_fans_out_to_every_subscriber() {
        let channel = channel(8);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        a.recv().await.unwrap();
        b.recv().await.unwrap();

        assert_eq!(channel.publish(task_update()), 2);
        assert_eq!(a.recv().await.unwrap().event_type(), "task_update");
        assert_eq!(b.recv().await.unwrap().event_type(), "task_update");
    }

    #[tokio::test(start_paused = true)]
    async fn full_subscriber_is_closed_without_stalling_others() {
        let channel = channel(2);
        let mut slow = channel.subscribe();
        let mut fast = channel.subscribe();
        fast.recv().await.unwrap();

        // slow still holds connection_established; two more publishes overflow it.
        assert_eq!(channel.publish(task_update()), 2);
        fast.recv().await.unwrap();
        assert_eq!(channel.publish(task_update()), 1);
        fast.recv().await.unwrap();

        let stats = channel.stats();
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.dropped, 1);

        // The closed subscriber drains what it had and then ends.
        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_some());
        let end = timeout(Duration::from_millis(10), slow.recv()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_everyone() {
        let channel = channel(8);
        let _a = channel.subscribe();
        let _b = channel.subscribe();
        channel.shutdown();
        assert_eq!(channel.subscriber_count(), 0);
        sleep(INTERVAL * 2).await;
        assert_eq!(channel.stats().heartbeats_sent, 0);
    }
}
