//! Queues between case handles, dispatchers, the timer and event subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{CaseflowError, Result};

/// Bounded flume queue with a single logical consumer.
///
/// Every case owns one as its command queue: `Case` handles and the timer
/// service push, the case's dispatcher pops. The engine also uses one to
/// learn about terminated cases.
pub struct Queue<T> {
    receiver: flume::Receiver<T>,
    sender: flume::Sender<T>,
}

impl<T> Queue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, receiver) = flume::bounded(cap);
        Arc::new(Self {
            receiver,
            sender,
        })
    }

    /// Blocks while the queue is full.
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send(msg).map_err(|e| CaseflowError::Queue(e.to_string()))
    }

    /// Fails instead of waiting when the queue is full. Safe to call from
    /// synchronous event handlers running on the runtime.
    pub fn try_send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| CaseflowError::Queue(e.to_string()))
    }

    pub async fn send_async(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send_async(msg).await.map_err(|e| CaseflowError::Queue(e.to_string()))
    }

    /// Pops a message if one is queued.
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Fan-out queue: every subscriber sees every case event.
///
/// Backed by tokio's broadcast channel, so a slow subscriber lags and skips
/// instead of holding back the dispatchers.
pub struct BroadcastQueue<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> BroadcastQueue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(cap);
        Arc::new(Self {
            sender,
        })
    }

    /// Publishes a message. Fails when nobody is subscribed.
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send(msg).map_err(|e| CaseflowError::Queue(e.to_string()))?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_queue() {
        let queue = Queue::new(2);
        queue.send(1).unwrap();
        queue.try_send(2).unwrap();
        assert!(matches!(queue.try_send(3), Err(CaseflowError::Queue(_))));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_next(), Some(1));
        assert_eq!(queue.try_next(), Some(2));
        assert!(queue.is_empty());
        assert_eq!(queue.try_next(), None);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let queue = BroadcastQueue::new(4);
        assert!(queue.send("lost").is_err());

        let mut first = queue.subscribe();
        let mut second = queue.subscribe();
        queue.send("fired").unwrap();
        assert_eq!(first.recv().await.unwrap(), "fired");
        assert_eq!(second.recv().await.unwrap(), "fired");
    }
}
