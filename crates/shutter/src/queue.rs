//! Outbound queue shared by the producer, the protocol handler and the sender.

use crate::message::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Unbounded FIFO of messages waiting to be transmitted.
///
/// `enqueue` never blocks and never fails. `dequeue` hands each message to
/// exactly one caller.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: Mutex<VecDeque<Message>>,
    available: Notify,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail.
    pub fn enqueue(&self, message: Message) {
        let depth = {
            let mut pending = self.pending.lock();
            pending.push_back(message);
            pending.len()
        };
        self.available.notify_one();
        debug!(depth, "Enqueued message");
    }

    /// Put a message that could not be delivered back at the tail.
    ///
    /// Messages queued after it will be attempted first.
    pub fn requeue(&self, message: Message) {
        debug!(kind = message.kind(), "Re-queueing message for retry");
        self.enqueue(message);
    }

    /// Take the head message, waiting up to `wait` for one to arrive.
    ///
    /// Returns `None` on timeout.
    pub async fn dequeue(&self, wait: Duration) -> Option<Message> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(message) = self.pending.lock().pop_front() {
                return Some(message);
            }

            // A permit stored by an earlier `notify_one` wakes this immediately,
            // so an enqueue between the check above and this wait is not lost.
            if timeout_at(deadline, self.available.notified()).await.is_err() {
                return self.pending.lock().pop_front();
            }
        }
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ack(name: &str) -> Message {
        Message::ack(name)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = OutboundQueue::new();
        queue.enqueue(ack("a"));
        queue.enqueue(ack("b"));
        queue.enqueue(ack("c"));

        assert_eq!(queue.len(), 3);
        for name in ["a", "b", "c"] {
            let message = queue.dequeue(Duration::from_millis(10)).await;
            assert_eq!(message, Some(ack(name)));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_times_out_when_empty() {
        let queue = OutboundQueue::new();
        let started = std::time::Instant::now();

        assert!(queue.dequeue(Duration::from_millis(50)).await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_requeue_goes_to_tail() {
        let queue = OutboundQueue::new();
        queue.enqueue(ack("m"));
        queue.enqueue(ack("x"));

        let first = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        queue.requeue(first);
        queue.enqueue(ack("n"));

        let order: Vec<_> = [
            queue.dequeue(Duration::from_millis(10)).await,
            queue.dequeue(Duration::from_millis(10)).await,
            queue.dequeue(Duration::from_millis(10)).await,
        ]
        .into_iter()
        .flatten()
        .collect();
        assert_eq!(order, vec![ack("x"), ack("m"), ack("n")]);
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(OutboundQueue::new());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(ack("late"));

        let received = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("dequeue should wake promptly")
            .unwrap();
        assert_eq!(received, Some(ack("late")));
    }

    #[tokio::test]
    async fn test_concurrent_consumers_never_share_a_message() {
        let queue = Arc::new(OutboundQueue::new());
        for i in 0..200 {
            queue.enqueue(ack(&i.to_string()));
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(message) = queue.dequeue(Duration::from_millis(20)).await {
                    taken.push(message);
                }
                taken
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }

        assert_eq!(all.len(), 200);
        let mut names: Vec<_> = all
            .into_iter()
            .map(|m| match m {
                Message::Ack { filename } => filename.unwrap(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 200);
    }
}
