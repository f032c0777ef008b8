//! The rendezvous queue bridging worker readiness back to control
//! connections.
//!
//! Workers publish one [`ReadyAnnouncement`] per sub-request they pop;
//! control connections drain announcements FIFO, one per sub-request they
//! reported as assigned or queued. When several control connections wait
//! concurrently, whichever blocked first is served first — announcements
//! are matched by arrival order, never by id.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

// ---

use super::request::ReadyAnnouncement;

// ---------------------------------------------------------------------------
// ReadyQueue
// ---------------------------------------------------------------------------

pub struct ReadyQueue {
    // ---
    inner: Mutex<VecDeque<ReadyAnnouncement>>,
    not_empty: Notify,
}

// ---

impl ReadyQueue {
    // ---

    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
        }
    }

    // ---

    /// Publish one announcement and wake one blocked waiter.
    pub async fn publish(&self, announcement: ReadyAnnouncement) {
        // ---
        self.inner.lock().await.push_back(announcement);
        self.not_empty.notify_one();
    }

    // ---

    /// Block until an announcement is available, then pop the oldest one.
    pub async fn wait(&self) -> ReadyAnnouncement {
        // ---
        loop {
            {
                let mut queue = self.inner.lock().await;
                if let Some(announcement) = queue.pop_front() {
                    return announcement;
                }
            }
            self.not_empty.notified().await;
        }
    }
}

// ---

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::ReadyQueue;
    use crate::ReadyAnnouncement;

    // ---

    fn ann(id: usize, port: u16) -> ReadyAnnouncement {
        ReadyAnnouncement {
            sub_request_id: id,
            port,
            video_count: 1,
        }
    }

    // ---

    #[tokio::test]
    async fn announcements_drain_in_arrival_order() {
        // ---
        let ready = ReadyQueue::new();
        ready.publish(ann(7, 9001)).await;
        ready.publish(ann(0, 9002)).await;

        // Arrival order, not id order.
        assert_eq!(ready.wait().await.sub_request_id, 7);
        assert_eq!(ready.wait().await.sub_request_id, 0);
    }

    // ---

    #[tokio::test]
    async fn publish_wakes_a_blocked_waiter() {
        // ---
        let ready = Arc::new(ReadyQueue::new());

        let waiter = {
            let ready = Arc::clone(&ready);
            tokio::spawn(async move { ready.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        ready.publish(ann(3, 9100)).await;

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter should not panic");
        assert_eq!(got.port, 9100);
    }
}
