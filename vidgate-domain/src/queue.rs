//! The shared work queue: a capacity-bounded FIFO of [`SubRequest`] with a
//! blocking pop for worker tasks.
//!
//! Capacity is measured in total video count, not in sub-requests. Admission
//! and capacity accounting happen under one lock so the queued total can
//! never overshoot under concurrent control connections. Assigned
//! sub-requests bypass the capacity bound — free workers drain them
//! immediately, so they only transit the queue.

use std::collections::VecDeque;
use std::net::IpAddr;

use tokio::sync::{Mutex, Notify};

// ---

use super::admission::{self, AdmissionPlan};
use super::request::SubRequest;

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// Mutex-protected FIFO with a not-empty notification.
///
/// Producers are control connections ([`WorkQueue::admit`]); consumers are
/// worker tasks ([`WorkQueue::pop`]). Each push wakes exactly one blocked
/// popper.
pub struct WorkQueue {
    // ---
    inner: Mutex<VecDeque<SubRequest>>,

    /// Signalled once per pushed sub-request.
    not_empty: Notify,

    /// Maximum total video count across queued (not assigned) sub-requests.
    max_videos: u64,
}

// ---

impl WorkQueue {
    // ---

    pub fn new(max_videos: u64) -> Self {
        // ---
        Self {
            inner: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
            max_videos,
        }
    }

    // ---

    /// Admit one `requestThreads` command: plan the split against the
    /// current occupancy, then push assigned and queued sub-requests in
    /// order, all under the queue lock.
    ///
    /// Occupancy is read before the assigned pushes; assigned sub-requests
    /// do not consume capacity since an idle worker pops each one straight
    /// away.
    pub async fn admit(
        &self,
        producer_ip: IpAddr,
        video_counts: &[u64],
        free_workers: usize,
    ) -> AdmissionPlan {
        // ---
        let mut queue = self.inner.lock().await;

        let occupied: u64 = queue.iter().map(|s| s.video_count).sum();
        let space_remaining = self.max_videos.saturating_sub(occupied);

        let plan = admission::plan(producer_ip, video_counts, free_workers, space_remaining);

        for sub in plan.assigned.iter().chain(plan.queued.iter()) {
            queue.push_back(sub.clone());
            self.not_empty.notify_one();
        }

        plan
    }

    // ---

    /// Block until the queue is non-empty, then pop the front sub-request.
    pub async fn pop(&self) -> SubRequest {
        // ---
        loop {
            {
                let mut queue = self.inner.lock().await;
                if let Some(sub) = queue.pop_front() {
                    return sub;
                }
            }
            self.not_empty.notified().await;
        }
    }

    // ---

    /// Total video count currently sitting in the queue.
    pub async fn queued_videos(&self) -> u64 {
        self.inner.lock().await.iter().map(|s| s.video_count).sum()
    }

    // ---

    /// Number of sub-requests currently sitting in the queue.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    // ---

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
