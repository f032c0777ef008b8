//! Worker status table.
//!
//! Exactly `num_workers` slots exist for the lifetime of the process; none
//! are created or destroyed after startup. Each worker owns its own slot's
//! transitions: idle → active on pop, active → idle when its data-plane
//! session ends.
//!
//! The free count read by the admission controller is a point-in-time
//! snapshot; it is not atomic with the subsequent queue push. Transient
//! over- or under-assignment relative to true availability is tolerated.

use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// WorkerStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Active,
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

pub struct WorkerPool {
    // ---
    slots: Mutex<Vec<WorkerStatus>>,
}

// ---

impl WorkerPool {
    // ---

    /// Create a pool of `num_workers` slots, all idle.
    pub fn new(num_workers: usize) -> Self {
        Self {
            slots: Mutex::new(vec![WorkerStatus::Idle; num_workers]),
        }
    }

    // ---

    /// Point-in-time count of idle workers.
    pub async fn free_count(&self) -> usize {
        self.slots
            .lock()
            .await
            .iter()
            .filter(|s| **s == WorkerStatus::Idle)
            .count()
    }

    // ---

    pub async fn set_active(&self, worker_id: usize) {
        self.slots.lock().await[worker_id] = WorkerStatus::Active;
    }

    // ---

    pub async fn set_idle(&self, worker_id: usize) {
        self.slots.lock().await[worker_id] = WorkerStatus::Idle;
    }

    // ---

    pub async fn status(&self, worker_id: usize) -> WorkerStatus {
        self.slots.lock().await[worker_id]
    }

    // ---

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    // ---

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
