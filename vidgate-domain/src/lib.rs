//! Core types, admission planning, and coordination primitives for the
//! Vidgate video ingest server.
//!
//! This crate defines the vocabulary of the system. The server crate depends
//! on `vidgate-domain` and speaks its types. No network I/O lives here.
//!
//! # Structure
//!
//! - [`error`]     — [`VidGateError`] and [`Result<T>`] alias
//! - [`request`]   — [`SubRequest`], [`ReadyAnnouncement`]
//! - [`admission`] — [`AdmissionPlan`] and the capacity-splitting planner
//! - [`queue`]     — [`WorkQueue`], the bounded FIFO workers pop from
//! - [`ready`]     — [`ReadyQueue`], the worker→control rendezvous queue
//! - [`pool`]      — [`WorkerPool`] status table ([`WorkerStatus`])

mod admission;
mod error;
mod pool;
mod queue;
mod ready;
mod request;

// --- error
pub use error::{Result, VidGateError};

// --- request
pub use request::{ReadyAnnouncement, SubRequest};

// --- admission
pub use admission::{plan, AdmissionPlan};

// --- queue
pub use queue::WorkQueue;

// --- ready
pub use ready::ReadyQueue;

// --- pool
pub use pool::{WorkerPool, WorkerStatus};
