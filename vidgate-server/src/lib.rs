//! Vidgate ingest daemon internals.
//!
//! The daemon accepts producer control connections on one TCP port, splits
//! each `requestThreads` command into positional sub-requests, and hands
//! them to a fixed pool of worker tasks. Each worker serves one data-plane
//! session per sub-request: a dedicated listener, announced back to the
//! producer, carrying exactly the admitted number of `sendFile` transfers
//! into the content store. Newly stored files are transcoded by an external
//! program, fire-and-forget.
//!
//! Coordination primitives (queue, ready queue, pool) live in
//! `vidgate-domain`; this crate owns all I/O.

mod config;
mod control;
mod framing;
mod producer;
mod server;
mod store;
mod transcode;
mod worker;

// Gateway re-exports
pub use config::{Config, ConfigError};
pub use framing::{
    // ---
    read_ack,
    read_command,
    read_frame,
    read_message,
    send_ack,
    write_frame,
    write_message,
    AdmissionReply,
    Command,
    DuplicateReply,
    ReadyReply,
};
pub use producer::{DataPlaneClient, ProducerClient};
pub use server::Server;
pub use store::ContentStore;
pub use transcode::Transcoder;
