use std::net::IpAddr;

// ---------------------------------------------------------------------------
// SubRequest
// ---------------------------------------------------------------------------

/// One producer-declared batch of videos awaiting a dedicated data-plane
/// session.
///
/// Created when a `requestThreads` command is parsed; consumed once a worker
/// has served it end-to-end. `sub_request_id` is the positional index of the
/// batch within its originating command, so ids are only unique per command,
/// never globally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    // ---
    /// Address the producer reached the control listener on. The worker
    /// binds its data-plane listener here so the producer can dial back.
    pub producer_ip: IpAddr,

    /// Positional index within the originating `requestThreads` command.
    pub sub_request_id: usize,

    /// Number of `sendFile` transfers the data-plane session will carry.
    /// May be smaller than the producer asked for if the batch was truncated
    /// to fit the remaining queue capacity.
    pub video_count: u64,
}

// ---------------------------------------------------------------------------
// ReadyAnnouncement
// ---------------------------------------------------------------------------

/// Emitted by a worker immediately after its data-plane listener is bound
/// and listening, before it accepts.
///
/// Exactly one announcement is produced per [`SubRequest`] ever popped from
/// the work queue. Announcements are drained FIFO by whichever control
/// connection is currently waiting — first worker ready, first served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyAnnouncement {
    // ---
    pub sub_request_id: usize,

    /// Actual bound port of the data-plane listener (resolved from the OS
    /// when the worker uses an ephemeral port).
    pub port: u16,

    pub video_count: u64,
}
