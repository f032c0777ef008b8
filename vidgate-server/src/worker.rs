//! Long-lived worker tasks serving data-plane sessions.
//!
//! Each worker loops forever: block on the work queue, mark itself active,
//! serve exactly one sub-request's transfer session, mark itself idle
//! again. A session is one TCP connection carrying exactly `video_count`
//! `sendFile` exchanges; the worker binds a fresh listener per session,
//! announces readiness before accepting, and tears the listener down when
//! the count is reached.
//!
//! A failed session (bind error, producer timeout, protocol violation) is
//! logged and abandoned; the sub-request is not retried and the worker goes
//! straight back to the queue.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

// ---

use vidgate_domain::{
    ReadyAnnouncement, ReadyQueue, Result, SubRequest, VidGateError, WorkQueue, WorkerPool,
};

use crate::framing::{self, Command};
use crate::store::ContentStore;
use crate::transcode::Transcoder;

// ---------------------------------------------------------------------------
// WorkerContext
// ---------------------------------------------------------------------------

/// Everything one worker task needs, cloned per worker at startup.
#[derive(Clone)]
pub struct WorkerContext {
    // ---
    pub id: usize,
    pub queue: Arc<WorkQueue>,
    pub ready: Arc<ReadyQueue>,
    pub pool: Arc<WorkerPool>,
    pub store: Arc<ContentStore>,
    pub transcoder: Transcoder,

    /// Statically configured data-plane port, or `None` for an ephemeral
    /// OS-assigned port per session.
    pub data_port: Option<u16>,

    /// Accept and per-frame read budget within a session.
    pub data_timeout: Duration,
}

// ---------------------------------------------------------------------------
// run_worker
// ---------------------------------------------------------------------------

/// The worker main loop. Runs until the task is aborted at shutdown.
pub async fn run_worker(ctx: WorkerContext) {
    // ---
    loop {
        let sub = ctx.queue.pop().await;
        ctx.pool.set_active(ctx.id).await;

        if let Err(e) = serve_assignment(&ctx, &sub).await {
            tracing::warn!(
                worker = ctx.id,
                sub_request_id = sub.sub_request_id,
                error = %e,
                "data-plane session failed"
            );
        }

        ctx.pool.set_idle(ctx.id).await;
    }
}

// ---------------------------------------------------------------------------
// serve_assignment
// ---------------------------------------------------------------------------

/// Bind, announce, accept, then serve exactly `video_count` transfers.
///
/// If the bind itself fails, the popped sub-request produces no readiness
/// announcement at all; the control connection waiting on it stays blocked
/// until the producer gives up. Known gap on this error path.
async fn serve_assignment(ctx: &WorkerContext, sub: &SubRequest) -> Result<()> {
    // ---
    let bind_addr = SocketAddr::new(sub.producer_ip, ctx.data_port.unwrap_or(0));
    let listener = TcpListener::bind(bind_addr).await?;
    let port = listener.local_addr()?.port();

    tracing::info!(
        worker = ctx.id,
        sub_request_id = sub.sub_request_id,
        port,
        video_count = sub.video_count,
        "data-plane listener ready"
    );

    // Announce only after the listener is live, so a producer that dials
    // the announced port immediately cannot beat the bind.
    ctx.ready
        .publish(ReadyAnnouncement {
            sub_request_id: sub.sub_request_id,
            port,
            video_count: sub.video_count,
        })
        .await;

    let (stream, peer) = tokio::time::timeout(ctx.data_timeout, listener.accept())
        .await
        .map_err(|_| {
            VidGateError::Timeout(format!(
                "no producer connected to port {port} within {:?}",
                ctx.data_timeout
            ))
        })??;
    drop(listener); // one connection per session

    tracing::debug!(worker = ctx.id, %peer, "data-plane connection accepted");

    serve_session(ctx, stream, sub.video_count).await
}

// ---

/// Consume exactly `video_count` `sendFile` exchanges, then end the session.
async fn serve_session(ctx: &WorkerContext, mut stream: TcpStream, video_count: u64) -> Result<()> {
    // ---
    for _ in 0..video_count {
        let command = tokio::time::timeout(ctx.data_timeout, framing::read_command(&mut stream))
            .await
            .map_err(|_| VidGateError::Timeout("data-plane frame read timed out".into()))??;

        match command {
            // ---
            Some(Command::SendFile {
                size,
                hash,
                filename,
            }) => {
                let stored = ctx
                    .store
                    .receive(&mut stream, size, &hash, &filename, ctx.data_timeout)
                    .await?;
                if let Some(path) = stored {
                    ctx.transcoder.spawn(path);
                }
            }

            // ---
            Some(other) => {
                return Err(VidGateError::Protocol(format!(
                    "expected sendFile on data-plane connection, got {other:?}"
                )));
            }

            // ---
            None => {
                return Err(VidGateError::Transport(
                    "producer closed the data-plane connection mid-session".into(),
                ));
            }
        }
    }

    Ok(())
}
