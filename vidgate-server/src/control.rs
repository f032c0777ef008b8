//! Control-plane connection handling.
//!
//! One task per accepted control connection. The loop reads commands until
//! the producer disconnects or sends `exit`. A `requestThreads` command is
//! split positionally into sub-requests, run through admission, answered
//! with the assigned/queued id lists, and then followed by one readiness
//! announcement per admitted sub-request.
//!
//! Announcements are drained from a single global queue shared by every
//! control connection, matched by arrival order rather than by id. With
//! concurrent producers an announcement can therefore be delivered to a
//! connection whose sub-request it does not describe; each announcement
//! carries its port and video count precisely so the recipient can act on
//! it regardless.

use std::sync::Arc;

use tokio::net::TcpStream;

// ---

use vidgate_domain::{ReadyQueue, Result, VidGateError, WorkQueue, WorkerPool};

use crate::framing::{self, AdmissionReply, Command, ReadyReply};

// ---------------------------------------------------------------------------
// ControlContext
// ---------------------------------------------------------------------------

/// Shared state a control connection needs, cloned per accepted connection.
#[derive(Clone)]
pub struct ControlContext {
    // ---
    pub queue: Arc<WorkQueue>,
    pub ready: Arc<ReadyQueue>,
    pub pool: Arc<WorkerPool>,
}

// ---------------------------------------------------------------------------
// handle_control_connection
// ---------------------------------------------------------------------------

/// Serve one control connection to completion.
pub async fn handle_control_connection(ctx: ControlContext, mut stream: TcpStream) -> Result<()> {
    // ---
    // Workers bind their data-plane listeners on the address the producer
    // reached this server on, so the announced ports are reachable over
    // the same path as the control connection.
    let producer_ip = stream.local_addr()?.ip();

    loop {
        let command = match framing::read_command(&mut stream).await? {
            Some(command) => command,
            None => return Ok(()), // producer hung up between frames
        };

        match command {
            // ---
            Command::RequestThreads { video_counts } => {
                let free_workers = ctx.pool.free_count().await;
                let plan = ctx.queue.admit(producer_ip, &video_counts, free_workers).await;

                tracing::info!(
                    sub_requests = video_counts.len(),
                    assigned = plan.assigned.len(),
                    queued = plan.queued.len(),
                    free_workers,
                    "admission decided"
                );

                let reply = AdmissionReply {
                    assigned: plan.assigned_ids(),
                    queued: plan.queued_ids(),
                };
                framing::write_message(&mut stream, &reply).await?;

                for _ in 0..plan.expected_announcements() {
                    let announcement = ctx.ready.wait().await;
                    framing::write_message(
                        &mut stream,
                        &ReadyReply {
                            id: announcement.sub_request_id,
                            port: announcement.port,
                            video_count: announcement.video_count,
                        },
                    )
                    .await?;
                }
            }

            // ---
            Command::Exit => return Ok(()),

            // ---
            Command::SendFile { .. } => {
                return Err(VidGateError::Protocol(
                    "sendFile is only valid on a data-plane connection".into(),
                ));
            }
        }
    }
}
