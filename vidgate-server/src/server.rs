//! Server assembly: bind the control listener, spawn the worker pool, and
//! accept control connections until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ---

use vidgate_domain::{ReadyQueue, Result, VidGateError, WorkQueue, WorkerPool};

use crate::config::Config;
use crate::control::{self, ControlContext};
use crate::store::ContentStore;
use crate::transcode::Transcoder;
use crate::worker::{self, WorkerContext};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A running Vidgate server: one control listener plus `num_threads`
/// worker tasks. Dropping the handle leaves the tasks running; call
/// [`Server::shutdown`] to stop them.
pub struct Server {
    // ---
    local_addr: SocketAddr,
    worker_handles: Vec<JoinHandle<()>>,
    accept_handle: JoinHandle<()>,
}

// ---

impl Server {
    // ---

    /// Validate `config`, bind the control listener, and spawn the worker
    /// tasks and the accept loop.
    pub async fn start(config: Config) -> Result<Server> {
        // ---
        config
            .validate()
            .map_err(|e| VidGateError::Config(e.to_string()))?;

        let bind_ip = config
            .bind_ip()
            .ok_or_else(|| VidGateError::Config(format!("unresolvable bind address {}", config.bound_addr)))?;
        let listener = TcpListener::bind(SocketAddr::new(bind_ip, config.port)).await?;
        let local_addr = listener.local_addr()?;

        let queue = Arc::new(WorkQueue::new(config.max_queue_length));
        let ready = Arc::new(ReadyQueue::new());
        let pool = Arc::new(WorkerPool::new(config.num_threads));
        let store = Arc::new(ContentStore::new(&config.video_directory));
        let transcoder = Transcoder::new(&config.ffmpeg_path);
        let data_timeout = Duration::from_secs(config.data_timeout_secs);

        let mut worker_handles = Vec::with_capacity(config.num_threads);
        for id in 0..config.num_threads {
            let ctx = WorkerContext {
                id,
                queue: Arc::clone(&queue),
                ready: Arc::clone(&ready),
                pool: Arc::clone(&pool),
                store: Arc::clone(&store),
                transcoder: transcoder.clone(),
                data_port: config.worker_port(id),
                data_timeout,
            };
            worker_handles.push(tokio::spawn(worker::run_worker(ctx)));
        }

        tracing::info!(
            addr = %local_addr,
            workers = config.num_threads,
            queue_capacity = config.max_queue_length,
            video_directory = %config.video_directory.display(),
            "vidgate server listening"
        );

        let ctx = ControlContext { queue, ready, pool };
        let accept_handle = tokio::spawn(accept_loop(listener, ctx));

        Ok(Server {
            local_addr,
            worker_handles,
            accept_handle,
        })
    }

    // ---

    /// The bound control address, useful when the configured port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // ---

    /// Abort the accept loop and every worker task.
    pub fn shutdown(self) {
        // ---
        self.accept_handle.abort();
        for handle in self.worker_handles {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// accept_loop
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, ctx: ControlContext) {
    // ---
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "control connection accepted");
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = control::handle_control_connection(ctx, stream).await {
                        tracing::warn!(%peer, error = %e, "control connection ended with error");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "control accept failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
