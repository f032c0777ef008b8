//! Daemon configuration for `vidgate-server`.
//!
//! Every option has an environment-variable fallback so deployments can
//! configure the daemon through the environment alone:
//!
//! ```text
//! vidgate-server --video-directory /srv/videos \
//!                [--bound-addr 0.0.0.0] [--port 7005] \
//!                [--num-threads 4] [--max-queue-length 16] \
//!                [--worker-ports 7006,7007,7008,7009]
//! ```
//!
//! All invariants are checked by [`Config::validate`] before the server
//! starts; a bad configuration is fatal.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

pub const MAX_NUM_THREADS: usize = 256;
pub const MAX_QUEUE_LENGTH_LIMIT: u64 = 256;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    // ---
    #[error("BOUND_ADDR is not a valid IP address or `localhost`, got \"{0}\"")]
    InvalidBoundAddr(String),

    #[error("VIDEO_DIRECTORY is not a directory, got \"{0}\"")]
    NotADirectory(String),

    #[error("NUM_CONSUMER_THREADS must be between 1 and {MAX_NUM_THREADS}, found {0}")]
    BadThreadCount(usize),

    #[error("MAX_QUEUE_LENGTH must be at most {MAX_QUEUE_LENGTH_LIMIT}, found {0}")]
    BadQueueLength(u64),

    #[error("WORKER_PORTS lists {got} ports but NUM_CONSUMER_THREADS is {expected}")]
    WorkerPortCountMismatch { got: usize, expected: usize },

    #[error("WORKER_PORTS contains duplicate port {0}")]
    DuplicateWorkerPort(u16),

    #[error("WORKER_PORTS contains the control port {0}")]
    WorkerPortIsControlPort(u16),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Parser)]
#[command(name = "vidgate-server", about = "Vidgate video ingest daemon")]
pub struct Config {
    // ---
    /// Address to bind the control listener on. An IP address or `localhost`.
    #[arg(long, env = "BOUND_ADDR", default_value = "127.0.0.1")]
    pub bound_addr: String,

    /// Control listener port.
    #[arg(long, env = "PORT", default_value_t = 7005)]
    pub port: u16,

    /// Directory where ingested videos are stored. Must already exist.
    #[arg(long, env = "VIDEO_DIRECTORY")]
    pub video_directory: PathBuf,

    /// Number of long-lived worker tasks serving data-plane sessions.
    #[arg(long, env = "NUM_CONSUMER_THREADS", default_value_t = 4)]
    pub num_threads: usize,

    /// Queue capacity, measured in total video count across queued
    /// sub-requests (not in sub-requests).
    #[arg(long, env = "MAX_QUEUE_LENGTH", default_value_t = 16)]
    pub max_queue_length: u64,

    /// Explicit per-worker data-plane ports, comma separated. When omitted
    /// each worker binds an OS-assigned ephemeral port. When given, the
    /// list length must equal --num-threads.
    #[arg(long, env = "WORKER_PORTS", value_delimiter = ',')]
    pub worker_ports: Vec<u16>,

    /// Seconds a worker waits for the producer to dial an announced
    /// data-plane port, and per-frame read budget inside a session.
    #[arg(long, env = "DATA_TIMEOUT_SECS", default_value_t = 30)]
    pub data_timeout_secs: u64,

    /// External transcoder program invoked per ingested file.
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,
}

// ---

impl Config {
    // ---

    /// Check every startup invariant. Called by `Server::start`; a failure
    /// here must abort the process with a non-zero exit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // ---
        if self.bind_ip().is_none() {
            return Err(ConfigError::InvalidBoundAddr(self.bound_addr.clone()));
        }

        if !self.video_directory.is_dir() {
            return Err(ConfigError::NotADirectory(
                self.video_directory.to_string_lossy().into_owned(),
            ));
        }

        if self.num_threads == 0 || self.num_threads > MAX_NUM_THREADS {
            return Err(ConfigError::BadThreadCount(self.num_threads));
        }

        if self.max_queue_length > MAX_QUEUE_LENGTH_LIMIT {
            return Err(ConfigError::BadQueueLength(self.max_queue_length));
        }

        if !self.worker_ports.is_empty() {
            if self.worker_ports.len() != self.num_threads {
                return Err(ConfigError::WorkerPortCountMismatch {
                    got: self.worker_ports.len(),
                    expected: self.num_threads,
                });
            }

            let mut seen = HashSet::new();
            for &port in &self.worker_ports {
                if port == self.port {
                    return Err(ConfigError::WorkerPortIsControlPort(port));
                }
                if !seen.insert(port) {
                    return Err(ConfigError::DuplicateWorkerPort(port));
                }
            }
        }

        Ok(())
    }

    // ---

    /// Resolve `bound_addr` to an IP, accepting `localhost` as loopback.
    pub fn bind_ip(&self) -> Option<IpAddr> {
        // ---
        if self.bound_addr == "localhost" {
            return Some(IpAddr::from([127, 0, 0, 1]));
        }
        self.bound_addr.parse().ok()
    }

    // ---

    /// The statically configured data-plane port for `worker_id`, or `None`
    /// when workers bind ephemeral ports.
    pub fn worker_port(&self, worker_id: usize) -> Option<u16> {
        self.worker_ports.get(worker_id).copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Config, ConfigError};

    // ---

    fn base_config() -> Config {
        // ---
        Config {
            bound_addr: "127.0.0.1".into(),
            port: 7005,
            video_directory: std::env::temp_dir(),
            num_threads: 4,
            max_queue_length: 16,
            worker_ports: Vec::new(),
            data_timeout_secs: 30,
            ffmpeg_path: "ffmpeg".into(),
        }
    }

    // ---

    #[test]
    fn default_shape_validates() {
        base_config().validate().expect("base config should pass");
    }

    // ---

    #[test]
    fn localhost_resolves_to_loopback() {
        // ---
        let mut cfg = base_config();
        cfg.bound_addr = "localhost".into();
        assert_eq!(cfg.bind_ip(), Some([127, 0, 0, 1].into()));
        cfg.validate().expect("localhost should be accepted");
    }

    // ---

    #[test]
    fn bad_address_rejected() {
        // ---
        let mut cfg = base_config();
        cfg.bound_addr = "not-an-address".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBoundAddr(_))
        ));
    }

    // ---

    #[test]
    fn missing_directory_rejected() {
        // ---
        let mut cfg = base_config();
        cfg.video_directory = PathBuf::from("/definitely/not/a/real/dir");
        assert!(matches!(cfg.validate(), Err(ConfigError::NotADirectory(_))));
    }

    // ---

    #[test]
    fn thread_count_range_enforced() {
        // ---
        let mut cfg = base_config();
        cfg.num_threads = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::BadThreadCount(0))));

        cfg.num_threads = 257;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BadThreadCount(257))
        ));
    }

    // ---

    #[test]
    fn queue_length_range_enforced() {
        // ---
        let mut cfg = base_config();
        cfg.max_queue_length = 257;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BadQueueLength(257))
        ));

        // Zero is a legal (nothing-ever-queues) configuration.
        cfg.max_queue_length = 0;
        cfg.validate().expect("zero queue length should be legal");
    }

    // ---

    #[test]
    fn worker_port_invariants_enforced() {
        // ---
        let mut cfg = base_config();

        cfg.worker_ports = vec![7006, 7007];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WorkerPortCountMismatch {
                got: 2,
                expected: 4
            })
        ));

        cfg.worker_ports = vec![7006, 7007, 7007, 7008];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateWorkerPort(7007))
        ));

        cfg.worker_ports = vec![7006, 7007, 7005, 7008];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WorkerPortIsControlPort(7005))
        ));

        cfg.worker_ports = vec![7006, 7007, 7008, 7009];
        cfg.validate().expect("distinct non-control ports should pass");
    }
}
