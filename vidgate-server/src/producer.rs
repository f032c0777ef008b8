//! Producer-side protocol client.
//!
//! Used by the end-to-end tests and the `e2e_test` binary to drive a
//! running server the way a real producer would. Follows the ack rules
//! from [`crate::framing`]: one `OK` is consumed after every frame or body
//! sent, and server replies are never acked.

use std::net::IpAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

// ---

use vidgate_domain::Result;

use crate::framing::{self, AdmissionReply, Command, DuplicateReply, ReadyReply};

// ---------------------------------------------------------------------------
// ProducerClient (control plane)
// ---------------------------------------------------------------------------

pub struct ProducerClient {
    // ---
    stream: TcpStream,
}

// ---

impl ProducerClient {
    // ---

    pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    // ---

    /// The local interface this client reached the server from. Workers
    /// bind data-plane listeners on the server-side twin of this address.
    pub fn server_ip(&self) -> Result<IpAddr> {
        Ok(self.stream.peer_addr()?.ip())
    }

    // ---

    /// Send `requestThreads` with one entry per sub-request and return the
    /// admission verdict.
    pub async fn request_threads(&mut self, video_counts: &[u64]) -> Result<AdmissionReply> {
        // ---
        framing::write_message(
            &mut self.stream,
            &Command::RequestThreads {
                video_counts: video_counts.to_vec(),
            },
        )
        .await?;
        framing::read_ack(&mut self.stream).await?;
        framing::read_message(&mut self.stream).await
    }

    // ---

    /// Block for the next readiness announcement on this connection.
    pub async fn next_announcement(&mut self) -> Result<ReadyReply> {
        framing::read_message(&mut self.stream).await
    }

    // ---

    /// Send `exit` and drop the connection.
    pub async fn exit(mut self) -> Result<()> {
        // ---
        framing::write_message(&mut self.stream, &Command::Exit).await?;
        framing::read_ack(&mut self.stream).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DataPlaneClient
// ---------------------------------------------------------------------------

pub struct DataPlaneClient {
    // ---
    stream: TcpStream,
}

// ---

impl DataPlaneClient {
    // ---

    pub async fn connect(ip: IpAddr, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((ip, port)).await?;
        Ok(Self { stream })
    }

    // ---

    /// One full `sendFile` exchange. Returns whether the server already
    /// held the content (in which case the body was not sent).
    pub async fn send_file(&mut self, hash: &str, filename: &str, body: &[u8]) -> Result<bool> {
        // ---
        framing::write_message(
            &mut self.stream,
            &Command::SendFile {
                size: body.len() as u64,
                hash: hash.to_string(),
                filename: filename.to_string(),
            },
        )
        .await?;
        framing::read_ack(&mut self.stream).await?;

        let reply: DuplicateReply = framing::read_message(&mut self.stream).await?;
        if reply.is_duplicate {
            return Ok(true);
        }

        self.stream.write_all(body).await?;
        framing::read_ack(&mut self.stream).await?;
        Ok(false)
    }
}
