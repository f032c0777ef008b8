//! Wire framing for the Vidgate control and data-plane protocols.
//!
//! Every message is a length-prefixed JSON frame:
//!
//! ```text
//! +--------------------+-------------------------+
//! | length (i64)       | payload (length bytes)  |
//! | little-endian      | UTF-8 JSON              |
//! +--------------------+-------------------------+
//!        8 bytes              variable
//! ```
//!
//! # Acknowledgement asymmetry
//!
//! The ack model is asymmetric and both ends must preserve it exactly or
//! they desynchronize:
//!
//! - The **server** writes the two literal bytes `OK` after every frame it
//!   reads and after every completed file body. It never waits for an ack
//!   on frames it sends.
//! - The **producer** consumes one `OK` after every frame or body it sends.
//!   It never acks frames it reads from the server.
//!
//! File bodies are raw bytes with no framing of their own; the `sendFile`
//! header frame carries their length.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ---

use vidgate_domain::{Result, VidGateError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length prefix size: one signed 64-bit integer.
pub const FRAME_HEADER_LEN: usize = 8;

/// The fixed two-byte acknowledgement written by frame receivers.
pub const ACK: &[u8; 2] = b"OK";

/// Upper bound on a declared frame length. Control messages are small;
/// anything larger is a protocol violation, not a real frame.
pub const MAX_FRAME_LEN: i64 = 1024 * 1024;

/// File bodies are streamed in chunks of this size; the final chunk is the
/// remainder.
pub const FILE_CHUNK_SIZE: usize = 65536;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Producer→server commands, tagged by the JSON `action` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Command {
    // ---
    /// Request data-plane sessions: one entry per sub-request, the index
    /// is the sub-request id.
    #[serde(rename = "requestThreads")]
    RequestThreads { video_counts: Vec<u64> },

    /// Announce one file transfer on a data-plane connection. `size` raw
    /// body bytes follow the duplicate-check reply (unless duplicate).
    #[serde(rename = "sendFile")]
    SendFile {
        size: u64,
        hash: String,
        filename: String,
    },

    /// Close the connection. No reply.
    #[serde(rename = "exit")]
    Exit,
}

// ---------------------------------------------------------------------------
// Server→producer replies
// ---------------------------------------------------------------------------

/// Reply to `requestThreads`: which sub-request ids were assigned to free
/// workers and which were queued (possibly truncated, under their original
/// id). Dropped overflow ids appear in neither list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionReply {
    pub assigned: Vec<usize>,
    pub queued: Vec<usize>,
}

// ---

/// One readiness announcement: a worker has bound `port` and is about to
/// accept the data-plane connection for sub-request `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyReply {
    pub id: usize,
    pub port: u16,
    pub video_count: u64,
}

// ---

/// Per-file duplicate-check reply. When `is_duplicate` is true the producer
/// must not send the body; the server will not read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReply {
    pub is_duplicate: bool,
}

// ---------------------------------------------------------------------------
// read_frame / write_frame
// ---------------------------------------------------------------------------

/// Read one frame, returning `Ok(None)` on clean EOF at the length read.
///
/// EOF is detected by peeking a single byte before committing to the full
/// header, so a connection closed between frames ends the read loop
/// gracefully instead of erroring.
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    // ---
    let mut header = [0u8; FRAME_HEADER_LEN];

    match stream.read(&mut header[..1]).await {
        Ok(0) => return Ok(None), // clean EOF
        Ok(_) => {}
        Err(e) => return Err(VidGateError::Transport(format!("frame read header[0]: {e}"))),
    }

    stream
        .read_exact(&mut header[1..])
        .await
        .map_err(|e| VidGateError::Transport(format!("frame read header[1..]: {e}")))?;

    let declared = i64::from_le_bytes(header);
    if declared <= 0 {
        return Err(VidGateError::Protocol(format!(
            "frame length must be positive, got {declared}"
        )));
    }
    if declared > MAX_FRAME_LEN {
        return Err(VidGateError::Protocol(format!(
            "frame length {declared} exceeds max {MAX_FRAME_LEN}"
        )));
    }

    let mut payload = vec![0u8; declared as usize];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| VidGateError::Transport(format!("frame read payload: {e}")))?;

    Ok(Some(payload))
}

// ---

/// Write the 8-byte length then the payload. Never waits for an ack.
pub async fn write_frame<W>(stream: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // ---
    let len = payload.len() as i64;
    stream
        .write_all(&len.to_le_bytes())
        .await
        .map_err(|e| VidGateError::Transport(format!("frame write header: {e}")))?;
    stream
        .write_all(payload)
        .await
        .map_err(|e| VidGateError::Transport(format!("frame write payload: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Acks
// ---------------------------------------------------------------------------

/// Write the literal `OK` bytes. Server side, after every frame read and
/// every completed file body.
pub async fn send_ack<W>(stream: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream
        .write_all(ACK)
        .await
        .map_err(|e| VidGateError::Transport(format!("ack write: {e}")))?;
    Ok(())
}

// ---

/// Consume one `OK`. Producer side, after every frame or body it sent.
pub async fn read_ack<R>(stream: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    // ---
    let mut buf = [0u8; 2];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| VidGateError::Transport(format!("ack read: {e}")))?;
    if &buf != ACK {
        return Err(VidGateError::Protocol(format!(
            "expected OK ack, got {buf:?}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

/// Server-side command read: read one frame, ack it, then parse the JSON.
///
/// The ack goes out before the payload is processed, so a malformed payload
/// still gets acked and then terminates the session.
pub async fn read_command<S>(stream: &mut S) -> Result<Option<Command>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // ---
    let payload = match read_frame(stream).await? {
        Some(payload) => payload,
        None => return Ok(None),
    };

    send_ack(stream).await?;

    let command = serde_json::from_slice(&payload)
        .map_err(|e| VidGateError::Protocol(format!("malformed command: {e}")))?;
    Ok(Some(command))
}

// ---

/// Serialize `message` and send it as one frame. No ack is awaited.
pub async fn write_message<W, T>(stream: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    // ---
    let payload = serde_json::to_vec(message)
        .map_err(|e| VidGateError::Protocol(format!("serialize message: {e}")))?;
    write_frame(stream, &payload).await
}

// ---

/// Producer-side reply read: read one frame (no ack back) and parse it.
pub async fn read_message<R, T>(stream: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    // ---
    let payload = read_frame(stream)
        .await?
        .ok_or_else(|| VidGateError::Transport("connection closed awaiting reply".into()))?;
    serde_json::from_slice(&payload)
        .map_err(|e| VidGateError::Protocol(format!("malformed reply: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::io::BufReader;

    use super::*;

    // ---

    /// Round-trip: write a frame into a buffer, read it back, confirm the
    /// stream position lands exactly after the payload.
    #[tokio::test]
    async fn frame_round_trip() {
        // ---
        let mut buf: Vec<u8> = Vec::new();
        write_frame(&mut buf, b"{\"action\":\"exit\"}").await.unwrap();
        buf.extend_from_slice(b"trailing");

        let mut reader = BufReader::new(Cursor::new(buf));
        let payload = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(payload, b"{\"action\":\"exit\"}");

        let mut tail = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut tail)
            .await
            .unwrap();
        assert_eq!(tail, b"trailing");
    }

    // ---

    #[tokio::test]
    async fn clean_eof_returns_none() {
        // ---
        let mut reader = BufReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    // ---

    #[tokio::test]
    async fn negative_length_rejected() {
        // ---
        let mut buf = (-5_i64).to_le_bytes().to_vec();
        buf.extend_from_slice(b"xxxxx");
        let mut reader = BufReader::new(Cursor::new(buf));
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    // ---

    #[tokio::test]
    async fn oversized_length_rejected() {
        // ---
        let buf = (MAX_FRAME_LEN + 1).to_le_bytes().to_vec();
        let mut reader = BufReader::new(Cursor::new(buf));
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("exceeds max"));
    }

    // ---

    #[test]
    fn command_action_tags_match_the_wire_protocol() {
        // ---
        let cmd = Command::RequestThreads {
            video_counts: vec![3, 4],
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["action"], "requestThreads");
        assert_eq!(value["video_counts"][1], 4);

        let cmd: Command =
            serde_json::from_str(r#"{"action":"sendFile","size":9,"hash":"abc","filename":"v.mp4"}"#)
                .unwrap();
        assert!(matches!(cmd, Command::SendFile { size: 9, .. }));

        let cmd: Command = serde_json::from_str(r#"{"action":"exit"}"#).unwrap();
        assert!(matches!(cmd, Command::Exit));
    }

    // ---

    #[test]
    fn unknown_action_fails_to_parse() {
        // ---
        let parsed = serde_json::from_str::<Command>(r#"{"action":"reboot"}"#);
        assert!(parsed.is_err());
    }

    // ---

    #[tokio::test]
    async fn server_acks_each_command_before_processing() {
        // ---
        let (mut producer, mut server) = tokio::io::duplex(4096);

        write_message(&mut producer, &Command::Exit).await.unwrap();

        let cmd = read_command(&mut server).await.unwrap().unwrap();
        assert!(matches!(cmd, Command::Exit));

        // The producer finds exactly one OK waiting.
        read_ack(&mut producer).await.unwrap();
    }
}
