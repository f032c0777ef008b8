//! Content-addressed video store.
//!
//! Files land in the configured video directory under the name
//! `<hash><filename>`. Whether an incoming file is already stored is
//! decided purely by hash prefix: if any existing file's name starts with
//! the incoming hash, the upload is a duplicate. The duplicate's body is
//! never read; instead the existing file is renamed so it carries the
//! newest producer-supplied filename.
//!
//! The hash is producer-supplied and trusted, never recomputed here. The
//! only inspection applied to `hash` and `filename` is that neither may
//! contain a path separator, so an upload cannot escape the store
//! directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ---

use vidgate_domain::{Result, VidGateError};

use crate::framing::{self, DuplicateReply, FILE_CHUNK_SIZE};

// ---------------------------------------------------------------------------
// ContentStore
// ---------------------------------------------------------------------------

pub struct ContentStore {
    // ---
    dir: PathBuf,
}

// ---

impl ContentStore {
    // ---

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // ---

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ---

    /// Find a stored file whose name starts with `hash`, if any.
    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<PathBuf>> {
        // ---
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(hash) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    // ---

    /// Serve one `sendFile` exchange on an open data-plane connection.
    ///
    /// Sends the duplicate-check reply, then either renames the existing
    /// file (duplicate, body not read, returns `None`) or streams `size`
    /// body bytes into a new file and acks the completed body (returns the
    /// stored path). Each chunk read gets `read_timeout`, so a producer
    /// that stalls mid-body cannot park the session indefinitely.
    ///
    /// On a failed or timed-out body read the partial file is removed
    /// before the error propagates.
    pub async fn receive<S>(
        &self,
        stream: &mut S,
        size: u64,
        hash: &str,
        filename: &str,
        read_timeout: Duration,
    ) -> Result<Option<PathBuf>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // ---
        if hash.is_empty() {
            return Err(VidGateError::Protocol("sendFile with empty hash".into()));
        }
        if hash.contains(['/', '\\']) || filename.contains(['/', '\\']) {
            return Err(VidGateError::Protocol(format!(
                "path separator in hash or filename: {hash:?} {filename:?}"
            )));
        }

        let existing = self.find_by_hash(hash).await?;
        let is_duplicate = existing.is_some();

        framing::write_message(stream, &DuplicateReply { is_duplicate }).await?;

        let target = self.dir.join(format!("{hash}{filename}"));

        if let Some(existing) = existing {
            // Same content, newest name wins. Nothing to read.
            if existing != target {
                tokio::fs::rename(&existing, &target).await?;
            }
            tracing::debug!(hash, filename, "duplicate upload, renamed existing file");
            return Ok(None);
        }

        if let Err(e) = self.read_body(stream, size, &target, read_timeout).await {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e);
        }

        framing::send_ack(stream).await?;
        tracing::debug!(hash, filename, size, "stored new file");
        Ok(Some(target))
    }

    // ---

    /// Stream exactly `size` raw bytes from the connection into `target`,
    /// 65536 bytes at a time, with a per-chunk read deadline.
    async fn read_body<R>(
        &self,
        stream: &mut R,
        size: u64,
        target: &Path,
        read_timeout: Duration,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        // ---
        let mut file = tokio::fs::File::create(target).await?;
        let mut remaining = size;
        let mut chunk = vec![0u8; FILE_CHUNK_SIZE];

        while remaining > 0 {
            let want = remaining.min(FILE_CHUNK_SIZE as u64) as usize;
            tokio::time::timeout(read_timeout, stream.read_exact(&mut chunk[..want]))
                .await
                .map_err(|_| VidGateError::Timeout("file body read timed out".into()))?
                .map_err(|e| VidGateError::Transport(format!("file body read: {e}")))?;
            file.write_all(&chunk[..want]).await?;
            remaining -= want as u64;
        }

        file.flush().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::ContentStore;
    use crate::framing::{self, DuplicateReply};

    // ---

    fn test_timeout() -> Duration {
        Duration::from_secs(5)
    }

    // ---

    fn temp_store_dir(tag: &str) -> PathBuf {
        // ---
        let dir = std::env::temp_dir().join(format!(
            "vidgate-store-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create temp store dir");
        dir
    }

    // ---

    #[tokio::test]
    async fn new_upload_lands_byte_for_byte() {
        // ---
        let dir = temp_store_dir("new");
        let store = ContentStore::new(&dir);
        let body = vec![0xA7u8; 70_000]; // spans two chunks

        let (mut producer, mut server) = tokio::io::duplex(1 << 20);

        let send = {
            let body = body.clone();
            tokio::spawn(async move {
                let reply: DuplicateReply = framing::read_message(&mut producer).await.unwrap();
                assert!(!reply.is_duplicate);
                producer.write_all(&body).await.unwrap();
                framing::read_ack(&mut producer).await.unwrap();
            })
        };

        let stored = store
            .receive(&mut server, body.len() as u64, "aaaa", "clip.mp4", test_timeout())
            .await
            .unwrap()
            .expect("new upload should return a path");
        send.await.unwrap();

        assert_eq!(stored, dir.join("aaaaclip.mp4"));
        assert_eq!(std::fs::read(&stored).unwrap(), body);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // ---

    #[tokio::test]
    async fn duplicate_renames_without_reading_a_body() {
        // ---
        let dir = temp_store_dir("dup");
        let store = ContentStore::new(&dir);
        std::fs::write(dir.join("bbbbold.mp4"), b"original bytes").unwrap();

        let (mut producer, mut server) = tokio::io::duplex(4096);

        let check = tokio::spawn(async move {
            let reply: DuplicateReply = framing::read_message(&mut producer).await.unwrap();
            assert!(reply.is_duplicate);
            // No body sent, no body ack expected.
        });

        let stored = store
            .receive(&mut server, 999, "bbbb", "new.mp4", test_timeout())
            .await
            .unwrap();
        check.await.unwrap();

        assert!(stored.is_none());
        assert!(!dir.join("bbbbold.mp4").exists());
        assert_eq!(
            std::fs::read(dir.join("bbbbnew.mp4")).unwrap(),
            b"original bytes"
        );
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // ---

    #[tokio::test]
    async fn truncated_body_removes_the_partial_file() {
        // ---
        let dir = temp_store_dir("partial");
        let store = ContentStore::new(&dir);

        let (mut producer, mut server) = tokio::io::duplex(4096);

        let send = tokio::spawn(async move {
            let reply: DuplicateReply = framing::read_message(&mut producer).await.unwrap();
            assert!(!reply.is_duplicate);
            // Promise 100 bytes, deliver 10, then hang up.
            producer.write_all(&[0u8; 10]).await.unwrap();
            drop(producer);
        });

        let err = store
            .receive(&mut server, 100, "cccc", "short.mp4", test_timeout())
            .await
            .unwrap_err();
        send.await.unwrap();

        assert!(err.to_string().contains("file body read"));
        assert!(!dir.join("ccccshort.mp4").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // ---

    #[tokio::test]
    async fn stalled_body_times_out_and_removes_the_partial_file() {
        // ---
        let dir = temp_store_dir("stall");
        let store = ContentStore::new(&dir);

        let (mut producer, mut server) = tokio::io::duplex(4096);

        let stall = tokio::spawn(async move {
            let reply: DuplicateReply = framing::read_message(&mut producer).await.unwrap();
            assert!(!reply.is_duplicate);
            // Promise 100 bytes, deliver 10, then go quiet with the
            // connection still open.
            producer.write_all(&[0u8; 10]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(producer);
        });

        let err = store
            .receive(
                &mut server,
                100,
                "eeee",
                "stall.mp4",
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        stall.await.unwrap();

        assert!(err.to_string().contains("timed out"));
        assert!(!dir.join("eeeestall.mp4").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // ---

    #[tokio::test]
    async fn path_separators_are_rejected_before_any_io() {
        // ---
        let dir = temp_store_dir("sep");
        let store = ContentStore::new(&dir);

        let (_producer, mut server) = tokio::io::duplex(4096);

        let err = store
            .receive(&mut server, 1, "dddd", "../escape.mp4", test_timeout())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path separator"));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
