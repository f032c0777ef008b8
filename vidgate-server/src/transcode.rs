//! Fire-and-forget transcoding of freshly stored files.
//!
//! Each newly ingested file is handed to an external transcoder (ffmpeg by
//! default) in a detached task. Nobody awaits the result: the worker moves
//! on to its next transfer immediately. The transcoder writes to a
//! temporary sibling of the source file and the source is replaced only on
//! a zero exit status, so a crashed or killed transcode never leaves a
//! half-written file under the final name.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Transcoder {
    // ---
    program: String,
}

// ---

impl Transcoder {
    // ---

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    // ---

    /// Kick off a transcode of `source` in a detached task and return
    /// immediately.
    pub fn spawn(&self, source: PathBuf) {
        // ---
        let program = self.program.clone();
        tokio::spawn(async move {
            if let Err(e) = run_transcode(&program, &source).await {
                tracing::warn!(path = %source.display(), error = %e, "transcode failed");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// run_transcode
// ---------------------------------------------------------------------------

/// Transcode `source` in place via a temporary sibling file.
async fn run_transcode(program: &str, source: &Path) -> std::io::Result<()> {
    // ---
    let mut tmp = source.as_os_str().to_owned();
    tmp.push(".transcoding.mp4");
    let tmp = PathBuf::from(tmp);

    let status = Command::new(program)
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(source)
        .arg("-vf")
        .arg("scale=1280:720")
        .arg("-c:v")
        .arg("libx264")
        .arg("-preset")
        .arg("fast")
        .arg("-c:a")
        .arg("aac")
        .arg(&tmp)
        .stdin(Stdio::null())
        .status()
        .await?;

    if status.success() {
        tokio::fs::rename(&tmp, source).await?;
        tracing::info!(path = %source.display(), "transcode complete");
    } else {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(std::io::Error::other(format!(
            "transcoder exited with {status}"
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::run_transcode;

    // ---

    /// A transcoder that cannot even start must leave the source file
    /// exactly as it was.
    #[tokio::test]
    async fn failed_transcode_leaves_the_original_intact() {
        // ---
        let dir = std::env::temp_dir().join(format!("vidgate-transcode-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("aaaaclip.mp4");
        std::fs::write(&source, b"source bytes").unwrap();

        let err = run_transcode("/nonexistent/vidgate-transcoder", &source)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);

        assert_eq!(std::fs::read(&source).unwrap(), b"source bytes");
        assert!(!dir.join("aaaaclip.mp4.transcoding.mp4").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
