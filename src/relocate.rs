// src/relocate.rs

//! Moving images into the library
//!
//! A move is a plain rename when source and destination share a volume. When
//! the rename fails because they don't, the file is streamed across with
//! throttled [`CopyProgress`] reports and the source is removed once the copy
//! is complete. A failed copy never leaves a partial destination behind.

use crate::error::{Error, Outcome, Result};
use crate::progress::{CopyProgress, ProgressEvent, ProgressSink};
use async_trait::async_trait;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Buffer size for cross-volume copies
const COPY_CHUNK_BYTES: usize = 1024 * 1024;

/// Minimum time between copy progress reports
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Successful move
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Moved {
    pub new_path: PathBuf,
}

/// Same-volume rename primitive
#[async_trait]
pub trait Rename: Send + Sync {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Filesystem rename
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRename;

#[async_trait]
impl Rename for FsRename {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }
}

/// Whether a rename failed only because the paths are on different volumes
pub fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

/// Final path for a move: into `destination` when it is a directory
///
/// A destination that does not exist yet is taken as the file path; any
/// other failure to inspect it is an error.
pub async fn resolve_destination(source: &Path, destination: &Path) -> Result<PathBuf> {
    let is_dir = match tokio::fs::metadata(destination).await {
        Ok(meta) => meta.is_dir(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            return Err(Error::IoError(format!(
                "Failed to inspect destination {}: {e}",
                destination.display()
            )));
        }
    };
    if !is_dir {
        return Ok(destination.to_path_buf());
    }

    let name = source.file_name().ok_or_else(|| {
        Error::IoError(format!("Source has no file name: {}", source.display()))
    })?;
    Ok(destination.join(name))
}

/// Move `source` to `destination` with the filesystem rename
pub async fn move_file(source: &Path, destination: &Path, sink: &dyn ProgressSink) -> Result<Moved> {
    move_file_with(&FsRename, source, destination, sink).await
}

/// Move `source` to `destination` using `renamer` for the fast path
pub async fn move_file_with(
    renamer: &dyn Rename,
    source: &Path,
    destination: &Path,
    sink: &dyn ProgressSink,
) -> Result<Moved> {
    let meta = match tokio::fs::metadata(source).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFoundError(format!(
                "Source file not found: {}",
                source.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let target = resolve_destination(source, destination).await?;
    if target == source {
        debug!(target: "relocate", "{} is already in place", source.display());
        return Ok(Moved { new_path: target });
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }

    match renamer.rename(source, &target).await {
        Ok(()) => {
            info!(target: "relocate", "Moved {} -> {}", source.display(), target.display());
        }
        Err(e) if is_cross_device(&e) => {
            info!(
                target: "relocate",
                "{} is on another volume, copying {} bytes",
                source.display(),
                meta.len()
            );
            copy_across(source, &target, meta.len(), sink).await?;
            tokio::fs::remove_file(source).await.map_err(|e| {
                Error::IoError(format!(
                    "Copied to {} but could not remove {}: {e}",
                    target.display(),
                    source.display()
                ))
            })?;
        }
        Err(e) => {
            return Err(Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                source.display(),
                target.display()
            )));
        }
    }

    Ok(Moved { new_path: target })
}

/// Stream `source` into `target`, removing `target` on failure
async fn copy_across(source: &Path, target: &Path, total: u64, sink: &dyn ProgressSink) -> Result<()> {
    let result = stream_copy(source, target, total, sink).await;
    if let Err(e) = &result {
        warn!(target: "relocate", "Copy to {} failed: {}", target.display(), e);
        if let Err(cleanup) = tokio::fs::remove_file(target).await
            && cleanup.kind() != io::ErrorKind::NotFound
        {
            warn!(target: "relocate", "Could not remove partial {}: {}", target.display(), cleanup);
        }
    }
    result
}

async fn stream_copy(source: &Path, target: &Path, total: u64, sink: &dyn ProgressSink) -> Result<()> {
    let reader = tokio::fs::File::open(source).await?;
    let mut writer = tokio::fs::File::create(target).await?;
    copy_with_progress(reader, &mut writer, total, sink).await?;
    writer.sync_all().await?;
    Ok(())
}

/// Copy `reader` into `writer`, reporting at most once per
/// [`REPORT_INTERVAL`] plus once at the end
async fn copy_with_progress<R, W>(
    mut reader: R,
    writer: &mut W,
    total: u64,
    sink: &dyn ProgressSink,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    let report = sink.wants_progress();

    let started = Instant::now();
    let mut last_report = started;
    let mut copied: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        copied = (copied + n as u64).min(total);

        if report && last_report.elapsed() >= REPORT_INTERVAL {
            last_report = Instant::now();
            sink.emit(ProgressEvent::Copy(CopyProgress::new(
                copied,
                total,
                started.elapsed().as_secs_f64(),
            )));
        }
    }
    writer.flush().await?;

    if report {
        sink.emit(ProgressEvent::Copy(CopyProgress::new(
            copied,
            total,
            started.elapsed().as_secs_f64(),
        )));
    }
    Ok(copied)
}

/// [`move_file`] as a uniform outcome
pub async fn relocate(source: &Path, destination: &Path, sink: &dyn ProgressSink) -> Outcome<Moved> {
    move_file(source, destination, sink).await.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CallbackProgress, SilentProgress};
    use std::sync::{Arc, Mutex};

    /// Rename that always fails with a fixed error kind
    struct FailingRename(io::ErrorKind);

    #[async_trait]
    impl Rename for FailingRename {
        async fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Err(io::Error::from(self.0))
        }
    }

    #[tokio::test]
    async fn test_same_volume_rename_into_directory() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("game.iso");
        std::fs::write(&source, b"image").unwrap();
        let dvd = temp.path().join("DVD");
        std::fs::create_dir(&dvd).unwrap();

        let moved = move_file(&source, &dvd, &SilentProgress).await.unwrap();
        assert_eq!(moved.new_path, dvd.join("game.iso"));
        assert!(!source.exists());
        assert_eq!(std::fs::read(dvd.join("game.iso")).unwrap(), b"image");
    }

    #[tokio::test]
    async fn test_missing_parent_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("game.iso");
        std::fs::write(&source, b"image").unwrap();
        let target = temp.path().join("lib").join("DVD").join("renamed.iso");

        let moved = move_file(&source, &target, &SilentProgress).await.unwrap();
        assert_eq!(moved.new_path, target);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_cross_volume_copy_reports_and_removes_source() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("big.iso");
        let data: Vec<u8> = (0..3 * COPY_CHUNK_BYTES + 123).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &data).unwrap();
        let target = temp.path().join("other").join("big.iso");

        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let sink = CallbackProgress::new(move |e| captured.lock().unwrap().push(e));

        let renamer = FailingRename(io::ErrorKind::CrossesDevices);
        let moved = move_file_with(&renamer, &source, &target, &sink).await.unwrap();

        assert_eq!(moved.new_path, target);
        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), data);

        let events = events.lock().unwrap();
        let Some(ProgressEvent::Copy(last)) = events.last() else {
            panic!("expected a final copy report, got {events:?}");
        };
        assert_eq!(last.percent, 100.0);
        assert_eq!(last.total_mb, last.copied_mb);
    }

    #[tokio::test]
    async fn test_other_rename_errors_propagate() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("game.iso");
        std::fs::write(&source, b"image").unwrap();
        let target = temp.path().join("out.iso");

        let renamer = FailingRename(io::ErrorKind::PermissionDenied);
        let err = move_file_with(&renamer, &source, &target, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
        assert!(source.exists());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp = tempfile::tempdir().unwrap();
        let outcome = relocate(
            &temp.path().join("nope.iso"),
            temp.path(),
            &SilentProgress,
        )
        .await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().starts_with("Source file not found"));
    }

    #[tokio::test]
    async fn test_move_onto_itself_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("game.iso");
        std::fs::write(&source, b"image").unwrap();

        let moved = move_file(&source, temp.path(), &SilentProgress).await.unwrap();
        assert_eq!(moved.new_path, source);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_failed_copy_removes_partial_target_and_keeps_source() {
        let temp = tempfile::tempdir().unwrap();
        // Opening works on unix but reading a directory fails mid-copy
        let source = temp.path().join("Game.iso");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("track.bin"), b"data").unwrap();
        let target = temp.path().join("other").join("Game.iso");

        let renamer = FailingRename(io::ErrorKind::CrossesDevices);
        let result = move_file_with(&renamer, &source, &target, &SilentProgress).await;

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(source.join("track.bin").exists());
    }

    #[tokio::test]
    async fn test_copy_reports_at_most_once_per_second() {
        const PIECE: usize = 256 * 1024;
        const PIECES: usize = 12;

        let (mut tx, rx) = tokio::io::duplex(64 * 1024);
        let feeder = tokio::spawn(async move {
            for _ in 0..PIECES {
                tx.write_all(&[0x5Au8; PIECE]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
        });

        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let sink = CallbackProgress::new(move |e| captured.lock().unwrap().push(e));

        let started = Instant::now();
        let mut out = tokio::io::sink();
        let copied = copy_with_progress(rx, &mut out, (PIECE * PIECES) as u64, &sink)
            .await
            .unwrap();
        let elapsed = started.elapsed().as_secs_f64();
        feeder.await.unwrap();

        assert_eq!(copied, (PIECE * PIECES) as u64);
        let reports: Vec<CopyProgress> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Copy(p) => Some(*p),
                _ => None,
            })
            .collect();

        // Throttled reports during a multi-second copy, plus the final one
        assert!(reports.len() >= 2, "{reports:?}");
        assert!(reports.len() as f64 <= elapsed + 1.0, "{} reports in {elapsed}s", reports.len());
        let throttled = &reports[..reports.len() - 1];
        assert!(throttled.windows(2).all(|w| w[1].elapsed - w[0].elapsed >= 0.9));
        assert_eq!(reports.last().unwrap().percent, 100.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_uninspectable_destination_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("game.iso");
        std::fs::write(&source, b"image").unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();

        let err = resolve_destination(&source, &file.join("game.iso")).await.unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().starts_with("Failed to inspect destination"));

        let missing = temp.path().join("new").join("game.iso");
        assert_eq!(resolve_destination(&source, &missing).await.unwrap(), missing);
    }
}
