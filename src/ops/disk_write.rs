use super::{filled_buffer, SENTINEL};
use crate::error::{BenchError, Result};
use crate::pool::{WorkerContext, WorkerOperation};
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

/// Durable sequential writes, one private file per worker.
///
/// Every block is synced to the device before the next one is written, so
/// the timing covers persisted I/O rather than the page cache.
#[derive(Debug, Clone)]
pub struct DiskWriteOp {
    folder: PathBuf,
    times: u64,
    size_in_bytes: usize,
}

impl DiskWriteOp {
    /// Make sure `folder` exists (creating it with mode 0700 if needed).
    pub fn prepare(folder: &Path, times: u64, size_in_bytes: usize) -> Result<Self> {
        ensure_folder(folder)?;
        Ok(Self {
            folder: folder.to_path_buf(),
            times,
            size_in_bytes,
        })
    }

    /// File written by worker `index`.
    pub fn file_for(&self, index: usize) -> PathBuf {
        self.folder.join(format!("disk_w.out.{}", index))
    }

    fn open(&self, path: &Path) -> Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        options.open(path).map_err(|source| BenchError::Open {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn ensure_folder(folder: &Path) -> Result<()> {
    match fs::metadata(folder) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(BenchError::NotAFolder {
            path: folder.to_path_buf(),
        }),
        Err(_) => {
            info!("Creating folder {}", folder.display());
            let mut builder = DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o700);
            builder
                .create(folder)
                .map_err(|source| BenchError::CreateFolder {
                    path: folder.to_path_buf(),
                    source,
                })
        }
    }
}

impl WorkerOperation for DiskWriteOp {
    fn name(&self) -> &'static str {
        "disk_w"
    }

    fn run_worker(&self, ctx: &WorkerContext<'_>) -> Result<f64> {
        let path = self.file_for(ctx.index);
        let buffer = filled_buffer(self.size_in_bytes, SENTINEL)?;
        let mut file = self.open(&path)?;
        debug!(
            "Worker #{} writing {} blocks of {} bytes to {}",
            ctx.index,
            self.times,
            self.size_in_bytes,
            path.display()
        );

        let start = Instant::now();
        let written = write_blocks(&mut file, &path, &buffer, self.times, ctx);
        let elapsed = start.elapsed().as_secs_f64();

        drop(file);
        let removed = fs::remove_file(&path).map_err(|source| BenchError::io(&path, source));
        written?;
        removed?;
        Ok(elapsed)
    }
}

fn write_blocks(
    file: &mut File,
    path: &Path,
    buffer: &[u8],
    times: u64,
    ctx: &WorkerContext<'_>,
) -> Result<()> {
    for iteration in 0..times {
        ctx.check()?;
        let written = file
            .write(buffer)
            .map_err(|source| BenchError::io(path, source))?;
        if written != buffer.len() {
            return Err(BenchError::ShortWrite {
                path: path.to_path_buf(),
                expected: buffer.len(),
                written,
            });
        }
        file.sync_all().map_err(|source| BenchError::Flush {
            path: path.to_path_buf(),
            iteration,
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;

    #[test]
    fn test_disk_write_creates_folder_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("bench");
        let op = DiskWriteOp::prepare(&folder, 4, 4096).unwrap();
        assert!(folder.is_dir());

        let results = WorkerPool::new(2).run(&op).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!op.file_for(0).exists());
        assert!(!op.file_for(1).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_write_folder_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("fresh");
        DiskWriteOp::prepare(&folder, 1, 1).unwrap();
        let mode = fs::metadata(&folder).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_disk_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let op = DiskWriteOp::prepare(dir.path(), 2, 512).unwrap();
        fs::write(op.file_for(0), b"stale content").unwrap();

        WorkerPool::new(1).run(&op).unwrap();
        assert!(!op.file_for(0).exists());
    }

    #[test]
    fn test_disk_write_rejects_plain_file_as_folder() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = DiskWriteOp::prepare(file.path(), 1, 1).unwrap_err();
        assert!(matches!(err, BenchError::NotAFolder { .. }));
    }
}
