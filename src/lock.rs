//! Single-flight guard for a full run.
//!
//! The active and archive directories are shared by every run, so two runs
//! racing on the same snapshot could move a file the other is deleting. A run
//! holds an exclusive advisory lock on a file in the active directory from
//! before its retention scan until its last mutation. The kernel drops the
//! lock when the holder exits, so a crashed run never blocks the next one.
//!
//! The lock file itself stays on disk between runs. Removing it on release
//! would let a waiter lock an unlinked inode while a third run creates a
//! fresh file.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BackupError, Result};

pub const LOCK_FILE_NAME: &str = ".dumpkeeper.lock";
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Takes the lock in `dir`, waiting up to `wait` for another run to finish.
    pub fn acquire(dir: &Path, wait: Duration) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| BackupError::io(format!("failed to create {}", dir.display()), e))?;

        let path = dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| BackupError::io(format!("failed to open run lock {}", path.display()), e))?;
        let deadline = Instant::now() + wait;

        loop {
            match file.try_lock() {
                Ok(()) => break,
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(BackupError::RunInProgress { lock_path: path });
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(TryLockError::Error(e)) => {
                    return Err(BackupError::io(
                        format!("failed to acquire run lock {}", path.display()),
                        e,
                    ));
                }
            }
        }

        // holder pid is informational only, a failed write still holds the lock
        if let Err(e) = write_pid(&mut file) {
            debug!(lock = %path.display(), "failed to record pid in run lock: {e}");
        }
        debug!(lock = %path.display(), "acquired run lock");

        Ok(RunLock { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_pid(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), "failed to release run lock: {e}");
        }
    }
}
