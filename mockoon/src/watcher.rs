use crate::error::Error;
use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant, SystemTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

/// Polling watcher for a single path.
///
/// Offers the two things log tailing needs: waiting for the path to be
/// created and noticing that it was modified since the last check.
#[derive(Debug)]
pub struct PathWatcher {
    path: PathBuf,
    interval: Duration,
    last: Option<Snapshot>,
}

impl PathWatcher {
    pub fn new<P: Into<PathBuf>>(path: P, interval: Duration) -> Self {
        let path = path.into();
        let last = snapshot(&path);

        Self {
            path,
            interval,
            last,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the watched path exists as a file, or fails once `timeout` has elapsed.
    pub fn wait_for_creation(&self, timeout: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.path.is_file() {
                tracing::info!(path = %self.path.display(), "log file has been created");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::SourceUnavailable(format!(
                    "Timeout reached. Server log file not created: {}",
                    self.path.display()
                )));
            }

            thread::sleep(self.interval.min(deadline - now));
        }
    }

    /// Returns true when the size or modification time changed since the previous call.
    pub fn modified(&mut self) -> bool {
        let current = snapshot(&self.path);
        if current == self.last {
            return false;
        }

        self.last = current;
        current.is_some()
    }
}

fn snapshot(path: &Path) -> Option<Snapshot> {
    let metadata = fs::metadata(path).ok()?;

    Some(Snapshot {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}
