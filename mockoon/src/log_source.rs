use std::{
    fmt::Debug,
    fs::{File, Metadata},
    io::{self, Read, Seek, SeekFrom},
    path::PathBuf,
    time::SystemTime,
};

/// Where the log lines of a running server come from.
pub enum LogSource {
    /// Standard output of a live process, e.g. `docker logs -f`. Ends when the output closes.
    Stream(Box<dyn Read + Send>),
    /// An append-only file that mockoon-cli keeps writing to.
    File(PathBuf),
}

impl Debug for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSource::Stream(_) => write!(f, "LogSource::Stream"),
            LogSource::File(path) => write!(f, "LogSource::File({})", path.display()),
        }
    }
}

/// Incremental reader over a growing file.
///
/// Remembers how far it has read so that every complete line is returned
/// exactly once. A trailing line without its newline is held back until the
/// rest of it arrives.
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
    identity: Option<FileIdentity>,
}

impl FileTail {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            pending: Vec::new(),
            identity: None,
        }
    }

    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut file = File::open(&self.path)?;
        let metadata = file.metadata()?;
        let identity = FileIdentity::of(&metadata);

        if metadata.len() < self.offset || self.identity.map_or(false, |last| last != identity) {
            // truncated or recreated
            self.offset = 0;
            self.pending.clear();
        }
        self.identity = Some(identity);

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buffer = Vec::new();
        let read = file.read_to_end(&mut buffer)?;
        self.offset += read as u64;
        self.pending.extend_from_slice(&buffer);

        let complete = match self.pending.iter().rposition(|byte| *byte == b'\n') {
            Some(position) => position + 1,
            None => return Ok(Vec::new()),
        };
        let rest = self.pending.split_off(complete);
        let lines = String::from_utf8_lossy(&self.pending)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect();
        self.pending = rest;

        Ok(lines)
    }
}

/// Distinguishes a file from a later one created at the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileIdentity {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    #[allow(dead_code)]
    Created(Option<SystemTime>),
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        FileIdentity::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    #[cfg(not(unix))]
    fn of(metadata: &Metadata) -> Self {
        FileIdentity::Created(metadata.created().ok())
    }
}
