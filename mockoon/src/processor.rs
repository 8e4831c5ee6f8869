use crate::{
    data::LogMessage,
    error::Error,
    events::{route_event, EventQueue, READY_EVENT, SERVER_STARTED_PREFIX},
    history::TransactionHistory,
    log_source::{FileTail, LogSource},
    watcher::PathWatcher,
};
use std::{
    io::{BufRead, BufReader, Read},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

// Upper bound on how long a waiter goes without re-checking the processor is alive.
const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Background thread turning raw log lines into history entries and events.
#[derive(Debug)]
pub struct LogStreamProcessor {
    history: TransactionHistory,
    events: Arc<EventQueue>,
    stop_requested: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl LogStreamProcessor {
    pub fn new(history: TransactionHistory, poll_interval: Duration) -> Self {
        Self {
            history,
            events: Arc::new(EventQueue::new()),
            stop_requested: Arc::new(AtomicBool::new(false)),
            join_handle: None,
            poll_interval,
        }
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(false, |join_handle| !join_handle.is_finished())
    }

    /// Starts processing `source` on a new thread. Does nothing if already running.
    pub fn start(&mut self, source: LogSource) -> Result<(), Error> {
        if self.is_running() {
            debug!("log stream processor already running");
            return Ok(());
        }

        self.join();
        self.stop_requested.store(false, Ordering::SeqCst);
        self.events.clear();

        let history = self.history.clone();
        let events = self.events.clone();
        let stop_requested = self.stop_requested.clone();
        let poll_interval = self.poll_interval;

        info!(source = ?source, "starting log stream processor");
        let join_handle = thread::Builder::new()
            .name(String::from("mockoon-log-stream"))
            .spawn(move || {
                let pipeline = Pipeline {
                    history,
                    events,
                    stop_requested,
                };
                match source {
                    LogSource::Stream(reader) => pipeline.follow_stream(reader),
                    LogSource::File(path) => pipeline.follow_file(path, poll_interval),
                }
            })?;
        self.join_handle = Some(join_handle);

        Ok(())
    }

    /// Asks the thread to finish without waiting for it.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Asks the thread to finish and waits until it has.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    fn join(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                warn!("log stream thread panicked");
            }
        }
    }

    /// Consumes events until `label` arrives. Other events are discarded.
    pub fn wait_for(&self, label: &str, timeout: Duration) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::ProcessorNotRunning);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::WaitTimeout {
                    event: String::from(label),
                    timeout,
                });
            }

            match self
                .events
                .pop_timeout((deadline - now).min(LIVENESS_CHECK_INTERVAL))?
            {
                Some(event) if event == label => return Ok(()),
                Some(event) => debug!(event = %event, expected = %label, "discarding event"),
                None if !self.is_running() => return Err(Error::ProcessorNotRunning),
                None => {}
            }
        }
    }
}

impl Drop for LogStreamProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Pipeline {
    history: TransactionHistory,
    events: Arc<EventQueue>,
    stop_requested: Arc<AtomicBool>,
}

impl Pipeline {
    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn follow_stream(&self, reader: Box<dyn Read + Send>) {
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        while !self.stopping() {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    debug!("log stream closed");
                    break;
                }
                Ok(_) => self.process_line(&line),
                Err(e) => {
                    warn!(error = %e, "failed to read log stream");
                    break;
                }
            }
        }
    }

    fn follow_file(&self, path: PathBuf, poll_interval: Duration) {
        // Watch before the first read: anything appended in between shows up
        // as a modification, and the tail offset keeps it from being read twice.
        let mut watcher = PathWatcher::new(&path, poll_interval);
        let mut tail = FileTail::new(&path);
        self.drain(&mut tail);

        while !self.stopping() {
            if watcher.modified() {
                self.drain(&mut tail);
            }
            thread::sleep(poll_interval);
        }
    }

    fn drain(&self, tail: &mut FileTail) {
        match tail.read_new_lines() {
            Ok(lines) => lines.iter().for_each(|line| self.process_line(line)),
            Err(e) => warn!(error = %e, "failed to read log file"),
        }
    }

    fn process_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let log_message = match LogMessage::from_line(line) {
            Ok(log_message) => log_message,
            Err(e) => {
                warn!(error = %e, line = %line.trim(), "skipping log line");
                return;
            }
        };

        let route = log_message.transaction.as_ref().map(|transaction| {
            info!(
                method = %transaction.request.method,
                route = %transaction.request.route,
                status = transaction.response.status_code,
                "transaction received"
            );
            route_event(&transaction.request.route)
        });
        if route.is_none() {
            debug!(message = %log_message.message, "log message has no transaction");
        }
        let ready = log_message.message.contains(SERVER_STARTED_PREFIX);

        // history first, so a woken waiter already sees the entry
        if let Err(e) = self.history.append(log_message) {
            warn!(error = %e, "failed to record log message");
        }
        if let Some(route) = route {
            self.events.post(route);
        }
        if ready {
            self.events.post(READY_EVENT);
        }
    }
}
