use crate::error::Error;
use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex},
    time::Duration,
};

pub const READY_EVENT: &str = "ready";

/// Substring of the message mockoon-cli logs once it is listening.
pub const SERVER_STARTED_PREFIX: &str = "Server started on port ";

/// Label posted when a transaction on `route` has been logged.
///
/// Routes are logged with a leading slash; callers may pass them with or without one.
pub fn route_event<S: AsRef<str>>(route: S) -> String {
    format!("/{}", route.as_ref().trim_start_matches('/'))
}

/// Unbounded queue of event labels, written by the log stream processor.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<String>>,
    available: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post<S: Into<String>>(&self, label: S) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push_back(label.into());
        self.available.notify_one();
    }

    /// Pops the oldest event, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<String>, Error> {
        let events = self.events.lock()?;
        let (mut events, _) = self
            .available
            .wait_timeout_while(events, timeout, |events| events.is_empty())?;

        Ok(events.pop_front())
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
