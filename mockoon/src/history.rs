use crate::{
    data::{LogMessage, Transaction},
    error::Error,
};
use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only record of everything the server logged during a session.
///
/// Cloning shares the same underlying history: the log stream processor
/// appends through its clone while tests read and reset through theirs.
#[derive(Debug, Clone, Default)]
pub struct TransactionHistory {
    log_messages: Arc<Mutex<Vec<LogMessage>>>,
}

impl TransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, log_message: LogMessage) -> Result<(), Error> {
        self.log_messages.lock()?.push(log_message);
        Ok(())
    }

    pub fn reset(&self) -> Result<(), Error> {
        self.log_messages.lock()?.clear();
        Ok(())
    }

    pub fn log_messages(&self) -> Vec<LogMessage> {
        self.lock().clone()
    }

    /// Transactions in the order the server logged them.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock()
            .iter()
            .filter_map(|log_message| log_message.transaction.clone())
            .collect()
    }

    // Appends are single pushes, so a poisoned history is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<LogMessage>> {
        self.log_messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
