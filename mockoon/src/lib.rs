mod assertion;
mod data;
mod error;
mod events;
mod history;
mod log_source;
mod mockoon_configuration;
mod mockoon_server;
mod processor;
mod util;
mod watcher;

pub use assertion::{RequestProperties, TransactionAssertion};
pub use data::{LogMessage, Request, Response, Transaction};
pub use error::Error;
pub use events::{route_event, EventQueue, READY_EVENT, SERVER_STARTED_PREFIX};
pub use history::TransactionHistory;
pub use log_source::{FileTail, LogSource};
pub use mockoon_codegen::mockoon_test;
pub use mockoon_configuration::{
    slugify, Definition, MockoonConfiguration, DEFAULT_CONTAINER_NAME, DEFAULT_DOCKER_EXECUTABLE,
    DEFAULT_EXECUTABLE, DEFAULT_IMAGE, DEFAULT_LOG_FILE_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_WAIT_TIMEOUT,
};
pub use mockoon_server::{MockoonServer, ServerState};
pub use processor::LogStreamProcessor;
pub use util::find_executable;
pub use watcher::PathWatcher;
