use crate::{
    assertion::TransactionAssertion,
    data::{LogMessage, Transaction},
    error::Error,
    events::{route_event, READY_EVENT},
    history::TransactionHistory,
    log_source::LogSource,
    mockoon_configuration::{slugify, Definition, MockoonConfiguration},
    processor::LogStreamProcessor,
    util,
    watcher::PathWatcher,
};
use std::{
    fs, io,
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
}

/// A mockoon-cli mock server, run as a local process or in a container.
///
/// The server is stopped when dropped, so a test that panics half way
/// still tears down the process and the log stream thread.
#[derive(Debug)]
pub struct MockoonServer {
    configuration: MockoonConfiguration,
    hostname: Option<String>,
    port: u16,
    process_name: String,
    state: ServerState,
    server_process: Option<Child>,
    log_process: Option<Child>,
    history: TransactionHistory,
    processor: LogStreamProcessor,
}

impl MockoonServer {
    pub fn new(configuration: MockoonConfiguration) -> Result<Self, Error> {
        let Definition {
            name,
            hostname,
            port,
        } = Definition::load(configuration.data_file())?;

        let required = if configuration.use_docker() {
            configuration.docker_executable()
        } else {
            configuration.executable()
        };
        if util::find_executable(required).is_none() {
            return Err(Error::ExecutableNotFound(String::from(required)));
        }

        let hostname = configuration
            .hostname()
            .cloned()
            .or(hostname)
            .filter(|hostname| !hostname.is_empty());
        let port = configuration.port().unwrap_or(port);
        let process_name = configuration
            .process_name()
            .cloned()
            .unwrap_or_else(|| slugify(&name));

        let history = TransactionHistory::new();
        let processor = LogStreamProcessor::new(history.clone(), configuration.poll_interval());

        Ok(Self {
            configuration,
            hostname,
            port,
            process_name,
            state: ServerState::Stopped,
            server_process: None,
            log_process: None,
            history,
            processor,
        })
    }

    pub fn configuration(&self) -> &MockoonConfiguration {
        &self.configuration
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn root_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// The file mockoon-cli logs to when running as a local process.
    pub fn log_file(&self) -> PathBuf {
        self.configuration
            .log_dir()
            .join(format!("mockoon-{}-out.log", self.process_name))
    }

    /// Program and arguments used to launch the server.
    pub fn mockoon_cli_command(&self) -> Vec<String> {
        let mut command = if self.configuration.use_docker() {
            let data_file = fs::canonicalize(self.configuration.data_file())
                .unwrap_or_else(|_| self.configuration.data_file().to_path_buf());

            vec![
                String::from(self.configuration.docker_executable()),
                String::from("run"),
                format!("--name={}", self.configuration.container_name()),
                String::from("-d"),
                String::from("--mount"),
                format!(
                    "type=bind,source={},target=/data,readonly",
                    data_file.display()
                ),
                String::from("-p"),
                format!("{}:{}", self.port, self.port),
                String::from(self.configuration.image()),
                String::from("--log-transaction"),
                String::from("--data"),
                String::from("data"),
            ]
        } else {
            vec![
                String::from(self.configuration.executable()),
                String::from("start"),
                String::from("--log-transaction"),
                String::from("--data"),
                self.configuration.data_file().display().to_string(),
            ]
        };

        if let Some(hostname) = &self.hostname {
            command.extend(vec![String::from("--hostname"), hostname.clone()]);
        }
        command.extend(vec![
            String::from("--pname"),
            self.process_name.clone(),
            String::from("--port"),
            self.port.to_string(),
        ]);
        if self.configuration.repair() {
            command.push(String::from("--repair"));
        }

        command
    }

    /// Starts the server and blocks until it reports it is listening.
    ///
    /// Any instance started earlier is stopped first. On failure everything
    /// started so far is torn down again before the error is returned.
    ///
    /// Transactions recorded before a restart are kept; call
    /// [`reset_transactions`](Self::reset_transactions) to start from an empty history.
    pub fn start(&mut self) -> Result<(), Error> {
        self.stop();

        self.state = ServerState::Starting;
        info!(process_name = %self.process_name, port = self.port, "starting mockoon server");

        match self.launch() {
            Ok(()) => {
                self.state = ServerState::Running;
                info!(root_uri = %self.root_uri(), "mockoon server is ready");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "mockoon server failed to start");
                self.stop();
                Err(e)
            }
        }
    }

    fn launch(&mut self) -> Result<(), Error> {
        self.pre_start();
        self.spawn_server()?;
        self.start_logging()?;

        self.wait_for_event(READY_EVENT, self.configuration.wait_timeout())
            .map_err(|e| match e {
                Error::WaitTimeout { .. } | Error::ProcessorNotRunning => {
                    Error::StartupFailure(e.to_string())
                }
                other => other,
            })
    }

    fn pre_start(&self) {
        if self.configuration.use_docker() {
            let pulled = self.run_quietly(
                self.configuration.docker_executable(),
                &["pull", self.configuration.image()],
            );
            if let Err(e) = pulled {
                warn!(error = %e, image = %self.configuration.image(), "failed to pull image");
            }
        } else {
            match fs::remove_file(self.log_file()) {
                Ok(()) => debug!("removed stale log file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "failed to remove stale log file"),
            }
        }
    }

    fn spawn_server(&mut self) -> Result<(), Error> {
        let command = self.mockoon_cli_command();
        debug!(command = ?command, "launching");

        let mut process = Command::new(&command[0]);
        process
            .args(&command[1..])
            .envs(self.configuration.envs().iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if self.configuration.use_docker() {
            let status = process.status().map_err(|e| {
                Error::SourceUnavailable(format!("failed to run {}: {}", command[0], e))
            })?;
            if !status.success() {
                return Err(Error::SourceUnavailable(format!(
                    "container could not be started, {} exited with {}",
                    command[0], status
                )));
            }
        } else {
            let child = process.spawn().map_err(|e| {
                Error::SourceUnavailable(format!("failed to launch {}: {}", command[0], e))
            })?;
            self.server_process = Some(child);
        }

        Ok(())
    }

    fn resolve_log_source(&mut self) -> Result<LogSource, Error> {
        if self.configuration.use_docker() {
            let mut child = Command::new(self.configuration.docker_executable())
                .args(&["logs", "-f", self.configuration.container_name()])
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| {
                    Error::SourceUnavailable(format!("failed to follow container logs: {}", e))
                })?;
            let stdout = child.stdout.take().ok_or_else(|| {
                Error::SourceUnavailable(String::from("container log stream has no output"))
            })?;
            self.log_process = Some(child);

            Ok(LogSource::Stream(Box::new(stdout)))
        } else {
            let log_file = self.log_file();
            if !log_file.is_file() {
                PathWatcher::new(&log_file, self.configuration.poll_interval())
                    .wait_for_creation(self.configuration.log_file_timeout())?;
            }

            Ok(LogSource::File(log_file))
        }
    }

    /// Starts following the server's log output. Does nothing if already following.
    pub fn start_logging(&mut self) -> Result<(), Error> {
        if self.processor.is_running() {
            return Ok(());
        }

        let source = self.resolve_log_source()?;
        self.processor.start(source)
    }

    /// Stops following the server's log output and waits for the log thread to exit.
    pub fn stop_logging(&mut self) {
        self.processor.request_stop();
        // a stream only ends once the process feeding it is gone
        if let Some(mut child) = self.log_process.take() {
            terminate(&mut child);
        }
        self.processor.stop();
    }

    /// Stops the server process or container and the log thread. Safe to call when stopped.
    pub fn stop(&mut self) {
        self.cleanup();
        self.stop_logging();

        if self.state != ServerState::Stopped {
            info!(process_name = %self.process_name, "mockoon server stopped");
        }
        self.state = ServerState::Stopped;
    }

    fn cleanup(&mut self) {
        if self.configuration.use_docker() {
            let docker = self.configuration.docker_executable();
            let container = self.configuration.container_name();
            if let Err(e) = self.run_quietly(docker, &["stop", container, "-t", "0"]) {
                debug!(error = %e, "container stop failed");
            }
            if let Err(e) = self.run_quietly(docker, &["rm", container]) {
                debug!(error = %e, "container removal failed");
            }
        } else {
            if let Some(mut child) = self.server_process.take() {
                terminate(&mut child);
            }
            let name = format!("mockoon-{}", self.process_name);
            if let Err(e) = self.run_quietly(self.configuration.executable(), &["stop", &name]) {
                debug!(error = %e, "mockoon-cli stop failed");
            }
        }
    }

    fn run_quietly(&self, program: &str, args: &[&str]) -> io::Result<ExitStatus> {
        Command::new(program)
            .args(args)
            .envs(self.configuration.envs().iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
    }

    pub fn wait_for_active(&self) -> Result<(), Error> {
        self.wait_for_active_within(self.configuration.wait_timeout())
    }

    pub fn wait_for_active_within(&self, timeout: Duration) -> Result<(), Error> {
        self.wait_for_event(READY_EVENT, timeout)
    }

    /// Waits for a transaction on `route` to be logged, e.g. `"hello"` or `"users/:id"`.
    pub fn wait_for_route_hit<S: AsRef<str>>(&self, route: S) -> Result<(), Error> {
        self.wait_for_route_hit_within(route, self.configuration.wait_timeout())
    }

    pub fn wait_for_route_hit_within<S: AsRef<str>>(
        &self,
        route: S,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.wait_for_event(&route_event(route), timeout)
    }

    fn wait_for_event(&self, label: &str, timeout: Duration) -> Result<(), Error> {
        self.processor.wait_for(label, timeout)
    }

    pub fn history(&self) -> &TransactionHistory {
        &self.history
    }

    pub fn log_messages(&self) -> Vec<LogMessage> {
        self.history.log_messages()
    }

    /// Forgets every transaction seen so far. Allowed while the server is running.
    pub fn reset_transactions(&self) -> Result<(), Error> {
        self.history.reset()
    }
}

impl TransactionAssertion for MockoonServer {
    fn transactions(&self) -> Vec<Transaction> {
        self.history.transactions()
    }
}

impl Drop for MockoonServer {
    fn drop(&mut self) {
        if self.state != ServerState::Stopped
            || self.server_process.is_some()
            || self.processor.is_running()
        {
            self.stop();
        }
    }
}

// Already-exited processes are fine.
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "process already gone");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "failed to reap process");
    }
}
