use crate::error::Error;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_EXECUTABLE: &str = "mockoon-cli";
pub const DEFAULT_DOCKER_EXECUTABLE: &str = "docker";
pub const DEFAULT_IMAGE: &str = "mockoon/cli:latest";
pub const DEFAULT_CONTAINER_NAME: &str = "mockoon-cli";
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_FILE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct MockoonConfiguration {
    data_file: PathBuf,
    hostname: Option<String>,
    port: Option<u16>,
    process_name: Option<String>,
    use_docker: bool,
    repair: bool,
    executable: String,
    docker_executable: String,
    image: String,
    container_name: String,
    log_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    wait_timeout: Duration,
    log_file_timeout: Duration,
    poll_interval: Duration,
}

impl MockoonConfiguration {
    pub fn new<P: Into<PathBuf>>(data_file: P) -> Self {
        Self {
            data_file: data_file.into(),
            hostname: None,
            port: None,
            process_name: None,
            use_docker: false,
            repair: false,
            executable: String::from(DEFAULT_EXECUTABLE),
            docker_executable: String::from(DEFAULT_DOCKER_EXECUTABLE),
            image: String::from(DEFAULT_IMAGE),
            container_name: String::from(DEFAULT_CONTAINER_NAME),
            log_dir: None,
            envs: Vec::new(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            log_file_timeout: DEFAULT_LOG_FILE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn set_hostname<S: Into<String>>(&mut self, hostname: S) {
        self.hostname = Some(hostname.into());
    }

    pub fn hostname(&self) -> Option<&String> {
        self.hostname.as_ref()
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn set_process_name<S: Into<String>>(&mut self, process_name: S) {
        self.process_name = Some(process_name.into());
    }

    pub fn process_name(&self) -> Option<&String> {
        self.process_name.as_ref()
    }

    pub fn set_use_docker(&mut self, value: bool) {
        self.use_docker = value;
    }

    pub fn use_docker(&self) -> bool {
        self.use_docker
    }

    pub fn set_repair(&mut self, value: bool) {
        self.repair = value;
    }

    pub fn repair(&self) -> bool {
        self.repair
    }

    /// The mockoon-cli executable, either a bare name looked up on `PATH` or a path.
    pub fn set_executable<S: Into<String>>(&mut self, executable: S) {
        self.executable = executable.into();
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn set_docker_executable<S: Into<String>>(&mut self, executable: S) {
        self.docker_executable = executable.into();
    }

    pub fn docker_executable(&self) -> &str {
        &self.docker_executable
    }

    pub fn set_image<S: Into<String>>(&mut self, image: S) {
        self.image = image.into();
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn set_container_name<S: Into<String>>(&mut self, container_name: S) {
        self.container_name = container_name.into();
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn set_log_dir<P: Into<PathBuf>>(&mut self, log_dir: P) {
        self.log_dir = Some(log_dir.into());
    }

    /// Where mockoon-cli writes its per-process logs, `~/.mockoon-cli/logs` unless overridden.
    pub fn log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(log_dir) => log_dir.clone(),
            None => home_dir().join(".mockoon-cli").join("logs"),
        }
    }

    /// Adds an environment variable to the launched executable.
    pub fn add_env<S1: Into<String>, S2: Into<String>>(&mut self, key: S1, value: S2) {
        self.envs.push((key.into(), value.into()));
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn set_wait_timeout(&mut self, timeout: Duration) {
        self.wait_timeout = timeout;
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn set_log_file_timeout(&mut self, timeout: Duration) {
        self.log_file_timeout = timeout;
    }

    pub fn log_file_timeout(&self) -> Duration {
        self.log_file_timeout
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// The parts of a mockoon environment file the server needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Definition {
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    pub port: u16,
}

impl Definition {
    pub fn load<P: AsRef<Path>>(data_file: P) -> Result<Self, Error> {
        let data_file = data_file.as_ref();
        if !data_file.exists() {
            return Err(Error::DataFileNotFound(data_file.to_path_buf()));
        }

        let contents = fs::read_to_string(data_file)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::InvalidDataFile(format!("{}: {}", data_file.display(), e)))
    }
}

/// Lower-cases a name and replaces spaces with hyphens, the way mockoon-cli names processes.
pub fn slugify<S: AsRef<str>>(name: S) -> String {
    name.as_ref().replace(' ', "-").to_lowercase()
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(env::temp_dir)
}
