//! Minimal stand-in for `mockoon-cli`, used by the integration tests.
//!
//! Understands the `start` and `stop` commands and the flags the library
//! passes, serves the routes of a mockoon data file and writes one JSON log
//! line per transaction in the same shape mockoon-cli does.
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use hyper::{
    body,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    env,
    error::Error as StdError,
    fs::{self, File, OpenOptions},
    io::Write,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tests::LOG_DIR_ENV;
use tokio::runtime::Runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn StdError + Send + Sync>;

lazy_static! {
    static ref PARAM_REGEX: Regex = Regex::new(r":(?P<name>[A-Za-z0-9_]+)").unwrap();
}

#[derive(Debug, Parser)]
#[command(name = "mockoon-stub", about = "Serves a mockoon data file for tests")]
struct Cli {
    #[command(subcommand)]
    command: StubCommand,
}

#[derive(Debug, Subcommand)]
enum StubCommand {
    Start {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        pname: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        hostname: Option<String>,
        #[arg(long)]
        log_transaction: bool,
        #[arg(long)]
        repair: bool,
    },
    Stop {
        name: String,
    },
}

#[derive(Debug, Deserialize)]
struct Environment {
    #[serde(default)]
    routes: Vec<RouteDefinition>,
}

#[derive(Debug, Deserialize)]
struct RouteDefinition {
    #[serde(default)]
    uuid: String,
    method: String,
    endpoint: String,
    #[serde(default)]
    responses: Vec<ResponseDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseDefinition {
    #[serde(default)]
    uuid: String,
    #[serde(default = "default_status_code")]
    status_code: u16,
    #[serde(default)]
    body: String,
    #[serde(default)]
    headers: Vec<Header>,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            status_code: default_status_code(),
            body: String::new(),
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Header {
    key: String,
    value: String,
}

fn default_status_code() -> u16 {
    200
}

#[derive(Debug)]
struct Route {
    uuid: String,
    method: String,
    route: String,
    pattern: Regex,
    response: ResponseDefinition,
}

impl Route {
    fn compile(definition: RouteDefinition) -> Result<Self, regex::Error> {
        let endpoint = definition.endpoint.trim_start_matches('/');
        let escaped = regex::escape(endpoint);
        let pattern = format!(
            "^/{}/?$",
            PARAM_REGEX.replace_all(&escaped, "(?P<${name}>[^/]+)")
        );

        Ok(Self {
            uuid: definition.uuid,
            method: definition.method,
            route: format!("/{}", endpoint),
            pattern: Regex::new(&pattern)?,
            response: definition.responses.into_iter().next().unwrap_or_default(),
        })
    }

    fn matches(&self, method: &Method, path: &str) -> Option<Vec<Value>> {
        if !self.method.eq_ignore_ascii_case(method.as_str()) {
            return None;
        }

        let captures = self.pattern.captures(path)?;
        Some(
            self.pattern
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|value| key_value(name, value.as_str()))
                })
                .collect(),
        )
    }
}

struct TransactionLog {
    file: Mutex<File>,
    mock_name: String,
}

impl TransactionLog {
    fn write(&self, message: String, transaction: Option<Value>) {
        let mut entry = json!({
            "level": "info",
            "message": message,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "mockName": self.mock_name,
        });
        if let Some(transaction) = transaction {
            entry["transaction"] = transaction;
        }

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(file, "{}", entry).and_then(|_| file.flush()) {
            error!(error = %e, "failed to write log line");
        }
    }
}

fn key_value(key: &str, value: &str) -> Value {
    json!({ "key": key, "value": value })
}

fn query_params(query: &str) -> Vec<Value> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            key_value(key, parts.next().unwrap_or_default())
        })
        .collect()
}

fn log_dir() -> PathBuf {
    env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".mockoon-cli").join("logs")))
        .unwrap_or_else(env::temp_dir)
}

async fn handle_request(
    request: Request<Body>,
    routes: Arc<Vec<Route>>,
    log: Arc<TransactionLog>,
) -> Result<Response<Body>, Infallible> {
    let (parts, request_body) = request.into_parts();
    let request_body = match body::to_bytes(request_body).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            error!(error = %e, "failed to read request body");
            String::new()
        }
    };
    let path = parts.uri.path();
    let query = parts.uri.query().unwrap_or_default();

    let matched = routes
        .iter()
        .find_map(|route| route.matches(&parts.method, path).map(|params| (route, params)));
    let (route, params) = match matched {
        Some(matched) => matched,
        None => {
            log.write(format!("{} {} | 404", parts.method, path), None);
            let mut response = Response::new(Body::from(format!("Cannot {} {}", parts.method, path)));
            *response.status_mut() = StatusCode::NOT_FOUND;
            return Ok(response);
        }
    };

    let status = StatusCode::from_u16(route.response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(route.response.body.clone()));
    *response.status_mut() = status;
    for header in &route.response.headers {
        match (
            header.key.parse::<hyper::header::HeaderName>(),
            header.value.parse::<hyper::header::HeaderValue>(),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => error!(key = %header.key, "skipping invalid response header"),
        }
    }

    let request_headers: Vec<Value> = parts
        .headers
        .iter()
        .map(|(name, value)| key_value(name.as_str(), value.to_str().unwrap_or_default()))
        .collect();
    let response_headers: Vec<Value> = route
        .response
        .headers
        .iter()
        .map(|header| key_value(&header.key.to_lowercase(), &header.value))
        .collect();

    let transaction = json!({
        "proxied": false,
        "request": {
            "body": request_body,
            "headers": request_headers,
            "method": parts.method.as_str(),
            "params": params,
            "query": query,
            "queryParams": query_params(query),
            "route": route.route,
            "urlPath": path,
        },
        "response": {
            "body": route.response.body,
            "headers": response_headers,
            "statusCode": status.as_u16(),
            "statusMessage": status.canonical_reason().unwrap_or_default(),
        },
        "routeResponseUUID": route.response.uuid,
        "routeUUID": route.uuid,
    });
    log.write(
        format!("{} {} | {}", parts.method, path, status.as_u16()),
        Some(transaction),
    );

    Ok(response)
}

async fn serve(
    addr: SocketAddr,
    routes: Arc<Vec<Route>>,
    log: Arc<TransactionLog>,
) -> Result<(), BoxError> {
    let server_log = log.clone();
    let server = Server::try_bind(&addr)?.serve(make_service_fn(move |_| {
        let routes = routes.clone();
        let log = server_log.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                handle_request(request, routes.clone(), log.clone())
            }))
        }
    }));

    log.write(format!("Server started on port {}", addr.port()), None);
    server.await?;

    Ok(())
}

fn start(data: PathBuf, pname: String, port: u16, hostname: Option<String>) -> Result<(), BoxError> {
    let environment: Environment = serde_json::from_str(&fs::read_to_string(&data)?)?;
    let routes = environment
        .routes
        .into_iter()
        .map(Route::compile)
        .collect::<Result<Vec<_>, _>>()?;

    let log_dir = log_dir();
    fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join(format!("mockoon-{}-out.log", pname));
    let file = OpenOptions::new().create(true).append(true).open(&log_file)?;
    let log = Arc::new(TransactionLog {
        file: Mutex::new(file),
        mock_name: format!("mockoon-{}", pname),
    });

    let ip = hostname
        .and_then(|hostname| hostname.parse::<IpAddr>().ok())
        .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));
    info!(port, log_file = %log_file.display(), "serving {}", data.display());

    Runtime::new()?.block_on(serve(SocketAddr::new(ip, port), Arc::new(routes), log))
}

fn run() -> Result<(), BoxError> {
    match Cli::parse().command {
        StubCommand::Start {
            data,
            pname,
            port,
            hostname,
            ..
        } => start(data, pname, port, hostname),
        StubCommand::Stop { name } => {
            info!(name = %name, "nothing to stop");
            Ok(())
        }
    }
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(e) = run() {
        error!(error = %e, "mockoon-stub failed");
        std::process::exit(1);
    }
}
