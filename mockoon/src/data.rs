//! Records parsed from the JSON lines mockoon-cli writes with `--log-transaction`.
//!
//! Header, path parameter and query parameter maps arrive as arrays of
//! `{"key": .., "value": ..}` pairs so that repeated headers survive transit.
//! They are folded into maps where the last occurrence of a key wins.

use crate::error::Error;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub body: String,
    #[serde(deserialize_with = "key_value_map")]
    pub headers: HashMap<String, String>,
    pub method: String,
    #[serde(deserialize_with = "key_value_map")]
    pub params: HashMap<String, String>,
    pub query: String,
    #[serde(deserialize_with = "key_value_map")]
    pub query_params: HashMap<String, String>,
    pub route: String,
    pub url_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub body: String,
    #[serde(deserialize_with = "key_value_map")]
    pub headers: HashMap<String, String>,
    pub status_code: u16,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transaction {
    pub proxied: bool,
    pub request: Request,
    pub response: Response,
    // proxied transactions carry no route UUIDs
    #[serde(rename = "routeResponseUUID", default)]
    pub route_response_uuid: Option<String>,
    #[serde(rename = "routeUUID", default)]
    pub route_uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
    /// Absent for messages that are not about a mock, e.g. proxy creation.
    #[serde(rename = "mockName", default)]
    pub mock_name: Option<String>,
    #[serde(default)]
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeyValue {
    key: Option<String>,
    value: Option<String>,
}

impl Request {
    pub fn from_log_entry(entry: Value) -> Result<Self, Error> {
        parse_entry(entry)
    }
}

impl Response {
    pub fn from_log_entry(entry: Value) -> Result<Self, Error> {
        parse_entry(entry)
    }
}

impl Transaction {
    pub fn from_log_entry(entry: Value) -> Result<Self, Error> {
        parse_entry(entry)
    }
}

impl LogMessage {
    pub fn from_log_entry(entry: Value) -> Result<Self, Error> {
        parse_entry(entry)
    }

    /// Parses one raw line of the log. Surrounding whitespace is ignored.
    pub fn from_line(line: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

fn parse_entry<T: DeserializeOwned>(entry: Value) -> Result<T, Error> {
    Ok(serde_json::from_value(entry)?)
}

/// Folds `{key, value}` pairs into a map. Pairs missing either half are skipped.
pub(crate) fn fold_key_values<I: IntoIterator<Item = KeyValue>>(
    pairs: I,
) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for pair in pairs {
        if let (Some(key), Some(value)) = (pair.key, pair.value) {
            map.insert(key, value);
        }
    }

    map
}

fn key_value_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error> {
    let pairs = Vec::<KeyValue>::deserialize(deserializer)?;
    Ok(fold_key_values(pairs))
}
