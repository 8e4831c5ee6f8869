use crate::{
    data::{Request, Transaction},
    error::Error,
    history::TransactionHistory,
};
use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// A partial description of a request: only the fields that were set are compared.
///
/// An empty set of properties matches every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestProperties {
    body: Option<String>,
    headers: Option<HashMap<String, String>>,
    header_values: Vec<(String, String)>,
    method: Option<String>,
    params: Option<HashMap<String, String>>,
    query: Option<String>,
    query_params: Option<HashMap<String, String>>,
    route: Option<String>,
    url_path: Option<String>,
}

impl RequestProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Requires the complete header map to be equal.
    pub fn with_headers<K: Into<String>, V: Into<String>, I: IntoIterator<Item = (K, V)>>(
        mut self,
        headers: I,
    ) -> Self {
        self.headers = Some(collect_map(headers));
        self
    }

    /// Requires one header to be present with the given value. Names compare case-insensitively.
    pub fn with_header<S1: Into<String>, S2: Into<String>>(mut self, name: S1, value: S2) -> Self {
        self.header_values.push((name.into(), value.into()));
        self
    }

    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_params<K: Into<String>, V: Into<String>, I: IntoIterator<Item = (K, V)>>(
        mut self,
        params: I,
    ) -> Self {
        self.params = Some(collect_map(params));
        self
    }

    pub fn with_query<S: Into<String>>(mut self, query: S) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_query_params<K: Into<String>, V: Into<String>, I: IntoIterator<Item = (K, V)>>(
        mut self,
        query_params: I,
    ) -> Self {
        self.query_params = Some(collect_map(query_params));
        self
    }

    pub fn with_route<S: Into<String>>(mut self, route: S) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_url_path<S: Into<String>>(mut self, url_path: S) -> Self {
        self.url_path = Some(url_path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, request: &Request) -> bool {
        field_matches(&self.body, &request.body)
            && field_matches(&self.headers, &request.headers)
            && field_matches(&self.method, &request.method)
            && field_matches(&self.params, &request.params)
            && field_matches(&self.query, &request.query)
            && field_matches(&self.query_params, &request.query_params)
            && field_matches(&self.route, &request.route)
            && field_matches(&self.url_path, &request.url_path)
            && self.header_values.iter().all(|(name, value)| {
                request
                    .headers
                    .iter()
                    .any(|(key, actual)| key.eq_ignore_ascii_case(name) && actual == value)
            })
    }
}

impl Display for RequestProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(body) = &self.body {
            fields.push(format!("body: {:?}", body));
        }
        if let Some(headers) = &self.headers {
            fields.push(format!("headers: {:?}", headers));
        }
        for (name, value) in &self.header_values {
            fields.push(format!("header {:?}: {:?}", name, value));
        }
        if let Some(method) = &self.method {
            fields.push(format!("method: {:?}", method));
        }
        if let Some(params) = &self.params {
            fields.push(format!("params: {:?}", params));
        }
        if let Some(query) = &self.query {
            fields.push(format!("query: {:?}", query));
        }
        if let Some(query_params) = &self.query_params {
            fields.push(format!("query_params: {:?}", query_params));
        }
        if let Some(route) = &self.route {
            fields.push(format!("route: {:?}", route));
        }
        if let Some(url_path) = &self.url_path {
            fields.push(format!("url_path: {:?}", url_path));
        }

        write!(f, "{{{}}}", fields.join(", "))
    }
}

fn field_matches<T: PartialEq>(expected: &Option<T>, actual: &T) -> bool {
    expected.as_ref().map_or(true, |expected| expected == actual)
}

fn collect_map<K: Into<String>, V: Into<String>, I: IntoIterator<Item = (K, V)>>(
    pairs: I,
) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Mock-style call verification over the transactions a server received.
///
/// Only [`transactions`](TransactionAssertion::transactions) has to be
/// provided; every query and assertion is derived from it.
pub trait TransactionAssertion {
    fn transactions(&self) -> Vec<Transaction>;

    fn transaction_count(&self) -> usize {
        self.transactions().len()
    }

    fn was_called(&self) -> bool {
        self.transaction_count() > 0
    }

    fn last_request(&self) -> Option<Request> {
        self.transactions()
            .pop()
            .map(|transaction| transaction.request)
    }

    fn all_requests(&self) -> Vec<Request> {
        self.transactions()
            .into_iter()
            .map(|transaction| transaction.request)
            .collect()
    }

    fn assert_not_called(&self) -> Result<(), Error> {
        let count = self.transaction_count();
        if count != 0 {
            return fail(format!(
                "Expected no calls but the server was called {} times",
                count
            ));
        }
        Ok(())
    }

    fn assert_called(&self) -> Result<(), Error> {
        if !self.was_called() {
            return fail(String::from(
                "Expected the server to have been called but it was not",
            ));
        }
        Ok(())
    }

    fn assert_called_once(&self) -> Result<(), Error> {
        let count = self.transaction_count();
        if count != 1 {
            return fail(format!(
                "Expected exactly one call but the server was called {} times",
                count
            ));
        }
        Ok(())
    }

    fn assert_called_once_with(&self, request: &Request) -> Result<(), Error> {
        let requests = self.all_requests();
        let count = requests.iter().filter(|actual| *actual == request).count();
        if count != 1 {
            return fail(format!(
                "Expected exactly one call with {:?} but found {} in {:?}",
                request, count, requests
            ));
        }
        Ok(())
    }

    /// Passes when any recorded call equals `request`, not only the most recent one.
    fn assert_called_with(&self, request: &Request) -> Result<(), Error> {
        let requests = self.all_requests();
        if !requests.iter().any(|actual| actual == request) {
            return fail(format!(
                "Expected call not found: {:?} in {:?}",
                request, requests
            ));
        }
        Ok(())
    }

    /// With `any_order` false the expected requests must appear in this
    /// relative order, other calls may sit in between. With `any_order` true
    /// each expected request consumes one distinct recorded call.
    fn assert_has_calls(&self, requests: &[Request], any_order: bool) -> Result<(), Error> {
        let actual = self.all_requests();
        let matches = |expected: &Request, actual: &Request| expected == actual;

        if any_order {
            if let Err(missing) = unordered_match(requests, &actual, matches) {
                return fail(format!("Expected call not found: {:?}", missing));
            }
        } else if !ordered_match(requests, &actual, matches) {
            return fail(format!(
                "Expected calls {:?} not found in the same order in {:?}",
                requests, actual
            ));
        }
        Ok(())
    }

    fn assert_called_once_with_properties(
        &self,
        properties: &RequestProperties,
    ) -> Result<(), Error> {
        let requests = self.all_requests();
        let count = requests
            .iter()
            .filter(|actual| properties.matches(actual))
            .count();
        if count != 1 {
            return fail(format!(
                "Expected exactly one call with properties {} but found {} in {:?}",
                properties, count, requests
            ));
        }
        Ok(())
    }

    /// Passes when any recorded call has `properties`.
    fn assert_called_with_properties(&self, properties: &RequestProperties) -> Result<(), Error> {
        let requests = self.all_requests();
        if !requests.iter().any(|actual| properties.matches(actual)) {
            return fail(format!(
                "Expected call with properties {} not found in {:?}",
                properties, requests
            ));
        }
        Ok(())
    }

    fn assert_has_calls_with_properties(
        &self,
        calls: &[RequestProperties],
        any_order: bool,
    ) -> Result<(), Error> {
        let actual = self.all_requests();
        let matches = |expected: &RequestProperties, actual: &Request| expected.matches(actual);

        if any_order {
            if let Err(missing) = unordered_match(calls, &actual, matches) {
                return fail(format!("Expected call not found: {}", missing));
            }
        } else if !ordered_match(calls, &actual, matches) {
            return fail(format!(
                "Expected calls [{}] not found in the same order in {:?}",
                calls
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                actual
            ));
        }
        Ok(())
    }
}

impl TransactionAssertion for TransactionHistory {
    fn transactions(&self) -> Vec<Transaction> {
        TransactionHistory::transactions(self)
    }
}

fn fail(message: String) -> Result<(), Error> {
    Err(Error::AssertionFailed(message))
}

/// Single left-to-right cursor over `actual`, advancing through `expected` on each match.
fn ordered_match<T, F: Fn(&T, &Request) -> bool>(
    expected: &[T],
    actual: &[Request],
    matches: F,
) -> bool {
    let mut matched = 0;

    for request in actual {
        if matched == expected.len() {
            break;
        }
        if matches(&expected[matched], request) {
            matched += 1;
        }
    }

    matched == expected.len()
}

/// Removes the first match for each expected entry from a working copy of `actual`.
fn unordered_match<'a, T, F: Fn(&T, &Request) -> bool>(
    expected: &'a [T],
    actual: &[Request],
    matches: F,
) -> Result<(), &'a T> {
    let mut remaining: Vec<&Request> = actual.iter().collect();

    for entry in expected {
        match remaining
            .iter()
            .position(|request| matches(entry, *request))
        {
            Some(index) => {
                remaining.remove(index);
            }
            None => return Err(entry),
        }
    }

    Ok(())
}
