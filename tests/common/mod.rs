// Shared test helpers

use std::collections::VecDeque;

use pyromon::error::FetchError;
use pyromon::poll::Fetch;
use pyromon::snapshot::Snapshot;
use serde_json::Value;

pub const URL: &str = "http://monitor.test/json/charts";

pub fn snapshot(value: Value) -> Snapshot {
    Snapshot::from_value(value).expect("snapshot must be a JSON object")
}

pub fn http_error(status: u16) -> FetchError {
    FetchError::Status {
        url: URL.to_string(),
        status,
    }
}

/// Fetcher that replays a fixed script of outcomes, one per call.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: VecDeque<Result<Snapshot, FetchError>>,
    pub calls: usize,
}

impl ScriptedFetcher {
    pub fn new(script: impl IntoIterator<Item = Result<Snapshot, FetchError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: 0,
        }
    }
}

impl Fetch for ScriptedFetcher {
    fn url(&self) -> &str {
        URL
    }

    fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        self.calls += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(http_error(503)))
    }
}
