//! In-memory oracles (testing only)
//!
//! [`ScriptedOracle`] answers from per-assertion verdict queues and records
//! every request it sees, so executor and orchestrator behaviour can be
//! checked without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest};

/// Owned copy of an [`OracleRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub tag: String,
    pub code: String,
    pub assertion: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl From<&OracleRequest<'_>> for RecordedRequest {
    fn from(request: &OracleRequest<'_>) -> Self {
        Self {
            tag: request.tag.to_string(),
            code: request.code.to_string(),
            assertion: request.assertion.to_string(),
            model: request.model.to_string(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// Oracle that replays scripted verdicts keyed by assertion text.
///
/// When an assertion's queue is empty the fallback verdict is returned, or
/// an error if no fallback was set.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<String, VecDeque<Result<bool, OracleError>>>>,
    fallback: Option<bool>,
    latency: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue verdicts for `assertion`, answered in order.
    pub fn script(
        self,
        assertion: &str,
        verdicts: impl IntoIterator<Item = Result<bool, OracleError>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(assertion.to_string())
            .or_default()
            .extend(verdicts);
        self
    }

    /// Verdict for assertions with no scripted answers left.
    pub fn fallback(mut self, verdict: bool) -> Self {
        self.fallback = Some(verdict);
        self
    }

    /// Sleep this long inside every call.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `ask` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every request seen, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_verdict(&self, assertion: &str) -> Result<bool, OracleError> {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(assertion)
            .and_then(VecDeque::pop_front);

        match (scripted, self.fallback) {
            (Some(verdict), _) => verdict,
            (None, Some(verdict)) => Ok(verdict),
            (None, None) => Err(OracleError::MalformedResponse(format!(
                "no scripted verdict for {assertion:?}"
            ))),
        }
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn ask(&self, request: &OracleRequest<'_>) -> Result<bool, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.into());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let verdict = self.next_verdict(request.assertion);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceSpec;

    fn spec(assertion: &str) -> InferenceSpec {
        InferenceSpec {
            tag: "t".to_string(),
            assertion: assertion.to_string(),
            model: "m".to_string(),
            count: 1,
            threshold: 1.0,
            max_tokens: 0,
            temperature: 0.0,
            line: 1,
        }
    }

    #[tokio::test]
    async fn replays_scripts_then_fallback() {
        let oracle = ScriptedOracle::new()
            .script("a", [Ok(false), Ok(true)])
            .fallback(false);
        let spec = spec("a");
        let request = OracleRequest::new(&spec, "");

        assert_eq!(oracle.ask(&request).await, Ok(false));
        assert_eq!(oracle.ask(&request).await, Ok(true));
        assert_eq!(oracle.ask(&request).await, Ok(false));
        assert_eq!(oracle.calls(), 3);
        assert_eq!(oracle.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn unscripted_assertion_without_fallback_errors() {
        let oracle = ScriptedOracle::new();
        let spec = spec("unknown");
        let result = oracle.ask(&OracleRequest::new(&spec, "")).await;
        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
        assert_eq!(oracle.requests()[0].assertion, "unknown");
    }
}
