//! Recording transport for exercising connections and queries without a cluster.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use quarry::error::{TransportError, TransportResult};
use quarry::{Connection, Endpoint, RequestParams, SearchTransport, TransportResponse};

/// One call seen by the transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Endpoint that was invoked.
    pub endpoint: Endpoint,
    /// Parameters it was invoked with.
    pub params: RequestParams,
}

/// A transport that records every call and replays queued responses.
///
/// Responses are queued per endpoint. An endpoint with nothing queued
/// answers `200` with a `null` body. A queued non-2xx status becomes a
/// [`TransportError::Status`] unless the request lists it as ignored,
/// mirroring the HTTP transport.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<Endpoint, VecDeque<TransportResponse>>>,
}

impl RecordingTransport {
    /// Creates an empty transport.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a `200` response for `endpoint`.
    pub fn respond(&self, endpoint: Endpoint, body: Value) {
        self.respond_with(endpoint, TransportResponse::ok(body));
    }

    /// Queues an arbitrary response for `endpoint`.
    pub fn respond_with(&self, endpoint: Endpoint, response: TransportResponse) {
        self.responses
            .lock()
            .entry(endpoint)
            .or_default()
            .push_back(response);
    }

    /// Returns every recorded call.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the most recent call.
    pub fn last_call(&self) -> RecordedCall {
        self.calls
            .lock()
            .last()
            .cloned()
            .expect("no calls recorded")
    }

    /// Returns the number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SearchTransport for RecordingTransport {
    async fn perform(
        &self,
        endpoint: Endpoint,
        params: RequestParams,
    ) -> TransportResult<TransportResponse> {
        self.calls.lock().push(RecordedCall {
            endpoint,
            params: params.clone(),
        });

        let response = self
            .responses
            .lock()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| TransportResponse::ok(Value::Null));

        let accepted = response.is_success()
            || params.ignores(response.status)
            || (endpoint == Endpoint::IndicesExists && response.status == 404);
        if !accepted {
            return Err(TransportError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }
}

/// Builds a shared connection over a recording transport.
pub fn recording_connection(
    name: &str,
    ignores: impl IntoIterator<Item = u16>,
) -> (Arc<Connection>, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let connection = Connection::new(name, transport.clone()).with_ignores(ignores);
    (Arc::new(connection), transport)
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quarry=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Log lines written while a [`capture_logs`] guard is alive.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Returns everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes this thread's `tracing` output at `DEBUG` and above into a buffer
/// until the guard drops. Use with a current-thread runtime.
pub fn capture_logs() -> (tracing::subscriber::DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}
