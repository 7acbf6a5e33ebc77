//! Reconnecting streaming HTTP consumer.
//!
//! Mirrors the Dispatcher's own reconcile loop in shape: a long-lived task
//! owns a piece of goal state (here, `args`/`delegate`) and keeps nudging
//! reality towards it, backing off on repeated failure. The streaming
//! connection itself is a thin NDJSON-over-HTTP line reader rather than a
//! full Twitter client — credential signing is out of scope, so requests
//! carry the four configured tokens as plain query parameters.

use futures_util::StreamExt;
use ikd_protocol::{Status, StreamFilterArgs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Connect,
    Http,
    /// The server ended the stream on its own (EOF with no transport
    /// error). Reconnects after a 5s floor rather than immediately, so a
    /// server that accepts and instantly closes can't drive a busy loop.
    Clean,
    /// The active generation was superseded by a new `connect()`/
    /// `set_filters()` call. Reconnects immediately with fresh backoff.
    Superseded,
    /// The endpoint rejected the request outright (e.g. bad credentials);
    /// retrying with the same args would only repeat the rejection.
    Other,
}

/// Credentials carried verbatim onto the streaming request's query string.
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[async_trait::async_trait]
pub trait MonitorDelegate: Send + Sync {
    async fn on_entry(&self, status: Status);
}

struct Goal {
    args: StreamFilterArgs,
    delegate: Option<Arc<dyn MonitorDelegate>>,
}

/// Owns the connect loop for one streaming endpoint. `run` is meant to be
/// driven by a single `tokio::spawn`; `set_filters`/`connect` may be called
/// from any task.
pub struct Monitor {
    client: reqwest::Client,
    stream_url: String,
    credentials: TwitterCredentials,
    goal: Mutex<Goal>,
    generation: AtomicU64,
    wake: Notify,
    continue_trying: std::sync::atomic::AtomicBool,
}

impl Monitor {
    pub fn new(stream_url: impl Into<String>, credentials: TwitterCredentials) -> Arc<Self> {
        Arc::new(Monitor {
            client: reqwest::Client::new(),
            stream_url: stream_url.into(),
            credentials,
            goal: Mutex::new(Goal { args: StreamFilterArgs::default(), delegate: None }),
            generation: AtomicU64::new(0),
            wake: Notify::new(),
            continue_trying: std::sync::atomic::AtomicBool::new(true),
        })
    }

    /// Update the filter args and delegate; reconnects if already
    /// connected (the new generation tears down the active request), or
    /// wakes the idle loop otherwise.
    pub async fn set_filters(&self, args: StreamFilterArgs, delegate: Option<Arc<dyn MonitorDelegate>>) {
        {
            let mut goal = self.goal.lock().await;
            goal.args = args;
            goal.delegate = delegate;
        }
        self.connect(true).await;
    }

    /// Tears down the active protocol (if any) by bumping the connection
    /// generation, forcing the current stream read to notice and exit on
    /// its next chunk, then wakes the loop to reconnect immediately.
    pub async fn connect(&self, _force_reconnect: bool) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn stop(&self) {
        self.continue_trying.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Run the connect loop until `stop()` is called. Never returns
    /// otherwise — reconnection only pauses (waiting on `wake`) when the
    /// goal has no usable args or no delegate.
    pub async fn run(self: Arc<Self>) {
        let mut connect_delay = Duration::from_millis(250);
        let mut http_delay = Duration::from_secs(10);

        loop {
            if !self.continue_trying.load(Ordering::SeqCst) {
                return;
            }

            let (args, delegate) = {
                let goal = self.goal.lock().await;
                (goal.args.clone(), goal.delegate.clone())
            };

            let Some(delegate) = delegate.filter(|_| !args.is_empty()) else {
                self.wake.notified().await;
                continue;
            };

            let generation = self.generation.load(Ordering::SeqCst);
            match self.stream_once(&args, delegate.as_ref(), generation).await {
                EndReason::Superseded => {
                    connect_delay = Duration::from_millis(250);
                    http_delay = Duration::from_secs(10);
                }
                EndReason::Clean => {
                    connect_delay = Duration::from_millis(250);
                    http_delay = Duration::from_secs(5);
                    info!("monitor: stream closed cleanly, holding 5s before reconnecting");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                EndReason::Connect => {
                    info!(delay = ?connect_delay, "monitor: connect-class failure, backing off");
                    tokio::time::sleep(connect_delay).await;
                    connect_delay = (connect_delay * 2).min(Duration::from_secs(16));
                }
                EndReason::Http => {
                    warn!(delay = ?http_delay, "monitor: http-error, backing off");
                    tokio::time::sleep(http_delay).await;
                    http_delay = (http_delay * 2).min(Duration::from_secs(240));
                }
                EndReason::Other => {
                    warn!("monitor: unrecoverable stream failure, no longer retrying");
                    self.continue_trying.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
    }

    async fn stream_once(&self, args: &StreamFilterArgs, delegate: &dyn MonitorDelegate, generation: u64) -> EndReason {
        let request = self
            .client
            .get(&self.stream_url)
            .query(&args.query_pairs())
            .query(&[
                ("consumer_key", self.credentials.consumer_key.as_str()),
                ("consumer_secret", self.credentials.consumer_secret.as_str()),
                ("access_token", self.credentials.access_token.as_str()),
                ("access_token_secret", self.credentials.access_token_secret.as_str()),
            ]);

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                info!(?err, "monitor: connect failed");
                return EndReason::Connect;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                warn!(%status, "monitor: streaming endpoint rejected the credentials, giving up");
                return EndReason::Other;
            }
            warn!(%status, "monitor: streaming endpoint returned an error status");
            return EndReason::Http;
        }

        let mut stream = response.bytes_stream();
        let mut buf = Vec::new();
        loop {
            if self.generation.load(Ordering::SeqCst) != generation {
                return EndReason::Superseded;
            }
            match stream.next().await {
                Some(Ok(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let line = &line[..line.len() - 1];
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_slice::<Status>(line) {
                            Ok(status) => delegate.on_entry(status).await,
                            Err(err) => warn!(?err, "monitor: skipping unparsable stream line"),
                        }
                    }
                }
                Some(Err(err)) => {
                    info!(?err, "monitor: stream read failed");
                    return EndReason::Connect;
                }
                None => return EndReason::Clean,
            }
        }
    }
}
