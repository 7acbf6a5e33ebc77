//! Liveness keep-alive / connection watchdog.
//!
//! Issues a request/response ping every `ping_interval` and escalates to a
//! stream restart (delivered as a [`RestartReason`] on `restart_tx`) after
//! `reconnect_count` consecutive misses, or immediately on the fabric
//! peer reporting `remote-server-not-found`.

use crate::fabric::FabricSession;
use ikd_protocol::{PubSubOutcome, StanzaCondition};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    RemoteServerNotFound,
    TimeoutThresholdExceeded,
}

pub struct Pinger<F: FabricSession> {
    fabric: Arc<F>,
    interval: Duration,
    reconnect_count: u32,
    timeout_count: AtomicU32,
    restart_tx: mpsc::Sender<RestartReason>,
}

impl<F: FabricSession + 'static> Pinger<F> {
    pub fn new(fabric: Arc<F>, interval: Duration, reconnect_count: u32, restart_tx: mpsc::Sender<RestartReason>) -> Arc<Self> {
        Arc::new(Pinger { fabric, interval, reconnect_count, timeout_count: AtomicU32::new(0), restart_tx })
    }

    /// Run the ping cycle forever. Intended to be driven by a dedicated
    /// `tokio::spawn`; returns only if the restart channel closes.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if self.restart_tx.is_closed() {
                return;
            }
            self.tick().await;
        }
    }

    async fn tick(&self) {
        match self.fabric.ping().await {
            PubSubOutcome::Ok => {
                self.timeout_count.store(0, Ordering::SeqCst);
            }
            PubSubOutcome::Error(err) if err.condition == StanzaCondition::RemoteServerNotFound => {
                warn!("pinger: remote-server-not-found, scheduling stream restart");
                tokio::time::sleep(Duration::from_secs(1)).await;
                let _ = self.restart_tx.send(RestartReason::RemoteServerNotFound).await;
            }
            PubSubOutcome::Error(err) => {
                // Any other condition on a ping is not actionable here;
                // the Dispatcher's own reconcile loop handles node-level errors.
                info!(?err, "pinger: ping returned a non-escalating error");
                self.timeout_count.store(0, Ordering::SeqCst);
            }
            PubSubOutcome::Timeout => {
                let count = self.timeout_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.reconnect_count {
                    warn!(count, "pinger: timeout threshold exceeded, scheduling stream restart");
                    let _ = self.restart_tx.send(RestartReason::TimeoutThresholdExceeded).await;
                }
            }
        }
    }
}
