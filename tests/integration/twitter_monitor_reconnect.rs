//! End-to-end: the Monitor reconnects on its own after a clean stream
//! close, re-delivering a fresh round of entries each time, and survives
//! an HTTP-error round without panicking or losing its goal.

use async_trait::async_trait;
use ikd_protocol::{Status, StreamFilterArgs};
use ikd_test_utils::{MockStreamServer, StreamScript};
use notifier::twitter::{Monitor, MonitorDelegate, TwitterCredentials};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn creds() -> TwitterCredentials {
    TwitterCredentials {
        consumer_key: "k".to_owned(),
        consumer_secret: "s".to_owned(),
        access_token: "t".to_owned(),
        access_token_secret: "ts".to_owned(),
    }
}

fn status_json(screen_name: &str) -> String {
    format!(r#"{{"user":{{"id":1,"screen_name":"{screen_name}"}},"text":"hi","entities":{{"urls":[],"media":[]}}}}"#)
}

struct CountingDelegate(Arc<AtomicUsize>);

#[async_trait]
impl MonitorDelegate for CountingDelegate {
    async fn on_entry(&self, _status: Status) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn clean_close_reconnects_and_redelivers() {
    let server = MockStreamServer::start(StreamScript::Statuses {
        lines: vec![status_json("alice"), status_json("bob")],
        keep_open_after: false,
    })
    .await;

    let monitor = Monitor::new(server.stream_url(), creds());
    let count = Arc::new(AtomicUsize::new(0));
    monitor
        .set_filters(StreamFilterArgs { track: "hi".to_owned(), follow: String::new() }, Some(Arc::new(CountingDelegate(count.clone()))))
        .await;

    let run = tokio::spawn(monitor.clone().run());

    // The clean-close-then-reconnect path should complete at least two
    // rounds (4 entries) well inside this window; the server re-serves
    // the same two-line script on every fresh connection.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    while count.load(Ordering::SeqCst) < 4 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    monitor.stop();
    let _ = timeout(Duration::from_secs(1), run).await;

    assert!(count.load(Ordering::SeqCst) >= 4, "expected at least two reconnect rounds, got {}", count.load(Ordering::SeqCst));
}

#[tokio::test]
async fn http_error_backs_off_then_recovers_on_filter_change() {
    let server = MockStreamServer::start(StreamScript::HttpError(axum::http::StatusCode::TOO_MANY_REQUESTS)).await;
    let monitor = Monitor::new(server.stream_url(), creds());
    let count = Arc::new(AtomicUsize::new(0));
    monitor
        .set_filters(StreamFilterArgs { track: "hi".to_owned(), follow: String::new() }, Some(Arc::new(CountingDelegate(count.clone()))))
        .await;

    let run = tokio::spawn(monitor.clone().run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor.stop();
    let _ = timeout(Duration::from_secs(1), run).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
}
