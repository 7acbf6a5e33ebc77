//! A mock microblog streaming HTTP server for Monitor tests.
//!
//! Mirrors `MockWsServer`: binds port 0, hands back the real bound address,
//! and serves its script in a background task. Unlike the fabric peer this
//! one is a real TCP listener, since the Monitor's reconnect/back-off
//! logic needs to observe genuine connect-refused/HTTP-error/clean-close
//! behavior.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;

/// What the single `/stream` route does for one connection.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Serve newline-delimited JSON lines, a short delay between each, then
    /// either close cleanly or hang open.
    Statuses { lines: Vec<String>, keep_open_after: bool },
    /// Immediately respond with this HTTP status and no body.
    HttpError(StatusCode),
}

pub struct MockStreamServer {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockStreamServer {
    pub async fn start(script: StreamScript) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock stream server");
        let addr = listener.local_addr().expect("local addr");
        let router = Router::new().route(
            "/stream",
            get(move || {
                let script = script.clone();
                async move { serve(script).await }
            }),
        );
        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        MockStreamServer { addr, _task: task }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stream_url(&self) -> String {
        format!("http://{}/stream", self.addr)
    }

    /// An address nothing is listening on, for exercising connect-refused
    /// back-off: binds then immediately drops the listener.
    pub async fn unused_addr() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("local addr")
    }
}

async fn serve(script: StreamScript) -> Response {
    match script {
        StreamScript::HttpError(status) => (status, "").into_response(),
        StreamScript::Statuses { lines, keep_open_after } => {
            let stream = async_stream::stream! {
                for line in lines {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    yield Ok::<_, std::io::Error>(format!("{line}\n").into_bytes());
                }
                if keep_open_after {
                    std::future::pending::<()>().await;
                }
            };
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(Body::from_stream(stream))
                .expect("valid response")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_ndjson_lines_then_closes() {
        let server = MockStreamServer::start(StreamScript::Statuses {
            lines: vec![r#"{"a":1}"#.to_owned(), r#"{"a":2}"#.to_owned()],
            keep_open_after: false,
        })
        .await;
        let body = reqwest::get(server.stream_url()).await.unwrap().text().await.unwrap();
        assert_eq!(body, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[tokio::test]
    async fn http_error_script_returns_status() {
        let server = MockStreamServer::start(StreamScript::HttpError(StatusCode::TOO_MANY_REQUESTS)).await;
        let resp = reqwest::get(server.stream_url()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
