//! Notification aggregator / pub-sub dispatcher entrypoint.
//!
//! tracing init -> config load -> build state -> serve admin HTTP +
//! live-page with graceful shutdown on Ctrl-C/SIGTERM, matching the
//! existing services' `main.rs` shape.

use async_trait::async_trait;
use clap::Parser;
use ikd_core::MemoryStore;
use ikd_protocol::xml::Element;
use ikd_protocol::PubSubOutcome;
use notifier::config::{self, NotifierConfig};
use notifier::dispatcher::{Dispatcher, Publisher};
use notifier::fabric::WsFabricSession;
use notifier::feed::FeedRouter;
use notifier::http::{self, AdminState, FilterRefreshHook, ResubscribeHook};
use notifier::live_page;
use notifier::pinger::Pinger;
use notifier::twitter::{MicroblogDispatcher, Monitor, OEmbedImageResolver, TwitterCredentials};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OnceCell};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "notifier", author, version, about = "Notification aggregator / pub-sub dispatcher")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "/etc/ikdisplay/notifier.toml")]
    config: String,

    /// Overrides the config file's `[logging] level`.
    #[arg(long)]
    log_level: Option<String>,
}

/// Breaks the Dispatcher/FeedRouter construction cycle: the router needs a
/// `Publisher` (the Dispatcher) before the Dispatcher itself can be built
/// out of the router as its `EventSink`. Forwards once `set` is called;
/// before that, publishing fails closed.
struct LazyPublisher(OnceCell<Arc<dyn Publisher>>);

impl LazyPublisher {
    fn new() -> Arc<Self> {
        Arc::new(LazyPublisher(OnceCell::new()))
    }

    fn set(&self, inner: Arc<dyn Publisher>) {
        let _ = self.0.set(inner);
    }
}

#[async_trait]
impl Publisher for LazyPublisher {
    async fn publish(&self, node: &str, items: Vec<Element>) -> PubSubOutcome {
        match self.0.get() {
            Some(inner) => inner.publish(node, items).await,
            None => PubSubOutcome::Timeout,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config::load_config_from_path(std::path::Path::new(&cli.config)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("FATAL: failed to load config from {}: {err}", cli.config);
            std::process::exit(1);
        }
    };

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level).to_owned();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"))).init();

    info!(version = env!("CARGO_PKG_VERSION"), "notifier starting");
    run(config).await;
}

async fn run(config: NotifierConfig) {
    let store = MemoryStore::new();
    match tokio::fs::read(&config.store.path).await {
        Ok(bytes) => match store.restore(&bytes).await {
            Ok(()) => info!(path = %config.store.path, "restored store snapshot"),
            Err(err) => warn!(?err, path = %config.store.path, "failed to parse store snapshot, starting empty"),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(?err, path = %config.store.path, "failed to read store snapshot, starting empty"),
    }

    let fabric_url = format!("ws://{}:{}/fabric", config.fabric.host, config.fabric.port);
    let fabric = match WsFabricSession::connect(&fabric_url, &config.fabric.secret).await {
        Ok(session) => Arc::new(session),
        Err(err) => {
            error!(?err, url = %fabric_url, "FATAL: failed to connect to the message fabric");
            std::process::exit(1);
        }
    };

    let lazy_publisher = LazyPublisher::new();
    let router = FeedRouter::new(store.clone(), lazy_publisher.clone(), config.limits.live_page_history);
    let own_address = config.fabric.jid.clone();
    let dispatcher = Dispatcher::new(fabric.clone(), store.clone(), router.clone(), own_address);
    lazy_publisher.set(dispatcher.clone());
    dispatcher.on_connected().await;

    let http_client = reqwest::Client::new();
    let image_resolver = Arc::new(OEmbedImageResolver::new(http_client, config.twitter.embedly_key.clone()));
    let monitor = Monitor::new(
        "https://stream.twitter.com/1.1/statuses/filter.json",
        TwitterCredentials {
            consumer_key: config.twitter.consumer_key.clone(),
            consumer_secret: config.twitter.consumer_secret.clone(),
            access_token: config.twitter.access_token.clone(),
            access_token_secret: config.twitter.access_token_secret.clone(),
        },
    );
    let microblog_dispatcher = MicroblogDispatcher::new(store.clone(), router.clone(), monitor.clone(), image_resolver);
    microblog_dispatcher.set_filters().await;
    tokio::spawn(monitor.clone().run());

    let (restart_tx, mut restart_rx) = mpsc::channel(4);
    let pinger = Pinger::new(fabric.clone(), Duration::from_secs(config.limits.ping_interval_secs), config.limits.reconnect_count, restart_tx);
    tokio::spawn(pinger.run());
    tokio::spawn(async move {
        if let Some(reason) = restart_rx.recv().await {
            warn!(?reason, "pinger requested a stream restart; this build does not support mid-session fabric reconnection, exiting");
            std::process::exit(1);
        }
    });

    {
        let dispatcher = dispatcher.clone();
        let fabric = fabric.clone();
        tokio::spawn(async move {
            loop {
                match fabric.next_event().await {
                    Some(event) => dispatcher.on_items_event(event).await,
                    None => {
                        dispatcher.on_disconnected().await;
                        error!("fabric session closed, exiting");
                        std::process::exit(1);
                    }
                }
            }
        });
    }

    let resubscribe: Arc<dyn ResubscribeHook> = Arc::new(dispatcher.clone());
    let filters: Arc<dyn FilterRefreshHook> = Arc::new(microblog_dispatcher.clone());
    let admin_state = AdminState::new(store.clone(), resubscribe, filters);

    let app = http::admin::router(admin_state).merge(live_page::router(router));

    let listener = match tokio::net::TcpListener::bind(&config.web.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(?err, bind = %config.web.bind, "FATAL: failed to bind web listener");
            std::process::exit(1);
        }
    };
    info!(bind = %config.web.bind, "notifier listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.expect("server error");

    if let Ok(snapshot) = store.snapshot().await {
        if let Err(err) = tokio::fs::write(&config.store.path, snapshot).await {
            warn!(?err, path = %config.store.path, "failed to write shutdown snapshot");
        }
    }
    info!("notifier shut down gracefully");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
