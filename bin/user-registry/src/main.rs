use anyhow::{Context, Result};
use registry_core::UserRegistry;
use registry_gateway::{Gateway, GatewayServer, MetricsCollector, RpcForwarder, TlsServerConfig};
use registry_rpc::RpcServer;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{LogFormat, Settings};

const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("Failed to load configuration")?;
    init_tracing(settings.log_format);

    info!("Starting user-registry...");

    let registry = UserRegistry::new();
    info!("User registry initialized");

    let forwarder = RpcForwarder::connect_lazy(&settings.rpc_upstream, FORWARD_TIMEOUT)
        .context("Failed to create RPC forwarder")?;
    let metrics = MetricsCollector::new().context("Failed to create metrics collector")?;
    let gateway = GatewayServer::new(Gateway::new(forwarder, metrics));
    info!("Gateway initialized with tracing, logging, and metrics middleware");

    let tls = match &settings.tls {
        Some(paths) => Some(
            TlsServerConfig::from_files(&paths.cert, &paths.key)
                .context("Failed to load TLS configuration")?,
        ),
        None => {
            warn!("TLS not configured - HTTPS listener not started");
            warn!(
                "Set {} and {} to enable HTTPS",
                config::TLS_CERT,
                config::TLS_KEY
            );
            None
        }
    };

    // Bind everything before serving so a taken port stops startup
    let rpc_listener = RpcServer::bind(settings.rpc_addr)
        .await
        .context("Failed to bind RPC listener")?;
    let http_listener = GatewayServer::bind(settings.http_addr)
        .await
        .context("Failed to bind HTTP listener")?;
    let https_listener = match tls {
        Some(tls) => Some((
            GatewayServer::bind(settings.https_addr)
                .await
                .context("Failed to bind HTTPS listener")?,
            tls,
        )),
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(trigger_shutdown_on(tokio::signal::ctrl_c(), shutdown_tx));

    let rpc = async {
        RpcServer::new(registry.clone())
            .serve_with_listener(rpc_listener, shutdown_signal(shutdown_rx.clone()))
            .await
            .context("RPC server failed")
    };

    let http = async {
        gateway
            .serve(http_listener, shutdown_signal(shutdown_rx.clone()))
            .await
            .context("HTTP gateway failed")
    };

    let https = async {
        match https_listener {
            Some((listener, tls)) => gateway
                .serve_tls(listener, tls, shutdown_signal(shutdown_rx.clone()))
                .await
                .context("HTTPS gateway failed"),
            None => Ok(()),
        }
    };

    // The first listener to fail takes the process down with it
    if let Err(e) = tokio::try_join!(rpc, http, https) {
        error!("{:#}", e);
        return Err(e);
    }

    info!("user-registry stopped with {} user(s) in memory", registry.len().await);
    Ok(())
}

/// Flip `tx` once `signal` fires. If the signal cannot be watched, keep the
/// sender alive and never fire, so the listeners keep serving.
async fn trigger_shutdown_on<F>(signal: F, tx: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Received Ctrl-C, shutting down");
            let _ = tx.send(true);
        }
        Err(e) => {
            error!("Failed to listen for Ctrl-C, graceful shutdown disabled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

fn shutdown_signal(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
