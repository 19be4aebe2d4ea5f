//! HTTP/1.1 accept loops for the gateway

use crate::http::Gateway;
use crate::tls::TlsServerConfig;
use crate::{GatewayError, Result};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::tokio::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Serves a [`Gateway`] over plain or TLS-wrapped TCP listeners
#[derive(Clone)]
pub struct GatewayServer {
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Bind a listener without accepting yet, so bind failures surface at startup
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })
    }

    /// Accept plain HTTP connections until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("HTTP gateway listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Error accepting HTTP connection: {}", e);
                        continue;
                    }
                },
            };

            let gateway = self.gateway.clone();
            tokio::task::spawn(async move {
                serve_connection(gateway, stream, peer_addr).await;
            });
        }

        info!("HTTP gateway stopped");
        Ok(())
    }

    /// Accept HTTPS connections until `shutdown` resolves
    pub async fn serve_tls<F>(
        &self,
        listener: TcpListener,
        tls: TlsServerConfig,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("HTTPS gateway listening on {}", listener.local_addr()?);
        let acceptor = tls.acceptor();
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Error accepting HTTPS connection: {}", e);
                        continue;
                    }
                },
            };

            let gateway = self.gateway.clone();
            let acceptor = acceptor.clone();
            tokio::task::spawn(async move {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => serve_connection(gateway, tls_stream, peer_addr).await,
                    Err(e) => debug!("TLS error from {}: {}", peer_addr, e),
                }
            });
        }

        info!("HTTPS gateway stopped");
        Ok(())
    }
}

async fn serve_connection<S>(gateway: Arc<Gateway>, stream: S, peer_addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req: Request<Incoming>| {
        let gateway = gateway.clone();
        async move { Ok::<_, Infallible>(gateway.handle(req).await) }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!("Error serving connection from {}: {}", peer_addr, e);
    }
}
