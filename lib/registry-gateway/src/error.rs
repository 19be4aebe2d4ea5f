use std::net::SocketAddr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("failed to bind gateway listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid RPC upstream {endpoint}: {source}")]
    InvalidUpstream {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
