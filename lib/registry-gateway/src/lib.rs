//! HTTP/JSON gateway for the user registry
//!
//! Decodes REST-style requests, re-issues them as `UserService` calls over a
//! loopback gRPC channel and renders the replies (or failures) as JSON.
pub mod envelope;
pub mod error;
pub mod forwarder;
pub mod http;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod tls;
pub mod trace_context;

pub use error::{GatewayError, Result};
pub use forwarder::RpcForwarder;
pub use http::Gateway;
pub use metrics::{MetricsCollector, MetricsMiddleware};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareContext};
pub use routes::{Route, RouteError};
pub use server::GatewayServer;
pub use tls::TlsServerConfig;
pub use trace_context::TracingMiddleware;
