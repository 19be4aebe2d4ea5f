//! W3C trace context propagation for gateway requests
//!
//! Each request gets a trace id, taken from an incoming `traceparent` header
//! or freshly generated, and a new span id for the gateway hop. The
//! resulting `traceparent` is stored in the middleware metadata so the
//! forwarder can attach it to the loopback RPC.

use std::collections::HashMap;
use anyhow::Result;
use tracing::{info, error};
use crate::forwarder::TRACEPARENT;
use crate::middleware::{Middleware, MiddlewareContext};

/// Parsed `traceparent` header value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceParent {
    pub trace_id: String,
    pub parent_id: String,
    pub flags: String,
}

impl TraceParent {
    /// Parse `version-trace_id-parent_id-flags`
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() < 4 || parts[0] == "ff" {
            return None;
        }

        let (version, trace_id, parent_id, flags) = (parts[0], parts[1], parts[2], parts[3]);
        let valid = is_hex(version, 2)
            && is_hex(trace_id, 32)
            && is_hex(parent_id, 16)
            && is_hex(flags, 2)
            && trace_id.bytes().any(|b| b != b'0')
            && parent_id.bytes().any(|b| b != b'0');

        valid.then(|| Self {
            trace_id: trace_id.to_ascii_lowercase(),
            parent_id: parent_id.to_ascii_lowercase(),
            flags: flags.to_ascii_lowercase(),
        })
    }

    /// Header value for a child span of this trace
    pub fn child(&self, span_id: &str) -> String {
        TracingMiddleware::create_w3c_trace_context(&self.trace_id, span_id, &self.flags)
    }
}

fn is_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Distributed tracing middleware
pub struct TracingMiddleware {
    /// Service name for traces
    pub service_name: String,
}

impl TracingMiddleware {
    pub fn new() -> Self {
        Self {
            service_name: "user-registry-gateway".to_string(),
        }
    }

    pub fn with_service_name(service_name: String) -> Self {
        Self { service_name }
    }

    /// Extract the trace context from request headers
    pub fn extract_w3c_trace_context(headers: &HashMap<String, String>) -> Option<TraceParent> {
        headers.get(TRACEPARENT).and_then(|v| TraceParent::parse(v))
    }

    /// Create W3C Trace Context header value
    pub fn create_w3c_trace_context(trace_id: &str, span_id: &str, trace_flags: &str) -> String {
        format!("00-{}-{}-{}", trace_id, span_id, trace_flags)
    }

    /// Generate a new span ID (random 16 hex digits)
    pub fn generate_span_id() -> String {
        format!("{:016x}", rand::random::<u64>().max(1))
    }

    /// Generate a new trace ID (random 32 hex digits)
    pub fn generate_trace_id() -> String {
        format!("{:032x}", rand::random::<u128>().max(1))
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "TracingMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        let parent = Self::extract_w3c_trace_context(&context.request_headers).unwrap_or_else(|| {
            TraceParent {
                trace_id: Self::generate_trace_id(),
                parent_id: String::new(),
                flags: "01".to_string(),
            }
        });
        let span_id = Self::generate_span_id();

        context.set_metadata(TRACEPARENT.to_string(), parent.child(&span_id));
        context.set_metadata("trace_id".to_string(), parent.trace_id.clone());
        context.set_metadata("span_id".to_string(), span_id);

        info!(
            service = %self.service_name,
            trace_id = %parent.trace_id,
            method = %context.method,
            path = %context.path,
            "Request started"
        );

        Ok(())
    }

    async fn on_response(
        &self,
        context: &MiddlewareContext,
        status: u16,
    ) -> Result<()> {
        let trace_id = context.get_metadata("trace_id").unwrap_or_default();

        info!(
            service = %self.service_name,
            trace_id = %trace_id,
            status = status,
            method = %context.method,
            path = %context.path,
            "Request completed"
        );

        Ok(())
    }

    async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        let trace_id = context.get_metadata("trace_id").unwrap_or_default();

        error!(
            service = %self.service_name,
            trace_id = %trace_id,
            error = %error,
            method = %context.method,
            path = %context.path,
            "Request error"
        );

        Ok(())
    }
}
