//! Middleware framework for gateway request/response hooks

use hyper::{HeaderMap, Method, Request};
use std::collections::HashMap;
use std::sync::Arc;
use anyhow::Result;
use tracing::{debug, span, Instrument, Level};

/// Route label used when a request matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Context passed through middleware chain
#[derive(Clone)]
pub struct MiddlewareContext {
    /// Request path
    pub path: String,
    /// Request method
    pub method: String,
    /// Route template the request resolved to
    pub route: &'static str,
    /// Request headers
    pub request_headers: HashMap<String, String>,
    /// Custom metadata for middleware
    pub metadata: Arc<std::sync::Mutex<HashMap<String, String>>>,
}

impl MiddlewareContext {
    /// Create a context for a request with no headers
    pub fn new(method: &Method, path: &str, route: &'static str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            route,
            request_headers: HashMap::new(),
            metadata: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Create a context from a request
    pub fn from_request<B>(req: &Request<B>, route: &'static str) -> Self {
        let mut context = Self::new(req.method(), req.uri().path(), route);
        context.request_headers = header_map(req.headers());
        context
    }

    /// Get a metadata value
    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.metadata
            .lock()
            .ok()
            .and_then(|m| m.get(key).cloned())
    }

    /// Set a metadata value
    pub fn set_metadata(&self, key: String, value: String) {
        if let Ok(mut m) = self.metadata.lock() {
            m.insert(key, value);
        }
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect()
}

/// Middleware trait for processing requests and responses
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in middleware spans
    fn name(&self) -> &'static str {
        "UnnamedMiddleware"
    }

    /// Called before request is processed
    async fn on_request(&self, _context: &MiddlewareContext) -> Result<()> {
        Ok(())
    }

    /// Called after the response status is known
    async fn on_response(
        &self,
        _context: &MiddlewareContext,
        _status: u16,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when the request failed
    async fn on_error(&self, _context: &MiddlewareContext, _error: &str) -> Result<()> {
        Ok(())
    }
}

/// Chain of middleware to execute in order
#[derive(Clone)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new middleware chain
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Add middleware to the chain
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Process request through all middleware
    pub async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        for mw in &self.middleware {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            mw.on_request(context).instrument(span).await?;
        }
        Ok(())
    }

    /// Process response through all middleware (in reverse order)
    pub async fn on_response(
        &self,
        context: &MiddlewareContext,
        status: u16,
    ) -> Result<()> {
        for mw in self.middleware.iter().rev() {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            mw.on_response(context, status).instrument(span).await?;
        }
        Ok(())
    }

    /// Process error through all middleware
    pub async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        for mw in &self.middleware {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            mw.on_error(context, error).instrument(span).await?;
        }
        Ok(())
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging middleware that logs request and response info
pub struct LoggingMiddleware;

fn now_millis() -> Result<u128> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_millis())
}

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        debug!(
            "Request: {} {} (route: {}, headers: {})",
            context.method,
            context.path,
            context.route,
            context.request_headers.len()
        );
        context.set_metadata("start_time".to_string(), now_millis()?.to_string());
        Ok(())
    }

    async fn on_response(
        &self,
        context: &MiddlewareContext,
        status: u16,
    ) -> Result<()> {
        let duration = context
            .get_metadata("start_time")
            .and_then(|start| start.parse::<u128>().ok())
            .map(|start| now_millis().map(|now| now.saturating_sub(start)))
            .transpose()?
            .unwrap_or(0);

        debug!(
            "Response: {} {} -> {} (duration: {}ms)",
            context.method,
            context.path,
            status,
            duration
        );
        Ok(())
    }

    async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        debug!("Error: {} {} - {}", context.method, context.path, error);
        Ok(())
    }
}
