//! Prometheus metrics for the gateway

use prometheus::{
    Counter, CounterVec, HistogramOpts, HistogramVec, Registry, Encoder, TextEncoder,
    Opts,
};
use std::sync::Arc;
use anyhow::Result;
use tracing::debug;
use crate::middleware::{Middleware, MiddlewareContext};

/// Prometheus metrics collector for gateway traffic
#[derive(Clone)]
pub struct MetricsCollector {
    /// Total HTTP requests received, by method and route template
    pub http_requests_total: CounterVec,
    /// HTTP request duration in seconds
    pub http_request_duration_seconds: HistogramVec,
    /// HTTP responses by status code
    pub http_responses_total: CounterVec,
    /// HTTP errors total
    pub http_errors_total: Counter,
    /// Loopback RPC calls by method and resulting gRPC code
    pub rpc_calls_total: CounterVec,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> std::result::Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let http_requests_total = CounterVec::new(
            Opts::new("gateway_http_requests_total", "Total HTTP requests"),
            &["method", "route"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "route"],
        )?;

        let http_responses_total = CounterVec::new(
            Opts::new("gateway_http_responses_total", "Total HTTP responses by status"),
            &["status"],
        )?;

        let http_errors_total = Counter::new(
            "gateway_http_errors_total",
            "Total failed HTTP requests",
        )?;

        let rpc_calls_total = CounterVec::new(
            Opts::new("gateway_rpc_calls_total", "Loopback RPC calls by method and code"),
            &["rpc", "code"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_responses_total.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(rpc_calls_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            http_responses_total,
            http_errors_total,
            rpc_calls_total,
            registry,
        })
    }

    /// Record the outcome of a forwarded call
    pub fn record_rpc(&self, rpc: &str, code: tonic::Code) {
        self.rpc_calls_total
            .with_label_values(&[rpc, &format!("{:?}", code)])
            .inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Prometheus metrics middleware
pub struct MetricsMiddleware {
    pub collector: MetricsCollector,
}

impl MetricsMiddleware {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }
}

fn now_secs() -> Result<f64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs_f64())
}

#[async_trait::async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "MetricsMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        self.collector
            .http_requests_total
            .with_label_values(&[&context.method, context.route])
            .inc();

        context.set_metadata("metrics_start_time".to_string(), now_secs()?.to_string());
        Ok(())
    }

    async fn on_response(
        &self,
        context: &MiddlewareContext,
        status: u16,
    ) -> Result<()> {
        debug!("Recording response metrics for {} {} -> {}", context.method, context.route, status);

        self.collector
            .http_responses_total
            .with_label_values(&[&status.to_string()])
            .inc();

        if let Some(start_time) = context
            .get_metadata("metrics_start_time")
            .and_then(|v| v.parse::<f64>().ok())
        {
            let duration = (now_secs()? - start_time).max(0.0);
            self.collector
                .http_request_duration_seconds
                .with_label_values(&[&context.method, context.route])
                .observe(duration);
        }

        Ok(())
    }

    async fn on_error(&self, _context: &MiddlewareContext, _error: &str) -> Result<()> {
        self.collector.http_errors_total.inc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn context() -> MiddlewareContext {
        MiddlewareContext::new(&Method::GET, "/v1/users/12", "/v1/users/{id}")
    }

    #[test]
    fn test_metrics_collector_text_format() {
        let collector = MetricsCollector::new().expect("Failed to create collector");
        collector
            .http_requests_total
            .with_label_values(&["GET", "/v1/users/{id}"])
            .inc();

        let metrics = collector.gather().expect("Failed to gather metrics");
        assert!(metrics.contains("# HELP"));
        assert!(metrics.contains("# TYPE"));
        assert!(metrics.contains("gateway_http_requests_total"));
    }

    #[test]
    fn test_metrics_collector_clone_shares_registry() {
        let collector1 = MetricsCollector::new().expect("Failed to create collector");
        let collector2 = collector1.clone();

        collector1.http_errors_total.inc();
        assert_eq!(collector2.http_errors_total.get(), 1.0);
    }

    #[test]
    fn test_record_rpc() {
        let collector = MetricsCollector::new().expect("Failed to create collector");
        collector.record_rpc("GetUser", tonic::Code::Unknown);

        let metrics = collector.gather().unwrap();
        assert!(metrics.contains("gateway_rpc_calls_total"));
        assert!(metrics.contains(r#"rpc="GetUser""#));
        assert!(metrics.contains(r#"code="Unknown""#));
    }

    #[tokio::test]
    async fn test_metrics_middleware_labels_by_route() {
        let middleware = MetricsMiddleware::new(MetricsCollector::new().unwrap());
        let context = context();

        middleware.on_request(&context).await.unwrap();
        assert!(context.get_metadata("metrics_start_time").is_some());
        middleware.on_response(&context, 200).await.unwrap();

        let metrics = middleware.collector.gather().unwrap();
        assert!(metrics.contains(r#"route="/v1/users/{id}""#));
        assert!(!metrics.contains("/v1/users/12"));
        assert!(metrics.contains("gateway_http_request_duration_seconds"));
        assert!(metrics.contains(r#"gateway_http_responses_total{status="200"} 1"#));
    }

    #[tokio::test]
    async fn test_metrics_middleware_on_error() {
        let middleware = MetricsMiddleware::new(MetricsCollector::new().unwrap());

        middleware.on_error(&context(), "Test error").await.unwrap();
        assert_eq!(middleware.collector.http_errors_total.get(), 1.0);
    }
}
