//! HTTP request handling: route, transcode, forward, respond

use crate::envelope::{error_response, json_response, text_response};
use crate::forwarder::{RpcForwarder, TRACEPARENT};
use crate::metrics::{MetricsCollector, MetricsMiddleware};
use crate::middleware::{LoggingMiddleware, MiddlewareChain, MiddlewareContext, UNMATCHED_ROUTE};
use crate::routes::{Route, RouteError};
use crate::trace_context::TracingMiddleware;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use registry_core::UserId;
use registry_proto::proto::{
    CreateUserRequest, DeleteUserRequest, GetUserRequest, UpdateUserRequest, User,
};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use tonic::{Code, Status};
use tracing::debug;

/// Largest accepted request body, matching tonic's default message limit
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Transcoding gateway in front of the loopback RPC client
#[derive(Clone)]
pub struct Gateway {
    forwarder: RpcForwarder,
    middleware: MiddlewareChain,
    metrics: MetricsCollector,
}

impl Gateway {
    /// Create a gateway with the standard tracing, logging and metrics chain
    pub fn new(forwarder: RpcForwarder, metrics: MetricsCollector) -> Self {
        let middleware = MiddlewareChain::new()
            .add(TracingMiddleware::new())
            .add(LoggingMiddleware)
            .add(MetricsMiddleware::new(metrics.clone()));
        Self::with_middleware(forwarder, middleware, metrics)
    }

    pub fn with_middleware(
        forwarder: RpcForwarder,
        middleware: MiddlewareChain,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            forwarder,
            middleware,
            metrics,
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Handle one HTTP request. Failures are rendered as error envelopes,
    /// so this never fails at the HTTP layer.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let route = Route::resolve(req.method(), req.uri().path());
        let label = route.as_ref().map(Route::template).unwrap_or(UNMATCHED_ROUTE);
        let context = MiddlewareContext::from_request(&req, label);

        if let Err(e) = self.middleware.on_request(&context).await {
            debug!("Middleware on_request error: {}", e);
        }

        let result = match route {
            Ok(route) => self.dispatch(route, req, &context).await,
            Err(e) => Err(routing_status(e)),
        };

        let response = match result {
            Ok(response) => response,
            Err(status) => {
                if let Err(e) = self.middleware.on_error(&context, status.message()).await {
                    debug!("Middleware on_error error: {}", e);
                }
                error_response(&status)
            }
        };

        if let Err(e) = self
            .middleware
            .on_response(&context, response.status().as_u16())
            .await
        {
            debug!("Middleware on_response error: {}", e);
        }

        response
    }

    async fn dispatch<B>(
        &self,
        route: Route,
        req: Request<B>,
        context: &MiddlewareContext,
    ) -> Result<Response<Full<Bytes>>, Status>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let traceparent = context.get_metadata(TRACEPARENT);
        let traceparent = traceparent.as_deref();

        match route {
            Route::Health => Ok(text_response(StatusCode::OK, "text/plain", "OK\n")),
            Route::Metrics => {
                let body = self
                    .metrics
                    .gather()
                    .map_err(|e| Status::internal(format!("failed to gather metrics: {}", e)))?;
                Ok(text_response(StatusCode::OK, "text/plain; version=0.0.4", body))
            }
            Route::CreateUser => {
                let message: CreateUserRequest = decode_body(req.into_body()).await?;
                let result = self.forwarder.create_user(message, traceparent).await;
                self.respond("CreateUser", result)
            }
            Route::GetUser(id) => {
                let result = self.forwarder.get_user(GetUserRequest { id }, traceparent).await;
                self.respond("GetUser", result)
            }
            Route::UpdateUser(id) => {
                let message = with_path_id(decode_body(req.into_body()).await?, id);
                let result = self.forwarder.update_user(message, traceparent).await;
                self.respond("UpdateUser", result)
            }
            Route::DeleteUser(id) => {
                let result = self
                    .forwarder
                    .delete_user(DeleteUserRequest { id }, traceparent)
                    .await;
                self.respond("DeleteUser", result)
            }
        }
    }

    fn respond<T: serde::Serialize>(
        &self,
        rpc: &'static str,
        result: Result<T, Status>,
    ) -> Result<Response<Full<Bytes>>, Status> {
        let code = result.as_ref().map(|_| Code::Ok).unwrap_or_else(Status::code);
        self.metrics.record_rpc(rpc, code);
        result.map(|message| json_response(&message))
    }
}

fn routing_status(err: RouteError) -> Status {
    match err {
        RouteError::NotFound => Status::not_found(err.to_string()),
        RouteError::MethodNotAllowed => Status::unimplemented(err.to_string()),
        RouteError::InvalidId(_) => Status::invalid_argument(err.to_string()),
    }
}

/// The path id names the record, whatever the body says
fn with_path_id(mut message: UpdateUserRequest, id: UserId) -> UpdateUserRequest {
    message.user.get_or_insert_with(User::default).id = id;
    message
}

/// Decode a request message from its proto3 JSON body. An empty body
/// decodes as the default message.
async fn decode_body<T, B>(body: B) -> Result<T, Status>
where
    T: DeserializeOwned + Default,
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                Status::invalid_argument(format!(
                    "request body exceeds {} bytes",
                    MAX_BODY_BYTES
                ))
            } else {
                Status::invalid_argument(format!("failed to read request body: {}", e))
            }
        })?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| Status::invalid_argument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use std::time::Duration;

    fn gateway() -> Gateway {
        // Nothing listens here; only requests that never reach the forwarder succeed
        let forwarder =
            RpcForwarder::connect_lazy("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        Gateway::new(forwarder, MetricsCollector::new().unwrap())
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = gateway().handle(request(Method::GET, "/healthz", "")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("OK\n"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_reports_traffic() {
        let gateway = gateway();
        gateway.handle(request(Method::GET, "/healthz", "")).await;

        let response = gateway.handle(request(Method::GET, "/metrics", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"route="/healthz""#));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = gateway().handle(request(Method::GET, "/v2/users/1", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json(response).await;
        assert_eq!(body["code"], Code::NotFound as i32);
        assert_eq!(body["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_wrong_method_is_unimplemented() {
        let response = gateway().handle(request(Method::GET, "/v1/users", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(json(response).await["code"], Code::Unimplemented as i32);
    }

    #[tokio::test]
    async fn test_bad_id_is_invalid_argument() {
        let response = gateway().handle(request(Method::GET, "/v1/users/abc", "")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["code"], Code::InvalidArgument as i32);
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_argument() {
        let response = gateway()
            .handle(request(Method::POST, "/v1/users", "{not json"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["code"], Code::InvalidArgument as i32);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_rendered_as_envelope() {
        let response = gateway().handle(request(Method::GET, "/v1/users/1", "")).await;
        assert!(response.status().is_server_error());

        let body = json(response).await;
        assert!(body["code"].as_i64().unwrap() > 0);
        assert!(body["details"].as_array().unwrap().is_empty());
    }

    fn body(text: &str) -> Full<Bytes> {
        Full::new(Bytes::from(text.to_string()))
    }

    #[tokio::test]
    async fn test_decode_request_message() {
        let message: CreateUserRequest =
            decode_body(body(r#"{"user": {"id": 3, "name": "Ada", "email": "ada@example.com"}}"#))
                .await
                .unwrap();
        let user = message.user.unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");

        let message: CreateUserRequest = decode_body(body(r#"{"user": {"id": "8"}}"#))
            .await
            .unwrap();
        assert_eq!(message.user.unwrap().id, 8);

        let empty: CreateUserRequest = decode_body(body("  ")).await.unwrap();
        assert_eq!(empty, CreateUserRequest::default());
    }

    #[tokio::test]
    async fn test_decode_rejects_bare_user() {
        let status = decode_body::<CreateUserRequest, _>(body(r#"{"id": 1, "name": "Ada"}"#))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("unknown field"));
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized_body() {
        let padding = "x".repeat(MAX_BODY_BYTES);
        let text = format!(r#"{{"user": {{"name": "{}"}}}}"#, padding);

        let status = decode_body::<CreateUserRequest, _>(body(&text))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("exceeds"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_bad_request() {
        let padding = "x".repeat(MAX_BODY_BYTES + 1);
        let response = gateway()
            .handle(request(Method::POST, "/v1/users", &padding))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["code"], Code::InvalidArgument as i32);
    }

    #[tokio::test]
    async fn test_bare_user_body_is_bad_request() {
        let response = gateway()
            .handle(request(Method::POST, "/v1/users", r#"{"id": 1, "name": "Ada"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_path_id_overrides_body() {
        let message = UpdateUserRequest {
            user: Some(User {
                id: 1,
                name: "Body".to_string(),
                email: String::new(),
            }),
        };
        let message = with_path_id(message, 7);
        let user = message.user.unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.name, "Body");

        let message = with_path_id(UpdateUserRequest::default(), 9);
        assert_eq!(message.user.unwrap().id, 9);
    }
}
