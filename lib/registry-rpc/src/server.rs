//! RPC listener bootstrap
//!
//! Serves `UserService` next to the standard `grpc.health.v1.Health` and
//! gRPC reflection services so tools like grpcurl can discover the API
//! without proto files.

use crate::{Result, TransportError, UserServiceImpl};
use registry_core::UserRegistry;
use registry_proto::proto::user_service_server::UserServiceServer;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing::info;

/// gRPC server for the user registry
pub struct RpcServer {
    service: UserServiceImpl,
}

impl RpcServer {
    /// Create a server whose handler shares `registry`
    pub fn new(registry: UserRegistry) -> Self {
        Self {
            service: UserServiceImpl::new(registry),
        }
    }

    /// Bind the RPC listen socket
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })
    }

    /// Bind `addr` and serve until `shutdown` resolves
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = Self::bind(addr).await?;
        self.serve_with_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_with_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<UserServiceServer<UserServiceImpl>>()
            .await;

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(registry_proto::FILE_DESCRIPTOR_SET)
            .register_encoded_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        match listener.local_addr() {
            Ok(addr) => info!("RPC server listening on {}", addr),
            Err(_) => info!("RPC server listening"),
        }

        Server::builder()
            .layer(TraceLayer::new_for_grpc())
            .add_service(self.service.into_server())
            .add_service(health_service)
            .add_service(reflection_service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        info!("RPC server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_proto::proto::user_service_client::UserServiceClient;
    use registry_proto::proto::{CreateUserRequest, GetUserRequest, User};
    use tokio::sync::oneshot;
    use tonic_health::pb::health_check_response::ServingStatus;
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    async fn start(registry: UserRegistry) -> (SocketAddr, oneshot::Sender<()>) {
        let listener = RpcServer::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            RpcServer::new(registry)
                .serve_with_listener(listener, async move {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        (addr, tx)
    }

    #[tokio::test]
    async fn test_serves_user_service() {
        let registry = UserRegistry::new();
        let (addr, _shutdown) = start(registry.clone()).await;

        let mut client = UserServiceClient::connect(format!("http://{}", addr))
            .await
            .unwrap();
        client
            .create_user(CreateUserRequest {
                user: Some(User {
                    id: 1,
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                }),
            })
            .await
            .unwrap();

        let fetched = client
            .get_user(GetUserRequest { id: 1 })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(fetched.user.unwrap().name, "Ada");
        assert_eq!(registry.len().await, 1);

        let status = client.get_user(GetUserRequest { id: 2 }).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unknown);
    }

    #[tokio::test]
    async fn test_reports_serving_health() {
        let (addr, _shutdown) = start(UserRegistry::new()).await;

        let channel = tonic::transport::Channel::from_shared(format!("http://{}", addr))
            .unwrap()
            .connect()
            .await
            .unwrap();
        let mut client = HealthClient::new(channel);
        for service in ["", registry_proto::SERVICE_NAME] {
            let response = client
                .check(HealthCheckRequest {
                    service: service.to_string(),
                })
                .await
                .unwrap()
                .into_inner();
            assert_eq!(response.status(), ServingStatus::Serving);
        }
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let listener = RpcServer::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let err = RpcServer::bind(addr).await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { addr: a, .. } if a == addr));
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let listener = RpcServer::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(
            RpcServer::new(UserRegistry::new()).serve_with_listener(listener, async move {
                rx.await.ok();
            }),
        );

        tx.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
