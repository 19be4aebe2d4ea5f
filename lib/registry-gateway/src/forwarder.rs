//! Loopback RPC forwarding
//!
//! Every decoded HTTP request is re-issued as a `UserService` call over an
//! insecure gRPC channel to the registry's own RPC listener.

use crate::{GatewayError, Result};
use registry_proto::proto::user_service_client::UserServiceClient;
use registry_proto::proto::{
    CreateUserRequest, CreateUserResponse, DeleteUserRequest, DeleteUserResponse, GetUserRequest,
    GetUserResponse, UpdateUserRequest, UpdateUserResponse,
};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

/// W3C trace context header, passed through to the RPC call as metadata
pub const TRACEPARENT: &str = "traceparent";

/// gRPC client that forwards gateway requests to the RPC listener
#[derive(Clone)]
pub struct RpcForwarder {
    client: UserServiceClient<Channel>,
    timeout: Duration,
}

impl RpcForwarder {
    /// Create a forwarder for `upstream` (e.g. `http://127.0.0.1:50051`).
    ///
    /// The channel connects on first use, so the gateway may start before
    /// the RPC listener is accepting.
    pub fn connect_lazy(upstream: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::from_shared(upstream.to_string())
            .map_err(|source| GatewayError::InvalidUpstream {
                endpoint: upstream.to_string(),
                source,
            })?
            .connect_timeout(timeout)
            .tcp_keepalive(Some(Duration::from_secs(30)));

        info!("RPC forwarder targeting {} with {}s timeout", upstream, timeout.as_secs());
        Ok(Self::from_channel(endpoint.connect_lazy(), timeout))
    }

    /// Create a forwarder over an existing channel
    pub fn from_channel(channel: Channel, timeout: Duration) -> Self {
        Self {
            client: UserServiceClient::new(channel),
            timeout,
        }
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn create_user(
        &self,
        message: CreateUserRequest,
        traceparent: Option<&str>,
    ) -> std::result::Result<CreateUserResponse, Status> {
        let mut client = self.client.clone();
        let request = Self::request(message, traceparent);
        self.call("CreateUser", client.create_user(request)).await
    }

    pub async fn get_user(
        &self,
        message: GetUserRequest,
        traceparent: Option<&str>,
    ) -> std::result::Result<GetUserResponse, Status> {
        let mut client = self.client.clone();
        let request = Self::request(message, traceparent);
        self.call("GetUser", client.get_user(request)).await
    }

    pub async fn update_user(
        &self,
        message: UpdateUserRequest,
        traceparent: Option<&str>,
    ) -> std::result::Result<UpdateUserResponse, Status> {
        let mut client = self.client.clone();
        let request = Self::request(message, traceparent);
        self.call("UpdateUser", client.update_user(request)).await
    }

    pub async fn delete_user(
        &self,
        message: DeleteUserRequest,
        traceparent: Option<&str>,
    ) -> std::result::Result<DeleteUserResponse, Status> {
        let mut client = self.client.clone();
        let request = Self::request(message, traceparent);
        self.call("DeleteUser", client.delete_user(request)).await
    }

    fn request<T>(message: T, traceparent: Option<&str>) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(value) = traceparent.and_then(|v| MetadataValue::try_from(v).ok()) {
            request.metadata_mut().insert(TRACEPARENT, value);
        }
        request
    }

    /// Await an RPC with timeout protection
    async fn call<T, F>(&self, rpc: &'static str, fut: F) -> std::result::Result<T, Status>
    where
        F: Future<Output = std::result::Result<Response<T>, Status>>,
    {
        debug!("Forwarding {} over loopback channel", rpc);

        match tokio_timeout(self.timeout, fut).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => {
                debug!("{} failed: {:?} {}", rpc, status.code(), status.message());
                Err(status)
            }
            Err(_) => {
                warn!("{} timed out after {}s", rpc, self.timeout.as_secs());
                Err(Status::deadline_exceeded(format!(
                    "{} did not complete within {}s",
                    rpc,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
