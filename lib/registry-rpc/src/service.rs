//! `UserService` handler
//!
//! Each RPC maps onto exactly one registry call. Lookups of an unknown id
//! fail with a plain `Unknown` status; callers only see that the call
//! failed, not why.

use registry_core::{CoreError, UserRegistry};
use registry_proto::convert::user_or_default;
use registry_proto::proto::user_service_server::{UserService, UserServiceServer};
use registry_proto::proto::{
    CreateUserRequest, CreateUserResponse, DeleteUserRequest, DeleteUserResponse, GetUserRequest,
    GetUserResponse, UpdateUserRequest, UpdateUserResponse,
};
use tonic::{Request, Response, Status};
use tracing::debug;

/// Message returned to callers when a user id is not registered.
pub const USER_NOT_FOUND: &str = "user not found";

/// Serves the registry over gRPC.
#[derive(Clone)]
pub struct UserServiceImpl {
    registry: UserRegistry,
}

impl UserServiceImpl {
    pub fn new(registry: UserRegistry) -> Self {
        Self { registry }
    }

    /// Get the registry this handler serves
    pub fn registry(&self) -> &UserRegistry {
        &self.registry
    }

    /// Wrap the handler in the generated tonic server
    pub fn into_server(self) -> UserServiceServer<Self> {
        UserServiceServer::new(self)
    }
}

fn lookup_status(err: CoreError) -> Status {
    match err {
        CoreError::UserNotFound(id) => {
            debug!(user_id = id, "GetUser on unregistered id");
            Status::unknown(USER_NOT_FOUND)
        }
    }
}

#[tonic::async_trait]
impl UserService for UserServiceImpl {
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<CreateUserResponse>, Status> {
        let user = user_or_default(request.into_inner().user);
        debug!(user_id = user.id, "CreateUser");

        let stored = self.registry.upsert(user).await;
        Ok(Response::new(CreateUserResponse {
            user: Some(stored.into()),
        }))
    }

    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<GetUserResponse>, Status> {
        let id = request.into_inner().id;
        debug!(user_id = id, "GetUser");

        let user = self.registry.get(id).await.map_err(lookup_status)?;
        Ok(Response::new(GetUserResponse {
            user: Some(user.into()),
        }))
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UpdateUserResponse>, Status> {
        let user = user_or_default(request.into_inner().user);
        debug!(user_id = user.id, "UpdateUser");

        let stored = self.registry.upsert(user).await;
        Ok(Response::new(UpdateUserResponse {
            user: Some(stored.into()),
        }))
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteUserResponse>, Status> {
        let id = request.into_inner().id;
        debug!(user_id = id, "DeleteUser");

        let success = self.registry.delete(id).await;
        Ok(Response::new(DeleteUserResponse { success }))
    }
}
