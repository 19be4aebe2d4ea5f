//! gRPC exposure of the user registry
//!
//! - `service`: the `UserService` handler backed by a `UserRegistry`
//! - `server`: the RPC listener with health checking and reflection

pub mod error;
pub mod server;
pub mod service;

pub use error::{TransportError, Result};
pub use server::RpcServer;
pub use service::UserServiceImpl;
