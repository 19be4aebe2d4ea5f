use thiserror::Error;

use crate::UserId;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),
}
