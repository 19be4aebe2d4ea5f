//! Conversions between registry records and `user.v1` wire messages.

use crate::proto;

impl From<registry_core::User> for proto::User {
    fn from(user: registry_core::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

impl From<proto::User> for registry_core::User {
    fn from(user: proto::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// Take the user carried by a create/update request.
///
/// An absent message reads as the default user, the same zero value a
/// proto3 getter yields for an unset field.
pub fn user_or_default(user: Option<proto::User>) -> registry_core::User {
    user.unwrap_or_default().into()
}
