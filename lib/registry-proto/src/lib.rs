//! Protobuf types and conversions for the user registry.
//!
//! This crate provides:
//! - Messages and the `UserService` server/client generated from
//!   `proto/user/v1/user.proto` ([`proto`])
//! - The encoded file descriptor set served through gRPC reflection
//! - Conversions between registry records and wire messages ([`convert`])

#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

/// Generated protobuf types and service traits.
pub mod proto {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    tonic::include_proto!("user.v1");
}

/// Serialized `FileDescriptorSet` for gRPC reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("user_v1_descriptor");

/// Protobuf package of the registry messages.
pub const PACKAGE: &str = "user.v1";

pub use proto::user_service_server::SERVICE_NAME;

pub mod convert;
pub mod json;

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use prost_types::FileDescriptorSet;

    fn descriptor() -> FileDescriptorSet {
        FileDescriptorSet::decode(FILE_DESCRIPTOR_SET).unwrap()
    }

    #[test]
    fn test_descriptor_declares_user_service() {
        let set = descriptor();
        let file = set
            .file
            .iter()
            .find(|f| f.package() == PACKAGE)
            .expect("user.v1 file in descriptor set");

        let service = &file.service[0];
        assert_eq!(format!("{}.{}", PACKAGE, service.name()), SERVICE_NAME);

        let methods: Vec<&str> = service.method.iter().map(|m| m.name()).collect();
        assert_eq!(methods, vec!["CreateUser", "GetUser", "UpdateUser", "DeleteUser"]);
        for method in &service.method {
            assert!(method.input_type().starts_with(".user.v1."));
            assert!(method.output_type().starts_with(".user.v1."));
        }
    }

    #[test]
    fn test_descriptor_matches_generated_user() {
        let set = descriptor();
        let user = set
            .file
            .iter()
            .flat_map(|f| f.message_type.iter())
            .find(|m| m.name() == "User")
            .unwrap();
        let fields: Vec<(&str, i32)> = user.field.iter().map(|f| (f.name(), f.number())).collect();
        assert_eq!(fields, vec![("id", 1), ("name", 2), ("email", 3)]);

        // id = 1, varint 5
        let encoded = proto::User {
            id: 5,
            ..Default::default()
        }
        .encode_to_vec();
        assert_eq!(encoded, vec![0x08, 0x05]);
    }
}
