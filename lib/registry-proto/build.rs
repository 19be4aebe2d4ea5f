//! Compiles `proto/user/v1/user.proto` into messages, the `UserService`
//! server and client, and the descriptor set served by gRPC reflection.
//!
//! Uses the vendored `protoc` unless `PROTOC` already points at one.

use std::path::PathBuf;

const PROTO: &str = "proto/user/v1/user.proto";

/// Messages double as proto3 JSON documents for the HTTP gateway
const JSON_DERIVE: &str = "#[derive(serde::Serialize, serde::Deserialize)]";
const JSON_SHAPE: &str = r#"#[serde(rename_all = "camelCase", default, deny_unknown_fields)]"#;
const JSON_INT32: &str = r#"#[serde(deserialize_with = "crate::json::int32")]"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed={}", PROTO);

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    tonic_build::configure()
        .file_descriptor_set_path(out_dir.join("user_v1_descriptor.bin"))
        .build_server(true)
        .build_client(true)
        .type_attribute(".user.v1", JSON_DERIVE)
        .type_attribute(".user.v1", JSON_SHAPE)
        .field_attribute(".user.v1.User.id", JSON_INT32)
        .field_attribute(".user.v1.GetUserRequest.id", JSON_INT32)
        .field_attribute(".user.v1.DeleteUserRequest.id", JSON_INT32)
        .compile_protos(&[PROTO], &["proto"])?;

    Ok(())
}
