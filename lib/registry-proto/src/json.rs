//! proto3 JSON helpers for the generated messages

use serde::de::{Deserializer, Error};
use serde::Deserialize;

/// Decode an `int32` written either as a JSON number or a decimal string.
pub fn int32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int32 {
        Number(i32),
        Text(String),
    }

    match Int32::deserialize(deserializer)? {
        Int32::Number(value) => Ok(value),
        Int32::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid int32 {:?}: {}", text, e))),
    }
}
