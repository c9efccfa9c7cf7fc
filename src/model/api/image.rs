//! Serde helpers carrying [`Photo`]s as base64 strings.

use data_encoding::BASE64;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

use crate::model::common::photo::Photo;

pub fn serialize<S: Serializer>(photo: &Photo, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(photo))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Photo, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    decode(&encoded).map_err(D::Error::custom)
}

/// Decode a base64 image, tolerating a `data:image/...;base64,` prefix.
pub fn decode(encoded: &str) -> Result<Photo, String> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };
    BASE64
        .decode(payload.trim().as_bytes())
        .map(Photo::from)
        .map_err(|e| format!("invalid base64 image: {e}"))
}

/// The same, for optional images.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(photo: &Option<Photo>, serializer: S) -> Result<S::Ok, S::Error> {
        match photo {
            Some(photo) => super::serialize(photo, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Photo>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| decode(&encoded).map_err(D::Error::custom))
            .transpose()
    }
}
