//! Readers: load a persisted site into a [`MountingPoint`].
//!
//! | Reader | Source |
//! |--------|--------|
//! | [`file_system`] | The local directory layout (`config/site.yml`, `app/`, `data/`, `public/`) |
//! | [`api`] | A remote engine reached through an [`ApiClient`](crate::api::ApiClient) |
//!
//! Both feed a [`MountingPointBuilder`](crate::mounting_point::MountingPointBuilder),
//! so slugs, relationships and the page tree are handled the same way
//! whichever side the data came from.
//!
//! [`MountingPoint`]: crate::mounting_point::MountingPoint

pub mod api;
pub mod file_system;

use crate::api::ApiError;
use crate::fields::FieldError;
use crate::models::ModelError;
use crate::mounting_point::MountError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("{origin}: expected {expected}")]
    Shape {
        origin: String,
        expected: &'static str,
    },
    #[error("{origin}: {source}")]
    Model { origin: String, source: ModelError },
    #[error("{origin}: {source}")]
    Field { origin: String, source: FieldError },
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Convert parsed YAML into the JSON shape the models consume.
///
/// Non-string mapping keys (`404:`, `true:`) are stringified; tags are
/// dropped.
pub fn yaml_to_json(yaml: serde_yaml::Value) -> serde_json::Value {
    use serde_yaml::Value as Yaml;
    match yaml {
        Yaml::Null => serde_json::Value::Null,
        Yaml::Bool(b) => serde_json::Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Yaml::String(s) => serde_json::Value::String(s),
        Yaml::Sequence(items) => serde_json::Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => String::new(),
        other => match yaml_to_json(other) {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

/// Unwrap a JSON object, or report what `origin` should have held.
pub(crate) fn into_mapping(
    value: serde_json::Value,
    origin: impl Into<String>,
) -> Result<serde_json::Map<String, serde_json::Value>, ReadError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        _ => Err(ReadError::Shape {
            origin: origin.into(),
            expected: "a mapping",
        }),
    }
}
