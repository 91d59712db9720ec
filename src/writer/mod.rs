//! Writers: persist a [`MountingPoint`](crate::mounting_point::MountingPoint).
//!
//! | Writer | Target |
//! |--------|--------|
//! | [`file_system`] | The local directory layout read by [`reader::file_system`](crate::reader::file_system) |
//! | [`api`] | A remote engine, pushed resource by resource |

pub mod api;
pub mod file_system;

use crate::api::ApiError;
use crate::models::AssetError;
use crate::mounting_point::MountError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode {origin} as YAML: {source}")]
    Yaml {
        origin: String,
        source: serde_yaml::Error,
    },
    #[error("{resource}: response carries no id")]
    MissingId { resource: String },
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
