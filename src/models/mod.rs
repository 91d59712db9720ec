//! Typed records of a mounted site.
//!
//! | Type | Keyed by | Notes |
//! |------|----------|-------|
//! | [`Site`] | — | one per mounting point; its first locale is the default |
//! | [`Page`] | raw fullpath | tree links are keys, not pointers |
//! | [`Snippet`] | slug | localized template |
//! | [`ContentType`] | slug | owns its [`ContentField`] list |
//! | [`ContentEntry`] | `"{content_type}/{slug}"` | dynamic attributes from its type |
//! | [`ThemeAsset`] / [`ContentAsset`] | folder + filename | lazily loaded bytes |
//! | [`Translation`] | key | per-locale strings |
//!
//! Records that carry localized values ([`Site`], [`Page`], [`Snippet`],
//! [`EditableElement`], [`ContentEntry`]) implement [`Entity`](crate::fields::Entity)
//! over an [`Attributes`](crate::fields::Attributes) store. The others are
//! plain structs whose `from_raw` constructors reject unknown keys.

pub mod asset;
pub mod content_entry;
pub mod content_type;
pub mod page;
pub mod site;
pub mod snippet;
pub mod translation;

pub use asset::{AssetError, AssetSource, ContentAsset, ThemeAsset};
pub use content_entry::{ContentEntry, ValidationFailure};
pub use content_type::{ContentField, ContentFieldKind, ContentType, SelectOption, UnknownFieldKind};
pub use page::{EditableElement, Page};
pub use site::Site;
pub use snippet::Snippet;
pub use translation::Translation;

use crate::fields::FieldError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("{entity}: '{key}' must be {expected}")]
    InvalidValue {
        entity: String,
        key: String,
        expected: &'static str,
    },
    #[error("content field '{field}' has unknown type '{kind}'")]
    UnknownFieldType { field: String, kind: String },
}

/// Read an optional string out of a raw mapping.
pub(crate) fn raw_str(
    raw: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    entity: &str,
) -> Result<Option<String>, ModelError> {
    match raw.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ModelError::InvalidValue {
            entity: entity.to_string(),
            key: key.to_string(),
            expected: "a string",
        }),
    }
}

/// Read an optional boolean out of a raw mapping.
pub(crate) fn raw_bool(
    raw: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    entity: &str,
) -> Result<Option<bool>, ModelError> {
    match raw.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
        Some(serde_json::Value::String(s)) if s == "true" || s == "false" => Ok(Some(s == "true")),
        Some(_) => Err(ModelError::InvalidValue {
            entity: entity.to_string(),
            key: key.to_string(),
            expected: "a boolean",
        }),
    }
}
