//! # Site Mounter
//!
//! Load a CMS site (pages, snippets, content types and entries, assets,
//! translations) from one place and write it to another. A site lives
//! either as a directory of YAML and Liquid files or in a remote engine
//! behind a REST API; both sides read into and write from the same
//! in-memory [`MountingPoint`](mounting_point::MountingPoint).
//!
//! # Architecture: Reader → Mounting Point → Writer
//!
//! ```text
//! reader::file_system ─┐                     ┌─ writer::file_system
//!                      ├─→ MountingPoint ─→ ─┤
//! reader::api ─────────┘                     └─ writer::api
//! ```
//!
//! Readers feed a [`MountingPointBuilder`](mounting_point::MountingPointBuilder)
//! record by record. Nothing cross-references until `finish`, which resolves
//! entry relationships, validates required fields and builds the page tree.
//! Writers only ever see a finished, consistent site.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`locale`] | Locale codes and the scoped current-locale context |
//! | [`value`] | Dynamic attribute values, links and their comparisons |
//! | [`fields`] | Per-locale attribute storage shared by every model |
//! | [`models`] | Site, pages, snippets, content types and entries, assets, translations |
//! | [`naming`] | Template file names (`about.fr.liquid`) and front matter |
//! | [`slug`] | Permalinks and unique slug generation |
//! | [`query`] | Entry filter and ordering DSL (`date.gte`, `title asc`) |
//! | [`relations`] | Two-phase relationship resolution between entries |
//! | [`tree`] | Page tree from fullpaths, localized fullpaths |
//! | [`mounting_point`] | The mounted site and its builder |
//! | [`reader`] / [`writer`] | Filesystem and API sides |
//! | [`api`] | Engine HTTP client behind the [`ApiClient`](api::ApiClient) trait |
//! | [`config`] | `mounter.toml` loading, validation and env overrides |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Locale Is Passed, Not Ambient
//!
//! Every localized read and write names its locale. The API reader scopes
//! each locale pass with [`LocaleContext::with_locale`](locale::LocaleContext::with_locale),
//! which restores the previous locale even when the pass fails.
//!
//! ## Keys, Not Pointers
//!
//! Pages are keyed by their raw fullpath and entries by `type/slug`.
//! Parent, children and entry links hold keys, so the whole site is plain
//! owned data and a relationship can point at an entry that arrives later.
//!
//! ## `has_many` Is Computed
//!
//! Only the owning side of a relationship is stored. The inverse
//! collection is recomputed by [`MountingPoint::has_many`](mounting_point::MountingPoint::has_many)
//! on every call, so it can never go stale.

pub mod api;
pub mod config;
pub mod fields;
pub mod locale;
pub mod models;
pub mod mounting_point;
pub mod naming;
pub mod output;
pub mod query;
pub mod reader;
pub mod relations;
pub mod slug;
pub mod tree;
pub mod value;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
