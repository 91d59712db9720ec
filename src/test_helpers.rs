//! Shared test utilities for the site-mounter test suite.
//!
//! Provides fixture setup, lookup helpers and page-tree assertions that work
//! with a mounted site (`MountingPoint`, `Page`, `ContentEntry`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let mp = file_system::read(tmp.path(), OrphanPolicy::Error).unwrap();
//!
//! let entry = find_entry(&mp, "events/launch");
//! assert_eq!(entry.slug(&en()), "launch");
//!
//! assert_children(&mp.pages, "index", &["about-us", "events"]);
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

use crate::fields::Entity;
use crate::locale::Locale;
use crate::models::{ContentEntry, Page};
use crate::mounting_point::MountingPoint;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Flat page map keyed by raw fullpath, main locale `en`. A `Some`
/// position is stored on the page.
pub fn page_map(pages: &[(&str, Option<i64>)]) -> BTreeMap<String, Page> {
    let en = Locale::from("en");
    pages
        .iter()
        .map(|(key, position)| {
            let mut page = Page::new(*key, en.clone());
            if let Some(position) = position {
                page.set("position", *position, &en).unwrap();
            }
            (key.to_string(), page)
        })
        .collect()
}

// =========================================================================
// Mounting point lookups (panic with the available keys on a miss)
// =========================================================================

/// Find a page by raw fullpath. Panics if not found.
pub fn find_page<'a>(mp: &'a MountingPoint, key: &str) -> &'a Page {
    mp.pages.get(key).unwrap_or_else(|| {
        let keys: Vec<&str> = mp.pages.keys().map(String::as_str).collect();
        panic!("page '{key}' not found. Available: {keys:?}")
    })
}

/// Find a content entry by `type/slug` key. Panics if not found.
pub fn find_entry<'a>(mp: &'a MountingPoint, key: &str) -> &'a ContentEntry {
    mp.content_entries.get(key).unwrap_or_else(|| {
        let keys: Vec<&str> = mp.content_entries.keys().map(String::as_str).collect();
        panic!("entry '{key}' not found. Available: {keys:?}")
    })
}

// =========================================================================
// Tree helpers
// =========================================================================

/// Assert the ordered children of the page at `key`.
pub fn assert_children(pages: &BTreeMap<String, Page>, key: &str, expected: &[&str]) {
    let page = pages.get(key).unwrap_or_else(|| {
        let keys: Vec<&str> = pages.keys().map(String::as_str).collect();
        panic!("page '{key}' not found. Available: {keys:?}")
    });
    let actual: Vec<&str> = page.children().iter().map(String::as_str).collect();
    assert_eq!(actual, expected.to_vec(), "children of '{key}' mismatch");
}
