//! Page hierarchy construction.
//!
//! Readers hand over a flat `raw fullpath → Page` map. The builder wires
//! `parent`/`children` keys into those pages:
//!
//! ```text
//! index                      depth 0 (root)
//! ├── about-us               depth 1: child of index
//! │   ├── about-us/john-doe  depth 2: child of the page at its directory
//! │   └── about-us/jane-doe
//! └── music
//! 404                        depth 0, never a child
//! ```
//!
//! Candidates are sorted lexically and then (stably) by depth, so a parent is
//! always visited before its children whatever order the reader produced.
//! Children are ordered by declared `position`; pages without one keep
//! discovery order after the positioned ones.
//!
//! Once the structure is known, [`localize_fullpaths`] derives each page's
//! fullpath per locale from its parent's localized fullpath and its own
//! localized slug.

use crate::fields::Entity;
use crate::locale::Locale;
use crate::models::Page;
use crate::models::page::{INDEX, NOT_FOUND, depth_of, parent_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("no parent page for: {}", .fullpaths.join(", "))]
    MissingParent { fullpaths: Vec<String> },
    #[error("site has pages but no '{INDEX}' page")]
    MissingRoot,
}

/// What to do with pages whose parent does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Fail with [`TreeError::MissingParent`].
    #[default]
    Error,
    /// Log each orphan and leave it unattached.
    Warn,
}

/// Attach every page to its parent.
///
/// Returns the keys of orphaned pages (always empty under
/// [`OrphanPolicy::Error`], which fails instead). Rebuilding an already
/// built tree yields the same structure.
pub fn build_tree(
    pages: &mut BTreeMap<String, Page>,
    policy: OrphanPolicy,
) -> Result<Vec<String>, TreeError> {
    if pages.is_empty() {
        return Ok(Vec::new());
    }
    if !pages.contains_key(INDEX) {
        return Err(TreeError::MissingRoot);
    }

    for page in pages.values_mut() {
        page.set_parent(None);
        page.set_children(Vec::new());
    }

    let mut candidates: Vec<String> = pages
        .keys()
        .filter(|k| k.as_str() != INDEX && k.as_str() != NOT_FOUND)
        .cloned()
        .collect();
    candidates.sort();
    candidates.sort_by_key(|k| depth_of(k));

    attach(pages, INDEX, &mut candidates);

    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    match policy {
        OrphanPolicy::Error => Err(TreeError::MissingParent {
            fullpaths: candidates,
        }),
        OrphanPolicy::Warn => {
            for orphan in &candidates {
                warn!(fullpath = %orphan, parent = %parent_path(orphan), "page has no parent, left unattached");
            }
            Ok(candidates)
        }
    }
}

fn is_subpage(parent: &str, candidate: &str) -> bool {
    if candidate == INDEX || candidate == NOT_FOUND {
        return false;
    }
    if parent == INDEX {
        depth_of(candidate) == 1
    } else {
        parent_path(candidate) == parent
    }
}

fn attach(pages: &mut BTreeMap<String, Page>, parent: &str, candidates: &mut Vec<String>) {
    let (matched, remaining): (Vec<String>, Vec<String>) = candidates
        .drain(..)
        .partition(|c| is_subpage(parent, c));
    *candidates = remaining;
    if matched.is_empty() {
        return;
    }

    let mut children = matched;
    children.sort_by_key(|key| {
        pages
            .get(key)
            .and_then(Page::position)
            .unwrap_or(i64::MAX)
    });

    for child in &children {
        if let Some(page) = pages.get_mut(child) {
            page.set_parent(Some(parent.to_string()));
        }
    }
    debug!(parent, children = children.len(), "attached pages");
    if let Some(page) = pages.get_mut(parent) {
        page.set_children(children.clone());
    }

    for child in &children {
        attach(pages, child, candidates);
    }
}

/// Keys in parent-before-child order, starting at the root.
pub fn walk(pages: &BTreeMap<String, Page>) -> Vec<String> {
    let mut order = Vec::new();
    let mut stack = vec![INDEX.to_string()];
    while let Some(key) = stack.pop() {
        let Some(page) = pages.get(&key) else { continue };
        stack.extend(page.children().iter().rev().cloned());
        order.push(key);
    }
    order
}

/// Derive every attached page's fullpath for each locale it is translated
/// in (plus its main locale).
pub fn localize_fullpaths(pages: &mut BTreeMap<String, Page>) {
    for key in walk(pages) {
        let Some(page) = pages.get(&key) else { continue };
        let main = page.main_locale().clone();
        let mut locales: Vec<Locale> = page
            .translated_in()
            .iter()
            .filter(|l| **l != main)
            .cloned()
            .collect();
        locales.insert(0, main);

        let localized: Vec<(Locale, String)> = locales
            .into_iter()
            .map(|locale| {
                let fullpath = if page.is_index_or_404() {
                    page.key().to_string()
                } else {
                    match page.parent().and_then(|p| pages.get(p)) {
                        Some(parent) if !parent.is_index() => {
                            format!("{}/{}", parent.fullpath(&locale), page.slug(&locale))
                        }
                        _ => page.slug(&locale),
                    }
                };
                (locale, fullpath)
            })
            .collect();

        if let Some(page) = pages.get_mut(&key) {
            for (locale, fullpath) in localized {
                page.set_fullpath(&fullpath, &locale);
            }
        }
    }
}
