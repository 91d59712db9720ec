//! CLI output formatting for every command.
//!
//! Output is **content-centric**: pages show up by title with their
//! fullpath as secondary context, entries by label. Each command has a
//! `format_*` function returning lines (pure, testable) and a `print_*`
//! wrapper that writes them to stdout.
//!
//! # Mount summary
//!
//! ```text
//! Sample Website (en, fr)
//!
//! Pages
//! Home → index (fr: index)
//!     001 About us → about-us (fr: a-propos)
//!         001 John Doe → about-us/john-doe (fr: a-propos/john-doe)
//!     002 Events → events
//!     --- Page not found → 404
//!
//! Content types
//! 001 Events (2 entries)
//!     001 Avogadro's Number
//!     002 Launch
//!
//! Snippets: footer
//! Assets: 1 theme, 1 content
//! Translations: 1
//! ```
//!
//! A `Warnings` section follows when there are dangling references,
//! entries missing required fields, or orphaned pages.

use crate::fields::Entity;
use crate::locale::Locale;
use crate::models::Page;
use crate::mounting_point::MountingPoint;
use crate::writer::api::PushReport;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `Title → fullpath`, plus the fullpath in every other translated locale.
fn page_line(page: &Page, main: &Locale) -> String {
    let title = page.title(main).unwrap_or_else(|| page.key().to_string());
    let translated: Vec<String> = page
        .translated_in()
        .iter()
        .filter(|l| *l != main)
        .map(|l| format!("{l}: {}", page.fullpath(l)))
        .collect();
    if translated.is_empty() {
        format!("{title} → {}", page.fullpath(main))
    } else {
        format!("{title} → {} ({})", page.fullpath(main), translated.join(", "))
    }
}

// ============================================================================
// Mount summary (check, pull)
// ============================================================================

/// Format everything a mounted site holds.
pub fn format_mount_summary(mp: &MountingPoint) -> Vec<String> {
    let main = mp.default_locale();
    let locales: Vec<String> = mp.locales().iter().map(ToString::to_string).collect();
    let mut lines = vec![format!("{} ({})", mp.site.name(), locales.join(", "))];

    if !mp.pages.is_empty() {
        lines.push(String::new());
        lines.push("Pages".to_string());
        lines.extend(format_page_tree(mp, &main));
    }

    if !mp.content_types.is_empty() {
        lines.push(String::new());
        lines.push("Content types".to_string());
        for (i, content_type) in mp.content_types.values().enumerate() {
            let entries = mp.entries_of(&content_type.slug, &main).unwrap_or_default();
            lines.push(format!(
                "{} {} ({} entries)",
                format_index(i + 1),
                content_type.name,
                entries.len()
            ));
            for (j, entry) in entries.iter().enumerate() {
                let label = entry.label(&main).unwrap_or_else(|| entry.slug(&main));
                lines.push(format!("{}{} {}", indent(1), format_index(j + 1), label));
            }
        }
    }

    lines.push(String::new());
    if !mp.snippets.is_empty() {
        let slugs: Vec<&str> = mp.snippets.keys().map(String::as_str).collect();
        lines.push(format!("Snippets: {}", slugs.join(", ")));
    }
    lines.push(format!(
        "Assets: {} theme, {} content",
        mp.theme_assets.len(),
        mp.content_assets.len()
    ));
    lines.push(format!("Translations: {}", mp.translations.len()));

    let warnings = format_warnings(mp);
    if !warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".to_string());
        lines.extend(warnings);
    }
    lines
}

/// The page tree from the root, siblings numbered in order. Pages outside
/// the tree (404, orphans) follow the root's children, marked `---`.
fn format_page_tree(mp: &MountingPoint, main: &Locale) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(root) = mp.root_page() else {
        return lines;
    };
    lines.push(page_line(root, main));
    walk_children(mp, root.key(), 1, main, &mut lines);

    let attached = crate::tree::walk(&mp.pages);
    for page in mp.pages.values().filter(|p| !attached.iter().any(|k| k == p.key())) {
        lines.push(format!("{}--- {}", indent(1), page_line(page, main)));
    }
    lines
}

fn walk_children(mp: &MountingPoint, key: &str, depth: usize, main: &Locale, lines: &mut Vec<String>) {
    for (i, child) in mp.children(key).into_iter().enumerate() {
        lines.push(format!(
            "{}{} {}",
            indent(depth),
            format_index(i + 1),
            page_line(child, main)
        ));
        walk_children(mp, child.key(), depth + 1, main, lines);
    }
}

/// One line per problem found while mounting.
pub fn format_warnings(mp: &MountingPoint) -> Vec<String> {
    let mut lines: Vec<String> = mp
        .dangling
        .iter()
        .map(|d| format!("{}dangling: {d}", indent(1)))
        .collect();
    for entry in mp.invalid_entries() {
        for failure in entry.errors() {
            lines.push(format!("{}invalid: {} {failure}", indent(1), entry.key()));
        }
    }
    lines.extend(mp.orphans.iter().map(|o| format!("{}orphan: {o}", indent(1))));
    lines
}

pub fn print_mount_summary(mp: &MountingPoint) {
    for line in format_mount_summary(mp) {
        println!("{}", line);
    }
}

// ============================================================================
// Pull
// ============================================================================

/// Files written by a pull, sorted, relative to `root`.
pub fn format_written(written: &[PathBuf], root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
    paths.sort();
    let mut lines: Vec<String> = paths.into_iter().map(|p| format!("{}{p}", indent(1))).collect();
    lines.push(format!("Wrote {} files → {}", written.len(), root.display()));
    lines
}

pub fn print_written(written: &[PathBuf], root: &Path) {
    for line in format_written(written, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Push
// ============================================================================

pub fn format_push_report(report: &PushReport) -> Vec<String> {
    vec![format!("Pushed: {report}")]
}

pub fn print_push_report(report: &PushReport) {
    for line in format_push_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::file_system::read;
    use crate::test_helpers::{setup_fixtures, write_file};
    use crate::tree::OrphanPolicy;

    fn fixture_summary() -> Vec<String> {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();
        format_mount_summary(&mp)
    }

    #[test]
    fn summary_leads_with_site_and_locales() {
        let lines = fixture_summary();
        assert_eq!(lines[0], "Sample Website (en, fr)");
    }

    #[test]
    fn page_tree_numbers_siblings_per_level() {
        let lines = fixture_summary();
        let start = lines.iter().position(|l| l == "Pages").unwrap();
        assert!(lines[start + 1].starts_with("Home → index"));
        assert_eq!(
            lines[start + 2],
            "    001 About us → about-us (fr: a-propos)",
            "full output: {lines:#?}"
        );
        assert!(lines[start + 3].starts_with("        001 John Doe → about-us/john-doe"));
        assert!(lines[start + 4].starts_with("    002 Events → events"));
        assert!(lines.iter().any(|l| l.starts_with("    --- ") && l.ends_with("→ 404")));
    }

    #[test]
    fn content_types_list_entries_in_order() {
        let lines = fixture_summary();
        let start = lines.iter().position(|l| l == "Content types").unwrap();
        assert_eq!(lines[start + 1], "001 Events (2 entries)");
        assert_eq!(lines[start + 2], "    001 Avogadro's Number");
        assert_eq!(lines[start + 3], "    002 Launch");
    }

    #[test]
    fn clean_site_has_no_warnings() {
        let lines = fixture_summary();
        assert!(!lines.iter().any(|l| l == "Warnings"));
    }

    #[test]
    fn dangling_reference_reported() {
        let tmp = setup_fixtures();
        write_file(
            tmp.path(),
            "data/events.yml",
            "- Orphan talk:\n    date: 2024-07-01\n    speaker: nobody\n",
        );
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();
        let warnings = format_warnings(&mp);
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].starts_with("    dangling: events/orphan-talk"));
        assert!(warnings[0].contains("nobody"));
    }

    #[test]
    fn written_files_sorted_with_total() {
        let written = vec![PathBuf::from("data/b.yml"), PathBuf::from("config/site.yml")];
        let lines = format_written(&written, Path::new("out"));
        assert_eq!(lines, vec!["    config/site.yml", "    data/b.yml", "Wrote 2 files → out"]);
    }

    #[test]
    fn push_report_line() {
        let report = PushReport {
            created: 3,
            updated: 1,
            skipped: 2,
        };
        assert_eq!(format_push_report(&report), vec!["Pushed: 3 created, 1 updated, 2 unchanged"]);
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }
}
