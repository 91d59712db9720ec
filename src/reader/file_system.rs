//! Filesystem reader.
//!
//! ## Directory Structure
//!
//! ```text
//! site/
//! ├── mounter.toml                     # Mounter config (optional)
//! ├── config/
//! │   ├── site.yml                     # Site name, locales, SEO
//! │   └── translations.yml             # key → {locale: text} (optional)
//! ├── app/
//! │   ├── content_types/
//! │   │   └── events.yml               # One content type per file
//! │   └── views/
//! │       ├── pages/
//! │       │   ├── index.liquid         # Page "index", main locale
//! │       │   ├── index.fr.liquid      # Its French translation
//! │       │   └── about-us/
//! │       │       └── john-doe.liquid  # Page "about-us/john-doe"
//! │       └── snippets/
//! │           └── footer.liquid.haml
//! ├── data/
//! │   └── events.yml                   # Entries of "events", label-keyed
//! └── public/
//!     ├── stylesheets/app.css          # Theme asset
//!     └── samples/photo.jpg            # Content asset
//! ```
//!
//! ## Entry Files
//!
//! `data/<content type>.yml` holds a list. Each item is either a
//! label-keyed mapping or a plain attribute mapping:
//!
//! ```yaml
//! - "Avogadro's Number":
//!     date: 2024-05-01
//!     speaker: ann
//! - title: Launch
//! ```
//!
//! The label is assigned to the content type's label field unless the
//! attributes already carry it.
//!
//! ## Templates
//!
//! Page files may start with YAML front matter holding page attributes;
//! the rest is the raw template. A `.<locale>` segment before the format
//! extensions marks a translation of the same page.

use super::{ReadError, into_mapping, yaml_to_json};
use crate::fields::Entity;
use crate::locale::Locale;
use crate::models::asset::split_asset_path;
use crate::models::{AssetSource, ContentAsset, ContentType, Site, ThemeAsset, Translation};
use crate::mounting_point::{MountingPoint, MountingPointBuilder};
use crate::naming::{self, parse_template_name};
use crate::tree::OrphanPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const SITE_FILE: &str = "config/site.yml";
pub const TRANSLATIONS_FILE: &str = "config/translations.yml";
pub const CONTENT_TYPES_DIR: &str = "app/content_types";
pub const DATA_DIR: &str = "data";
pub const PAGES_DIR: &str = "app/views/pages";
pub const SNIPPETS_DIR: &str = "app/views/snippets";
pub const PUBLIC_DIR: &str = "public";
/// Folder below `public/` holding content assets.
pub const SAMPLES_DIR: &str = "samples";

/// Read the site rooted at `root`.
pub fn read(root: &Path, orphans: OrphanPolicy) -> Result<MountingPoint, ReadError> {
    info!(root = %root.display(), "reading site from filesystem");

    let site = read_site(root)?;
    let mut builder = MountingPointBuilder::new(site).orphan_policy(orphans);

    read_content_types(root, &mut builder)?;
    read_entries(root, &mut builder)?;
    read_pages(root, &mut builder)?;
    read_snippets(root, &mut builder)?;
    read_assets(root, &mut builder)?;
    read_translations(root, &mut builder)?;

    Ok(builder.finish()?)
}

fn read_site(root: &Path) -> Result<Site, ReadError> {
    let path = root.join(SITE_FILE);
    let raw = into_mapping(read_yaml(&path)?, SITE_FILE)?;
    Site::from_raw(&raw).map_err(|source| ReadError::Field {
        origin: SITE_FILE.to_string(),
        source,
    })
}

fn read_content_types(root: &Path, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    let main = builder.default_locale();
    for path in yaml_files(&root.join(CONTENT_TYPES_DIR))? {
        let origin = relative(root, &path);
        let raw = into_mapping(read_yaml(&path)?, &origin)?;
        let content_type = ContentType::from_raw(&raw, &file_stem(&path), &main)
            .map_err(|source| ReadError::Model {
                origin: origin.clone(),
                source,
            })?;
        builder.add_content_type(content_type);
    }
    Ok(())
}

fn read_entries(root: &Path, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    let main = builder.default_locale();
    for path in yaml_files(&root.join(DATA_DIR))? {
        let origin = relative(root, &path);
        let slug = file_stem(&path);
        let items = match read_yaml(&path)? {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Null => Vec::new(),
            _ => {
                return Err(ReadError::Shape {
                    origin,
                    expected: "a list of entries",
                });
            }
        };
        let Some(content_type) = builder.content_type(&slug).cloned() else {
            return Err(crate::mounting_point::MountError::UnknownContentType(slug).into());
        };
        for item in items {
            let raw = entry_attributes(item, &content_type, &origin)?;
            builder.add_entry(&slug, &raw, &main)?;
        }
        debug!(content_type = %slug, "entries read");
    }
    Ok(())
}

/// Normalize one item of a data file into an attribute mapping.
pub fn entry_attributes(
    item: serde_json::Value,
    content_type: &ContentType,
    origin: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ReadError> {
    let label_field = content_type.label_field().map(|f| f.name.clone());
    let is_attribute = |key: &str| key.starts_with('_') || content_type.find_field(key).is_some();

    let (label, mut attributes) = match item {
        serde_json::Value::String(label) => (Some(label), serde_json::Map::new()),
        serde_json::Value::Object(map)
            if map.len() == 1
                && map
                    .iter()
                    .all(|(k, v)| !is_attribute(k) && (v.is_object() || v.is_null())) =>
        {
            let Some((label, attributes)) = map.into_iter().next() else {
                return Ok(serde_json::Map::new());
            };
            (Some(label), into_mapping(attributes, origin)?)
        }
        serde_json::Value::Object(map) => (None, map),
        _ => {
            return Err(ReadError::Shape {
                origin: origin.to_string(),
                expected: "an entry mapping",
            });
        }
    };

    if let (Some(label), Some(field)) = (label, label_field) {
        attributes
            .entry(field)
            .or_insert(serde_json::Value::String(label));
    }
    Ok(attributes)
}

fn read_pages(root: &Path, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    let dir = root.join(PAGES_DIR);
    let locales = builder.locales().to_vec();
    let main = builder.default_locale();

    for path in files_under(&dir)? {
        let Some(template) = read_template(&dir, &path, &locales, &main)? else {
            warn!(file = %relative(root, &path), "not a template, skipped");
            continue;
        };
        let origin = relative(root, &path);
        let attributes = match template.front_matter {
            Some(yaml) => into_mapping(parse_yaml(&yaml, &path)?, &origin)?,
            None => serde_json::Map::new(),
        };

        let page = builder.page(&template.key);
        page.apply_raw(&attributes, &template.locale, &locales)
            .map_err(|source| ReadError::Field { origin, source })?;
        page.set_template(&template.body, &template.locale);
        debug!(page = %template.key, locale = %template.locale, "page read");
    }
    Ok(())
}

fn read_snippets(root: &Path, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    let dir = root.join(SNIPPETS_DIR);
    let locales = builder.locales().to_vec();
    let main = builder.default_locale();

    for path in files_under(&dir)? {
        let Some(template) = read_template(&dir, &path, &locales, &main)? else {
            warn!(file = %relative(root, &path), "not a template, skipped");
            continue;
        };
        let snippet = builder.snippet(&template.key);
        snippet.set_template(&template.body, &template.locale);
        if let Some(yaml) = template.front_matter {
            let origin = relative(root, &path);
            let attributes = into_mapping(parse_yaml(&yaml, &path)?, &origin)?;
            if let Some(name) = attributes.get("name").and_then(|v| v.as_str()) {
                snippet
                    .set("name", name, &template.locale)
                    .map_err(|source| ReadError::Field { origin, source })?;
            }
        }
    }
    Ok(())
}

/// A template file split into key, locale, front matter and body.
struct TemplateFile {
    key: String,
    locale: Locale,
    front_matter: Option<String>,
    body: String,
}

fn read_template(
    dir: &Path,
    path: &Path,
    locales: &[Locale],
    main: &Locale,
) -> Result<Option<TemplateFile>, ReadError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = parse_template_name(&file_name, locales);
    if !name.is_template() {
        return Ok(None);
    }

    let rel_dir = path
        .parent()
        .and_then(|p| p.strip_prefix(dir).ok())
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    let key = if rel_dir.is_empty() {
        name.stem
    } else {
        format!("{rel_dir}/{}", name.stem)
    };

    let content = read_text(path)?;
    let (front_matter, body) = naming::split_front_matter(&content);
    Ok(Some(TemplateFile {
        key,
        locale: name.locale.unwrap_or_else(|| main.clone()),
        front_matter: front_matter.map(String::from),
        body: body.to_string(),
    }))
}

fn read_assets(root: &Path, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    let public = root.join(PUBLIC_DIR);
    let samples = public.join(SAMPLES_DIR);
    for path in files_under(&public)? {
        if let Ok(rel) = path.strip_prefix(&samples) {
            let (folder, filename) = split_asset_path(rel);
            builder.add_content_asset(ContentAsset::new(folder, filename, AssetSource::File(path.clone())));
        } else if let Ok(rel) = path.strip_prefix(&public) {
            let (folder, filename) = split_asset_path(rel);
            builder.add_theme_asset(ThemeAsset::new(folder, filename, AssetSource::File(path.clone())));
        }
    }
    Ok(())
}

fn read_translations(root: &Path, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    let path = root.join(TRANSLATIONS_FILE);
    if !path.exists() {
        return Ok(());
    }
    let raw = into_mapping(read_yaml(&path)?, TRANSLATIONS_FILE)?;
    for (key, values) in raw {
        let values = into_mapping(values, format!("{TRANSLATIONS_FILE}: {key}"))?;
        builder.add_translation(Translation::from_raw(key, &values));
    }
    Ok(())
}

// ============================================================================
// File helpers
// ============================================================================

fn read_text(path: &Path) -> Result<String, ReadError> {
    fs::read_to_string(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_yaml(path: &Path) -> Result<serde_json::Value, ReadError> {
    let text = read_text(path)?;
    parse_yaml(&text, path)
}

fn parse_yaml(text: &str, path: &Path) -> Result<serde_json::Value, ReadError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|source| ReadError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(yaml_to_json(yaml))
}

/// Visible files below `dir`, sorted by path. A missing directory has none.
fn files_under(dir: &Path) -> Result<Vec<PathBuf>, ReadError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(|err| ReadError::Io {
            path: err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: err.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, ReadError> {
    Ok(files_under(dir)?
        .into_iter()
        .filter(|p| {
            p.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
        })
        .collect())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentFieldKind;
    use crate::mounting_point::MountError;
    use crate::relations::RelationError;
    use crate::test_helpers::{find_entry, find_page, setup_fixtures, write_file};
    use crate::value::Value;
    use serde_json::json;

    fn en() -> Locale {
        Locale::from("en")
    }

    fn fr() -> Locale {
        Locale::from("fr")
    }

    #[test]
    fn reads_fixture_site() {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();

        assert_eq!(mp.site.name(), "Sample Website");
        assert_eq!(mp.locales(), vec![en(), fr()]);
        assert!(mp.content_types.contains_key("events"));
        assert!(mp.content_types.contains_key("speakers"));
        assert!(mp.snippets.contains_key("footer"));
        assert!(mp.dangling.is_empty());
    }

    #[test]
    fn label_keyed_entries_get_label_and_slug() {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();
        let entry = find_entry(&mp, "events/avogadro-s-number");
        assert_eq!(entry.label(&en()).as_deref(), Some("Avogadro's Number"));
        assert_eq!(
            entry.get_dynamic("date", &en()).unwrap(),
            Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
    }

    #[test]
    fn belongs_to_resolved_from_slug() {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();
        let entry = find_entry(&mp, "events/avogadro-s-number");
        let speaker = entry.get_dynamic("speaker", &en()).unwrap();
        assert_eq!(speaker.as_link().map(|l| l.key.as_str()), Some("speakers/ann-smith"));

        let ann = find_entry(&mp, "speakers/ann-smith");
        let events = mp.has_many(ann, "events", &en()).unwrap();
        assert!(!events.is_empty());
    }

    #[test]
    fn pages_form_a_localized_tree() {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();

        let index = find_page(&mp, "index");
        assert_eq!(index.children(), ["about-us".to_string(), "events".to_string()]);
        assert_eq!(index.title(&fr()).as_deref(), Some("Accueil"));
        assert_eq!(index.title(&en()).as_deref(), Some("Home"));

        let about = find_page(&mp, "about-us");
        assert_eq!(about.fullpath(&fr()), "a-propos");
        assert!(about.template(&en()).is_some_and(|t| t.contains("About")));
        assert_eq!(find_page(&mp, "about-us/john-doe").fullpath(&fr()), "a-propos/john-doe");
    }

    #[test]
    fn assets_split_between_theme_and_content() {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();
        let theme: Vec<String> = mp.theme_assets.iter().map(|a| a.path()).collect();
        let content: Vec<String> = mp.content_assets.iter().map(|a| a.path()).collect();
        assert_eq!(theme, vec!["stylesheets/application.css"]);
        assert_eq!(content, vec!["photo.txt"]);
    }

    #[test]
    fn translations_read() {
        let tmp = setup_fixtures();
        let mp = read(tmp.path(), OrphanPolicy::Error).unwrap();
        assert_eq!(mp.translation("read_more", &fr()), Some("Lire la suite"));
        assert_eq!(mp.translation("read_more", &Locale::from("de")), Some("Read more"));
    }

    #[test]
    fn unknown_front_matter_key_is_fatal() {
        let tmp = setup_fixtures();
        write_file(tmp.path(), "app/views/pages/music.liquid", "---\nlayout: wide\n---\nbody");
        let err = read(tmp.path(), OrphanPolicy::Error).unwrap_err();
        assert!(matches!(err, ReadError::Field { ref origin, .. } if origin.contains("music")));
    }

    #[test]
    fn orphan_page_honours_policy() {
        let tmp = setup_fixtures();
        write_file(tmp.path(), "app/views/pages/archive/2020.liquid", "old");
        assert!(matches!(
            read(tmp.path(), OrphanPolicy::Error),
            Err(ReadError::Mount(MountError::Tree(_)))
        ));
        let mp = read(tmp.path(), OrphanPolicy::Warn).unwrap();
        assert_eq!(mp.orphans, vec!["archive/2020".to_string()]);
    }

    #[test]
    fn relation_to_unknown_type_is_fatal() {
        let tmp = setup_fixtures();
        write_file(
            tmp.path(),
            "app/content_types/venues.yml",
            "name: Venues\nfields:\n  - name:\n      type: string\n  - city:\n      type: belongs_to\n      class_name: cities\n",
        );
        write_file(tmp.path(), "data/venues.yml", "- Hall:\n    city: paris\n");
        let err = read(tmp.path(), OrphanPolicy::Error).unwrap_err();
        assert!(matches!(
            err,
            ReadError::Mount(MountError::Relation(RelationError::UnknownContentType { .. }))
        ));
    }

    #[test]
    fn plain_and_label_keyed_items() {
        let mut title = crate::models::ContentField::new("title", ContentFieldKind::String);
        title.required = true;
        let ct = ContentType::new("Events", "events").with_field(title);

        let labelled = entry_attributes(json!({"Launch": {"_position": 1}}), &ct, "x").unwrap();
        assert_eq!(labelled["title"], json!("Launch"));
        assert_eq!(labelled["_position"], json!(1));

        let plain = entry_attributes(json!({"title": "Keynote"}), &ct, "x").unwrap();
        assert_eq!(plain["title"], json!("Keynote"));

        let bare = entry_attributes(json!("Party"), &ct, "x").unwrap();
        assert_eq!(bare["title"], json!("Party"));

        assert!(entry_attributes(json!(3), &ct, "x").is_err());
    }
}
