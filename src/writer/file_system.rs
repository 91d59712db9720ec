//! Filesystem writer: the inverse of [`reader::file_system`].
//!
//! Every resource lands where the reader looks for it, so reading the
//! output back yields the same site. Entries are written in their content
//! type's default order, label-keyed when the label field is not
//! localized; links are written as the target's slug.
//!
//! [`reader::file_system`]: crate::reader::file_system

use super::WriteError;
use crate::fields::Entity;
use crate::locale::Locale;
use crate::models::{ContentEntry, ContentType, Page};
use crate::mounting_point::MountingPoint;
use crate::naming::{join_front_matter, template_file_name};
use crate::reader::file_system::{
    CONTENT_TYPES_DIR, DATA_DIR, PAGES_DIR, PUBLIC_DIR, SAMPLES_DIR, SITE_FILE, SNIPPETS_DIR,
    TRANSLATIONS_FILE,
};
use crate::value::Link;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type Record = serde_json::Map<String, serde_json::Value>;

/// Write `mp` below `root`. Returns the written paths, relative to `root`.
pub fn write(mp: &MountingPoint, root: &Path) -> Result<Vec<PathBuf>, WriteError> {
    info!(root = %root.display(), "writing site to filesystem");
    let mut out = Output {
        root,
        written: Vec::new(),
    };
    let main = mp.default_locale();

    out.yaml(SITE_FILE, mp.site.to_raw())?;

    for content_type in mp.content_types.values() {
        out.yaml(
            &format!("{CONTENT_TYPES_DIR}/{}.yml", content_type.slug),
            content_type.to_raw(),
        )?;
        let items: Vec<serde_json::Value> = mp
            .entries_of(&content_type.slug, &main)?
            .into_iter()
            .map(|entry| data_item(entry, content_type, &main))
            .collect();
        out.yaml(
            &format!("{DATA_DIR}/{}.yml", content_type.slug),
            serde_json::Value::Array(items),
        )?;
    }

    for page in mp.pages.values() {
        for locale in written_locales(page.main_locale(), page.translated_in()) {
            let front_matter = page_front_matter(page, &locale);
            let template = exact_string(page, "template", &locale);
            let name = template_file_name(page.key(), &locale, &main);
            out.template(&format!("{PAGES_DIR}/{name}"), front_matter, &template)?;
        }
    }

    for snippet in mp.snippets.values() {
        for locale in written_locales(snippet.main_locale(), snippet.translated_in()) {
            let mut front_matter = Record::new();
            if locale == main {
                front_matter.insert("name".into(), snippet.name().into());
            }
            let template = exact_string(snippet, "template", &locale);
            let name = template_file_name(&snippet.slug(), &locale, &main);
            out.template(&format!("{SNIPPETS_DIR}/{name}"), front_matter, &template)?;
        }
    }

    for asset in &mp.theme_assets {
        out.bytes(&format!("{PUBLIC_DIR}/{}", asset.path()), asset.content()?)?;
    }
    for asset in &mp.content_assets {
        out.bytes(&format!("{PUBLIC_DIR}/{SAMPLES_DIR}/{}", asset.path()), asset.content()?)?;
    }

    if !mp.translations.is_empty() {
        let translations: Record = mp
            .translations
            .values()
            .map(|t| (t.key.clone(), serde_json::Value::Object(t.to_raw())))
            .collect();
        out.yaml(TRANSLATIONS_FILE, translations)?;
    }

    info!(files = out.written.len(), "site written");
    Ok(out.written)
}

/// One item of a data file: `{label: attributes}` when the label can stand
/// in for its field, else the plain attribute mapping.
fn data_item(entry: &ContentEntry, content_type: &ContentType, main: &Locale) -> serde_json::Value {
    let mut attributes = entry.to_raw(link_slug);
    let label_field = content_type.label_field().filter(|f| !f.localized);
    match (label_field, entry.label(main)) {
        (Some(field), Some(label)) => {
            attributes.remove(&field.name);
            let mut item = Record::new();
            item.insert(label, serde_json::Value::Object(attributes));
            serde_json::Value::Object(item)
        }
        _ => serde_json::Value::Object(attributes),
    }
}

/// Entry links on disk name the target by slug.
fn link_slug(link: &Link) -> String {
    link.key
        .rsplit_once('/')
        .map(|(_, slug)| slug.to_string())
        .unwrap_or_else(|| link.id.clone())
}

/// Front matter of one page file. Translation files only carry what
/// varies per locale.
fn page_front_matter(page: &Page, locale: &Locale) -> Record {
    let mut raw = page.to_raw_in(locale);
    if locale != page.main_locale() {
        let schema = page.attributes().schema();
        raw.retain(|key, _| key == "editable_elements" || schema.is_localized(key));
    }
    raw
}

/// Main locale first, then every other translated locale.
fn written_locales(main: &Locale, translated: &[Locale]) -> Vec<Locale> {
    let mut locales = vec![main.clone()];
    locales.extend(translated.iter().filter(|l| *l != main).cloned());
    locales
}

fn exact_string(entity: &impl Entity, field: &str, locale: &Locale) -> String {
    entity
        .attributes()
        .get_exact(field, locale)
        .ok()
        .flatten()
        .map(|v| v.to_string())
        .unwrap_or_default()
}

struct Output<'a> {
    root: &'a Path,
    written: Vec<PathBuf>,
}

impl Output<'_> {
    fn bytes(&mut self, relative: &str, content: &[u8]) -> Result<(), WriteError> {
        let path = self.root.join(relative);
        let io = |source| WriteError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(&path, content).map_err(io)?;
        debug!(file = relative, "written");
        self.written.push(PathBuf::from(relative));
        Ok(())
    }

    fn yaml(&mut self, relative: &str, value: impl Into<serde_json::Value>) -> Result<(), WriteError> {
        let text = to_yaml(relative, &value.into())?;
        self.bytes(relative, text.as_bytes())
    }

    fn template(&mut self, relative: &str, front_matter: Record, body: &str) -> Result<(), WriteError> {
        let yaml = if front_matter.is_empty() {
            String::new()
        } else {
            to_yaml(relative, &serde_json::Value::Object(front_matter))?
        };
        self.bytes(relative, join_front_matter(&yaml, body).as_bytes())
    }
}

fn to_yaml(origin: &str, value: &serde_json::Value) -> Result<String, WriteError> {
    serde_yaml::to_string(value).map_err(|source| WriteError::Yaml {
        origin: origin.to_string(),
        source,
    })
}
