//! Remote reader: pull a site from the engine's REST API.
//!
//! Resources are fetched once for structure (site, content types, assets,
//! translations) and once per locale for localized content (entries,
//! pages, snippets). The main locale comes first and creates the records;
//! every other locale is merged into them by remote id, inside a
//! [`LocaleContext::with_locale`] scope.

use super::{ReadError, into_mapping};
use crate::api::{ApiClient, expect_list, record_id};
use crate::fields::Entity;
use crate::locale::{Locale, LocaleContext};
use crate::models::{AssetSource, ContentAsset, ContentType, Site, ThemeAsset, Translation};
use crate::mounting_point::{MountingPoint, MountingPointBuilder};
use crate::tree::OrphanPolicy;
use std::collections::HashMap;
use tracing::{debug, info, warn};

type Record = serde_json::Map<String, serde_json::Value>;

/// Bookkeeping keys the engine adds to every record.
const REMOTE_METADATA: [&str; 2] = ["created_at", "updated_at"];

/// Read the whole site behind `client`. Relative asset URLs are resolved
/// against `asset_host`.
pub fn read(
    client: &dyn ApiClient,
    asset_host: &str,
    orphans: OrphanPolicy,
) -> Result<MountingPoint, ReadError> {
    info!("reading site from API");

    let raw_site = strip_metadata(into_mapping(client.get("site", None)?, "site")?);
    let site = Site::from_raw(&raw_site).map_err(|source| ReadError::Field {
        origin: "site".into(),
        source,
    })?;
    let main = site.default_locale();
    let locales = site.locales();
    let mut builder = MountingPointBuilder::new(site).orphan_policy(orphans);

    let mut type_slugs = Vec::new();
    for raw in records(client, "content_types", None)? {
        let content_type = ContentType::from_raw(&raw, "", &main).map_err(|source| ReadError::Model {
            origin: "content_types".into(),
            source,
        })?;
        type_slugs.push(content_type.slug.clone());
        builder.add_content_type(content_type);
    }

    let ctx = LocaleContext::new(main.clone());
    let mut page_keys = HashMap::new();
    for locale in &locales {
        ctx.with_locale(locale, |locale| {
            let pass = LocalePass {
                client,
                locale,
                is_main: *locale == main,
                locales: &locales,
            };
            pass.read_entries(&mut builder, &type_slugs)?;
            pass.read_pages(&mut builder, &mut page_keys)?;
            pass.read_snippets(&mut builder)
        })?;
    }

    read_assets(client, asset_host, &mut builder)?;
    for raw in records(client, "translations", None)? {
        let Some(key) = raw.get("key").and_then(|k| k.as_str()) else {
            warn!("translation without key skipped");
            continue;
        };
        let values = into_mapping(raw.get("values").cloned().unwrap_or_default(), "translations")?;
        let mut translation = Translation::from_raw(key, &values);
        translation.id = record_id(&serde_json::Value::Object(raw.clone()));
        builder.add_translation(translation);
    }

    Ok(builder.finish()?)
}

/// Localized resources fetched under one locale.
struct LocalePass<'a> {
    client: &'a dyn ApiClient,
    locale: &'a Locale,
    is_main: bool,
    locales: &'a [Locale],
}

impl LocalePass<'_> {
    fn records(&self, resource: &str) -> Result<Vec<Record>, ReadError> {
        records(self.client, resource, Some(self.locale))
    }

    fn read_entries(&self, builder: &mut MountingPointBuilder, type_slugs: &[String]) -> Result<(), ReadError> {
        for slug in type_slugs {
            let resource = format!("content_types/{slug}/entries");
            for raw in self.records(&resource)? {
                if self.is_main {
                    builder.add_entry(slug, &raw, self.locale)?;
                    continue;
                }
                let id = record_id(&serde_json::Value::Object(raw.clone())).unwrap_or_default();
                match builder.find_entry_key(slug, &id) {
                    Some(key) => {
                        builder.translate_entry(&key, &raw, self.locale)?;
                    }
                    None => warn!(content_type = %slug, id = %id, locale = %self.locale, "translation of unknown entry skipped"),
                }
            }
            debug!(content_type = %slug, locale = %self.locale, "entries read");
        }
        Ok(())
    }

    fn read_pages(
        &self,
        builder: &mut MountingPointBuilder,
        page_keys: &mut HashMap<String, String>,
    ) -> Result<(), ReadError> {
        for mut raw in self.records("pages")? {
            let id = record_id(&serde_json::Value::Object(raw.clone()));
            let fullpath = raw
                .remove("fullpath")
                .and_then(|f| f.as_str().map(String::from));
            let key = if self.is_main {
                fullpath
            } else {
                id.as_ref().and_then(|id| page_keys.get(id).cloned())
            };
            let Some(key) = key else {
                warn!(id = ?id, locale = %self.locale, "page without fullpath or unknown id skipped");
                continue;
            };

            let page = builder.page(&key);
            page.apply_raw(&raw, self.locale, self.locales)
                .map_err(|source| ReadError::Field {
                    origin: format!("pages/{key}"),
                    source,
                })?;
            if let Some(id) = id {
                page.set_id(id.clone());
                page_keys.insert(id, key);
            }
        }
        Ok(())
    }

    fn read_snippets(&self, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
        for raw in self.records("snippets")? {
            let Some(slug) = raw.get("slug").and_then(|s| s.as_str()) else {
                warn!(locale = %self.locale, "snippet without slug skipped");
                continue;
            };
            let snippet = builder.snippet(slug);
            if let Some(id) = record_id(&serde_json::Value::Object(raw.clone())) {
                snippet.set_id(id);
            }
            if let Some(template) = raw.get("template").and_then(|t| t.as_str()) {
                snippet.set_template(template, self.locale);
            }
            if self.is_main
                && let Some(name) = raw.get("name").and_then(|n| n.as_str())
            {
                snippet
                    .set("name", name, self.locale)
                    .map_err(|source| ReadError::Field {
                        origin: format!("snippets/{slug}"),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

fn read_assets(client: &dyn ApiClient, asset_host: &str, builder: &mut MountingPointBuilder) -> Result<(), ReadError> {
    for raw in records(client, "theme_assets", None)? {
        let Some((folder, filename, url)) = asset_fields(&raw, asset_host) else {
            warn!("theme asset without url skipped");
            continue;
        };
        let mut asset = ThemeAsset::new(folder, filename, AssetSource::Url(url));
        asset.id = record_id(&serde_json::Value::Object(raw));
        builder.add_theme_asset(asset);
    }
    for raw in records(client, "content_assets", None)? {
        let Some((folder, filename, url)) = asset_fields(&raw, asset_host) else {
            warn!("content asset without url skipped");
            continue;
        };
        let mut asset = ContentAsset::new(folder, filename, AssetSource::Url(url));
        asset.id = record_id(&serde_json::Value::Object(raw));
        builder.add_content_asset(asset);
    }
    Ok(())
}

/// `(folder, filename, absolute url)` of an asset record. `local_path`
/// stands in for a missing folder/filename pair.
fn asset_fields(raw: &Record, asset_host: &str) -> Option<(String, String, String)> {
    let text = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(String::from);
    let url = text("url")?;
    let (folder, filename) = match (text("folder"), text("filename")) {
        (folder, Some(filename)) => (folder.unwrap_or_default(), filename),
        (_, None) => {
            let local = text("local_path").unwrap_or_else(|| url.clone());
            match local.rsplit_once('/') {
                Some((folder, filename)) => (folder.trim_start_matches('/').to_string(), filename.to_string()),
                None => (String::new(), local),
            }
        }
    };
    Some((folder, filename, absolute_url(asset_host, &url)))
}

fn absolute_url(host: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}/{}", host.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

fn records(client: &dyn ApiClient, resource: &str, locale: Option<&Locale>) -> Result<Vec<Record>, ReadError> {
    let body = client.get(resource, locale.cloned())?;
    expect_list(resource, body)?
        .into_iter()
        .map(|record| into_mapping(record, resource).map(strip_metadata))
        .collect()
}

fn strip_metadata(mut record: Record) -> Record {
    for key in REMOTE_METADATA {
        record.remove(key);
    }
    record
}
