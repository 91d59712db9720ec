//! Remote writer: push a mounted site to the engine.
//!
//! Resources go out in dependency order:
//!
//! ```text
//! site → content types → entries → snippets → pages → theme assets → content assets → translations
//! ```
//!
//! Each local record is matched against the remote listing (content types
//! and snippets by slug, entries by `_slug`, pages by fullpath, assets by
//! path, translations by key) and updated when found, created otherwise.
//!
//! Entries are pushed in two passes: plain attributes first, then
//! relationship fields once every target has a remote id. Pages go
//! parents first so `parent_id` is always known. Theme assets whose
//! checksum matches the remote copy are skipped unless forced.

use super::WriteError;
use crate::api::{ApiClient, expect_list, record_id};
use crate::config::{PushConfig, Resource};
use crate::fields::Entity;
use crate::locale::Locale;
use crate::models::ContentFieldKind;
use crate::mounting_point::MountingPoint;
use crate::value::Link;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

type Record = serde_json::Map<String, serde_json::Value>;

/// What a push did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub created: usize,
    pub updated: usize,
    /// Unchanged theme and content assets.
    pub skipped: usize,
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged",
            self.created, self.updated, self.skipped
        )
    }
}

/// Push every resource `config` selects.
pub fn push(client: &dyn ApiClient, mp: &MountingPoint, config: &PushConfig) -> Result<PushReport, WriteError> {
    let mut pusher = Pusher {
        client,
        mp,
        main: mp.default_locale(),
        force: config.force,
        report: PushReport::default(),
        entry_ids: HashMap::new(),
        page_ids: HashMap::new(),
    };
    for resource in Resource::ALL {
        if !config.includes(resource) {
            debug!(?resource, "not selected, skipped");
            continue;
        }
        info!(?resource, "pushing");
        match resource {
            Resource::Site => pusher.push_site()?,
            Resource::ContentTypes => pusher.push_content_types()?,
            Resource::ContentEntries => pusher.push_entries()?,
            Resource::Snippets => pusher.push_snippets()?,
            Resource::Pages => pusher.push_pages()?,
            Resource::ThemeAssets => pusher.push_theme_assets()?,
            Resource::ContentAssets => pusher.push_content_assets()?,
            Resource::Translations => pusher.push_translations()?,
        }
    }
    info!(report = %pusher.report, "push complete");
    Ok(pusher.report)
}

struct Pusher<'a> {
    client: &'a dyn ApiClient,
    mp: &'a MountingPoint,
    main: Locale,
    force: bool,
    report: PushReport,
    /// Entry key → remote id.
    entry_ids: HashMap<String, String>,
    /// Page key → remote id.
    page_ids: HashMap<String, String>,
}

impl Pusher<'_> {
    /// Update `existing` or create a new record; returns the remote id.
    fn upsert(
        &mut self,
        resource: &str,
        existing: Option<&str>,
        attributes: Record,
        locale: Option<Locale>,
    ) -> Result<String, WriteError> {
        let attributes = serde_json::Value::Object(attributes);
        let response = match existing {
            Some(id) => {
                self.report.updated += 1;
                self.client.put(resource, id, &attributes, locale)?
            }
            None => {
                self.report.created += 1;
                self.client.post(resource, &attributes, locale)?
            }
        };
        record_id(&response)
            .or_else(|| existing.map(String::from))
            .ok_or_else(|| WriteError::MissingId {
                resource: resource.to_string(),
            })
    }

    /// Remote records of `resource` keyed by `field`.
    fn remote_index(&self, resource: &str, field: &str) -> Result<HashMap<String, Record>, WriteError> {
        let listing = expect_list(resource, self.client.get(resource, Some(self.main.clone()))?)?;
        Ok(listing
            .into_iter()
            .filter_map(|record| match record {
                serde_json::Value::Object(map) => {
                    let key = map.get(field).and_then(remote_key)?;
                    Some((key, map))
                }
                _ => None,
            })
            .collect())
    }

    fn push_site(&mut self) -> Result<(), WriteError> {
        let remote = self.client.get("site", None)?;
        let existing = record_id(&remote).or_else(|| self.mp.site.id().map(String::from));
        self.upsert("site", existing.as_deref(), self.mp.site.to_raw(), None)?;
        Ok(())
    }

    fn push_content_types(&mut self) -> Result<(), WriteError> {
        let remote = self.remote_index("content_types", "slug")?;
        let mp = self.mp;
        for content_type in mp.content_types.values() {
            let existing = remote.get(&content_type.slug).and_then(id_of);
            self.upsert("content_types", existing.as_deref(), content_type.to_raw(), None)?;
        }
        Ok(())
    }

    fn push_entries(&mut self) -> Result<(), WriteError> {
        let mp = self.mp;
        let main = self.main.clone();

        for content_type in mp.content_types.values() {
            let resource = format!("content_types/{}/entries", content_type.slug);
            let remote = self.remote_index(&resource, "_slug")?;
            let relationships: Vec<&str> = content_type
                .fields
                .iter()
                .filter(|f| f.kind.is_relationship() && f.kind != ContentFieldKind::HasMany)
                .map(|f| f.name.as_str())
                .collect();
            let schema = content_type.entry_schema();

            for entry in mp.entries_of(&content_type.slug, &main)? {
                let mut attributes = entry.to_raw_in(&main, |link| link.id.clone());
                attributes.retain(|k, _| !relationships.contains(&k.as_str()));
                let existing = remote
                    .get(&entry.slug(&main))
                    .and_then(id_of)
                    .or_else(|| entry.remote_id().map(String::from));
                let id = self.upsert(&resource, existing.as_deref(), attributes, Some(main.clone()))?;

                for locale in entry.translated_in().iter().filter(|l| **l != main) {
                    let mut localized = entry.to_raw_in(locale, |link| link.id.clone());
                    localized.retain(|k, _| schema.is_localized(k) && !relationships.contains(&k.as_str()));
                    if !localized.is_empty() {
                        self.upsert(&resource, Some(id.as_str()), localized, Some(locale.clone()))?;
                    }
                }
                self.entry_ids.insert(entry.key(), id);
            }
        }

        for content_type in mp.content_types.values() {
            let resource = format!("content_types/{}/entries", content_type.slug);
            let relationships: Vec<&str> = content_type
                .fields
                .iter()
                .filter(|f| f.kind.is_relationship() && f.kind != ContentFieldKind::HasMany)
                .map(|f| f.name.as_str())
                .collect();
            if relationships.is_empty() {
                continue;
            }
            for entry in mp.entries_of(&content_type.slug, &main)? {
                let ids = &self.entry_ids;
                let link_id = |link: &Link| ids.get(&link.key).cloned().unwrap_or_else(|| link.id.clone());
                let mut links = entry.to_raw_in(&main, link_id);
                links.retain(|k, _| relationships.contains(&k.as_str()));
                let Some(id) = self.entry_ids.get(&entry.key()).cloned() else { continue };
                if !links.is_empty() {
                    self.upsert(&resource, Some(id.as_str()), links, Some(main.clone()))?;
                }
            }
        }
        Ok(())
    }

    fn push_snippets(&mut self) -> Result<(), WriteError> {
        let remote = self.remote_index("snippets", "slug")?;
        let main = self.main.clone();
        let mp = self.mp;
        for snippet in mp.snippets.values() {
            let slug = snippet.slug();
            let mut attributes = Record::new();
            attributes.insert("slug".into(), slug.clone().into());
            attributes.insert("name".into(), snippet.name().into());
            attributes.insert("template".into(), snippet.template(&main).unwrap_or_default().into());
            let existing = remote
                .get(&slug)
                .and_then(id_of)
                .or_else(|| snippet.id().map(String::from));
            let id = self.upsert("snippets", existing.as_deref(), attributes, Some(main.clone()))?;

            for locale in snippet.translated_in().iter().filter(|l| **l != main) {
                let Some(template) = snippet.attributes().get_exact("template", locale).ok().flatten() else {
                    continue;
                };
                let localized = Record::from_iter([("template".to_string(), template.to_json())]);
                self.upsert("snippets", Some(id.as_str()), localized, Some(locale.clone()))?;
            }
        }
        Ok(())
    }

    fn push_pages(&mut self) -> Result<(), WriteError> {
        let remote = self.remote_index("pages", "fullpath")?;
        let main = self.main.clone();
        let mp = self.mp;
        for page in mp.pages_in_tree_order() {
            let mut attributes = page.to_raw_in(&main);
            attributes.insert("fullpath".into(), page.fullpath(&main).into());
            attributes.insert("template".into(), page.template(&main).unwrap_or_default().into());
            if let Some(parent_id) = page.parent().and_then(|p| self.page_ids.get(p)) {
                attributes.insert("parent_id".into(), parent_id.clone().into());
            }
            let existing = remote
                .get(&page.fullpath(&main))
                .and_then(id_of)
                .or_else(|| page.id().map(String::from));
            let id = self.upsert("pages", existing.as_deref(), attributes, Some(main.clone()))?;

            let schema = page.attributes().schema();
            for locale in page.translated_in().iter().filter(|l| **l != main) {
                let mut localized = page.to_raw_in(locale);
                localized.retain(|k, _| k == "editable_elements" || schema.is_localized(k));
                if let Some(template) = page.attributes().get_exact("template", locale).ok().flatten() {
                    localized.insert("template".into(), template.to_json());
                }
                self.upsert("pages", Some(id.as_str()), localized, Some(locale.clone()))?;
            }
            self.page_ids.insert(page.key().to_string(), id);
        }
        Ok(())
    }

    fn push_theme_assets(&mut self) -> Result<(), WriteError> {
        let remote = self.remote_assets("theme_assets")?;
        let mp = self.mp;
        for asset in &mp.theme_assets {
            let checksum = asset.checksum()?;
            let path = asset.path();
            let existing = remote.get(&path);
            if !self.force && existing.is_some_and(|(_, c)| c.as_deref() == Some(checksum.as_str())) {
                debug!(asset = %path, "unchanged, skipped");
                self.report.skipped += 1;
                continue;
            }
            let attributes = asset_payload(&asset.folder, &asset.filename, asset.content()?, &checksum);
            let existing = existing.map(|(id, _)| id.clone()).or_else(|| asset.id.clone());
            self.upsert("theme_assets", existing.as_deref(), attributes, None)?;
        }
        Ok(())
    }

    fn push_content_assets(&mut self) -> Result<(), WriteError> {
        let remote = self.remote_assets("content_assets")?;
        let mp = self.mp;
        for asset in &mp.content_assets {
            let checksum = asset.checksum()?;
            let path = asset.path();
            let existing = remote.get(&path);
            if !self.force && existing.is_some_and(|(_, c)| c.as_deref() == Some(checksum.as_str())) {
                self.report.skipped += 1;
                continue;
            }
            let attributes = asset_payload(&asset.folder, &asset.filename, asset.content()?, &checksum);
            let existing = existing.map(|(id, _)| id.clone()).or_else(|| asset.id.clone());
            self.upsert("content_assets", existing.as_deref(), attributes, None)?;
        }
        Ok(())
    }

    /// Remote assets keyed by path: `(id, checksum)`.
    fn remote_assets(&self, resource: &str) -> Result<HashMap<String, (String, Option<String>)>, WriteError> {
        let listing = expect_list(resource, self.client.get(resource, None)?)?;
        Ok(listing
            .iter()
            .filter_map(|record| {
                let text = |key: &str| record.get(key).and_then(|v| v.as_str()).map(String::from);
                let path = match (text("folder"), text("filename")) {
                    (Some(folder), Some(filename)) if !folder.is_empty() => format!("{folder}/{filename}"),
                    (_, Some(filename)) => filename,
                    (_, None) => text("local_path")?.trim_start_matches('/').to_string(),
                };
                Some((path, (record_id(record)?, text("checksum"))))
            })
            .collect())
    }

    fn push_translations(&mut self) -> Result<(), WriteError> {
        let remote = self.remote_index("translations", "key")?;
        let mp = self.mp;
        for translation in mp.translations.values() {
            let attributes = Record::from_iter([
                ("key".to_string(), translation.key.clone().into()),
                ("values".to_string(), serde_json::Value::Object(translation.to_raw())),
            ]);
            let existing = remote
                .get(&translation.key)
                .and_then(id_of)
                .or_else(|| translation.id.clone());
            self.upsert("translations", existing.as_deref(), attributes, None)?;
        }
        Ok(())
    }
}

fn asset_payload(folder: &str, filename: &str, content: &[u8], checksum: &str) -> Record {
    match json!({
        "folder": folder,
        "filename": filename,
        "checksum": checksum,
        "source": STANDARD.encode(content),
    }) {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn id_of(record: &Record) -> Option<String> {
    let id = record.get("_id").or_else(|| record.get("id"))?;
    remote_key(id)
}

fn remote_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApiClient;
    use crate::models::{AssetSource, ContentField, ContentType, Site, ThemeAsset};
    use crate::mounting_point::MountingPointBuilder;
    use sha2::{Digest, Sha256};
    use std::sync::{Arc, Mutex};

    fn en() -> Locale {
        Locale::from("en")
    }

    fn raw(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn site() -> MountingPoint {
        let mut b = MountingPointBuilder::new(Site::new("Sample", &[en(), Locale::from("fr")]));
        b.page("index").set_title("Home", &en());
        b.page("about-us").set_title("About", &en());
        b.page("about-us/team").set_title("Team", &en());

        let mut speaker = ContentField::new("speaker", ContentFieldKind::BelongsTo);
        speaker.class_name = Some("speakers".into());
        b.add_content_type(
            ContentType::new("Events", "events")
                .with_field(ContentField::new("title", ContentFieldKind::String))
                .with_field(speaker),
        );
        b.add_content_type(
            ContentType::new("Speakers", "speakers").with_field(ContentField::new("name", ContentFieldKind::String)),
        );
        b.add_entry("events", &raw(json!({"title": "Launch", "speaker": "ann"})), &en())
            .unwrap();
        b.add_entry("speakers", &raw(json!({"name": "Ann"})), &en()).unwrap();
        b.add_theme_asset(ThemeAsset::new(
            "stylesheets",
            "app.css",
            AssetSource::Inline(b"body {}".to_vec()),
        ));
        b.finish().unwrap()
    }

    /// A remote with nothing on it that records every write and hands out
    /// sequential ids.
    fn empty_remote(calls: Arc<Mutex<Vec<String>>>) -> MockApiClient {
        let mut mock = MockApiClient::new();
        mock.expect_get().returning(|resource, _| {
            Ok(if resource == "site" { json!({"_id": "site1"}) } else { json!([]) })
        });
        let posts = calls.clone();
        mock.expect_post().returning(move |resource, attributes, _| {
            let mut calls = posts.lock().unwrap();
            let label = attributes
                .get("fullpath")
                .or_else(|| attributes.get("slug"))
                .or_else(|| attributes.get("title"))
                .or_else(|| attributes.get("name"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            calls.push(format!("POST {resource} {label}"));
            Ok(json!({"_id": format!("id{}", calls.len())}))
        });
        let puts = calls;
        mock.expect_put().returning(move |resource, id, attributes, _| {
            puts.lock().unwrap().push(format!("PUT {resource} {id} {attributes}"));
            Ok(json!({"_id": id}))
        });
        mock
    }

    #[test]
    fn pushes_in_dependency_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mock = empty_remote(calls.clone());
        let report = push(&mock, &site(), &PushConfig::default()).unwrap();

        let calls = calls.lock().unwrap();
        let position = |prefix: &str| {
            calls
                .iter()
                .position(|c| c.starts_with(prefix))
                .unwrap_or_else(|| panic!("no call starting with '{prefix}'. Calls: {calls:?}"))
        };
        assert!(position("PUT site site1") < position("POST content_types"));
        assert!(position("POST content_types") < position("POST content_types/events/entries"));
        assert!(position("POST pages index") < position("POST pages about-us"));
        assert!(position("POST pages about-us") < position("POST pages about-us/team"));
        assert!(position("POST pages") < position("POST theme_assets"));
        assert_eq!(report.skipped, 0);
        assert!(report.created >= 7);
    }

    #[test]
    fn relationships_pushed_with_remote_ids() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mock = empty_remote(calls.clone());
        push(&mock, &site(), &PushConfig::default()).unwrap();

        let calls = calls.lock().unwrap();
        let speaker_post = calls
            .iter()
            .position(|c| c.starts_with("POST content_types/speakers/entries"))
            .unwrap();
        let speaker_id = format!("id{}", speaker_post + 1);
        let link_put = calls
            .iter()
            .find(|c| c.starts_with("PUT content_types/events/entries"))
            .unwrap();
        assert!(link_put.contains(&format!("\"speaker\":\"{speaker_id}\"")), "{link_put}");
    }

    #[test]
    fn existing_page_updated_in_place() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut mock = MockApiClient::new();
        mock.expect_get().returning(|resource, _| {
            Ok(match resource {
                "pages" => json!([{"_id": "p1", "fullpath": "index"}]),
                _ => json!([]),
            })
        });
        let puts = calls.clone();
        mock.expect_put().returning(move |resource, id, _, _| {
            puts.lock().unwrap().push(format!("PUT {resource} {id}"));
            Ok(json!({"_id": id}))
        });
        let posts = calls.clone();
        mock.expect_post().returning(move |resource, _, _| {
            posts.lock().unwrap().push(format!("POST {resource}"));
            Ok(json!({"_id": "new"}))
        });

        let config = PushConfig {
            resources: vec![Resource::Pages],
            force: false,
        };
        let report = push(&mock, &site(), &config).unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], "PUT pages p1");
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 2);
    }

    #[test]
    fn unchanged_theme_asset_skipped_unless_forced() {
        let checksum = format!("{:x}", Sha256::digest(b"body {}"));
        let remote_assets = json!([{
            "_id": "a1",
            "folder": "stylesheets",
            "filename": "app.css",
            "checksum": checksum
        }]);

        let mut mock = MockApiClient::new();
        let listing = remote_assets.clone();
        mock.expect_get().returning(move |_, _| Ok(listing.clone()));
        mock.expect_put().never();
        mock.expect_post().never();
        let config = PushConfig {
            resources: vec![Resource::ThemeAssets],
            force: false,
        };
        let report = push(&mock, &site(), &config).unwrap();
        assert_eq!(report.skipped, 1);

        let mut mock = MockApiClient::new();
        mock.expect_get().returning(move |_, _| Ok(remote_assets.clone()));
        mock.expect_put()
            .withf(|resource, id, attributes, _| {
                resource == "theme_assets" && id == "a1" && attributes["source"] == "Ym9keSB7fQ=="
            })
            .times(1)
            .returning(|_, id, _, _| Ok(json!({"_id": id})));
        let forced = PushConfig {
            resources: vec![Resource::ThemeAssets],
            force: true,
        };
        let report = push(&mock, &site(), &forced).unwrap();
        assert_eq!(report.updated, 1);
    }
}
