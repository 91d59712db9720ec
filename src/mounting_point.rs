//! The mounted site: one aggregate owning every resource.
//!
//! Readers never assemble a [`MountingPoint`] directly. They feed a
//! [`MountingPointBuilder`], which runs the load pipeline in order:
//!
//! ```text
//! add_content_type ─┐
//! add_entry ────────┼─ slug engine, relation queue
//! page / snippet ───┘
//!         │
//!      finish ── resolve relations ── validate entries ── build tree ── localize fullpaths
//!         │
//!    MountingPoint
//! ```
//!
//! Every collection is keyed the way writers address it: pages by raw
//! fullpath, snippets and content types by slug, entries by
//! `"{content_type}/{slug}"`, translations by key.

use crate::fields::{Entity, FieldError, Schema};
use crate::locale::Locale;
use crate::models::{
    ContentAsset, ContentEntry, ContentFieldKind, ContentType, Page, Site, Snippet, ThemeAsset,
    Translation,
};
use crate::models::page::INDEX;
use crate::query::{Query, QueryError};
use crate::relations::{self, DanglingReference, RelationError, RelationQueue};
use crate::slug;
use crate::tree::{self, OrphanPolicy, TreeError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum MountError {
    #[error("entry for unknown content type '{0}'")]
    UnknownContentType(String),
    #[error("no content entry '{0}'")]
    UnknownEntry(String),
    #[error("'{field}' is not a has_many field of {content_type}")]
    NotHasMany { content_type: String, field: String },
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Relation(#[from] RelationError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

// ============================================================================
// Mounting point
// ============================================================================

#[derive(Debug)]
pub struct MountingPoint {
    pub site: Site,
    pub pages: BTreeMap<String, Page>,
    pub snippets: BTreeMap<String, Snippet>,
    pub content_types: BTreeMap<String, ContentType>,
    pub content_entries: BTreeMap<String, ContentEntry>,
    pub theme_assets: Vec<ThemeAsset>,
    pub content_assets: Vec<ContentAsset>,
    pub translations: BTreeMap<String, Translation>,
    /// References that resolved to nothing while loading.
    pub dangling: Vec<DanglingReference>,
    /// Pages left out of the tree (only under [`OrphanPolicy::Warn`]).
    pub orphans: Vec<String>,
}

impl MountingPoint {
    /// First locale of the site.
    pub fn default_locale(&self) -> Locale {
        self.site.default_locale()
    }

    pub fn locales(&self) -> Vec<Locale> {
        self.site.locales()
    }

    pub fn root_page(&self) -> Option<&Page> {
        self.pages.get(INDEX)
    }

    pub fn children(&self, key: &str) -> Vec<&Page> {
        self.pages
            .get(key)
            .map(|p| p.children().iter().filter_map(|c| self.pages.get(c)).collect())
            .unwrap_or_default()
    }

    /// Pages in parent-before-child order, followed by unattached pages.
    pub fn pages_in_tree_order(&self) -> Vec<&Page> {
        let walked = tree::walk(&self.pages);
        let unattached = self
            .pages
            .values()
            .filter(|p| !walked.iter().any(|k| k == p.key()));
        walked
            .iter()
            .filter_map(|k| self.pages.get(k))
            .chain(unattached)
            .collect()
    }

    pub fn content_type(&self, slug: &str) -> Result<&ContentType, MountError> {
        self.content_types
            .get(slug)
            .ok_or_else(|| MountError::UnknownContentType(slug.to_string()))
    }

    /// Entries of `content_type` in the type's default order.
    pub fn entries_of(&self, content_type: &str, locale: &Locale) -> Result<Vec<&ContentEntry>, MountError> {
        let ct = self.content_type(content_type)?;
        let query = Query::new().order_by(&ct.order_clause())?;
        Ok(query.run(self.typed_entries(content_type), locale))
    }

    /// Run `query` over the entries of `content_type`.
    pub fn query_entries(
        &self,
        content_type: &str,
        query: &Query,
        locale: &Locale,
    ) -> Result<Vec<&ContentEntry>, MountError> {
        self.content_type(content_type)?;
        Ok(query.run(self.typed_entries(content_type), locale))
    }

    fn typed_entries<'a>(&'a self, content_type: &str) -> impl Iterator<Item = &'a ContentEntry> {
        self.content_entries
            .values()
            .filter(move |e| e.content_type() == content_type)
    }

    /// Entries on the other side of a `has_many` field of `entry`,
    /// recomputed on every call.
    pub fn has_many(&self, entry: &ContentEntry, field: &str, locale: &Locale) -> Result<Vec<&ContentEntry>, MountError> {
        let ct = self.content_type(entry.content_type())?;
        let not_has_many = || MountError::NotHasMany {
            content_type: ct.slug.clone(),
            field: field.to_string(),
        };
        let def = ct
            .find_field(field)
            .filter(|f| f.kind == ContentFieldKind::HasMany)
            .ok_or_else(not_has_many)?;
        let (Some(target), Some(inverse)) = (def.class_name.as_deref(), def.inverse_of.as_deref()) else {
            return Err(not_has_many());
        };
        let target_type = self.content_type(target)?;
        let found = relations::find_entries_where(
            self.content_entries.values(),
            target,
            inverse,
            &[entry.id()],
        )?;
        let clause = def.order_by.clone().unwrap_or_else(|| target_type.order_clause());
        Ok(Query::new().order_by(&clause)?.run(found, locale))
    }

    /// Entries that failed required-field validation.
    pub fn invalid_entries(&self) -> impl Iterator<Item = &ContentEntry> {
        self.content_entries.values().filter(|e| !e.is_valid())
    }

    pub fn translation(&self, key: &str, locale: &Locale) -> Option<&str> {
        let default = self.default_locale();
        self.translations.get(key)?.get(locale, &default)
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct MountingPointBuilder {
    site: Site,
    locales: Vec<Locale>,
    orphan_policy: OrphanPolicy,
    pages: BTreeMap<String, Page>,
    snippets: BTreeMap<String, Snippet>,
    content_types: BTreeMap<String, ContentType>,
    schemas: HashMap<String, Arc<Schema>>,
    entries: BTreeMap<String, ContentEntry>,
    relations: RelationQueue,
    theme_assets: Vec<ThemeAsset>,
    content_assets: Vec<ContentAsset>,
    translations: BTreeMap<String, Translation>,
}

impl MountingPointBuilder {
    pub fn new(site: Site) -> Self {
        let locales = site.locales();
        Self {
            site,
            locales,
            orphan_policy: OrphanPolicy::default(),
            pages: BTreeMap::new(),
            snippets: BTreeMap::new(),
            content_types: BTreeMap::new(),
            schemas: HashMap::new(),
            entries: BTreeMap::new(),
            relations: RelationQueue::new(),
            theme_assets: Vec::new(),
            content_assets: Vec::new(),
            translations: BTreeMap::new(),
        }
    }

    pub fn orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn locales(&self) -> &[Locale] {
        &self.locales
    }

    pub fn default_locale(&self) -> Locale {
        self.site.default_locale()
    }

    /// Page at raw fullpath `key`, created on first access.
    pub fn page(&mut self, key: &str) -> &mut Page {
        let main = self.site.default_locale();
        self.pages
            .entry(key.to_string())
            .or_insert_with(|| Page::new(key, main))
    }

    /// Snippet with `slug`, created on first access.
    pub fn snippet(&mut self, slug: &str) -> &mut Snippet {
        let main = self.site.default_locale();
        self.snippets
            .entry(slug.to_string())
            .or_insert_with(|| Snippet::new(slug, main))
    }

    pub fn add_content_type(&mut self, content_type: ContentType) {
        debug!(slug = %content_type.slug, fields = content_type.fields.len(), "content type");
        self.schemas
            .insert(content_type.slug.clone(), content_type.entry_schema());
        self.content_types
            .insert(content_type.slug.clone(), content_type);
    }

    pub fn content_type(&self, slug: &str) -> Option<&ContentType> {
        self.content_types.get(slug)
    }

    /// Build an entry of `content_type` from raw attributes under `locale`,
    /// give it a unique slug and queue its relationships. Returns its key.
    pub fn add_entry(
        &mut self,
        content_type: &str,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
    ) -> Result<String, MountError> {
        let (ct, schema) = match (self.content_types.get(content_type), self.schemas.get(content_type)) {
            (Some(ct), Some(schema)) => (ct, schema.clone()),
            _ => return Err(MountError::UnknownContentType(content_type.to_string())),
        };
        let mut entry = ContentEntry::new(ct, schema, self.site.default_locale());
        let references = entry.apply_raw(ct, raw, locale, &self.locales)?;

        let locales = slug_locales(&entry);
        for l in &locales {
            let slug = unique_slug(&self.entries, ct, &entry, l, None);
            entry.set_slug(&slug, l);
        }

        let key = entry.key();
        for reference in references {
            self.relations.push(&key, reference);
        }
        debug!(key = %key, "content entry");
        self.entries.insert(key.clone(), entry);
        Ok(key)
    }

    /// Apply another locale's raw attributes to an existing entry.
    ///
    /// The entry's slug for `locale` is recomputed; if that changes the
    /// main-locale slug the entry is re-keyed and the new key returned.
    pub fn translate_entry(
        &mut self,
        key: &str,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
    ) -> Result<String, MountError> {
        let mut entry = self
            .entries
            .remove(key)
            .ok_or_else(|| MountError::UnknownEntry(key.to_string()))?;
        let Some(ct) = self.content_types.get(entry.content_type()) else {
            return Err(MountError::UnknownContentType(entry.content_type().to_string()));
        };
        let applied = entry.apply_raw(ct, raw, locale, &self.locales);
        let references = match applied {
            Ok(references) => references,
            Err(err) => {
                self.entries.insert(key.to_string(), entry);
                return Err(err.into());
            }
        };
        if slug_locales(&entry).contains(locale) {
            let slug = unique_slug(&self.entries, ct, &entry, locale, Some(key));
            entry.set_slug(&slug, locale);
        }

        let new_key = entry.key();
        if new_key != key {
            self.relations.rename_source(key, &new_key);
        }
        for reference in references {
            self.relations.push(&new_key, reference);
        }
        self.entries.insert(new_key.clone(), entry);
        Ok(new_key)
    }

    /// Key of the entry of `content_type` answering to `id` (remote id or
    /// main-locale slug).
    pub fn find_entry_key(&self, content_type: &str, id: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, e)| e.content_type() == content_type && (e.remote_id() == Some(id) || e.id() == id))
            .map(|(k, _)| k.clone())
    }

    pub fn add_theme_asset(&mut self, asset: ThemeAsset) {
        self.theme_assets.push(asset);
    }

    pub fn add_content_asset(&mut self, asset: ContentAsset) {
        self.content_assets.push(asset);
    }

    pub fn add_translation(&mut self, translation: Translation) {
        self.translations.insert(translation.key.clone(), translation);
    }

    /// Resolve relationships, validate entries and build the page tree.
    pub fn finish(self) -> Result<MountingPoint, MountError> {
        let MountingPointBuilder {
            site,
            orphan_policy,
            mut pages,
            snippets,
            content_types,
            mut entries,
            relations,
            theme_assets,
            content_assets,
            translations,
            ..
        } = self;

        let pending = relations.len();
        let dangling = relations::resolve(relations, &mut entries, &content_types)?;
        info!(pending, dangling = dangling.len(), "relations resolved");

        for (key, entry) in entries.iter_mut() {
            let Some(ct) = content_types.get(entry.content_type()) else { continue };
            for failure in entry.validate(ct) {
                warn!(entry = %key, field = %failure.field, locale = %failure.locale, "required field is blank");
            }
        }

        let orphans = tree::build_tree(&mut pages, orphan_policy)?;
        tree::localize_fullpaths(&mut pages);

        info!(
            pages = pages.len(),
            snippets = snippets.len(),
            content_types = content_types.len(),
            entries = entries.len(),
            theme_assets = theme_assets.len(),
            content_assets = content_assets.len(),
            translations = translations.len(),
            "site mounted"
        );

        Ok(MountingPoint {
            site,
            pages,
            snippets,
            content_types,
            content_entries: entries,
            theme_assets,
            content_assets,
            translations,
            dangling,
            orphans,
        })
    }
}

/// Locales an entry carries its own `_slug` in: the main locale, plus every
/// translated locale when slugs are localized.
fn slug_locales(entry: &ContentEntry) -> Vec<Locale> {
    let main = entry.main_locale().clone();
    let mut locales = vec![main.clone()];
    if entry.attributes().schema().is_localized("_slug") {
        locales.extend(entry.translated_in().iter().filter(|l| **l != main).cloned());
    }
    locales
}

/// Slug for `entry` under `locale`: its own `_slug`, else its label, else
/// the content type name, normalized and made unique among siblings.
fn unique_slug(
    entries: &BTreeMap<String, ContentEntry>,
    content_type: &ContentType,
    entry: &ContentEntry,
    locale: &Locale,
    exclude: Option<&str>,
) -> String {
    let source = entry
        .explicit_slug(locale)
        .or_else(|| entry.label(locale))
        .unwrap_or_else(|| content_type.name.clone());
    let mut base = slug::permalink(&source);
    if base.is_empty() {
        base = slug::permalink(&content_type.name);
    }
    if base.is_empty() {
        base = slug::permalink(&content_type.slug);
    }

    let taken: Vec<String> = entries
        .iter()
        .filter(|(k, e)| e.content_type() == content_type.slug && Some(k.as_str()) != exclude)
        .map(|(_, e)| e.slug(locale))
        .collect();
    if taken.iter().any(|t| *t == base) {
        slug::next_unique(&base, taken.iter().map(String::as_str))
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentField, ContentFieldKind};
    use crate::value::Value;
    use serde_json::json;

    fn en() -> Locale {
        Locale::from("en")
    }

    fn fr() -> Locale {
        Locale::from("fr")
    }

    fn raw(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn builder() -> MountingPointBuilder {
        let mut b = MountingPointBuilder::new(Site::new("Sample", &[en(), fr()]));
        b.page("index");

        let mut title = ContentField::new("title", ContentFieldKind::String);
        title.required = true;
        let mut speaker = ContentField::new("speaker", ContentFieldKind::BelongsTo);
        speaker.class_name = Some("speakers".into());
        b.add_content_type(
            ContentType::new("Events", "events")
                .with_field(title)
                .with_field(speaker),
        );

        let mut name = ContentField::new("name", ContentFieldKind::String);
        name.localized = true;
        let mut events = ContentField::new("events", ContentFieldKind::HasMany);
        events.class_name = Some("events".into());
        events.inverse_of = Some("speaker".into());
        b.add_content_type(
            ContentType::new("Speakers", "speakers")
                .with_field(name)
                .with_field(events),
        );
        b
    }

    #[test]
    fn slug_derived_from_label() {
        let mut b = builder();
        let key = b
            .add_entry("events", &raw(json!({"title": "Avogadro's Number"})), &en())
            .unwrap();
        assert_eq!(key, "events/avogadro-s-number");
        let mp = b.finish().unwrap();
        let entry = &mp.content_entries[&key];
        assert_eq!(entry.label(&en()).as_deref(), Some("Avogadro's Number"));
        assert_eq!(entry.slug(&en()), "avogadro-s-number");
    }

    #[test]
    fn duplicate_labels_get_numbered_in_creation_order() {
        let mut b = builder();
        let keys: Vec<String> = (0..3)
            .map(|_| b.add_entry("events", &raw(json!({"title": "Launch"})), &en()).unwrap())
            .collect();
        assert_eq!(keys, vec!["events/launch", "events/launch-1", "events/launch-2"]);
    }

    #[test]
    fn slug_falls_back_to_content_type_name() {
        let mut b = builder();
        let key = b.add_entry("events", &raw(json!({})), &en()).unwrap();
        assert_eq!(key, "events/events");
    }

    #[test]
    fn untransliterable_label_falls_back_to_type_name() {
        let mut b = builder();
        b.add_content_type(
            ContentType::new("Blog Posts", "posts")
                .with_field(ContentField::new("title", ContentFieldKind::String)),
        );
        let key = b.add_entry("posts", &raw(json!({"title": "東京"})), &en()).unwrap();
        assert_eq!(key, "posts/blog-posts");
    }

    #[test]
    fn failed_translation_leaves_entry_untouched() {
        let mut b = builder();
        let key = b.add_entry("speakers", &raw(json!({"name": "Ann"})), &en()).unwrap();
        let err = b.translate_entry(&key, &raw(json!({"name": "Anne", "zzz": 1})), &fr());
        assert!(err.is_err());

        let mp = b.finish().unwrap();
        let entry = &mp.content_entries[&key];
        assert_eq!(entry.translated_in().to_vec(), vec![en()]);
        assert_eq!(entry.get_dynamic("name", &fr()).unwrap(), Value::from("Ann"));
    }

    #[test]
    fn localized_slugs_numbered_per_locale() {
        let mut b = builder();
        let first = b
            .add_entry("speakers", &raw(json!({"name": {"en": "Ann", "fr": "Anne"}})), &en())
            .unwrap();
        let second = b
            .add_entry("speakers", &raw(json!({"name": {"en": "Anne", "fr": "Anne"}})), &en())
            .unwrap();
        let mp = b.finish().unwrap();
        assert_eq!(mp.content_entries[&first].slug(&fr()), "anne");
        assert_eq!(mp.content_entries[&second].slug(&en()), "anne");
        assert_eq!(mp.content_entries[&second].slug(&fr()), "anne-1");
    }

    #[test]
    fn entry_for_unknown_type_rejected() {
        let mut b = builder();
        let err = b.add_entry("venues", &raw(json!({})), &en()).unwrap_err();
        assert!(matches!(err, MountError::UnknownContentType(ref t) if t == "venues"));
    }

    #[test]
    fn unknown_entry_field_is_fatal() {
        let mut b = builder();
        let err = b
            .add_entry("events", &raw(json!({"colour": "red"})), &en())
            .unwrap_err();
        assert!(matches!(err, MountError::Field(FieldError::UnknownField { .. })));
    }

    #[test]
    fn dangling_reference_resolves_to_null() {
        let mut b = builder();
        let key = b
            .add_entry("events", &raw(json!({"title": "Launch", "speaker": "42"})), &en())
            .unwrap();
        let mp = b.finish().unwrap();
        assert_eq!(mp.dangling.len(), 1);
        assert_eq!(mp.dangling[0].target_id, "42");
        assert_eq!(mp.content_entries[&key].get_dynamic("speaker", &en()).unwrap(), Value::Null);
    }

    #[test]
    fn has_many_follows_inverse_field() {
        let mut b = builder();
        let ann = b
            .add_entry("speakers", &raw(json!({"name": "Ann"})), &en())
            .unwrap();
        b.add_entry("events", &raw(json!({"title": "Launch", "speaker": "ann", "_position": 2})), &en())
            .unwrap();
        b.add_entry("events", &raw(json!({"title": "Keynote", "speaker": "ann", "_position": 1})), &en())
            .unwrap();
        b.add_entry("events", &raw(json!({"title": "Party"})), &en())
            .unwrap();
        let mp = b.finish().unwrap();

        let speaker = &mp.content_entries[&ann];
        let events = mp.has_many(speaker, "events", &en()).unwrap();
        let slugs: Vec<String> = events.iter().map(|e| e.slug(&en())).collect();
        assert_eq!(slugs, vec!["keynote", "launch"]);

        assert!(matches!(
            mp.has_many(speaker, "name", &en()),
            Err(MountError::NotHasMany { .. })
        ));
    }

    #[test]
    fn missing_required_field_recorded_not_fatal() {
        let mut b = builder();
        let key = b.add_entry("events", &raw(json!({"_slug": "untitled"})), &en()).unwrap();
        let mp = b.finish().unwrap();
        let entry = &mp.content_entries[&key];
        assert!(!entry.is_valid());
        assert_eq!(entry.errors()[0].field, "title");
        assert_eq!(mp.invalid_entries().count(), 1);
    }

    #[test]
    fn translation_merges_into_existing_entry() {
        let mut b = builder();
        let key = b
            .add_entry("speakers", &raw(json!({"name": "Ann"})), &en())
            .unwrap();
        let same = b
            .translate_entry(&key, &raw(json!({"name": "Anne"})), &fr())
            .unwrap();
        assert_eq!(key, same);
        let mp = b.finish().unwrap();
        let entry = &mp.content_entries[&key];
        assert_eq!(entry.slug(&fr()), "anne");
        assert_eq!(entry.slug(&en()), "ann");
    }

    #[test]
    fn query_entries_in_declared_order() {
        let mut b = builder();
        for (title, position) in [("B", 2), ("A", 1), ("C", 3)] {
            b.add_entry("events", &raw(json!({"title": title, "_position": position})), &en())
                .unwrap();
        }
        let mp = b.finish().unwrap();
        let titles: Vec<String> = mp
            .entries_of("events", &en())
            .unwrap()
            .iter()
            .filter_map(|e| e.label(&en()))
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);

        let query = Query::new().filter("title.in", vec!["A", "C"]).unwrap();
        assert_eq!(mp.query_entries("events", &query, &en()).unwrap().len(), 2);
    }

    #[test]
    fn orphan_policy_applies_on_finish() {
        let mut b = builder();
        b.page("archive/2020");
        assert!(matches!(b.finish(), Err(MountError::Tree(TreeError::MissingParent { .. }))));

        let mut b = builder().orphan_policy(OrphanPolicy::Warn);
        b.page("archive/2020");
        let mp = b.finish().unwrap();
        assert_eq!(mp.orphans, vec!["archive/2020".to_string()]);
        assert_eq!(mp.pages_in_tree_order().len(), 2);
    }
}
