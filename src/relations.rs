//! Cross-references between content entries.
//!
//! Entries name each other by identifier before every entry exists, so
//! resolution runs in two phases:
//!
//! 1. **Collection.** While raw entries are applied, `belongs_to` and
//!    `many_to_many` values are not stored. Their target identifiers go into
//!    a [`RelationQueue`] keyed by the source entry.
//! 2. **Resolution.** Once every entry of every type is loaded,
//!    [`resolve`] indexes entries by `(content type, identifier)` and writes
//!    a [`Link`] (belongs_to) or a list of links (many_to_many) into each
//!    source entry.
//!
//! Targets that cannot be found are not errors: the field resolves to null
//! (or drops that member) and a [`DanglingReference`] is reported and logged.
//! A relationship naming a content type that was never loaded *is* an error.
//!
//! `has_many` values are never stored. [`find_entries_where`] computes them
//! on each call from the inverse side.

use crate::fields::{Entity, FieldError};
use crate::models::{ContentEntry, ContentFieldKind, ContentType};
use crate::query::{Query, QueryError};
use crate::value::{Link, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RelationError {
    #[error("{source_key}: field '{field}' references unknown content type '{class_name}'")]
    UnknownContentType {
        source_key: String,
        field: String,
        class_name: String,
    },
    #[error("{source_key}: relationship field '{field}' has no class_name")]
    MissingClassName { source_key: String, field: String },
    #[error("{source_key} is not a loaded entry")]
    UnknownSource { source_key: String },
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Unresolved relationship value read from raw entry data.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReference {
    pub field: String,
    pub kind: ContentFieldKind,
    /// Target content type slug.
    pub class_name: Option<String>,
    pub target_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRelation {
    /// Key of the entry the value belongs to.
    pub source: String,
    pub reference: RawReference,
}

/// Relationship values waiting for every entry to be loaded.
#[derive(Debug, Default)]
pub struct RelationQueue {
    pending: Vec<PendingRelation>,
}

impl RelationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reference` for `source`. A later push for the same source and
    /// field replaces the earlier one.
    pub fn push(&mut self, source: impl Into<String>, reference: RawReference) {
        let source = source.into();
        self.pending
            .retain(|p| !(p.source == source && p.reference.field == reference.field));
        self.pending.push(PendingRelation { source, reference });
    }

    /// Point queued relations of `from` at `to` after an entry was re-keyed.
    pub fn rename_source(&mut self, from: &str, to: &str) {
        for pending in self.pending.iter_mut().filter(|p| p.source == from) {
            pending.source = to.to_string();
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRelation> {
        self.pending.iter()
    }
}

/// A recorded target identifier with no matching entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub source: String,
    pub field: String,
    pub content_type: String,
    pub target_id: String,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: '{}' points to missing {} '{}'",
            self.source, self.field, self.content_type, self.target_id
        )
    }
}

/// Lookup of entries by content type and any identifier they answer to:
/// remote id or slug in any translated locale.
struct EntryIndex {
    links: HashMap<(String, String), Link>,
}

impl EntryIndex {
    /// Ids and main-locale slugs are indexed first; translated slugs only
    /// fill identifiers no entry answers to in its main locale.
    fn build(entries: &BTreeMap<String, ContentEntry>) -> Self {
        let mut links = HashMap::new();
        for (key, entry) in entries {
            let link = Link {
                key: key.clone(),
                id: entry.id(),
            };
            for identifier in [entry.id(), entry.slug(entry.main_locale())] {
                Self::insert(&mut links, entry, identifier, &link);
            }
        }
        for (key, entry) in entries {
            let link = Link {
                key: key.clone(),
                id: entry.id(),
            };
            for locale in entry.translated_in() {
                Self::insert(&mut links, entry, entry.slug(locale), &link);
            }
        }
        Self { links }
    }

    fn insert(
        links: &mut HashMap<(String, String), Link>,
        entry: &ContentEntry,
        identifier: String,
        link: &Link,
    ) {
        if identifier.is_empty() {
            return;
        }
        links
            .entry((entry.content_type().to_string(), identifier))
            .or_insert_with(|| link.clone());
    }

    fn find(&self, content_type: &str, identifier: &str) -> Option<&Link> {
        self.links
            .get(&(content_type.to_string(), identifier.to_string()))
    }
}

/// Resolve every queued relation into the entries it belongs to.
///
/// Consumes the queue. Returns the dangling references met on the way;
/// each one is also logged at `warn`.
pub fn resolve(
    queue: RelationQueue,
    entries: &mut BTreeMap<String, ContentEntry>,
    content_types: &BTreeMap<String, ContentType>,
) -> Result<Vec<DanglingReference>, RelationError> {
    let index = EntryIndex::build(entries);
    let mut dangling = Vec::new();

    for PendingRelation { source, reference } in queue.pending {
        let class_name = reference
            .class_name
            .clone()
            .ok_or_else(|| RelationError::MissingClassName {
                source_key: source.clone(),
                field: reference.field.clone(),
            })?;
        if !content_types.contains_key(&class_name) {
            return Err(RelationError::UnknownContentType {
                source_key: source,
                field: reference.field,
                class_name,
            });
        }

        let mut links = Vec::new();
        for target in &reference.target_ids {
            match index.find(&class_name, target) {
                Some(link) => links.push(link.clone()),
                None => {
                    warn!(
                        entry = %source,
                        field = %reference.field,
                        content_type = %class_name,
                        target = %target,
                        "dangling reference"
                    );
                    dangling.push(DanglingReference {
                        source: source.clone(),
                        field: reference.field.clone(),
                        content_type: class_name.clone(),
                        target_id: target.clone(),
                    });
                }
            }
        }

        let value = match reference.kind {
            ContentFieldKind::ManyToMany => Value::List(links.into_iter().map(Value::Link).collect()),
            _ => links.into_iter().next().map(Value::Link).unwrap_or_default(),
        };

        let entry = entries
            .get_mut(&source)
            .ok_or_else(|| RelationError::UnknownSource {
                source_key: source.clone(),
            })?;
        let main = entry.main_locale().clone();
        debug!(entry = %source, field = %reference.field, "relation resolved");
        entry.set_dynamic(&reference.field, value, &main)?;
    }
    Ok(dangling)
}

/// Entries of `content_type` whose `inverse_field` points at any of
/// `target_ids`.
///
/// Backs `has_many` fields. Computed from the live collection on every call.
pub fn find_entries_where<'a>(
    entries: impl IntoIterator<Item = &'a ContentEntry>,
    content_type: &str,
    inverse_field: &str,
    target_ids: &[String],
) -> Result<Vec<&'a ContentEntry>, RelationError> {
    let ids: Vec<Value> = target_ids.iter().map(|id| Value::from(id.as_str())).collect();
    let query = Query::new().filter(&format!("{inverse_field}.in"), Value::List(ids))?;
    let candidates: Vec<&ContentEntry> = entries
        .into_iter()
        .filter(|e| e.content_type() == content_type)
        .collect();
    let Some(first) = candidates.first() else {
        return Ok(Vec::new());
    };
    let locale = first.main_locale().clone();
    Ok(query.run(candidates, &locale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::Locale;
    use crate::models::ContentField;

    fn en() -> Locale {
        Locale::from("en")
    }

    fn types() -> BTreeMap<String, ContentType> {
        let venues = ContentType::new("Venues", "venues")
            .with_field(ContentField::new("name", ContentFieldKind::String));
        let mut venue = ContentField::new("venue", ContentFieldKind::BelongsTo);
        venue.class_name = Some("venues".into());
        let mut speakers = ContentField::new("speakers", ContentFieldKind::ManyToMany);
        speakers.class_name = Some("venues".into());
        let events = ContentType::new("Events", "events")
            .with_field(ContentField::new("title", ContentFieldKind::String))
            .with_field(venue)
            .with_field(speakers);
        BTreeMap::from([
            ("venues".to_string(), venues),
            ("events".to_string(), events),
        ])
    }

    fn add(
        entries: &mut BTreeMap<String, ContentEntry>,
        ct: &ContentType,
        slug: &str,
    ) -> String {
        let mut entry = ContentEntry::new(ct, ct.entry_schema(), en());
        entry.set_slug(slug, &en());
        let key = entry.key();
        entries.insert(key.clone(), entry);
        key
    }

    fn reference(field: &str, kind: ContentFieldKind, ids: &[&str]) -> RawReference {
        RawReference {
            field: field.into(),
            kind,
            class_name: Some("venues".into()),
            target_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn belongs_to_resolves_to_link() {
        let types = types();
        let mut entries = BTreeMap::new();
        add(&mut entries, &types["venues"], "hall-a");
        let launch = add(&mut entries, &types["events"], "launch");
        let mut queue = RelationQueue::new();
        queue.push(&launch, reference("venue", ContentFieldKind::BelongsTo, &["hall-a"]));

        let dangling = resolve(queue, &mut entries, &types).unwrap();
        assert!(dangling.is_empty());
        let venue = entries[&launch].get_dynamic("venue", &en()).unwrap();
        assert_eq!(
            venue,
            Value::Link(Link {
                key: "venues/hall-a".into(),
                id: "hall-a".into()
            })
        );
    }

    #[test]
    fn translated_slug_never_shadows_a_main_slug() {
        let mut name = ContentField::new("name", ContentFieldKind::String);
        name.localized = true;
        let mut types = types();
        types.insert("venues".into(), ContentType::new("Venues", "venues").with_field(name));

        let fr = Locale::from("fr");
        let mut entries = BTreeMap::new();
        let aaa = add(&mut entries, &types["venues"], "aaa");
        if let Some(entry) = entries.get_mut(&aaa) {
            entry.set_slug("zed", &fr);
        }
        add(&mut entries, &types["venues"], "zed");
        let launch = add(&mut entries, &types["events"], "launch");
        let mut queue = RelationQueue::new();
        queue.push(&launch, reference("venue", ContentFieldKind::BelongsTo, &["zed"]));

        let dangling = resolve(queue, &mut entries, &types).unwrap();
        assert!(dangling.is_empty());
        let venue = entries[&launch].get_dynamic("venue", &en()).unwrap();
        assert_eq!(venue.as_link().map(|l| l.key.as_str()), Some("venues/zed"));
    }

    #[test]
    fn dangling_belongs_to_resolves_to_null() {
        let types = types();
        let mut entries = BTreeMap::new();
        let launch = add(&mut entries, &types["events"], "launch");
        let mut queue = RelationQueue::new();
        queue.push(&launch, reference("venue", ContentFieldKind::BelongsTo, &["42"]));

        let dangling = resolve(queue, &mut entries, &types).unwrap();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].target_id, "42");
        assert_eq!(entries[&launch].get_dynamic("venue", &en()).unwrap(), Value::Null);
    }

    #[test]
    fn many_to_many_keeps_order_and_drops_missing() {
        let types = types();
        let mut entries = BTreeMap::new();
        add(&mut entries, &types["venues"], "a");
        add(&mut entries, &types["venues"], "b");
        let launch = add(&mut entries, &types["events"], "launch");
        let mut queue = RelationQueue::new();
        queue.push(
            &launch,
            reference("speakers", ContentFieldKind::ManyToMany, &["b", "zz", "a"]),
        );

        let dangling = resolve(queue, &mut entries, &types).unwrap();
        assert_eq!(dangling.len(), 1);
        let value = entries[&launch].get_dynamic("speakers", &en()).unwrap();
        let ids: Vec<&str> = value
            .as_list()
            .unwrap()
            .iter()
            .filter_map(Value::identifier)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn unknown_content_type_is_fatal() {
        let types = types();
        let mut entries = BTreeMap::new();
        let launch = add(&mut entries, &types["events"], "launch");
        let mut queue = RelationQueue::new();
        let mut r = reference("venue", ContentFieldKind::BelongsTo, &["x"]);
        r.class_name = Some("rooms".into());
        queue.push(&launch, r);

        let err = resolve(queue, &mut entries, &types).unwrap_err();
        assert!(matches!(err, RelationError::UnknownContentType { ref class_name, .. } if class_name == "rooms"));
    }

    #[test]
    fn later_push_replaces_same_field() {
        let mut queue = RelationQueue::new();
        queue.push("events/a", reference("venue", ContentFieldKind::BelongsTo, &["x"]));
        queue.push("events/a", reference("venue", ContentFieldKind::BelongsTo, &["y"]));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().reference.target_ids, vec!["y".to_string()]);
    }

    #[test]
    fn has_many_recomputed_from_inverse_side() {
        let types = types();
        let mut entries = BTreeMap::new();
        add(&mut entries, &types["venues"], "hall-a");
        let launch = add(&mut entries, &types["events"], "launch");
        add(&mut entries, &types["events"], "party");
        let mut queue = RelationQueue::new();
        queue.push(&launch, reference("venue", ContentFieldKind::BelongsTo, &["hall-a"]));
        resolve(queue, &mut entries, &types).unwrap();

        let found = find_entries_where(entries.values(), "events", "venue", &["hall-a".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), launch);

        let party = entries.get_mut("events/party").unwrap();
        party
            .set_dynamic(
                "venue",
                Link {
                    key: "venues/hall-a".into(),
                    id: "hall-a".into(),
                },
                &en(),
            )
            .unwrap();
        let found = find_entries_where(entries.values(), "events", "venue", &["hall-a".to_string()]).unwrap();
        assert_eq!(found.len(), 2);
    }
}
