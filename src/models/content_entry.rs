//! Instances of a user-defined content type.
//!
//! An entry's attribute store is built from its type's
//! [`entry_schema`](super::ContentType::entry_schema): fixed fields (`_slug`,
//! `_position`, `_visible`, SEO fields) followed by one attribute per content
//! field. Dynamic fields are read and written by name through
//! [`ContentEntry::get_dynamic`] / [`ContentEntry::set_dynamic`].
//!
//! Relationship fields are not stored while raw data is applied: the raw
//! target identifiers are handed back as [`RawReference`]s for the
//! relationship resolver, which writes [`Link`](crate::value::Link)s once
//! every entry exists. `has_many` fields are never stored at all.

use super::content_type::{ContentFieldKind, ContentType};
use crate::fields::{Attributes, Entity, FieldError, Schema};
use crate::locale::Locale;
use crate::query::Queryable;
use crate::relations::RawReference;
use crate::value::{Link, Value};
use std::fmt;
use std::sync::Arc;

/// Raw keys that describe an entry rather than one of its fields.
const IGNORED_RAW_KEYS: [&str; 5] = [
    "_label",
    "content_type_slug",
    "created_at",
    "updated_at",
    "_translated_in",
];

/// A required field left blank in one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: String,
    pub locale: Locale,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is required ({})", self.field, self.locale)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentEntry {
    id: Option<String>,
    content_type: String,
    label_field: Option<String>,
    errors: Vec<ValidationFailure>,
    attributes: Attributes,
}

impl Entity for ContentEntry {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl ContentEntry {
    /// Empty entry of `content_type`. `schema` should come from
    /// [`ContentType::entry_schema`]; callers building many entries share one.
    pub fn new(content_type: &ContentType, schema: Arc<Schema>, main_locale: Locale) -> Self {
        Self {
            id: None,
            content_type: content_type.slug.clone(),
            label_field: content_type.label_field().map(|f| f.name.clone()),
            errors: Vec::new(),
            attributes: Attributes::new("content entry", schema, main_locale),
        }
    }

    /// Apply a raw attribute mapping under `locale`.
    ///
    /// Returns the relationship references found, unresolved. `has_many`
    /// values are dropped since they are derived from the other side. On
    /// error the entry is left exactly as it was.
    pub fn apply_raw(
        &mut self,
        content_type: &ContentType,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
        site_locales: &[Locale],
    ) -> Result<Vec<RawReference>, FieldError> {
        let mut staged = self.clone();
        let references = staged.merge_raw(content_type, raw, locale, site_locales)?;
        *self = staged;
        Ok(references)
    }

    fn merge_raw(
        &mut self,
        content_type: &ContentType,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
        site_locales: &[Locale],
    ) -> Result<Vec<RawReference>, FieldError> {
        let mut references = Vec::new();
        for (key, value) in raw {
            if key == "_id" || key == "id" {
                if let Some(id) = json_identifier(value) {
                    self.id = Some(id);
                }
                continue;
            }
            if IGNORED_RAW_KEYS.contains(&key.as_str()) {
                continue;
            }
            match content_type.find_field(key) {
                Some(field) if field.kind == ContentFieldKind::HasMany => {}
                Some(field) if field.kind.is_relationship() => {
                    references.push(RawReference {
                        field: field.name.clone(),
                        kind: field.kind,
                        class_name: field.class_name.clone(),
                        target_ids: json_identifiers(value),
                    });
                }
                _ => self.attributes.assign_raw(key, value, locale, site_locales)?,
            }
        }
        Ok(references)
    }

    /// Slug of the owning content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Remote id when known, else the main-locale slug.
    pub fn id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self.slug(self.attributes.main_locale()),
        }
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Collection key: `"{content_type}/{main-locale slug}"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.content_type, self.slug(self.attributes.main_locale()))
    }

    pub fn slug(&self, locale: &Locale) -> String {
        self.attributes.string("_slug", locale).unwrap_or_default()
    }

    /// `_slug` exactly as stored for `locale`, without main-locale fallback.
    pub fn explicit_slug(&self, locale: &Locale) -> Option<String> {
        self.attributes
            .get_exact("_slug", locale)
            .ok()
            .flatten()
            .filter(|v| !v.is_blank())
            .map(Value::to_string)
    }

    pub fn set_slug(&mut self, slug: &str, locale: &Locale) {
        self.attributes.set_declared("_slug", slug, locale);
    }

    /// Value of the label field under `locale`.
    pub fn label(&self, locale: &Locale) -> Option<String> {
        let field = self.label_field.as_deref()?;
        self.attributes.string(field, locale).filter(|s| !s.is_empty())
    }

    pub fn position(&self) -> i64 {
        self.attributes
            .integer("_position", self.attributes.main_locale())
            .unwrap_or(0)
    }

    pub fn is_visible(&self) -> bool {
        self.attributes
            .bool("_visible", self.attributes.main_locale())
            .unwrap_or(true)
    }

    /// Read a content-type field by name.
    pub fn get_dynamic(&self, name: &str, locale: &Locale) -> Result<Value, FieldError> {
        Ok(self.attributes.get(name, locale)?.cloned().unwrap_or_default())
    }

    /// Write a content-type field by name.
    pub fn set_dynamic(&mut self, name: &str, value: impl Into<Value>, locale: &Locale) -> Result<(), FieldError> {
        self.attributes.set(name, value, locale)
    }

    /// Re-run required-field validation against `content_type`, replacing
    /// the previous failures. Each locale the entry is translated in is
    /// checked for localized fields; other fields are checked once.
    pub fn validate(&mut self, content_type: &ContentType) -> &[ValidationFailure] {
        let main = self.attributes.main_locale().clone();
        let mut locales = vec![main.clone()];
        locales.extend(self.attributes.translated_in().iter().filter(|l| **l != main).cloned());

        let mut errors = Vec::new();
        for field in content_type.fields.iter().filter(|f| f.required) {
            if field.kind == ContentFieldKind::HasMany {
                continue;
            }
            let checked: &[Locale] = if field.localized { &locales } else { &locales[..1] };
            for locale in checked {
                let blank = self
                    .attributes
                    .get_exact(&field.name, locale)
                    .ok()
                    .flatten()
                    .is_none_or(Value::is_blank);
                if blank {
                    errors.push(ValidationFailure {
                        field: field.name.clone(),
                        locale: locale.clone(),
                    });
                }
            }
        }
        self.errors = errors;
        &self.errors
    }

    pub fn errors(&self) -> &[ValidationFailure] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Stored attributes as seen from `locale`, ready for a writer. Links
    /// are rendered with `link_ref` (writers disagree on how to address the
    /// target entry).
    pub fn to_raw_in(
        &self,
        locale: &Locale,
        link_ref: impl Fn(&Link) -> String,
    ) -> serde_json::Map<String, serde_json::Value> {
        self.attributes
            .present_fields()
            .filter_map(|def| {
                let value = self.attributes.get_exact(&def.name, locale).ok().flatten()?;
                Some((def.name.clone(), raw_value(value, &link_ref)))
            })
            .collect()
    }

    /// Every stored attribute, localized fields as `{locale: value}`
    /// mappings. Used where one record carries all locales (data files).
    pub fn to_raw(&self, link_ref: impl Fn(&Link) -> String) -> serde_json::Map<String, serde_json::Value> {
        let main = self.attributes.main_locale();
        self.attributes
            .present_fields()
            .filter_map(|def| {
                let json = match self.attributes.localized_values(&def.name) {
                    Some(values) => serde_json::Value::Object(
                        values
                            .iter()
                            .map(|(l, v)| (l.as_str().to_string(), raw_value(v, &link_ref)))
                            .collect(),
                    ),
                    None => raw_value(self.attributes.get_exact(&def.name, main).ok().flatten()?, &link_ref),
                };
                Some((def.name.clone(), json))
            })
            .collect()
    }
}

fn raw_value(value: &Value, link_ref: &impl Fn(&Link) -> String) -> serde_json::Value {
    match value {
        Value::Link(link) => serde_json::Value::String(link_ref(link)),
        Value::List(items) => serde_json::Value::Array(items.iter().map(|v| raw_value(v, link_ref)).collect()),
        other => other.to_json(),
    }
}

impl Queryable for ContentEntry {
    fn field_value(&self, field: &str, locale: &Locale) -> Option<Value> {
        match field {
            "_id" => Some(Value::String(self.id())),
            "_label" => Some(Value::from(self.label(locale))),
            "_slug" | "_permalink" => Some(Value::String(self.slug(locale))),
            "content_type" => Some(Value::String(self.content_type.clone())),
            _ => self.attributes.get(field, locale).ok().flatten().cloned(),
        }
    }
}

fn json_identifier(json: &serde_json::Value) -> Option<String> {
    match json {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("_slug"))
            .and_then(json_identifier),
        _ => None,
    }
}

/// Target identifiers of a raw relationship value: a single id, a list of
/// ids, or embedded records carrying `_id`/`_slug`.
fn json_identifiers(json: &serde_json::Value) -> Vec<String> {
    match json {
        serde_json::Value::Array(items) => items.iter().filter_map(json_identifier).collect(),
        other => json_identifier(other).into_iter().collect(),
    }
}
