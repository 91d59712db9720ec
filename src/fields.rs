//! Schema-driven, locale-aware attribute storage.
//!
//! Each entity type declares a [`Schema`]: an ordered list of [`FieldDef`]s
//! with a kind, a `localized` flag and an optional default. Values live in an
//! [`Attributes`] store that picks a storage strategy per field:
//!
//! - **Scalar** fields hold one [`Value`].
//! - **Localized** fields hold a `Locale → Value` map. Reads for a locale with
//!   no value fall back to the entity's *main locale* (the locale the entity
//!   was built under).
//!
//! Every locale a localized field is written under is appended to
//! `translated_in`, which only ever grows.
//!
//! Writes to names the schema does not declare fail with
//! [`FieldError::UnknownField`].

use crate::locale::{self, Locale};
use crate::value::{self, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("unknown field '{field}' for {entity}")]
    UnknownField { entity: String, field: String },
}

/// Storage/coercion tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Text,
    Boolean,
    Integer,
    Float,
    Date,
    /// List of nested records (editable elements, select options).
    Array,
    /// Link(s) to other entries, filled in by relationship resolution.
    Association,
    /// Free-form nested mapping.
    Map,
}

impl FieldKind {
    /// Best-effort coercion of a raw value. Values that do not fit are kept
    /// as-is rather than rejected; validation is the entry's business.
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (FieldKind::Boolean, Value::String(s)) if s == "true" || s == "false" => {
                Value::Bool(s == "true")
            }
            (FieldKind::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::String(s),
            },
            (FieldKind::Float, Value::Integer(i)) => Value::Float(i as f64),
            (FieldKind::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            },
            (FieldKind::Date, Value::String(s)) => match value::parse_date(&s) {
                Some(d) => Value::Date(d),
                None => Value::String(s),
            },
            (FieldKind::String | FieldKind::Text, Value::Integer(i)) => Value::String(i.to_string()),
            (_, v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub localized: bool,
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            localized: false,
            default: None,
        }
    }

    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Ordered field declarations of one entity type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn is_localized(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.localized)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Scalar(Value),
    Localized(BTreeMap<Locale, Value>),
}

/// Attribute values of a single entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    entity: &'static str,
    schema: Arc<Schema>,
    main_locale: Locale,
    translated_in: Vec<Locale>,
    slots: BTreeMap<String, Slot>,
}

impl Attributes {
    pub fn new(entity: &'static str, schema: Arc<Schema>, main_locale: Locale) -> Self {
        Self {
            entity,
            schema,
            main_locale,
            translated_in: Vec::new(),
            slots: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn main_locale(&self) -> &Locale {
        &self.main_locale
    }

    /// Locales at least one localized field was written under, in first-write
    /// order.
    pub fn translated_in(&self) -> &[Locale] {
        &self.translated_in
    }

    pub fn is_translated_in(&self, locale: &Locale) -> bool {
        self.translated_in.contains(locale)
    }

    fn def(&self, name: &str) -> Result<&FieldDef, FieldError> {
        self.schema.field(name).ok_or_else(|| FieldError::UnknownField {
            entity: self.entity.to_string(),
            field: name.to_string(),
        })
    }

    /// Read `name` under `locale`, falling back to the main locale and then
    /// to the field default.
    pub fn get(&self, name: &str, locale: &Locale) -> Result<Option<&Value>, FieldError> {
        let def = self.def(name)?;
        let stored = match self.slots.get(name) {
            Some(Slot::Scalar(v)) => Some(v),
            Some(Slot::Localized(map)) => map.get(locale).or_else(|| map.get(&self.main_locale)),
            None => None,
        };
        Ok(stored.or(def.default.as_ref()))
    }

    /// Read `name` under exactly `locale`, without fallback or default.
    pub fn get_exact(&self, name: &str, locale: &Locale) -> Result<Option<&Value>, FieldError> {
        self.def(name)?;
        Ok(match self.slots.get(name) {
            Some(Slot::Scalar(v)) => Some(v),
            Some(Slot::Localized(map)) => map.get(locale),
            None => None,
        })
    }

    /// Every per-locale value of a localized field.
    pub fn localized_values(&self, name: &str) -> Option<&BTreeMap<Locale, Value>> {
        match self.slots.get(name) {
            Some(Slot::Localized(map)) => Some(map),
            _ => None,
        }
    }

    /// Store `value` for `name`. Localized fields store it under `locale`.
    pub fn set(&mut self, name: &str, value: impl Into<Value>, locale: &Locale) -> Result<(), FieldError> {
        let (kind, localized) = {
            let def = self.def(name)?;
            (def.kind, def.localized)
        };
        let value = kind.coerce(value.into());
        if localized {
            let slot = self
                .slots
                .entry(name.to_string())
                .or_insert_with(|| Slot::Localized(BTreeMap::new()));
            match slot {
                Slot::Localized(map) => {
                    map.insert(locale.clone(), value);
                }
                Slot::Scalar(_) => {
                    *slot = Slot::Localized(BTreeMap::from([(locale.clone(), value)]));
                }
            }
            self.mark_translated(locale);
        } else {
            self.slots.insert(name.to_string(), Slot::Scalar(value));
        }
        Ok(())
    }

    /// Store a field the entity's own fixed schema declares. Those writes
    /// cannot hit an unknown field; reaching that case is a schema bug.
    pub(crate) fn set_declared(&mut self, name: &'static str, value: impl Into<Value>, locale: &Locale) {
        let written = self.set(name, value, locale);
        debug_assert!(written.is_ok(), "'{name}' is not declared by the {} schema", self.entity);
    }

    /// Replace every per-locale value of `name` at once.
    ///
    /// A non-localized field is not promoted: it stores the whole mapping as
    /// a single map value.
    pub fn set_all(&mut self, name: &str, values: BTreeMap<Locale, Value>) -> Result<(), FieldError> {
        let (kind, localized) = {
            let def = self.def(name)?;
            (def.kind, def.localized)
        };
        if localized {
            let coerced: BTreeMap<Locale, Value> = values
                .into_iter()
                .map(|(locale, v)| (locale, kind.coerce(v)))
                .collect();
            let locales: Vec<Locale> = coerced.keys().cloned().collect();
            self.slots.insert(name.to_string(), Slot::Localized(coerced));
            for locale in &locales {
                self.mark_translated(locale);
            }
        } else {
            let map = values
                .into_iter()
                .map(|(locale, v)| (locale.as_str().to_string(), v))
                .collect();
            self.slots.insert(name.to_string(), Slot::Scalar(Value::Map(map)));
        }
        Ok(())
    }

    /// Assign a raw JSON value, detecting `{locale: value}` mappings for
    /// localized fields.
    pub fn assign_raw(
        &mut self,
        name: &str,
        raw: &serde_json::Value,
        locale: &Locale,
        site_locales: &[Locale],
    ) -> Result<(), FieldError> {
        let localized = self.def(name)?.localized;
        match raw {
            serde_json::Value::Object(map)
                if localized
                    && !map.is_empty()
                    && map.keys().all(|k| locale::is_known(k, site_locales)) =>
            {
                let values = map
                    .iter()
                    .map(|(k, v)| (Locale::from(k.as_str()), Value::from_json(v)))
                    .collect();
                self.set_all(name, values)
            }
            other => self.set(name, Value::from_json(other), locale),
        }
    }

    /// Record a locale in `translated_in` without writing a value.
    pub fn mark_translated(&mut self, locale: &Locale) {
        if !self.translated_in.contains(locale) {
            self.translated_in.push(locale.clone());
        }
    }

    /// Names with a stored value, in schema order.
    pub fn present_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.schema
            .fields()
            .iter()
            .filter(|f| self.slots.contains_key(&f.name))
    }

    /// Every stored value as raw JSON; localized fields become
    /// `{locale: value}` objects.
    pub fn to_raw(&self) -> serde_json::Map<String, serde_json::Value> {
        self.slots
            .iter()
            .map(|(name, slot)| {
                let json = match slot {
                    Slot::Scalar(v) => v.to_json(),
                    Slot::Localized(map) => serde_json::Value::Object(
                        map.iter()
                            .map(|(l, v)| (l.as_str().to_string(), v.to_json()))
                            .collect(),
                    ),
                };
                (name.clone(), json)
            })
            .collect()
    }

    /// Raw JSON as seen from one locale: scalar fields plus the localized
    /// values translated in exactly that locale.
    pub fn to_raw_in(&self, locale: &Locale) -> serde_json::Map<String, serde_json::Value> {
        self.slots
            .iter()
            .filter_map(|(name, slot)| {
                let value = match slot {
                    Slot::Scalar(v) => Some(v),
                    Slot::Localized(map) => map.get(locale),
                };
                value.map(|v| (name.clone(), v.to_json()))
            })
            .collect()
    }

    pub fn string(&self, name: &str, locale: &Locale) -> Option<String> {
        match self.get(name, locale).ok().flatten()? {
            Value::Null => None,
            v => Some(v.to_string()),
        }
    }

    pub fn bool(&self, name: &str, locale: &Locale) -> Option<bool> {
        self.get(name, locale).ok().flatten().and_then(Value::as_bool)
    }

    pub fn integer(&self, name: &str, locale: &Locale) -> Option<i64> {
        self.get(name, locale).ok().flatten().and_then(Value::as_i64)
    }
}

/// Common surface of every record with an [`Attributes`] store.
pub trait Entity {
    fn attributes(&self) -> &Attributes;
    fn attributes_mut(&mut self) -> &mut Attributes;

    fn get(&self, name: &str, locale: &Locale) -> Result<Option<&Value>, FieldError> {
        self.attributes().get(name, locale)
    }

    fn set(&mut self, name: &str, value: impl Into<Value>, locale: &Locale) -> Result<(), FieldError>
    where
        Self: Sized,
    {
        self.attributes_mut().set(name, value, locale)
    }

    fn main_locale(&self) -> &Locale {
        self.attributes().main_locale()
    }

    fn translated_in(&self) -> &[Locale] {
        self.attributes().translated_in()
    }

    /// Assign every key of a raw mapping. Stops at the first unknown field.
    fn assign(
        &mut self,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
        site_locales: &[Locale],
    ) -> Result<(), FieldError> {
        for (name, value) in raw {
            self.attributes_mut()
                .assign_raw(name, value, locale, site_locales)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            FieldDef::new("title", FieldKind::String).localized(),
            FieldDef::new("listed", FieldKind::Boolean).default_value(true),
            FieldDef::new("options", FieldKind::Map),
            FieldDef::new("published_on", FieldKind::Date),
        ]))
    }

    fn en() -> Locale {
        Locale::from("en")
    }

    fn fr() -> Locale {
        Locale::from("fr")
    }

    #[test]
    fn localized_read_back_per_locale() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set("title", "Hello", &en()).unwrap();
        attrs.set("title", "Salut", &fr()).unwrap();
        assert_eq!(attrs.string("title", &fr()).as_deref(), Some("Salut"));
        assert_eq!(attrs.string("title", &en()).as_deref(), Some("Hello"));
    }

    #[test]
    fn declared_field_write_stores_value() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set_declared("title", "Hello", &en());
        assert_eq!(attrs.string("title", &en()).as_deref(), Some("Hello"));
    }

    #[test]
    #[should_panic(expected = "not declared by the page schema")]
    #[cfg(debug_assertions)]
    fn undeclared_field_write_is_a_schema_bug() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set_declared("layout", "wide", &en());
    }

    #[test]
    fn missing_locale_falls_back_to_main() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set("title", "Hello", &en()).unwrap();
        assert_eq!(attrs.string("title", &Locale::from("de")).as_deref(), Some("Hello"));
        assert_eq!(attrs.get_exact("title", &Locale::from("de")).unwrap(), None);
    }

    #[test]
    fn translated_in_grows_without_duplicates() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set("title", "Hello", &en()).unwrap();
        attrs.set("title", "Salut", &fr()).unwrap();
        attrs.set("title", "Bonjour", &fr()).unwrap();
        assert_eq!(attrs.translated_in(), &[en(), fr()]);
    }

    #[test]
    fn scalar_writes_do_not_mark_translation() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set("listed", false, &fr()).unwrap();
        assert!(attrs.translated_in().is_empty());
        assert_eq!(attrs.bool("listed", &en()), Some(false));
    }

    #[test]
    fn default_applies_when_unset() {
        let attrs = Attributes::new("page", schema(), en());
        assert_eq!(attrs.bool("listed", &en()), Some(true));
    }

    #[test]
    fn unknown_field_rejected() {
        let mut attrs = Attributes::new("page", schema(), en());
        let err = attrs.set("colour", "red", &en()).unwrap_err();
        assert_eq!(
            err,
            FieldError::UnknownField {
                entity: "page".into(),
                field: "colour".into()
            }
        );
    }

    #[test]
    fn set_all_replaces_every_locale() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set("title", "Old", &Locale::from("de")).unwrap();
        attrs
            .set_all(
                "title",
                BTreeMap::from([(en(), "Hello".into()), (fr(), "Salut".into())]),
            )
            .unwrap();
        assert_eq!(attrs.get_exact("title", &Locale::from("de")).unwrap(), None);
        assert!(attrs.is_translated_in(&fr()));
    }

    #[test]
    fn mapping_on_scalar_field_is_not_promoted() {
        let mut attrs = Attributes::new("page", schema(), en());
        let locales = vec![en(), fr()];
        attrs
            .assign_raw("options", &json!({"en": "a", "fr": "b"}), &en(), &locales)
            .unwrap();
        assert!(attrs.localized_values("options").is_none());
        assert!(matches!(attrs.get("options", &fr()).unwrap(), Some(Value::Map(_))));
        assert!(attrs.translated_in().is_empty());
    }

    #[test]
    fn raw_locale_mapping_on_localized_field() {
        let mut attrs = Attributes::new("page", schema(), en());
        let locales = vec![en(), fr()];
        attrs
            .assign_raw("title", &json!({"en": "Hi", "fr": "Salut"}), &en(), &locales)
            .unwrap();
        assert_eq!(attrs.string("title", &fr()).as_deref(), Some("Salut"));
        assert_eq!(attrs.translated_in().len(), 2);
    }

    #[test]
    fn dates_coerced_from_strings() {
        let mut attrs = Attributes::new("page", schema(), en());
        attrs.set("published_on", "2024-03-01", &en()).unwrap();
        assert!(matches!(attrs.get("published_on", &en()).unwrap(), Some(Value::Date(_))));
    }
}
