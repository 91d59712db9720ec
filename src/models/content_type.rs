//! User-defined content types and their field declarations.
//!
//! A content type's field list doubles as the schema of its entries:
//! [`ContentType::entry_schema`] turns it into an
//! [`Schema`](crate::fields::Schema) with the fixed entry fields prepended.
//!
//! Raw field lists come in two shapes, both accepted:
//!
//! ```yaml
//! fields:            # filesystem: one single-key mapping per field
//!   - title:
//!       type: string
//!       required: true
//! ```
//!
//! ```json
//! {"fields": [{"name": "title", "type": "string", "required": true}]}
//! ```

use super::{ModelError, raw_bool, raw_str};
use crate::fields::{FieldDef, FieldError, FieldKind, Schema};
use crate::locale::Locale;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Entry field names every content type gets for free.
pub const ENTRY_FIXED_FIELDS: [&str; 6] = [
    "_slug",
    "_position",
    "_visible",
    "seo_title",
    "meta_keywords",
    "meta_description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFieldKind {
    String,
    Text,
    Select,
    Boolean,
    Date,
    File,
    BelongsTo,
    HasMany,
    ManyToMany,
    Category,
    Tags,
    Integer,
    Float,
    Email,
}

/// A content field `type` outside the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown content field type '{0}'")]
pub struct UnknownFieldKind(pub String);

impl FromStr for ContentFieldKind {
    type Err = UnknownFieldKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => ContentFieldKind::String,
            "text" => ContentFieldKind::Text,
            "select" => ContentFieldKind::Select,
            "boolean" => ContentFieldKind::Boolean,
            "date" | "date_time" => ContentFieldKind::Date,
            "file" => ContentFieldKind::File,
            "belongs_to" => ContentFieldKind::BelongsTo,
            "has_many" => ContentFieldKind::HasMany,
            "many_to_many" => ContentFieldKind::ManyToMany,
            "category" => ContentFieldKind::Category,
            "tags" => ContentFieldKind::Tags,
            "integer" => ContentFieldKind::Integer,
            "float" => ContentFieldKind::Float,
            "email" => ContentFieldKind::Email,
            other => return Err(UnknownFieldKind(other.to_string())),
        })
    }
}

impl ContentFieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFieldKind::String => "string",
            ContentFieldKind::Text => "text",
            ContentFieldKind::Select => "select",
            ContentFieldKind::Boolean => "boolean",
            ContentFieldKind::Date => "date",
            ContentFieldKind::File => "file",
            ContentFieldKind::BelongsTo => "belongs_to",
            ContentFieldKind::HasMany => "has_many",
            ContentFieldKind::ManyToMany => "many_to_many",
            ContentFieldKind::Category => "category",
            ContentFieldKind::Tags => "tags",
            ContentFieldKind::Integer => "integer",
            ContentFieldKind::Float => "float",
            ContentFieldKind::Email => "email",
        }
    }

    pub fn is_relationship(self) -> bool {
        matches!(
            self,
            ContentFieldKind::BelongsTo | ContentFieldKind::HasMany | ContentFieldKind::ManyToMany
        )
    }

    /// Storage kind of the entry attribute backing this field.
    pub fn storage(self) -> FieldKind {
        match self {
            ContentFieldKind::String
            | ContentFieldKind::Select
            | ContentFieldKind::File
            | ContentFieldKind::Category
            | ContentFieldKind::Email => FieldKind::String,
            ContentFieldKind::Text => FieldKind::Text,
            ContentFieldKind::Boolean => FieldKind::Boolean,
            ContentFieldKind::Date => FieldKind::Date,
            ContentFieldKind::Integer => FieldKind::Integer,
            ContentFieldKind::Float => FieldKind::Float,
            ContentFieldKind::Tags => FieldKind::Array,
            ContentFieldKind::BelongsTo | ContentFieldKind::HasMany | ContentFieldKind::ManyToMany => {
                FieldKind::Association
            }
        }
    }
}

/// One choice of a `select` field. Names may differ per locale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectOption {
    pub names: BTreeMap<Locale, String>,
    pub position: i64,
}

impl SelectOption {
    pub fn name(&self, locale: &Locale, main_locale: &Locale) -> Option<&str> {
        self.names
            .get(locale)
            .or_else(|| self.names.get(main_locale))
            .or_else(|| self.names.values().next())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentField {
    pub name: String,
    pub label: String,
    pub kind: ContentFieldKind,
    pub hint: Option<String>,
    pub position: i64,
    pub required: bool,
    pub localized: bool,
    pub unique: bool,
    /// Target content type slug for relationship fields.
    pub class_name: Option<String>,
    /// Field of the target type pointing back here (has_many/many_to_many).
    pub inverse_of: Option<String>,
    pub order_by: Option<String>,
    pub select_options: Vec<SelectOption>,
    pub text_formatting: Option<String>,
}

impl ContentField {
    pub fn new(name: impl Into<String>, kind: ContentFieldKind) -> Self {
        let name = name.into();
        Self {
            label: humanize(&name),
            name,
            kind,
            hint: None,
            position: 0,
            required: false,
            localized: false,
            unique: false,
            class_name: None,
            inverse_of: None,
            order_by: None,
            select_options: Vec::new(),
            text_formatting: None,
        }
    }

    fn from_raw(
        name: &str,
        raw: &serde_json::Map<String, serde_json::Value>,
        position: i64,
        main_locale: &Locale,
    ) -> Result<Self, ModelError> {
        const ENTITY: &str = "content field";
        let kind_name = raw_str(raw, "type", ENTITY)?.unwrap_or_else(|| "string".to_string());
        let kind = kind_name
            .parse::<ContentFieldKind>()
            .map_err(|UnknownFieldKind(kind)| ModelError::UnknownFieldType {
                field: name.to_string(),
                kind,
            })?;
        let mut field = ContentField::new(name, kind);
        field.position = position;

        for key in raw.keys() {
            match key.as_str() {
                "name" | "type" | "_id" | "id" => {}
                "label" => field.label = raw_str(raw, key, ENTITY)?.unwrap_or(field.label),
                "hint" => field.hint = raw_str(raw, key, ENTITY)?,
                "position" => {
                    if let Some(p) = raw[key].as_i64() {
                        field.position = p;
                    }
                }
                "required" => field.required = raw_bool(raw, key, ENTITY)?.unwrap_or(false),
                "localized" => field.localized = raw_bool(raw, key, ENTITY)?.unwrap_or(false),
                "unique" => field.unique = raw_bool(raw, key, ENTITY)?.unwrap_or(false),
                "class_name" | "target" => field.class_name = raw_str(raw, key, ENTITY)?,
                "inverse_of" => field.inverse_of = raw_str(raw, key, ENTITY)?,
                "order_by" => field.order_by = raw_str(raw, key, ENTITY)?,
                "text_formatting" => field.text_formatting = raw_str(raw, key, ENTITY)?,
                "select_options" => {
                    field.select_options = parse_select_options(&raw[key], main_locale)
                }
                other => {
                    return Err(FieldError::UnknownField {
                        entity: ENTITY.to_string(),
                        field: other.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(field)
    }

    /// Option whose name (in any locale) equals `name`.
    pub fn find_select_option(&self, name: &str) -> Option<&SelectOption> {
        self.select_options
            .iter()
            .find(|o| o.names.values().any(|n| n == name))
    }

    pub fn to_raw(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut raw = serde_json::Map::new();
        raw.insert("label".into(), self.label.clone().into());
        raw.insert("type".into(), self.kind.as_str().into());
        if let Some(hint) = &self.hint {
            raw.insert("hint".into(), hint.clone().into());
        }
        raw.insert("position".into(), self.position.into());
        if self.required {
            raw.insert("required".into(), true.into());
        }
        if self.localized {
            raw.insert("localized".into(), true.into());
        }
        if self.unique {
            raw.insert("unique".into(), true.into());
        }
        for (key, value) in [
            ("class_name", &self.class_name),
            ("inverse_of", &self.inverse_of),
            ("order_by", &self.order_by),
            ("text_formatting", &self.text_formatting),
        ] {
            if let Some(v) = value {
                raw.insert(key.into(), v.clone().into());
            }
        }
        if !self.select_options.is_empty() {
            let options = self
                .select_options
                .iter()
                .map(|o| {
                    let names: serde_json::Map<_, _> = o
                        .names
                        .iter()
                        .map(|(l, n)| (l.as_str().to_string(), n.clone().into()))
                        .collect();
                    serde_json::json!({"name": names, "position": o.position})
                })
                .collect();
            raw.insert("select_options".into(), serde_json::Value::Array(options));
        }
        raw
    }
}

/// Accepts `["A", "B"]`, `[{name: "A"|{en: "A"}, position: 0}]` or
/// `{en: ["A", "B"], fr: ["Ah", "Bé"]}`.
fn parse_select_options(raw: &serde_json::Value, main_locale: &Locale) -> Vec<SelectOption> {
    match raw {
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut option = SelectOption {
                    position: i as i64,
                    ..Default::default()
                };
                match item {
                    serde_json::Value::String(s) => {
                        option.names.insert(main_locale.clone(), s.clone());
                    }
                    serde_json::Value::Object(map) => {
                        match map.get("name") {
                            Some(serde_json::Value::String(s)) => {
                                option.names.insert(main_locale.clone(), s.clone());
                            }
                            Some(serde_json::Value::Object(names)) => {
                                for (l, n) in names {
                                    if let Some(n) = n.as_str() {
                                        option.names.insert(Locale::from(l.as_str()), n.to_string());
                                    }
                                }
                            }
                            _ => {}
                        }
                        if let Some(p) = map.get("position").and_then(|p| p.as_i64()) {
                            option.position = p;
                        }
                    }
                    _ => {}
                }
                option
            })
            .collect(),
        serde_json::Value::Object(per_locale) => {
            let mut options: Vec<SelectOption> = Vec::new();
            for (l, names) in per_locale {
                let Some(names) = names.as_array() else { continue };
                for (i, name) in names.iter().filter_map(|n| n.as_str()).enumerate() {
                    if options.len() <= i {
                        options.push(SelectOption {
                            position: i as i64,
                            ..Default::default()
                        });
                    }
                    options[i].names.insert(Locale::from(l.as_str()), name.to_string());
                }
            }
            options
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    pub id: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub label_field_name: Option<String>,
    pub group_by_field_name: Option<String>,
    /// Field entries are listed by; `None` or `"manually"` means `_position`.
    pub order_by: Option<String>,
    pub order_direction: Option<String>,
    pub public_submission_enabled: bool,
    pub raw_item_template: Option<String>,
    pub fields: Vec<ContentField>,
}

impl ContentType {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            slug: slug.into(),
            description: None,
            label_field_name: None,
            group_by_field_name: None,
            order_by: None,
            order_direction: None,
            public_submission_enabled: false,
            raw_item_template: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: ContentField) -> Self {
        self.fields.push(field);
        self
    }

    /// Build from a raw definition. `fallback_slug` (the file stem) is used
    /// when the definition has no `slug`.
    pub fn from_raw(
        raw: &serde_json::Map<String, serde_json::Value>,
        fallback_slug: &str,
        main_locale: &Locale,
    ) -> Result<Self, ModelError> {
        const ENTITY: &str = "content type";
        let slug = raw_str(raw, "slug", ENTITY)?.unwrap_or_else(|| fallback_slug.to_string());
        let name = raw_str(raw, "name", ENTITY)?.unwrap_or_else(|| humanize(&slug));
        let mut content_type = ContentType::new(name, slug);

        for key in raw.keys() {
            match key.as_str() {
                "name" | "slug" => {}
                "_id" | "id" => content_type.id = raw_str(raw, key, ENTITY)?,
                "description" => content_type.description = raw_str(raw, key, ENTITY)?,
                "label_field_name" => content_type.label_field_name = raw_str(raw, key, ENTITY)?,
                "group_by_field_name" | "group_by" => {
                    content_type.group_by_field_name = raw_str(raw, key, ENTITY)?
                }
                "order_by" => content_type.order_by = raw_str(raw, key, ENTITY)?,
                "order_direction" => content_type.order_direction = raw_str(raw, key, ENTITY)?,
                "public_submission_enabled" => {
                    content_type.public_submission_enabled =
                        raw_bool(raw, key, ENTITY)?.unwrap_or(false)
                }
                "raw_item_template" => content_type.raw_item_template = raw_str(raw, key, ENTITY)?,
                "fields" | "entries_custom_fields" => {
                    content_type.fields = parse_fields(&raw[key], main_locale)?
                }
                other => {
                    return Err(FieldError::UnknownField {
                        entity: ENTITY.to_string(),
                        field: other.to_string(),
                    }
                    .into());
                }
            }
        }
        content_type.fields.sort_by_key(|f| f.position);
        Ok(content_type)
    }

    pub fn find_field(&self, name: &str) -> Option<&ContentField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The field labelling entries: `label_field_name`, else the first field.
    pub fn label_field(&self) -> Option<&ContentField> {
        self.label_field_name
            .as_deref()
            .and_then(|name| self.find_field(name))
            .or_else(|| self.fields.first())
    }

    /// Whether any field varies per locale.
    pub fn is_localized(&self) -> bool {
        self.fields.iter().any(|f| f.localized)
    }

    /// Default listing order as an `order_by` clause.
    pub fn order_clause(&self) -> String {
        let field = match self.order_by.as_deref() {
            None | Some("") | Some("manually") => "_position",
            Some("created_at") => "_position",
            Some(field) => field,
        };
        let direction = match self.order_direction.as_deref() {
            Some(d) if d.eq_ignore_ascii_case("desc") => "desc",
            _ => "asc",
        };
        format!("{field} {direction}")
    }

    /// Schema of this type's entries: fixed fields then one per content field.
    pub fn entry_schema(&self) -> Arc<Schema> {
        let localized = self.is_localized();
        let fixed = |def: FieldDef| if localized { def.localized() } else { def };
        let mut defs = vec![
            fixed(FieldDef::new("_slug", FieldKind::String)),
            FieldDef::new("_position", FieldKind::Integer).default_value(0),
            FieldDef::new("_visible", FieldKind::Boolean).default_value(true),
            fixed(FieldDef::new("seo_title", FieldKind::String)),
            fixed(FieldDef::new("meta_keywords", FieldKind::String)),
            fixed(FieldDef::new("meta_description", FieldKind::Text)),
        ];
        defs.extend(self.fields.iter().map(|f| {
            let def = FieldDef::new(f.name.clone(), f.kind.storage());
            if f.localized { def.localized() } else { def }
        }));
        Arc::new(Schema::new(defs))
    }

    pub fn to_raw(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut raw = serde_json::Map::new();
        raw.insert("name".into(), self.name.clone().into());
        raw.insert("slug".into(), self.slug.clone().into());
        for (key, value) in [
            ("description", &self.description),
            ("label_field_name", &self.label_field_name),
            ("group_by_field_name", &self.group_by_field_name),
            ("order_by", &self.order_by),
            ("order_direction", &self.order_direction),
            ("raw_item_template", &self.raw_item_template),
        ] {
            if let Some(v) = value {
                raw.insert(key.into(), v.clone().into());
            }
        }
        if self.public_submission_enabled {
            raw.insert("public_submission_enabled".into(), true.into());
        }
        let fields = self
            .fields
            .iter()
            .map(|f| {
                let mut entry = serde_json::Map::new();
                entry.insert(f.name.clone(), serde_json::Value::Object(f.to_raw()));
                serde_json::Value::Object(entry)
            })
            .collect();
        raw.insert("fields".into(), serde_json::Value::Array(fields));
        raw
    }
}

fn parse_fields(raw: &serde_json::Value, main_locale: &Locale) -> Result<Vec<ContentField>, ModelError> {
    let Some(items) = raw.as_array() else {
        return Err(ModelError::InvalidValue {
            entity: "content type".into(),
            key: "fields".into(),
            expected: "a list",
        });
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let invalid = || ModelError::InvalidValue {
                entity: "content type".into(),
                key: format!("fields[{i}]"),
                expected: "a field definition",
            };
            let map = item.as_object().ok_or_else(invalid)?;
            match map.get("name").and_then(|n| n.as_str()) {
                Some(name) => ContentField::from_raw(name, map, i as i64, main_locale),
                None if map.len() == 1 => {
                    let (name, definition) = map.iter().next().ok_or_else(invalid)?;
                    let empty = serde_json::Map::new();
                    let definition = match definition {
                        serde_json::Value::Object(d) => d,
                        serde_json::Value::Null => &empty,
                        _ => return Err(invalid()),
                    };
                    ContentField::from_raw(name, definition, i as i64, main_locale)
                }
                None => Err(invalid()),
            }
        })
        .collect()
}

/// `"blog_posts"` → `"Blog posts"`.
fn humanize(name: &str) -> String {
    let spaced = name.trim_start_matches('_').replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
