use crate::fields::{Attributes, Entity, FieldDef, FieldError, FieldKind, Schema};
use crate::locale::Locale;
use crate::value::Value;
use std::sync::{Arc, LazyLock};

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        FieldDef::new("name", FieldKind::String),
        FieldDef::new("locales", FieldKind::Array),
        FieldDef::new("subdomain", FieldKind::String),
        FieldDef::new("domains", FieldKind::Array),
        FieldDef::new("timezone", FieldKind::String),
        FieldDef::new("robots_txt", FieldKind::Text),
        FieldDef::new("seo_title", FieldKind::String).localized(),
        FieldDef::new("meta_keywords", FieldKind::String).localized(),
        FieldDef::new("meta_description", FieldKind::Text).localized(),
    ]))
});

/// Locale used when a site declares none.
pub const FALLBACK_LOCALE: &str = "en";

/// Site-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    id: Option<String>,
    attributes: Attributes,
}

impl Entity for Site {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl Site {
    pub fn new(name: &str, locales: &[Locale]) -> Self {
        let main = locales
            .first()
            .cloned()
            .unwrap_or_else(|| Locale::from(FALLBACK_LOCALE));
        let mut attributes = Attributes::new("site", SCHEMA.clone(), main.clone());
        let locale_values: Vec<Value> = locales.iter().map(|l| Value::from(l.as_str())).collect();
        // Both names exist in the static schema.
        attributes.set_declared("name", name, &main);
        attributes.set_declared("locales", Value::List(locale_values), &main);
        Self {
            id: None,
            attributes,
        }
    }

    /// Build from a raw `site.yml` style mapping.
    ///
    /// `locales` is read first: its first entry becomes the main locale the
    /// remaining attributes are assigned under.
    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Result<Self, FieldError> {
        let locales: Vec<Locale> = raw
            .get("locales")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(Locale::from)
                    .collect()
            })
            .unwrap_or_default();
        let name = raw.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        let mut site = Site::new(name, &locales);
        let main = site.default_locale();
        let all = site.locales();
        for (key, value) in raw {
            if key == "locales" || key == "id" || key == "_id" {
                continue;
            }
            site.attributes.assign_raw(key, value, &main, &all)?;
        }
        site.id = raw
            .get("_id")
            .or_else(|| raw.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from);
        Ok(site)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn name(&self) -> String {
        self.attributes
            .string("name", self.attributes.main_locale())
            .unwrap_or_default()
    }

    /// Declared locales, main locale first.
    pub fn locales(&self) -> Vec<Locale> {
        let declared: Vec<Locale> = self
            .attributes
            .get("locales", self.attributes.main_locale())
            .ok()
            .flatten()
            .and_then(Value::as_list)
            .map(|items| items.iter().map(|v| Locale::from(v.to_string())).collect())
            .unwrap_or_default();
        if declared.is_empty() {
            vec![self.attributes.main_locale().clone()]
        } else {
            declared
        }
    }

    pub fn default_locale(&self) -> Locale {
        self.attributes.main_locale().clone()
    }

    pub fn seo_title(&self, locale: &Locale) -> Option<String> {
        self.attributes.string("seo_title", locale)
    }

    pub fn to_raw(&self) -> serde_json::Map<String, serde_json::Value> {
        self.attributes.to_raw()
    }
}
