use crate::fields::{Attributes, Entity, FieldDef, FieldKind, Schema};
use crate::locale::Locale;
use std::sync::{Arc, LazyLock};

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        FieldDef::new("name", FieldKind::String),
        FieldDef::new("slug", FieldKind::String),
        FieldDef::new("template", FieldKind::Text).localized(),
    ]))
});

/// Reusable template fragment, keyed by slug.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    id: Option<String>,
    attributes: Attributes,
}

impl Entity for Snippet {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl Snippet {
    pub fn new(slug: &str, main_locale: Locale) -> Self {
        let mut attributes = Attributes::new("snippet", SCHEMA.clone(), main_locale.clone());
        attributes.set_declared("slug", slug, &main_locale);
        attributes.set_declared("name", humanize(slug), &main_locale);
        Self {
            id: None,
            attributes,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn slug(&self) -> String {
        self.attributes
            .string("slug", self.attributes.main_locale())
            .unwrap_or_default()
    }

    pub fn name(&self) -> String {
        self.attributes
            .string("name", self.attributes.main_locale())
            .unwrap_or_default()
    }

    pub fn template(&self, locale: &Locale) -> Option<String> {
        self.attributes.string("template", locale)
    }

    pub fn set_template(&mut self, template: &str, locale: &Locale) {
        self.attributes.set_declared("template", template, locale);
    }
}

/// `"main_menu"` → `"Main menu"`.
fn humanize(slug: &str) -> String {
    let spaced = slug.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
