//! Pages and their editable elements.
//!
//! A page is keyed by its *raw fullpath*: the path it was discovered under,
//! in the main locale (`index`, `about-us/john-doe`). Tree links (`parent`,
//! `children`) are raw fullpaths too, so the mounting point's page map stays
//! the single owner of every page. Localized fullpaths (`a-propos/john-doe`)
//! are computed by the tree builder once the hierarchy is known.

use crate::fields::{Attributes, Entity, FieldDef, FieldError, FieldKind, Schema};
use crate::locale::Locale;
use crate::query::Queryable;
use crate::value::Value;
use std::sync::{Arc, LazyLock};

pub const INDEX: &str = "index";
pub const NOT_FOUND: &str = "404";

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        FieldDef::new("title", FieldKind::String).localized(),
        FieldDef::new("slug", FieldKind::String).localized(),
        FieldDef::new("fullpath", FieldKind::String).localized(),
        FieldDef::new("handle", FieldKind::String),
        FieldDef::new("position", FieldKind::Integer),
        FieldDef::new("listed", FieldKind::Boolean).default_value(true),
        FieldDef::new("published", FieldKind::Boolean).default_value(true),
        FieldDef::new("templatized", FieldKind::Boolean).default_value(false),
        FieldDef::new("content_type", FieldKind::String),
        FieldDef::new("redirect_url", FieldKind::String).localized(),
        FieldDef::new("redirect_type", FieldKind::Integer).default_value(301),
        FieldDef::new("cache_strategy", FieldKind::String).default_value("none"),
        FieldDef::new("response_type", FieldKind::String).default_value("text/html"),
        FieldDef::new("seo_title", FieldKind::String).localized(),
        FieldDef::new("meta_keywords", FieldKind::String).localized(),
        FieldDef::new("meta_description", FieldKind::Text).localized(),
        FieldDef::new("template", FieldKind::Text).localized(),
    ]))
});

static ELEMENT_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        FieldDef::new("block", FieldKind::String),
        FieldDef::new("slug", FieldKind::String),
        FieldDef::new("content", FieldKind::Text).localized(),
    ]))
});

/// A block of page content editable from the CMS back-office.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableElement {
    attributes: Attributes,
}

impl Entity for EditableElement {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl EditableElement {
    pub fn new(block: Option<&str>, slug: &str, main_locale: Locale) -> Self {
        let mut attributes = Attributes::new("editable element", ELEMENT_SCHEMA.clone(), main_locale.clone());
        // Both names exist in the static schema.
        attributes.set_declared("block", Value::from(block), &main_locale);
        attributes.set_declared("slug", slug, &main_locale);
        Self { attributes }
    }

    /// Parse a `"block/slug"` (or bare `"slug"`) key.
    pub fn from_path(path: &str, main_locale: Locale) -> Self {
        match path.rsplit_once('/') {
            Some((block, slug)) => Self::new(Some(block), slug, main_locale),
            None => Self::new(None, path, main_locale),
        }
    }

    pub fn block(&self) -> Option<String> {
        self.attributes.string("block", self.attributes.main_locale())
    }

    pub fn slug(&self) -> String {
        self.attributes
            .string("slug", self.attributes.main_locale())
            .unwrap_or_default()
    }

    /// `block/slug`, or `slug` when there is no block.
    pub fn path(&self) -> String {
        match self.block() {
            Some(block) => format!("{block}/{}", self.slug()),
            None => self.slug(),
        }
    }

    pub fn content(&self, locale: &Locale) -> Option<String> {
        self.attributes.string("content", locale)
    }

    pub fn set_content(&mut self, content: &str, locale: &Locale) {
        self.attributes.set_declared("content", content, locale);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    key: String,
    id: Option<String>,
    parent: Option<String>,
    children: Vec<String>,
    editable_elements: Vec<EditableElement>,
    attributes: Attributes,
}

impl Entity for Page {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl Page {
    pub fn new(key: impl Into<String>, main_locale: Locale) -> Self {
        Self {
            key: key.into(),
            id: None,
            parent: None,
            children: Vec::new(),
            editable_elements: Vec::new(),
            attributes: Attributes::new("page", SCHEMA.clone(), main_locale),
        }
    }

    /// Apply a raw attribute mapping (front matter or API payload) under
    /// `locale`.
    ///
    /// `editable_elements` is a `{"block/slug": content}` mapping (or a list of
    /// `{block, slug, content}` records); `_id`/`id` set the remote id. On
    /// error the page is left exactly as it was.
    pub fn apply_raw(
        &mut self,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
        site_locales: &[Locale],
    ) -> Result<(), FieldError> {
        let mut staged = self.clone();
        staged.merge_raw(raw, locale, site_locales)?;
        *self = staged;
        Ok(())
    }

    fn merge_raw(
        &mut self,
        raw: &serde_json::Map<String, serde_json::Value>,
        locale: &Locale,
        site_locales: &[Locale],
    ) -> Result<(), FieldError> {
        for (key, value) in raw {
            match key.as_str() {
                "_id" | "id" => {
                    if let Some(id) = value.as_str() {
                        self.id = Some(id.to_string());
                    }
                }
                "editable_elements" => self.apply_editable_elements(value, locale),
                "parent_id" | "parent_fullpath" | "depth" | "translated_in" => {}
                _ => self.attributes.assign_raw(key, value, locale, site_locales)?,
            }
        }
        Ok(())
    }

    fn apply_editable_elements(&mut self, raw: &serde_json::Value, locale: &Locale) {
        match raw {
            serde_json::Value::Object(map) => {
                for (path, content) in map {
                    let content = content.as_str().unwrap_or_default();
                    self.editable_element_mut(path).set_content(content, locale);
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter().filter_map(|i| i.as_object()) {
                    let slug = item.get("slug").and_then(|v| v.as_str()).unwrap_or_default();
                    let path = match item.get("block").and_then(|v| v.as_str()) {
                        Some(block) if !block.is_empty() => format!("{block}/{slug}"),
                        _ => slug.to_string(),
                    };
                    let content = item.get("content").and_then(|v| v.as_str()).unwrap_or_default();
                    self.editable_element_mut(&path).set_content(content, locale);
                }
            }
            _ => {}
        }
    }

    fn editable_element_mut(&mut self, path: &str) -> &mut EditableElement {
        let position = self.editable_elements.iter().position(|e| e.path() == path);
        match position {
            Some(i) => &mut self.editable_elements[i],
            None => {
                let main = self.attributes.main_locale().clone();
                self.editable_elements.push(EditableElement::from_path(path, main));
                let last = self.editable_elements.len() - 1;
                &mut self.editable_elements[last]
            }
        }
    }

    /// Raw fullpath this page is keyed by.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn is_index(&self) -> bool {
        self.key == INDEX
    }

    pub fn is_index_or_404(&self) -> bool {
        self.key == INDEX || self.key == NOT_FOUND
    }

    /// Number of path segments; 0 for `index` and `404`.
    pub fn depth(&self) -> usize {
        depth_of(&self.key)
    }

    pub fn title(&self, locale: &Locale) -> Option<String> {
        self.attributes.string("title", locale)
    }

    pub fn set_title(&mut self, title: &str, locale: &Locale) {
        self.attributes.set_declared("title", title, locale);
    }

    /// Slug under `locale`, derived from the raw fullpath when never set.
    pub fn slug(&self, locale: &Locale) -> String {
        self.attributes
            .string("slug", locale)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| last_segment(&self.key).to_string())
    }

    /// Fullpath under `locale`, the raw fullpath when not localized yet.
    pub fn fullpath(&self, locale: &Locale) -> String {
        self.attributes
            .string("fullpath", locale)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.key.clone())
    }

    pub fn set_fullpath(&mut self, fullpath: &str, locale: &Locale) {
        self.attributes.set_declared("fullpath", fullpath, locale);
    }

    pub fn position(&self) -> Option<i64> {
        self.attributes.integer("position", self.attributes.main_locale())
    }

    pub fn handle(&self) -> Option<String> {
        self.attributes.string("handle", self.attributes.main_locale())
    }

    pub fn is_listed(&self) -> bool {
        self.attributes
            .bool("listed", self.attributes.main_locale())
            .unwrap_or(true)
    }

    pub fn is_published(&self) -> bool {
        self.attributes
            .bool("published", self.attributes.main_locale())
            .unwrap_or(true)
    }

    pub fn is_templatized(&self) -> bool {
        self.attributes
            .bool("templatized", self.attributes.main_locale())
            .unwrap_or(false)
    }

    /// Slug of the content type a templatized page renders.
    pub fn content_type(&self) -> Option<String> {
        self.attributes.string("content_type", self.attributes.main_locale())
    }

    pub fn redirect_url(&self, locale: &Locale) -> Option<String> {
        self.attributes.string("redirect_url", locale)
    }

    /// Raw template source, stored verbatim.
    pub fn template(&self, locale: &Locale) -> Option<String> {
        self.attributes.string("template", locale)
    }

    pub fn set_template(&mut self, template: &str, locale: &Locale) {
        self.attributes.set_declared("template", template, locale);
    }

    pub fn editable_elements(&self) -> &[EditableElement] {
        &self.editable_elements
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub(crate) fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    pub(crate) fn set_children(&mut self, children: Vec<String>) {
        self.children = children;
    }

    /// Attributes for one locale, ready for a writer. Tree-derived fields
    /// are left out; writers recompute them from the structure.
    pub fn to_raw_in(&self, locale: &Locale) -> serde_json::Map<String, serde_json::Value> {
        let mut raw = self.attributes.to_raw_in(locale);
        raw.remove("fullpath");
        raw.remove("template");
        let elements: serde_json::Map<String, serde_json::Value> = self
            .editable_elements
            .iter()
            .filter_map(|e| {
                e.attributes()
                    .get_exact("content", locale)
                    .ok()
                    .flatten()
                    .map(|c| (e.path(), c.to_json()))
            })
            .collect();
        if !elements.is_empty() {
            raw.insert(
                "editable_elements".to_string(),
                serde_json::Value::Object(elements),
            );
        }
        raw
    }
}

impl Queryable for Page {
    fn field_value(&self, field: &str, locale: &Locale) -> Option<Value> {
        match field {
            "fullpath" => Some(Value::String(self.fullpath(locale))),
            "slug" => Some(Value::String(self.slug(locale))),
            "depth" => Some(Value::Integer(self.depth() as i64)),
            "parent" => Some(Value::from(self.parent.clone())),
            _ => self.attributes.get(field, locale).ok().flatten().cloned(),
        }
    }
}

/// Segment count of a raw fullpath; `index` and `404` sit at depth 0.
pub fn depth_of(fullpath: &str) -> usize {
    if fullpath == INDEX || fullpath == NOT_FOUND {
        0
    } else {
        fullpath.split('/').filter(|s| !s.is_empty()).count()
    }
}

/// Everything before the last `/`, or `""` for top-level paths.
pub fn parent_path(fullpath: &str) -> &str {
    fullpath.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn last_segment(fullpath: &str) -> &str {
    fullpath.rsplit('/').next().unwrap_or(fullpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn en() -> Locale {
        Locale::from("en")
    }

    #[test]
    fn depth_counts_segments() {
        assert_eq!(Page::new("index", en()).depth(), 0);
        assert_eq!(Page::new("404", en()).depth(), 0);
        assert_eq!(Page::new("about-us", en()).depth(), 1);
        assert_eq!(Page::new("about-us/john-doe", en()).depth(), 2);
    }

    #[test]
    fn slug_derived_from_fullpath() {
        let page = Page::new("about-us/john-doe", en());
        assert_eq!(page.slug(&en()), "john-doe");
        assert_eq!(page.fullpath(&en()), "about-us/john-doe");
    }

    #[test]
    fn apply_front_matter() {
        let mut page = Page::new("about-us", en());
        let locales = vec![en(), Locale::from("fr")];
        let raw = json!({
            "title": "About us",
            "position": 2,
            "listed": false,
            "editable_elements": {"banner/pitch": "We do things"}
        });
        page.apply_raw(raw.as_object().unwrap(), &en(), &locales).unwrap();
        assert_eq!(page.title(&en()).as_deref(), Some("About us"));
        assert_eq!(page.position(), Some(2));
        assert!(!page.is_listed());
        let element = &page.editable_elements()[0];
        assert_eq!(element.block().as_deref(), Some("banner"));
        assert_eq!(element.slug(), "pitch");
        assert_eq!(element.content(&en()).as_deref(), Some("We do things"));
    }

    #[test]
    fn editable_elements_merge_across_locales() {
        let mut page = Page::new("index", en());
        let fr = Locale::from("fr");
        let locales = vec![en(), fr.clone()];
        page.apply_raw(
            json!({"editable_elements": {"intro": "Hello"}}).as_object().unwrap(),
            &en(),
            &locales,
        )
        .unwrap();
        page.apply_raw(
            json!({"editable_elements": [{"slug": "intro", "content": "Salut"}]})
                .as_object()
                .unwrap(),
            &fr,
            &locales,
        )
        .unwrap();
        assert_eq!(page.editable_elements().len(), 1);
        assert_eq!(page.editable_elements()[0].content(&fr).as_deref(), Some("Salut"));
    }

    #[test]
    fn unknown_front_matter_key_rejected() {
        let mut page = Page::new("index", en());
        let err = page
            .apply_raw(json!({"layout": "x"}).as_object().unwrap(), &en(), &[en()])
            .unwrap_err();
        assert!(matches!(err, FieldError::UnknownField { .. }));
    }

    #[test]
    fn rejected_front_matter_leaves_page_untouched() {
        let mut page = Page::new("about-us", en());
        let fr = Locale::from("fr");
        let raw = json!({
            "editable_elements": {"main/pitch": "Salut"},
            "title": "À propos",
            "zzz": 1
        });
        assert!(page.apply_raw(raw.as_object().unwrap(), &fr, &[en(), fr.clone()]).is_err());
        assert_eq!(page.title(&fr), None);
        assert!(page.editable_elements().is_empty());
        assert!(!page.translated_in().contains(&fr));
    }

    #[test]
    fn title_written_inside_locale_scope() {
        use crate::locale::LocaleContext;

        let ctx = LocaleContext::new(en());
        let mut page = Page::new("index", en());
        page.set_title("Hello", &ctx.current());
        ctx.with_locale(&Locale::from("fr"), |fr| page.set_title("Salut", fr));

        assert_eq!(ctx.current(), en());
        assert_eq!(page.title(&ctx.current()).as_deref(), Some("Hello"));
        assert_eq!(page.title(&Locale::from("fr")).as_deref(), Some("Salut"));
    }

    #[test]
    fn defaults() {
        let page = Page::new("index", en());
        assert!(page.is_listed());
        assert!(page.is_published());
        assert!(!page.is_templatized());
    }

    #[test]
    fn raw_for_locale_includes_elements() {
        let mut page = Page::new("index", en());
        page.set_title("Home", &en());
        page.apply_raw(
            json!({"editable_elements": {"intro": "Hello"}}).as_object().unwrap(),
            &en(),
            &[en()],
        )
        .unwrap();
        let raw = page.to_raw_in(&en());
        assert_eq!(raw["title"], json!("Home"));
        assert_eq!(raw["editable_elements"]["intro"], json!("Hello"));
    }

    #[test]
    fn parent_path_of_nested_and_top_level() {
        assert_eq!(parent_path("about-us/john-doe"), "about-us");
        assert_eq!(parent_path("about-us"), "");
    }
}
