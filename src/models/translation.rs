use crate::locale::Locale;
use std::collections::BTreeMap;

/// A translation key and its per-locale strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Translation {
    pub key: String,
    pub id: Option<String>,
    pub values: BTreeMap<Locale, String>,
}

impl Translation {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Build from a `{locale: text}` mapping. Non-string values are skipped.
    pub fn from_raw(key: impl Into<String>, raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let values = raw
            .iter()
            .filter_map(|(locale, text)| Some((Locale::from(locale.as_str()), text.as_str()?.to_string())))
            .collect();
        Self {
            key: key.into(),
            id: None,
            values,
        }
    }

    pub fn set(&mut self, locale: &Locale, text: impl Into<String>) {
        self.values.insert(locale.clone(), text.into());
    }

    /// Text under `locale`, falling back to `default_locale`.
    pub fn get(&self, locale: &Locale, default_locale: &Locale) -> Option<&str> {
        self.values
            .get(locale)
            .or_else(|| self.values.get(default_locale))
            .map(String::as_str)
    }

    pub fn to_raw(&self) -> serde_json::Map<String, serde_json::Value> {
        self.values
            .iter()
            .map(|(l, v)| (l.as_str().to_string(), serde_json::Value::String(v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falls_back_to_default_locale() {
        let raw = json!({"en": "Read more", "fr": "Lire la suite"});
        let t = Translation::from_raw("read_more", raw.as_object().unwrap());
        let en = Locale::from("en");
        assert_eq!(t.get(&Locale::from("fr"), &en), Some("Lire la suite"));
        assert_eq!(t.get(&Locale::from("de"), &en), Some("Read more"));
    }
}
