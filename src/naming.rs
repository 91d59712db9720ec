//! Centralized filename parsing for template and data files.
//!
//! Page and snippet templates follow one pattern: a stem, an optional locale
//! segment, then one or more format extensions:
//!
//! - `about-us.liquid` → stem="about-us", locale=None, extensions=["liquid"]
//! - `about-us.fr.liquid.haml` → stem="about-us", locale=Some("fr"), extensions=["liquid", "haml"]
//! - `footer.liquid.haml` → stem="footer", locale=None, extensions=["liquid", "haml"]
//!
//! A segment is only treated as a locale when it names one of the site
//! locales, so `jquery.min.js` style names are never misread.
//!
//! Templates may start with a YAML front-matter block delimited by `---`
//! lines; [`split_front_matter`] separates it from the template body.

use crate::locale::{self, Locale};

/// Extensions recognised as template formats.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["liquid", "haml"];

/// Result of parsing a template filename like `about-us.fr.liquid.haml`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateName {
    /// Name before the first dot.
    pub stem: String,
    /// Locale segment, if present and known.
    pub locale: Option<Locale>,
    /// Format extensions in order (`liquid`, `haml`).
    pub extensions: Vec<String>,
}

impl TemplateName {
    pub fn is_template(&self) -> bool {
        !self.extensions.is_empty()
            && self
                .extensions
                .iter()
                .all(|e| TEMPLATE_EXTENSIONS.contains(&e.as_str()))
    }
}

/// Parse a template filename, recognising `locales` as locale segments.
pub fn parse_template_name(file_name: &str, locales: &[Locale]) -> TemplateName {
    let mut parts = file_name.split('.');
    let stem = parts.next().unwrap_or_default().to_string();
    let mut locale = None;
    let mut extensions = Vec::new();
    for part in parts {
        if locale.is_none() && extensions.is_empty() && locale::is_known(part, locales) {
            locale = Some(Locale::from(part));
        } else {
            extensions.push(part.to_lowercase());
        }
    }
    TemplateName {
        stem,
        locale,
        extensions,
    }
}

/// Build the filename a template is written to.
///
/// The main locale gets no locale segment.
pub fn template_file_name(stem: &str, locale: &Locale, main_locale: &Locale) -> String {
    if locale == main_locale {
        format!("{stem}.liquid")
    } else {
        format!("{stem}.{locale}.liquid")
    }
}

/// Split `content` into (front matter, body).
///
/// Front matter is only recognised when the very first line is `---`; the
/// block runs until the next `---` line.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let rest = match content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, content),
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, content)
}

/// Join a YAML front-matter block and a template body.
pub fn join_front_matter(yaml: &str, body: &str) -> String {
    let yaml = yaml.strip_prefix("---\n").unwrap_or(yaml);
    if yaml.trim().is_empty() || yaml.trim() == "{}" {
        return body.to_string();
    }
    let mut out = String::from("---\n");
    out.push_str(yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locales() -> Vec<Locale> {
        vec![Locale::from("en"), Locale::from("fr")]
    }

    #[test]
    fn plain_liquid_template() {
        let n = parse_template_name("about-us.liquid", &locales());
        assert_eq!(n.stem, "about-us");
        assert_eq!(n.locale, None);
        assert_eq!(n.extensions, vec!["liquid"]);
        assert!(n.is_template());
    }

    #[test]
    fn localized_haml_template() {
        let n = parse_template_name("about-us.fr.liquid.haml", &locales());
        assert_eq!(n.stem, "about-us");
        assert_eq!(n.locale, Some(Locale::from("fr")));
        assert_eq!(n.extensions, vec!["liquid", "haml"]);
    }

    #[test]
    fn unknown_segment_is_an_extension() {
        let n = parse_template_name("jquery.min.js", &locales());
        assert_eq!(n.locale, None);
        assert_eq!(n.extensions, vec!["min", "js"]);
        assert!(!n.is_template());
    }

    #[test]
    fn locale_only_recognised_before_extensions() {
        let n = parse_template_name("notes.liquid.fr", &locales());
        assert_eq!(n.locale, None);
        assert_eq!(n.extensions, vec!["liquid", "fr"]);
    }

    #[test]
    fn no_extension() {
        let n = parse_template_name("README", &locales());
        assert_eq!(n.stem, "README");
        assert!(!n.is_template());
    }

    #[test]
    fn main_locale_file_name_has_no_segment() {
        let en = Locale::from("en");
        assert_eq!(template_file_name("index", &en, &en), "index.liquid");
        assert_eq!(
            template_file_name("index", &Locale::from("fr"), &en),
            "index.fr.liquid"
        );
    }

    #[test]
    fn front_matter_split() {
        let (yaml, body) = split_front_matter("---\ntitle: Home\n---\n<h1>Hi</h1>\n");
        assert_eq!(yaml, Some("title: Home\n"));
        assert_eq!(body, "<h1>Hi</h1>\n");
    }

    #[test]
    fn no_front_matter() {
        let (yaml, body) = split_front_matter("<h1>Hi</h1>");
        assert_eq!(yaml, None);
        assert_eq!(body, "<h1>Hi</h1>");
    }

    #[test]
    fn unterminated_front_matter_is_body() {
        let (yaml, body) = split_front_matter("---\ntitle: Home\n");
        assert_eq!(yaml, None);
        assert_eq!(body, "---\ntitle: Home\n");
    }

    #[test]
    fn join_skips_empty_front_matter() {
        assert_eq!(join_front_matter("{}\n", "body"), "body");
        assert_eq!(
            join_front_matter("title: Home\n", "body"),
            "---\ntitle: Home\n---\nbody"
        );
    }
}
