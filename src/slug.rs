//! Permalink normalization and unique-slug allocation.
//!
//! [`permalink`] turns any label into a URL-safe slug: lowercase, transliterated
//! to ASCII, with every run of non-alphanumeric characters collapsed into a
//! single dash.
//!
//! [`next_unique`] resolves collisions among siblings. Given a base slug and
//! the slugs already taken, it scans every sibling shaped like `base` or
//! `base-N` and appends `max(N) + 1`:
//!
//! ```text
//! taken: []                      → "news"
//! taken: ["news"]                → "news-1"
//! taken: ["news", "news-1"]      → "news-2"
//! taken: ["news", "news-7"]      → "news-8"
//! ```

use regex::Regex;

/// Normalize `input` into a permalink.
///
/// - `"Avogadro's Number"` → `"avogadro-s-number"`
/// - `"Crème Brûlée"` → `"creme-brulee"`
/// - `"  --Hello__World--  "` → `"hello-world"`
pub fn permalink(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    let mut push = |a: char| {
        if a.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(a.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    };
    for c in input.chars() {
        if c.is_ascii() {
            push(c);
        } else {
            match transliterate(c) {
                "" => push(' '),
                ascii => ascii.chars().for_each(&mut push),
            }
        }
    }
    out
}

/// Compute the first free slug for `base` among `taken`.
pub fn next_unique<'a>(base: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let pattern = match Regex::new(&format!(r"^{}(?:-(\d+))?$", regex::escape(base))) {
        Ok(p) => p,
        Err(_) => return base.to_string(),
    };
    let mut collision = false;
    let mut max_suffix = 0u64;
    for slug in taken {
        if let Some(caps) = pattern.captures(slug) {
            collision |= slug == base;
            if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                max_suffix = max_suffix.max(n);
            }
        }
    }
    if collision {
        format!("{base}-{}", max_suffix + 1)
    } else {
        base.to_string()
    }
}

/// ASCII rendition of a non-ASCII character. Unknown characters map to an
/// empty string and act as separators.
fn transliterate(c: char) -> &'static str {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'æ' => "ae",
        'Æ' => "AE",
        'ç' | 'ć' | 'č' | 'ĉ' | 'ċ' => "c",
        'Ç' | 'Ć' | 'Č' | 'Ĉ' | 'Ċ' => "C",
        'ď' | 'đ' | 'ð' => "d",
        'Ď' | 'Đ' | 'Ð' => "D",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => "E",
        'ğ' | 'ģ' | 'ĝ' => "g",
        'Ğ' | 'Ģ' | 'Ĝ' => "G",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'Į' | 'İ' => "I",
        'ł' | 'ľ' | 'ļ' => "l",
        'Ł' | 'Ľ' | 'Ļ' => "L",
        'ñ' | 'ń' | 'ň' | 'ņ' => "n",
        'Ñ' | 'Ń' | 'Ň' | 'Ņ' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => "O",
        'œ' => "oe",
        'Œ' => "OE",
        'ř' | 'ŕ' => "r",
        'Ř' | 'Ŕ' => "R",
        'ś' | 'š' | 'ş' | 'ș' => "s",
        'Ś' | 'Š' | 'Ş' | 'Ș' => "S",
        'ß' => "ss",
        'ť' | 'ţ' | 'ț' => "t",
        'Ť' | 'Ţ' | 'Ț' => "T",
        'þ' => "th",
        'Þ' => "TH",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        _ => "",
    }
}
