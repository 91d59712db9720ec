//! Locale codes and scoped locale context.
//!
//! Every localized read and write in this crate takes an explicit [`Locale`].
//! There is no process-wide "current locale": callers that want the familiar
//! "run this block under French" shape use a [`LocaleContext`], which owns the
//! current locale and restores the previous one when the block exits, even if
//! the block panics.
//!
//! ```text
//! let ctx = LocaleContext::new(Locale::from("en"));
//! ctx.with_locale(&Locale::from("fr"), |fr| page.set_title("Salut", fr));
//! assert_eq!(ctx.current(), Locale::from("en"));
//! ```

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// A locale code such as `en`, `fr` or `pt-BR`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Locale {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for Locale {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of a "current locale" with strictly scoped overrides.
///
/// Not `Sync`: a context belongs to one pipeline run. Parallel runs each get
/// their own context.
#[derive(Debug)]
pub struct LocaleContext {
    current: RefCell<Locale>,
}

impl LocaleContext {
    pub fn new(default: Locale) -> Self {
        Self {
            current: RefCell::new(default),
        }
    }

    /// The locale installed right now.
    pub fn current(&self) -> Locale {
        self.current.borrow().clone()
    }

    /// Run `f` with `locale` installed as the current locale.
    ///
    /// The previous locale is restored when `f` returns or unwinds.
    pub fn with_locale<R>(&self, locale: &Locale, f: impl FnOnce(&Locale) -> R) -> R {
        let previous = self.current.replace(locale.clone());
        let _guard = RestoreGuard {
            slot: &self.current,
            previous: Some(previous),
        };
        f(locale)
    }
}

struct RestoreGuard<'a> {
    slot: &'a RefCell<Locale>,
    previous: Option<Locale>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot.borrow_mut() = previous;
        }
    }
}

/// Whether `candidate` names one of the site locales.
pub fn is_known(candidate: &str, locales: &[Locale]) -> bool {
    locales.iter().any(|l| l.as_str() == candidate)
}
