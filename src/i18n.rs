//! Internationalization (i18n) for ThresholdFE.
//!
//! Uses a simple key→string HashMap loaded at runtime from embedded translation data.
//! The `t!("key")` macro looks up the current language, falling back to English.
//! Language can be switched at runtime via `set_language()`.

use std::collections::HashMap;
use std::sync::Mutex;

/// Global translation state.
static I18N: Mutex<Option<I18nState>> = Mutex::new(None);

const FALLBACK_LANG: &str = "en";

struct I18nState {
    current_lang: &'static str,
    /// lang_code → (key → translated_string)
    translations: HashMap<&'static str, HashMap<String, String>>,
}

impl I18nState {
    fn lookup(&self, lang: &str, key: &str) -> Option<&String> {
        self.translations.get(lang)?.get(key)
    }
}

/// Supported languages: (code, native_name, embedded table)
const TABLES: &[(&str, &str, &str)] = &[
    ("en", "English", include_str!("../locales/en.txt")),
    ("es", "Español", include_str!("../locales/es.txt")),
];

/// (code, native_name) for language pickers.
pub fn languages() -> impl Iterator<Item = (&'static str, &'static str)> {
    TABLES.iter().map(|&(code, name, _)| (code, name))
}

/// Parse the embedded tables. Call once at startup; calling again resets
/// the language to English.
pub fn init() {
    let translations = TABLES
        .iter()
        .map(|&(code, _, data)| (code, parse_translations(data)))
        .collect();
    if let Ok(mut guard) = I18N.lock() {
        *guard = Some(I18nState { current_lang: FALLBACK_LANG, translations });
    }
}

/// Set the active language. Unknown codes select English.
pub fn set_language(code: &str) {
    if let Ok(mut guard) = I18N.lock()
        && let Some(state) = guard.as_mut()
    {
        state.current_lang = languages()
            .map(|(c, _)| c)
            .find(|c| *c == code)
            .unwrap_or(FALLBACK_LANG);
    }
}

/// Look up `key` in the active language, then English, then give back the
/// key itself.
pub fn translate(key: &str) -> String {
    if let Ok(guard) = I18N.lock()
        && let Some(state) = guard.as_ref()
        && let Some(val) = state
            .lookup(state.current_lang, key)
            .or_else(|| state.lookup(FALLBACK_LANG, key))
    {
        return val.clone();
    }
    key.to_string()
}

/// Best supported language for the user's locale environment variables.
pub fn detect_system_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG", "LANGUAGE"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|val| match_system_locale(&val))
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

/// Match a locale string ("es_ES.UTF-8", "en-GB", "C") to a supported code by
/// its primary language subtag.
fn match_system_locale(locale: &str) -> Option<String> {
    let primary = locale
        .split(['.', '@', '_', '-'])
        .next()?
        .to_lowercase();
    languages()
        .map(|(code, _)| code)
        .find(|code| *code == primary)
        .map(str::to_string)
}

/// Parse a `key=value` table. `#` starts a comment line; blank lines are skipped.
fn parse_translations(data: &str) -> HashMap<String, String> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, val)| (key.trim().to_string(), val.trim().to_string()))
        .collect()
}

/// Translation macro. Usage: `t!("menu.file")` or `t!("dialog.layer_name", name = "Layer 1")`
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::translate($key)
    };
    ($key:expr, $($name:ident = $val:expr),+ $(,)?) => {{
        let mut s = $crate::i18n::translate($key);
        $(
            s = s.replace(concat!("{", stringify!($name), "}"), &format!("{}", $val));
        )+
        s
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines() {
        let map = parse_translations("# comment\n\ndialog.threshold = Threshold\nbad line\nmode.trunc=Truncate");
        assert_eq!(map.len(), 2);
        assert_eq!(map["dialog.threshold"], "Threshold");
        assert_eq!(map["mode.trunc"], "Truncate");
    }

    #[test]
    fn matches_system_locales() {
        assert_eq!(match_system_locale("es_ES.UTF-8").as_deref(), Some("es"));
        assert_eq!(match_system_locale("en-GB").as_deref(), Some("en"));
        assert_eq!(match_system_locale("ja_JP"), None);
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        init();
        assert_eq!(translate("no.such.key"), "no.such.key");
        assert_eq!(t!("no.such.{n}", n = 3), "no.such.3");
    }

    #[test]
    fn embedded_tables_share_keys() {
        let en = parse_translations(include_str!("../locales/en.txt"));
        let es = parse_translations(include_str!("../locales/es.txt"));
        for key in en.keys() {
            assert!(es.contains_key(key), "missing es translation for {key}");
        }
    }
}
