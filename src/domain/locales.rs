//! Locale metadata for the translation surface.

use std::collections::BTreeSet;

/// The canonical source locale. Documents in other locales are translations
/// whose `parent` points into this locale.
pub const DEFAULT_LOCALE: &str = "en-US";

struct LocaleInfo {
    code: &'static str,
    english: &'static str,
    native: &'static str,
}

static LOCALES: &[LocaleInfo] = &[
    LocaleInfo {
        code: "en-US",
        english: "English (US)",
        native: "English (US)",
    },
    LocaleInfo {
        code: "de",
        english: "German",
        native: "Deutsch",
    },
    LocaleInfo {
        code: "es",
        english: "Spanish",
        native: "Español",
    },
    LocaleInfo {
        code: "fr",
        english: "French",
        native: "Français",
    },
    LocaleInfo {
        code: "it",
        english: "Italian",
        native: "Italiano",
    },
    LocaleInfo {
        code: "ja",
        english: "Japanese",
        native: "日本語",
    },
    LocaleInfo {
        code: "ko",
        english: "Korean",
        native: "한국어",
    },
    LocaleInfo {
        code: "nl",
        english: "Dutch",
        native: "Nederlands",
    },
    LocaleInfo {
        code: "pl",
        english: "Polish",
        native: "Polski",
    },
    LocaleInfo {
        code: "pt-BR",
        english: "Portuguese (Brazil)",
        native: "Português (do Brasil)",
    },
    LocaleInfo {
        code: "ru",
        english: "Russian",
        native: "Русский",
    },
    LocaleInfo {
        code: "sv-SE",
        english: "Swedish",
        native: "Svenska",
    },
    LocaleInfo {
        code: "zh-CN",
        english: "Chinese (Simplified)",
        native: "中文 (简体)",
    },
    LocaleInfo {
        code: "zh-TW",
        english: "Chinese (Traditional)",
        native: "正體中文 (繁體)",
    },
];

fn find(code: &str) -> Option<&'static LocaleInfo> {
    LOCALES.iter().find(|info| info.code == code)
}

/// English name of a locale; falls back to the code itself for locales the
/// table does not know.
pub fn english_name(code: &str) -> &str {
    find(code).map_or(code, |info| info.english)
}

/// Native name of a locale; falls back to the code itself.
pub fn native_name(code: &str) -> &str {
    find(code).map_or(code, |info| info.native)
}

/// Derive the `hreflang` value for a locale given the set of locales the
/// translation family is available in.
///
/// The primary language subtag is used unless another available locale shares
/// it, in which case the full tag is kept so the alternates stay
/// distinguishable (`zh-CN` / `zh-TW`).
pub fn hreflang(locale: &str, available: &BTreeSet<String>) -> String {
    let primary = primary_subtag(locale);
    let shared = available
        .iter()
        .filter(|candidate| primary_subtag(candidate) == primary)
        .count();

    if shared > 1 {
        locale.to_ascii_lowercase()
    } else {
        primary.to_ascii_lowercase()
    }
}

fn primary_subtag(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}
