//! Wikipedia language editions and the country sets tied to them.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Wikipedia language codes ordered by rough importance (article count and
/// reach). The order matters: it decides which interwiki link wins when a
/// replacement article has to be picked and no caller preference matches.
pub const CODES_BY_IMPORTANCE: &[&str] = &[
    "en", "de", "fr", "nl", "it", "es", "ru", "ja", "pl", "pt", "zh", "sv", "vi", "uk", "ca",
    "no", "fi", "cs", "hu", "ko", "fa", "id", "tr", "ar", "ro", "sr", "ms", "eo", "he", "eu",
    "da", "bg", "sk", "min", "kk", "hy", "lt", "hr", "sh", "et", "sl", "el", "be", "gl", "la",
    "simple", "nn", "az", "ur", "th", "ka", "hi", "uz", "oc", "ta", "mk", "cy", "lv", "bs",
    "new", "tt", "tl", "te", "sq", "pms", "br", "ky", "bn", "jv", "ast", "lb", "mg", "ml",
    "mr", "af", "sco", "war", "ht", "ga", "is", "ba", "fy", "cv", "lmo", "sw", "my", "an",
    "yo", "ne", "io", "gu", "scn", "nap", "bpy", "ku", "wa", "als", "kn", "pnb", "ckb", "su",
    "mn", "qu", "ce",
];

/// Validated membership lookup. Legacy keys and article language prefixes
/// are checked against this set, not the ordered slice.
pub fn is_known_language_code(code: &str) -> bool {
    static KNOWN: OnceLock<HashSet<&'static str>> = OnceLock::new();
    KNOWN
        .get_or_init(|| CODES_BY_IMPORTANCE.iter().copied().collect())
        .contains(code)
}

/// Wikidata ids of the countries where a given language is the expected
/// wikipedia-tag language. Returns `None` for languages the audit has no
/// country mapping for; callers must treat that as a configuration error,
/// not a per-record problem.
pub fn countries_for_language(language_code: &str) -> Option<&'static [&'static str]> {
    match language_code {
        "pl" => Some(&["Q36"]),
        "de" => Some(&["Q183", "Q40", "Q39"]),
        "cs" => Some(&["Q213"]),
        "fr" => Some(&["Q142"]),
        "es" => Some(&["Q29"]),
        "it" => Some(&["Q38"]),
        "nl" => Some(&["Q55"]),
        "pt" => Some(&["Q45", "Q155"]),
        "ja" => Some(&["Q17"]),
        // https://en.wikipedia.org/wiki/English_language lists more; these
        // cover the areas where an English wikipedia tag is uncontroversial.
        "en" => Some(&["Q145", "Q30", "Q664", "Q408", "Q16", "Q22890"]),
        _ => None,
    }
}

/// Countries that no longer exist. Wikidata sometimes carries an
/// unqualified country claim pointing at one of these; treating them as a
/// live country association produces nonsense like "allowed to keep a
/// foreign link because it is partially in Nazi Germany".
pub fn is_former_country(country_id: &str) -> bool {
    matches!(country_id, "Q7318" | "Q28513" | "Q15180" | "Q36704")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_order_starts_with_english() {
        assert_eq!(CODES_BY_IMPORTANCE[0], "en");
    }

    #[test]
    fn known_language_codes_cover_common_editions() {
        assert!(is_known_language_code("en"));
        assert!(is_known_language_code("ceb") || is_known_language_code("pl"));
        assert!(!is_known_language_code("xx"));
        assert!(!is_known_language_code("EN"));
    }

    #[test]
    fn country_mapping_exists_for_supported_languages() {
        assert_eq!(countries_for_language("pl"), Some(&["Q36"][..]));
        assert!(countries_for_language("en").is_some());
        assert!(countries_for_language("tlh").is_none());
    }

    #[test]
    fn former_countries_are_flagged() {
        assert!(is_former_country("Q7318"));
        assert!(!is_former_country("Q36"));
    }
}
