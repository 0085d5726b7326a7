//! ISO 639-2 language code validation and naming.
//!
//! Language codes appear in every cache key and every wire request, so
//! validation is a sorted-slice binary search rather than a set allocation.

/// ISO 639-2 bibliographic codes, sorted ascending for binary search.
const ISO_639_2_CODES: &[&str] = &[
    "aar", "abk", "ace", "ach", "ada", "ady", "afr", "aka", "alb", "amh", "ara", "arg", "arm",
    "asm", "ava", "ave", "aym", "aze", "bak", "bam", "baq", "bel", "ben", "bih", "bis", "bos",
    "bre", "bul", "bur", "cat", "ceb", "cha", "che", "chi", "chu", "chv", "cor", "cos", "cre",
    "cze", "dan", "div", "dut", "dzo", "eng", "epo", "est", "ewe", "fao", "fij", "fin", "fre",
    "fry", "ful", "geo", "ger", "gla", "gle", "glg", "glv", "gre", "grn", "guj", "hat", "hau",
    "heb", "her", "hin", "hmo", "hrv", "hun", "ibo", "ice", "ido", "iii", "iku", "ile", "ina",
    "ind", "ipk", "ita", "jav", "jpn", "kal", "kan", "kas", "kaz", "khm", "kik", "kin", "kir",
    "kom", "kon", "kor", "kua", "kur", "lao", "lat", "lav", "lim", "lin", "lit", "ltz", "lub",
    "lug", "mac", "mah", "mal", "mao", "mar", "may", "mlg", "mlt", "mon", "nau", "nav", "nbl",
    "nde", "ndo", "nep", "nno", "nob", "nor", "nya", "oci", "oji", "ori", "orm", "oss", "pan",
    "per", "pli", "pol", "por", "pus", "que", "roh", "rum", "run", "rus", "sag", "san", "sin",
    "slo", "slv", "sme", "smo", "sna", "snd", "som", "sot", "spa", "srd", "srp", "ssw", "sun",
    "swa", "swe", "tah", "tam", "tat", "tel", "tgk", "tgl", "tha", "tib", "tir", "ton", "tsn",
    "tso", "tuk", "tur", "twi", "uig", "ukr", "urd", "uzb", "ven", "vie", "vol", "wel", "wln",
    "wol", "xho", "yid", "yor", "zha", "zul",
];

/// Code → English name, for the languages the prompt template spells out.
/// Codes without a mapping fall back to the raw code in prompts.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("ara", "Arabic"),
    ("ben", "Bengali"),
    ("chi", "Chinese"),
    ("dut", "Dutch"),
    ("eng", "English"),
    ("fre", "French"),
    ("ger", "German"),
    ("hin", "Hindi"),
    ("ind", "Indonesian"),
    ("ita", "Italian"),
    ("jpn", "Japanese"),
    ("kor", "Korean"),
    ("may", "Malay"),
    ("pol", "Polish"),
    ("por", "Portuguese"),
    ("rus", "Russian"),
    ("spa", "Spanish"),
    ("tha", "Thai"),
    ("tur", "Turkish"),
    ("vie", "Vietnamese"),
];

/// Validate an ISO 639-2 language code (case-insensitive).
pub fn validate_language_code(code: &str) -> bool {
    canonical_code(code).is_some()
}

/// Canonical lowercase form of a valid ISO 639-2 code, or `None`.
pub fn canonical_code(code: &str) -> Option<&'static str> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let lower = code.to_ascii_lowercase();
    ISO_639_2_CODES
        .binary_search(&lower.as_str())
        .ok()
        .map(|i| ISO_639_2_CODES[i])
}

/// Human-readable English name for a language code, when known.
pub fn language_name(code: &str) -> Option<&'static str> {
    let canonical = canonical_code(code)?;
    LANGUAGE_NAMES
        .binary_search_by_key(&canonical, |(c, _)| c)
        .ok()
        .map(|i| LANGUAGE_NAMES[i].1)
}

/// Normalize a 3-letter code or an English language name to the canonical
/// ISO 639-2 code.
pub fn normalize_language(input: &str) -> Option<&'static str> {
    if input.len() == 3 {
        return canonical_code(input);
    }
    LANGUAGE_NAMES
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(input))
        .map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_validate() {
        for code in ["kor", "eng", "jpn", "zul", "aar"] {
            assert!(validate_language_code(code), "{code} should validate");
        }
    }

    #[test]
    fn validation_is_case_insensitive() {
        assert!(validate_language_code("KOR"));
        assert_eq!(canonical_code("EnG"), Some("eng"));
    }

    #[test]
    fn unknown_or_malformed_codes_fail() {
        assert!(!validate_language_code("xx"));
        assert!(!validate_language_code("xxxx"));
        assert!(!validate_language_code("qqq"));
        assert!(!validate_language_code("k0r"));
        assert!(!validate_language_code(""));
    }

    #[test]
    fn code_table_is_sorted() {
        let mut sorted = ISO_639_2_CODES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, ISO_639_2_CODES);
    }

    #[test]
    fn name_table_is_sorted() {
        let mut sorted = LANGUAGE_NAMES.to_vec();
        sorted.sort_unstable_by_key(|(c, _)| *c);
        assert_eq!(sorted, LANGUAGE_NAMES);
    }

    #[test]
    fn names_resolve() {
        assert_eq!(language_name("kor"), Some("Korean"));
        assert_eq!(language_name("ENG"), Some("English"));
        assert_eq!(language_name("zul"), None);
    }

    #[test]
    fn normalize_accepts_codes_and_names() {
        assert_eq!(normalize_language("kor"), Some("kor"));
        assert_eq!(normalize_language("Korean"), Some("kor"));
        assert_eq!(normalize_language("korean"), Some("kor"));
        assert_eq!(normalize_language("Klingon"), None);
    }
}
