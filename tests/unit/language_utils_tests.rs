/*!
 * Tests for ISO language code utilities
 */

use subai::language_utils::{
    LanguageCodeType, LanguagePreference, get_language_name, language_codes_match, normalize_to_part2b,
    normalize_to_part2t, validate_language_code,
};

#[test]
fn test_validate_language_code_withEachCodeFamily_shouldReportType() {
    assert_eq!(validate_language_code("fr").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("fra").unwrap(), LanguageCodeType::Part2T);
    assert_eq!(validate_language_code("fre").unwrap(), LanguageCodeType::Part2B);
    assert!(validate_language_code("zz").is_err());
    assert!(validate_language_code("french").is_err());
}

#[test]
fn test_normalize_to_part2t_withBibliographicCode_shouldUseTerminologyForm() {
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part2t(" DE ").unwrap(), "deu");
    assert_eq!(normalize_to_part2t("eng").unwrap(), "eng");
}

#[test]
fn test_normalize_to_part2b_withCatalogLanguages_shouldMatchCatalogCodes() {
    assert_eq!(normalize_to_part2b("fr").unwrap(), "fre");
    assert_eq!(normalize_to_part2b("fra").unwrap(), "fre");
    assert_eq!(normalize_to_part2b("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2b("es").unwrap(), "spa");
}

#[test]
fn test_language_codes_match_withMixedForms_shouldCompareLanguages() {
    assert!(language_codes_match("fr", "fre"));
    assert!(language_codes_match("fra", "FR"));
    assert!(!language_codes_match("fr", "en"));
    assert!(!language_codes_match("fr", "xx"));
}

#[test]
fn test_get_language_name_withPart1Code_shouldReturnEnglishName() {
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert_eq!(get_language_name("eng").unwrap(), "English");
}

#[test]
fn test_language_preference_parse_withAnyForm_shouldExposeAllForms() {
    for code in ["fr", "fra", "fre"] {
        let lang = LanguagePreference::parse(code).unwrap();
        assert_eq!(lang.part1(), "fr");
        assert_eq!(lang.part2b(), "fre");
        assert_eq!(lang.name(), "French");
        assert_eq!(lang.to_string(), "fr");
    }
}

#[test]
fn test_language_preference_parse_or_withInvalidCode_shouldUseDefault() {
    let lang = LanguagePreference::parse_or(Some("klingon"), "fr").unwrap();
    assert_eq!(lang.part2b(), "fre");

    let lang = LanguagePreference::parse_or(Some("  "), "en").unwrap();
    assert_eq!(lang.part2b(), "eng");

    let lang = LanguagePreference::parse_or(None, "de").unwrap();
    assert_eq!(lang.part2b(), "ger");

    let lang = LanguagePreference::parse_or(Some("es"), "fr").unwrap();
    assert_eq!(lang.part2b(), "spa");
}

#[test]
fn test_language_preference_parse_or_withInvalidDefault_shouldFail() {
    assert!(LanguagePreference::parse_or(None, "xx").is_err());
}
