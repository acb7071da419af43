/*!
 * Tests for request payload parsing and validation
 */

use texlate::errors::RequestError;
use texlate::language_utils::TargetLanguage;
use texlate::request::{MAX_MAX_LEN, MIN_MAX_LEN, TranslateRequest, TranslationModel};

/// Test the request bounds at both edges
#[test]
fn test_validate_withBoundaryValues_shouldAcceptInclusiveRange() {
    for max_len in [MIN_MAX_LEN, 2500, MAX_MAX_LEN] {
        let mut request = TranslateRequest::new("paper.tex");
        request.max_len = max_len;
        assert!(request.validate().is_ok(), "max_len {} rejected", max_len);
    }
    for pages in [1, 20] {
        let mut request = TranslateRequest::new("paper.tex");
        request.num_pages = Some(pages);
        assert!(request.validate().is_ok(), "num_pages {} rejected", pages);
    }
}

/// Test that the failing field is named
#[test]
fn test_from_json_withBadField_shouldNameTheField() {
    let err = TranslateRequest::from_json(r#"{"file_url": "a.tex", "num_pages": 40}"#).unwrap_err();
    assert_eq!(
        err,
        RequestError::InvalidField {
            field: "num_pages",
            message: "40 is outside 1..=20".to_string()
        }
    );

    let err = TranslateRequest::from_json(r#"{"max_len": 1000}"#).unwrap_err();
    assert!(matches!(err, RequestError::InvalidField { field: "body", .. }));
}

/// Test every supported model and language identifier
#[test]
fn test_enumerations_withSupportedValues_shouldParse() {
    for model in TranslationModel::ALL {
        assert_eq!(model.as_str().parse::<TranslationModel>().unwrap(), model);
        let json = format!(r#"{{"file_url": "a.tex", "model": "{}"}}"#, model);
        assert_eq!(TranslateRequest::from_json(&json).unwrap().model, model);
    }
    for language in TargetLanguage::ALL {
        assert_eq!(language.name().parse::<TargetLanguage>().unwrap(), language);
        assert_eq!(language.code().parse::<TargetLanguage>().unwrap(), language);
    }
}

/// Test that requests serialize with the wire names
#[test]
fn test_serialize_withDefaults_shouldUseWireNames() {
    let json = serde_json::to_value(TranslateRequest::new("a.tex")).unwrap();
    assert_eq!(json["model"], "gpt-4");
    assert_eq!(json["dest_language"], "English");
    assert_eq!(json["max_len"], 1000);
    assert!(json["num_pages"].is_null());
}
