//! Tests for value decoding and AND/OR composition.

use helios_search::types::{DatePrecision, ReferenceTarget, ValueKind};
use helios_search::{
    ComposeError, DecodeError, DecodeHints, SearchModifier, SearchParamType, compose, decode,
    decode_with,
};

#[test]
fn test_date_and_of_or() {
    let param = compose(
        "p",
        SearchParamType::Date,
        &DecodeHints::default(),
        ["2001,2002", "2003,2004"],
    )
    .unwrap();

    assert_eq!(param.groups.len(), 2);
    assert_eq!(param.groups[0].values.len(), 2);
    assert_eq!(param.groups[1].values.len(), 2);
    assert_eq!(param.groups[0].values[0].raw, "2001");
    assert_eq!(param.groups[0].values[1].raw, "2002");
    assert_eq!(param.groups[1].values[0].raw, "2003");
    assert_eq!(param.groups[1].values[1].raw, "2004");

    for value in param.values() {
        let ValueKind::Date(range) = &value.kind else {
            panic!("expected a date value");
        };
        assert_eq!(range.precision, DatePrecision::Year);
    }
}

#[test]
fn test_one_bad_token_invalidates_parameter() {
    let err = compose(
        "value-quantity",
        SearchParamType::Quantity,
        &DecodeHints::default(),
        ["5.4|http://unitsofmeasure.org|mg", "6,abc|http://unitsofmeasure.org|mg"],
    )
    .unwrap_err();

    let ComposeError::InvalidToken {
        occurrence,
        index,
        raw,
        source,
        ..
    } = err
    else {
        panic!("expected InvalidToken");
    };
    assert_eq!((occurrence, index), (1, 1));
    assert_eq!(raw, "abc|http://unitsofmeasure.org|mg");
    assert!(matches!(source, DecodeError::MalformedQuantity { .. }));
}

#[test]
fn test_whitespace_occurrence_is_empty_group() {
    let err = compose(
        "code",
        SearchParamType::Token,
        &DecodeHints::default(),
        ["  "],
    )
    .unwrap_err();
    assert!(matches!(err, ComposeError::EmptyGroup { occurrence: 0, .. }));
}

#[test]
fn test_whitespace_token_in_group_is_rejected() {
    let err = compose(
        "name",
        SearchParamType::String,
        &DecodeHints::default(),
        ["smith, "],
    )
    .unwrap_err();

    let ComposeError::InvalidToken {
        occurrence,
        index,
        source,
        ..
    } = err
    else {
        panic!("expected InvalidToken");
    };
    assert_eq!((occurrence, index), (0, 1));
    assert_eq!(source, DecodeError::EmptyValue);
}

#[test]
fn test_reference_hint_and_explicit_type() {
    let hinted = DecodeHints::default().with_target_type("Patient");
    let expected = ValueKind::Reference(ReferenceTarget {
        resource_type: Some("Patient".to_string()),
        id: "123".to_string(),
    });

    assert_eq!(
        decode_with("123", SearchParamType::Reference, &hinted).unwrap().kind,
        expected
    );
    assert_eq!(
        decode_with("Patient/123", SearchParamType::Reference, &hinted)
            .unwrap()
            .kind,
        expected
    );
    assert_eq!(
        decode("Patient/123", SearchParamType::Reference).unwrap().kind,
        expected
    );

    let typed = DecodeHints::with_modifier(Some(SearchModifier::Type("Patient".to_string())));
    let err = decode_with("Practitioner/123", SearchParamType::Reference, &typed).unwrap_err();
    assert!(matches!(err, DecodeError::ReferenceTypeMismatch { .. }));
}

#[test]
fn test_missing_modifier_per_occurrence() {
    let param = compose(
        "birthdate",
        SearchParamType::Date,
        &DecodeHints::default(),
        vec![
            helios_search::Occurrence::new(Some(SearchModifier::Missing), "false"),
            helios_search::Occurrence::from("ge1970"),
        ],
    )
    .unwrap();
    assert_eq!(
        param.groups[0].values[0].kind,
        ValueKind::Missing { missing: false }
    );
    assert_eq!(param.groups[1].values[0].param_type(), Some(SearchParamType::Date));
}

#[test]
fn test_decode_errors_carry_raw_token() {
    for (raw, ty) in [
        ("2001-02-30", SearchParamType::Date),
        ("five", SearchParamType::Number),
        ("|code", SearchParamType::Token),
        ("not a ref", SearchParamType::Reference),
    ] {
        let err = decode(raw, ty).unwrap_err();
        assert_eq!(err.raw_input(), raw, "{:?}", err);
    }
}
