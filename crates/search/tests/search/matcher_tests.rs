//! Tests for matching query values against index rows.

use std::collections::HashSet;

use rust_decimal::Decimal;

use helios_search::index::{IndexedDate, IndexedQuantity, IndexedString};
use helios_search::{
    DecodeHints, IndexedRecord, Matcher, ParameterValue, SearchModifier, SearchParamType, compose,
    decode, decode_with, matches, to_indexed,
};

use crate::common::observation;

fn mg(value: Decimal) -> IndexedRecord {
    IndexedRecord::Quantity(IndexedQuantity {
        param_name: "value-quantity".to_string(),
        owner: observation("obs-1"),
        system: Some("http://unitsofmeasure.org".to_string()),
        units: Some("mg".to_string()),
        value,
    })
}

// ============================================================================
// Quantity
// ============================================================================

#[test]
fn test_quantity_exact_match() {
    let row = mg(Decimal::new(54, 1));
    let hit = decode("5.4|http://unitsofmeasure.org|mg", SearchParamType::Quantity).unwrap();
    let miss = decode("5.5|http://unitsofmeasure.org|mg", SearchParamType::Quantity).unwrap();
    assert!(matches(&row, &hit));
    assert!(!matches(&row, &miss));
}

#[test]
fn test_quantity_unit_system_unspecified() {
    let row = mg(Decimal::new(54, 1));
    let any_system = decode("5.4||mg", SearchParamType::Quantity).unwrap();
    let wrong_unit = decode("5.4||g", SearchParamType::Quantity).unwrap();
    assert!(matches(&row, &any_system));
    assert!(!matches(&row, &wrong_unit));
}

#[test]
fn test_quantity_approximate_uses_config() {
    let row = mg(Decimal::new(54, 1));
    let ap = decode("ap6", SearchParamType::Quantity).unwrap();
    assert!(matches(&row, &ap));
    assert!(!Matcher::new(5).matches(&row, &ap));
}

// ============================================================================
// Idempotence
// ============================================================================

fn idempotent_values() -> Vec<ParameterValue> {
    let mut values: Vec<ParameterValue> = [
        ("5.4|http://unitsofmeasure.org|mg", SearchParamType::Quantity),
        ("ge5.4|http://unitsofmeasure.org|mg", SearchParamType::Quantity),
        ("ap0", SearchParamType::Quantity),
        ("-12.50", SearchParamType::Number),
        ("le100", SearchParamType::Number),
        ("2001", SearchParamType::Date),
        ("2001-06-15T10:30:00.250+02:00", SearchParamType::Date),
        ("ap2001-06", SearchParamType::Date),
        ("ge2001-06-15", SearchParamType::Date),
        ("http://loinc.org|8867-4", SearchParamType::Token),
        ("8867-4", SearchParamType::Token),
        ("Smith", SearchParamType::String),
        ("Patient/123", SearchParamType::Reference),
        ("http://example.org/fhir/Organization/9/_history/2", SearchParamType::Reference),
        ("http://hl7.org/fhir/StructureDefinition/Patient", SearchParamType::Uri),
    ]
    .into_iter()
    .map(|(raw, ty)| decode(raw, ty).unwrap())
    .collect();

    for modifier in [SearchModifier::Exact, SearchModifier::Contains] {
        values.push(
            decode_with(
                "Van der Berg",
                SearchParamType::String,
                &DecodeHints::with_modifier(Some(modifier)),
            )
            .unwrap(),
        );
    }
    values.push(
        decode_with(
            "123",
            SearchParamType::Reference,
            &DecodeHints::default().with_target_type("Patient"),
        )
        .unwrap(),
    );
    values.push(
        decode_with(
            "http://loinc.org|8480-6$ge140",
            SearchParamType::Composite,
            &DecodeHints::default()
                .with_components(vec![SearchParamType::Token, SearchParamType::Number]),
        )
        .unwrap(),
    );
    values
}

#[test]
fn test_indexed_form_matches_its_own_value() {
    let owner = observation("obs-1");
    for value in idempotent_values() {
        let row = to_indexed(&value, &owner, "p").expect("indexable value");
        assert!(matches(&row, &value), "round trip lost {:?}", value);
    }
}

#[test]
fn test_missing_is_not_indexable() {
    let value = decode_with(
        "true",
        SearchParamType::Token,
        &DecodeHints::with_modifier(Some(SearchModifier::Missing)),
    )
    .unwrap();
    assert!(to_indexed(&value, &observation("obs-1"), "code").is_none());
}

#[test]
fn test_rows_deduplicate_by_content() {
    let owner = observation("obs-1");
    let rows: HashSet<IndexedRecord> = ["Patient/1", "Patient/1", "http://x.org/fhir/Patient/1"]
        .into_iter()
        .map(|raw| decode(raw, SearchParamType::Reference).unwrap())
        .filter_map(|v| to_indexed(&v, &owner, "subject"))
        .collect();
    assert_eq!(rows.len(), 1);
}

// ============================================================================
// Groups and rows
// ============================================================================

#[test]
fn test_or_group_any_and_compound_all() {
    let row = IndexedRecord::Date(
        IndexedDate::from_literal("date", observation("obs-1"), "2002-03-04").unwrap(),
    );

    let or_hit = compose("date", SearchParamType::Date, &DecodeHints::default(), ["2001,2002"]).unwrap();
    assert!(or_hit.groups[0].matches(&row));
    assert!(or_hit.matches(&row));

    let and_miss = compose(
        "date",
        SearchParamType::Date,
        &DecodeHints::default(),
        ["2001,2002", "2003,2004"],
    )
    .unwrap();
    assert!(!and_miss.matches(&row));

    let range = compose(
        "date",
        SearchParamType::Date,
        &DecodeHints::default(),
        ["ge2002-01-01", "lt2003"],
    )
    .unwrap();
    assert!(range.matches(&row));
}

#[test]
fn test_matches_rows_missing() {
    let missing = compose(
        "name",
        SearchParamType::String,
        &DecodeHints::with_modifier(Some(SearchModifier::Missing)),
        ["true"],
    )
    .unwrap();
    let present = compose(
        "name",
        SearchParamType::String,
        &DecodeHints::with_modifier(Some(SearchModifier::Missing)),
        ["false"],
    )
    .unwrap();
    let rows = vec![IndexedRecord::String(IndexedString::new(
        "name",
        observation("obs-1"),
        "Smith",
    ))];

    assert!(missing.matches_rows(&[]));
    assert!(!missing.matches_rows(&rows));
    assert!(present.matches_rows(&rows));
    assert!(!present.matches_rows(&[]));
}

#[test]
fn test_matches_rows_not_requires_no_matching_row() {
    let owner = observation("obs-1");
    let rows: Vec<IndexedRecord> = ["http://loinc.org|8867-4", "http://loinc.org|8310-5"]
        .into_iter()
        .filter_map(|raw| to_indexed(&decode(raw, SearchParamType::Token).unwrap(), &owner, "code"))
        .collect();

    let not_present = compose(
        "code",
        SearchParamType::Token,
        &DecodeHints::with_modifier(Some(SearchModifier::Not)),
        ["8867-4"],
    )
    .unwrap();
    let not_absent = compose(
        "code",
        SearchParamType::Token,
        &DecodeHints::with_modifier(Some(SearchModifier::Not)),
        ["1234-5"],
    )
    .unwrap();

    assert!(!not_present.matches_rows(&rows));
    assert!(not_absent.matches_rows(&rows));
}
