//! End-to-end tests for request parsing.

use rust_decimal::Decimal;

use helios_search::index::{IndexedQuantity, IndexedString};
use helios_search::registry::ChainPolicy;
use helios_search::types::ValueKind;
use helios_search::{
    ChainError, ComposeError, Handling, SearchConfig, SearchError, SearchParamType,
    SearchQueryParser,
};

use crate::common::{clinical_registry, observation, policy_registry};

fn lenient() -> SearchConfig {
    SearchConfig {
        handling: Handling::Lenient,
        ..SearchConfig::default()
    }
}

#[test]
fn test_whitelisted_chain_end_to_end() {
    let registry = policy_registry(ChainPolicy::whitelist(["white1"]));
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let query = parser.parse("Patient", [("ref.white1", "value")]).unwrap();
    let param = query.parameter("ref.white1").unwrap();
    let chain = param.chain.as_ref().unwrap();

    assert_eq!(param.param_type, SearchParamType::String);
    assert_eq!(
        chain.target_types(),
        ["Organization".to_string(), "Patient".to_string()]
    );
    assert_eq!(param.compound.groups[0].values[0].raw, "value");
}

#[test]
fn test_plain_reference_forbidden_by_whitelist() {
    let registry = policy_registry(ChainPolicy::whitelist(["white1"]));
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let err = parser.parse("Patient", [("ref", "Patient/1")]).unwrap_err();
    assert!(matches!(err, SearchError::Chain(ChainError::Forbidden { .. })));
    assert_eq!(err.issue_code(), "not-supported");
}

#[test]
fn test_control_parameters_are_kept_in_order() {
    let registry = clinical_registry();
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let query = parser
        .parse(
            "Observation",
            [
                ("_sort", "-date"),
                ("code", "8867-4"),
                ("_count", "20"),
                ("_include", "Observation:subject"),
            ],
        )
        .unwrap();

    assert_eq!(query.parameters.len(), 1);
    assert_eq!(
        query.control,
        vec![
            ("_sort".to_string(), "-date".to_string()),
            ("_count".to_string(), "20".to_string()),
            ("_include".to_string(), "Observation:subject".to_string()),
        ]
    );
}

#[test]
fn test_unknown_parameter_strict_and_lenient() {
    let registry = clinical_registry();

    let strict = SearchQueryParser::new(&registry, SearchConfig::default());
    let err = strict
        .parse("Observation", [("bogus", "1"), ("code", "8867-4")])
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Chain(ChainError::UnknownParameter { .. })
    ));
    assert_eq!(err.raw_input(), "bogus");

    let lenient = SearchQueryParser::new(&registry, lenient());
    let query = lenient
        .parse("Observation", [("bogus", "1"), ("code", "8867-4")])
        .unwrap();
    assert_eq!(query.skipped, vec!["bogus".to_string()]);
    assert_eq!(query.parameters.len(), 1);
}

#[test]
fn test_lenient_handling_still_rejects_bad_values() {
    let registry = clinical_registry();
    let parser = SearchQueryParser::new(&registry, lenient());
    let err = parser
        .parse("Observation", [("date", "yesterday")])
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Compose(ComposeError::InvalidToken { .. })
    ));
}

#[test]
fn test_parameters_in_first_appearance_order() {
    let registry = clinical_registry();
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let query = parser
        .parse(
            "Observation",
            [
                ("date", "ge2001"),
                ("code", "8867-4"),
                ("date", "lt2002"),
                ("_id", "obs-1"),
            ],
        )
        .unwrap();

    let names: Vec<&str> = query.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["date", "code", "_id"]);
    assert_eq!(query.parameter("date").unwrap().compound.len(), 2);
}

#[test]
fn test_type_modifiers_group_separately() {
    let registry = clinical_registry();
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let query = parser
        .parse(
            "Observation",
            [("subject:Patient.name", "smith"), ("subject:Group.name", "ward")],
        )
        .unwrap();

    assert_eq!(query.parameters.len(), 2);
    let patient = query.parameter("subject:Patient.name").unwrap();
    assert_eq!(
        patient.chain.as_ref().unwrap().target_types(),
        ["Patient".to_string()]
    );
}

#[test]
fn test_composite_components_come_from_registry() {
    let registry = clinical_registry();
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let query = parser
        .parse(
            "Observation",
            [("code-value-quantity", "http://loinc.org|8480-6$gt140||mm[Hg]")],
        )
        .unwrap();

    let value = &query.parameters[0].compound.groups[0].values[0];
    let ValueKind::Composite { components } = &value.kind else {
        panic!("expected a composite value");
    };
    assert_eq!(components.len(), 2);
    assert_eq!(components[0].param_type(), Some(SearchParamType::Token));
    assert_eq!(components[1].param_type(), Some(SearchParamType::Quantity));
}

#[test]
fn test_max_chain_depth_from_config() {
    let registry = clinical_registry();
    let config = SearchConfig {
        max_chain_depth: Some(1),
        ..SearchConfig::default()
    };
    let parser = SearchQueryParser::new(&registry, config);

    assert!(parser.parse("Observation", [("patient.name", "smith")]).is_ok());
    let err = parser
        .parse("Observation", [("patient.organization.name", "acme")])
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Chain(ChainError::MaxDepthExceeded { depth: 2, max: 1, .. })
    ));
}

#[test]
fn test_chain_target_matching() {
    let registry = clinical_registry();
    let parser = SearchQueryParser::new(&registry, SearchConfig::default());

    let query = parser
        .parse("Observation", [("subject:Patient.name", "smi")])
        .unwrap();
    let param = &query.parameters[0];

    let rows = vec![helios_search::IndexedRecord::String(IndexedString::new(
        "name",
        observation("pat-1"),
        "Smith",
    ))];

    assert!(param.matches_chain_target("Patient", &rows));
    assert!(!param.matches_chain_target("Group", &rows));
    assert!(!param.matches_chain_target("Patient", &[]));
}

#[test]
fn test_row_matching_uses_configured_tolerance() {
    let registry = clinical_registry();
    let rows = vec![helios_search::IndexedRecord::Quantity(IndexedQuantity {
        param_name: "value-quantity".to_string(),
        owner: observation("obs-1"),
        system: Some("http://unitsofmeasure.org".to_string()),
        units: Some("mg".to_string()),
        value: Decimal::new(54, 1),
    })];

    let wide = SearchConfig {
        approximate_tolerance_percent: 50,
        ..SearchConfig::default()
    };
    let query = SearchQueryParser::new(&registry, wide)
        .parse("Observation", [("value-quantity", "ap4")])
        .unwrap();
    assert!(query.parameters[0].matches_rows(&rows));

    let narrow = SearchQueryParser::new(&registry, SearchConfig::default())
        .parse("Observation", [("value-quantity", "ap4")])
        .unwrap();
    assert!(!narrow.parameters[0].matches_rows(&rows));
}
