//! Shared fixtures for search integration tests.

#![allow(dead_code)]

use helios_search::registry::{ChainPolicy, ParamDefinition, ParameterRegistry};
use helios_search::{ResourceId, SearchParamType};

/// Builds a definition declared on a single resource type.
pub fn param(base: &str, code: &str, param_type: SearchParamType) -> ParamDefinition {
    ParamDefinition::new(
        format!("http://example.org/fhir/SearchParameter/{}-{}", base, code),
        code,
        param_type,
    )
    .with_base([base])
}

/// Builds a reference definition with targets.
pub fn reference(base: &str, code: &str, targets: &[&str]) -> ParamDefinition {
    param(base, code, SearchParamType::Reference).with_targets(targets.iter().copied())
}

/// A registry where `Patient.ref` points at Patient and Organization under
/// the given policy, and both targets declare `white1`, `black1` and `name`.
pub fn policy_registry(policy: ChainPolicy) -> ParameterRegistry {
    let mut builder = ParameterRegistry::builder()
        .add(reference("Patient", "ref", &["Patient", "Organization"]).with_chain_policy(policy));
    for target in ["Patient", "Organization"] {
        builder = builder
            .add(param(target, "white1", SearchParamType::String))
            .add(param(target, "black1", SearchParamType::String))
            .add(param(target, "name", SearchParamType::String));
    }
    builder.build().expect("policy registry")
}

/// A small clinical registry: Observation, Patient, Group, Organization.
pub fn clinical_registry() -> ParameterRegistry {
    ParameterRegistry::builder()
        .add(param("Resource", "_id", SearchParamType::Token))
        .add(reference("Observation", "subject", &["Patient", "Group"]))
        .add(reference("Observation", "patient", &["Patient"]))
        .add(
            reference("Observation", "performer", &["Practitioner", "Organization"])
                .with_chain_policy(ChainPolicy::blacklist(["name"])),
        )
        .add(param("Observation", "code", SearchParamType::Token))
        .add(param("Observation", "date", SearchParamType::Date))
        .add(param("Observation", "value-quantity", SearchParamType::Quantity))
        .add(
            param("Observation", "code-value-quantity", SearchParamType::Composite).with_components([
                "http://example.org/fhir/SearchParameter/Observation-code",
                "http://example.org/fhir/SearchParameter/Observation-value-quantity",
            ]),
        )
        .add(param("Patient", "name", SearchParamType::String))
        .add(param("Patient", "birthdate", SearchParamType::Date))
        .add(reference("Patient", "organization", &["Organization"]))
        .add(param("Group", "name", SearchParamType::String))
        .add(param("Organization", "name", SearchParamType::String))
        .add(param("Practitioner", "name", SearchParamType::String))
        .add(param("RiskAssessment", "probability", SearchParamType::Number))
        .build()
        .expect("clinical registry")
}

/// Owner used for index rows in matcher tests.
pub fn observation(id: &str) -> ResourceId {
    ResourceId::new("Observation", id)
}
