//! Tests for chain resolution and chain policy.

use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicUsize, Ordering};

use helios_search::registry::{
    ChainPolicy, DefinitionSource, LazyParameterRegistry, ParamDefinition, ParameterLookup,
};
use helios_search::{
    ChainError, ChainResolver, ParameterName, RegistryError, SearchParamType, resolve,
};

use crate::common::{clinical_registry, param, policy_registry, reference};

fn name(raw: &str) -> ParameterName {
    ParameterName::parse(raw).unwrap()
}

// ============================================================================
// Whitelist / Blacklist
// ============================================================================

#[test]
fn test_whitelisted_chain_resolves() {
    let registry = policy_registry(ChainPolicy::whitelist(["white1"]));
    let spec = resolve("Patient", &name("ref.white1"), &registry).unwrap();
    assert!(spec.is_chained());
    assert_eq!(spec.terminal.name, "white1");
}

#[test]
fn test_blacklisted_chain_is_forbidden() {
    let registry = policy_registry(ChainPolicy::blacklist(["black1"]));
    let err = resolve("Patient", &name("ref.black1"), &registry).unwrap_err();
    assert!(matches!(err, ChainError::Forbidden { .. }));
}

#[test]
fn test_chain_missing_from_whitelist_is_forbidden() {
    let registry = policy_registry(ChainPolicy::whitelist(["white1"]));
    let err = resolve("Patient", &name("ref.black1"), &registry).unwrap_err();
    assert!(matches!(err, ChainError::Forbidden { .. }));
}

#[test]
fn test_plain_use_rejected_by_whitelist_without_empty_chain() {
    let registry = policy_registry(ChainPolicy::whitelist(["white1"]));
    let err = resolve("Patient", &name("ref"), &registry).unwrap_err();
    assert!(matches!(err, ChainError::Forbidden { .. }));

    let permissive = policy_registry(ChainPolicy::whitelist(["", "white1"]));
    assert!(resolve("Patient", &name("ref"), &permissive).is_ok());
}

#[test]
fn test_forbidden_reads_like_unknown_target() {
    let registry = policy_registry(ChainPolicy::blacklist(["black1"]));
    let forbidden = resolve("Patient", &name("ref.black1"), &registry).unwrap_err();
    let unknown = resolve("Patient", &name("ref.black2"), &registry).unwrap_err();

    assert!(matches!(unknown, ChainError::UnknownChainTarget { .. }));
    assert_eq!(
        forbidden.to_string().replace("black1", "X"),
        unknown.to_string().replace("black2", "X")
    );
    assert_eq!(forbidden.issue_code(), unknown.issue_code());
}

#[test]
fn test_registry_rejects_both_lists() {
    let err = helios_search::ParameterRegistry::builder()
        .add(
            reference("Patient", "ref", &["Patient"]).with_chain_policy(ChainPolicy {
                whitelist: Some(["white1".to_string()].into()),
                blacklist: Some(["black1".to_string()].into()),
            }),
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, RegistryError::ConflictingChainPolicy { .. }));
}

// ============================================================================
// Target Resolution
// ============================================================================

#[test]
fn test_multi_target_chain_is_carried_forward() {
    let registry = policy_registry(ChainPolicy::whitelist(["white1"]));
    let spec = resolve("Patient", &name("ref.white1"), &registry).unwrap();
    assert_eq!(
        spec.target_types(),
        ["Organization".to_string(), "Patient".to_string()]
    );
    assert_eq!(spec.declared_target(), None);
}

#[test]
fn test_type_modifier_skips_enumeration() {
    let registry = clinical_registry();
    let spec = resolve("Observation", &name("subject:Group.name"), &registry).unwrap();
    assert_eq!(spec.target_types(), ["Group".to_string()]);
    assert_eq!(spec.declared_target(), Some("Group"));
}

#[test]
fn test_three_level_chain() {
    let registry = clinical_registry();
    let spec = resolve(
        "Observation",
        &name("patient.organization.name"),
        &registry,
    )
    .unwrap();
    assert_eq!(spec.depth(), 2);
    assert_eq!(spec.links[0].reference_param, "patient");
    assert_eq!(spec.links[1].reference_param, "organization");
    assert_eq!(spec.target_types(), ["Organization".to_string()]);
}

#[test]
fn test_blacklist_on_intermediate_level() {
    let registry = clinical_registry();
    let err = resolve("Observation", &name("performer.name"), &registry).unwrap_err();
    assert!(matches!(err, ChainError::Forbidden { .. }));
}

#[test]
fn test_chain_through_non_reference() {
    let registry = clinical_registry();
    let err = resolve("Observation", &name("code.name"), &registry).unwrap_err();
    assert_eq!(err.issue_code(), "invalid");
    assert!(matches!(err, ChainError::NotChainable { .. }));
}

#[test]
fn test_depth_limit() {
    let registry = clinical_registry();
    let resolver = ChainResolver::new(&registry).with_max_depth(Some(1));
    let err = resolver
        .resolve("Observation", &name("patient.organization.name"))
        .unwrap_err();
    assert_eq!(err.issue_code(), "too-costly");
}

// ============================================================================
// Lazy Registry
// ============================================================================

struct CountingSource {
    calls: AtomicUsize,
}

impl DefinitionSource for CountingSource {
    fn definitions_for(&self, resource_type: &str) -> Result<Vec<ParamDefinition>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match resource_type {
            "Observation" => vec![reference("Observation", "subject", &["Patient"])],
            "Patient" => vec![param("Patient", "name", SearchParamType::String)],
            _ => Vec::new(),
        })
    }
}

#[test]
fn test_lazy_registry_concurrent_first_use() {
    let registry = Arc::new(LazyParameterRegistry::new(CountingSource {
        calls: AtomicUsize::new(0),
    }));

    let start = Arc::new(Barrier::new(8));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let start = Arc::clone(&start);
            scope.spawn(move || {
                start.wait();
                for _ in 0..50 {
                    assert!(registry.get_param("Patient", "name").is_some());
                    assert!(registry.get_param("Observation", "subject").is_some());
                }
            });
        }
    });

    assert_eq!(registry.populated_types(), 2);
    assert_eq!(registry_calls(&registry), 2);
}

fn registry_calls(registry: &LazyParameterRegistry<CountingSource>) -> usize {
    registry.source().calls.load(Ordering::SeqCst)
}

#[test]
fn test_lazy_registry_resolves_chains() {
    let source = CountingSource {
        calls: AtomicUsize::new(0),
    };
    let registry = LazyParameterRegistry::new(source);
    let spec = resolve("Observation", &name("subject.name"), &registry).unwrap();
    assert_eq!(spec.target_types(), ["Patient".to_string()]);
}

fn untargeted_source(resource_type: &str) -> Result<Vec<ParamDefinition>, RegistryError> {
    Ok(match resource_type {
        "Observation" => vec![param("Observation", "subject", SearchParamType::Reference)],
        "Patient" => vec![param("Patient", "name", SearchParamType::String)],
        _ => Vec::new(),
    })
}

#[test]
fn test_unknown_type_modifiers_leave_cache_unchanged() {
    let registry = LazyParameterRegistry::new(untargeted_source);
    assert!(resolve("Observation", &name("subject:Patient.name"), &registry).is_ok());
    let populated = registry.populated_types();
    assert_eq!(populated, 2);

    for i in 0..20 {
        let err = resolve("Observation", &name(&format!("subject:Zz{}.name", i)), &registry)
            .unwrap_err();
        assert!(matches!(err, ChainError::UnknownChainTarget { .. }));
    }
    assert_eq!(registry.populated_types(), populated);
}
