use reservoir::fleet::{BuildError, FleetBuilder, WorkerIdentity, WorkerRegistry, WorkerSpec};

fn identities(fleet: &reservoir::fleet::BuiltFleet) -> Vec<WorkerIdentity> {
    fleet.handles.iter().map(|h| h.identity().clone()).collect()
}

#[test]
fn test_spec_expands_into_indexed_handles() {
    for k in 1..=5u32 {
        let fleet = FleetBuilder::build(vec![WorkerSpec::new("alpha", "10.0.0.1", k)]);

        assert!(fleet.errors.is_empty());
        assert_eq!(fleet.handles.len(), k as usize);
        let expected: Vec<WorkerIdentity> =
            (0..k).map(|i| WorkerIdentity::new("alpha", i)).collect();
        assert_eq!(identities(&fleet), expected);
        assert!(fleet.handles.iter().all(|h| h.host == "10.0.0.1"));
        assert!(fleet.handles.iter().all(|h| h.enabled));
    }
}

#[test]
fn test_zero_subworkers_is_invalid() {
    let fleet = FleetBuilder::build(vec![WorkerSpec::new("alpha", "10.0.0.1", 0)]);

    assert!(fleet.handles.is_empty());
    assert_eq!(fleet.errors.len(), 1);
    assert!(matches!(fleet.errors[0], BuildError::InvalidSpec { .. }));
}

#[test]
fn test_empty_name_or_host_is_invalid() {
    let cases = vec![
        WorkerSpec::new("", "10.0.0.1", 2),
        WorkerSpec::new("alpha", "", 2),
        WorkerSpec::new("   ", "10.0.0.1", 2),
        WorkerSpec::new("alpha", "  ", 2),
    ];

    for spec in cases {
        let fleet = FleetBuilder::build(vec![spec.clone()]);
        assert!(fleet.handles.is_empty(), "spec {:?} produced handles", spec);
        assert_eq!(fleet.errors.len(), 1);
        match &fleet.errors[0] {
            BuildError::InvalidSpec { reason, .. } => assert!(reason.contains("empty")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}

#[test]
fn test_invalid_spec_does_not_abort_others() {
    let fleet = FleetBuilder::build(vec![
        WorkerSpec::new("alpha", "10.0.0.1", 2),
        WorkerSpec::new("broken", "", 4),
        WorkerSpec::new("gamma", "10.0.0.3", 1),
    ]);

    assert_eq!(fleet.errors.len(), 1);
    assert_eq!(
        identities(&fleet),
        vec![
            WorkerIdentity::new("alpha", 0),
            WorkerIdentity::new("alpha", 1),
            WorkerIdentity::new("gamma", 0),
        ]
    );
}

#[test]
fn test_invalid_spec_names_its_origin() {
    let fleet = FleetBuilder::build(vec![
        WorkerSpec::new("alpha", "", 1).with_origin("workers/alpha.properties")
    ]);

    let message = fleet.errors[0].to_string();
    assert!(message.contains("workers/alpha.properties"), "{}", message);
}

#[test]
fn test_duplicate_name_first_wins() {
    let fleet = FleetBuilder::build(vec![
        WorkerSpec::new("beta", "10.0.0.1", 2),
        WorkerSpec::new("beta", "10.0.0.2", 3),
    ]);

    assert_eq!(
        identities(&fleet),
        vec![WorkerIdentity::new("beta", 0), WorkerIdentity::new("beta", 1)]
    );
    assert!(fleet.handles.iter().all(|h| h.host == "10.0.0.1"));

    // One error per identity the second spec would have generated.
    let duplicates: Vec<WorkerIdentity> = fleet
        .errors
        .iter()
        .map(|e| match e {
            BuildError::DuplicateIdentity { identity } => identity.clone(),
            other => panic!("unexpected error {:?}", other),
        })
        .collect();
    assert_eq!(
        duplicates,
        vec![
            WorkerIdentity::new("beta", 0),
            WorkerIdentity::new("beta", 1),
            WorkerIdentity::new("beta", 2),
        ]
    );
}

#[test]
fn test_invalid_spec_does_not_claim_name() {
    let fleet = FleetBuilder::build(vec![
        WorkerSpec::new("beta", "", 2),
        WorkerSpec::new("beta", "10.0.0.2", 1),
    ]);

    assert_eq!(identities(&fleet), vec![WorkerIdentity::new("beta", 0)]);
    assert_eq!(fleet.handles[0].host, "10.0.0.2");
    assert_eq!(fleet.errors.len(), 1);
    assert!(matches!(fleet.errors[0], BuildError::InvalidSpec { .. }));
}

#[test]
fn test_registry_after_insert_holds_only_first_duplicate() {
    let fleet = FleetBuilder::build(vec![
        WorkerSpec::new("beta", "10.0.0.1", 2),
        WorkerSpec::new("beta", "10.0.0.2", 2),
    ]);
    let registry = WorkerRegistry::new();
    for handle in fleet.handles {
        registry.insert(handle).unwrap();
    }

    assert_eq!(registry.len(), 2);
    assert!(registry.snapshot().iter().all(|w| w.handle.host == "10.0.0.1"));
}
