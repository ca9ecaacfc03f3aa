// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::policy::RoutePolicy;
use crate::types::{DefaultPermission, OperatorAddress};

fn op(b: u8) -> OperatorAddress {
    OperatorAddress([b; 20])
}

#[test]
fn test_reads_always_permitted() {
    let policies = [
        RoutePolicy::new([], DefaultPermission::Closed),
        RoutePolicy::new([], DefaultPermission::Open),
        RoutePolicy::new([op(1)], DefaultPermission::Closed),
    ];
    for policy in &policies {
        for operator in [op(1), op(2)] {
            assert!(policy.permitted(false, &operator));
        }
    }
}

#[test]
fn test_closed_route_allows_only_listed_writers() {
    let policy = RoutePolicy::new([op(1), op(3)], DefaultPermission::Closed);
    assert!(policy.permitted(true, &op(1)));
    assert!(policy.permitted(true, &op(3)));
    assert!(!policy.permitted(true, &op(2)));
}

#[test]
fn test_open_route_allows_any_writer() {
    let policy = RoutePolicy::new([], DefaultPermission::Open);
    assert!(policy.permitted(true, &op(42)));
}

#[test]
fn test_empty_closed_route_denies_all_writes() {
    let policy = RoutePolicy::default();
    assert_eq!(policy.default_permission, DefaultPermission::Closed);
    assert!(!policy.permitted(true, &op(0)));
}
