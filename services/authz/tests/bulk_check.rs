mod common;

use authz::context::{AuthnError, RequestContext};
use authz::relation::RelationError;
use authz::resource::{CheckOutcome, CheckRequest, ResourceCheck};
use common::{BackendCall, Harness};
use keyward_authz::{Action, Resource};
use std::collections::HashSet;
use std::time::Duration;

fn pair(namespace: &str, id: &str, action: &str) -> ResourceCheck {
    ResourceCheck::new(Resource::reference(namespace, id), Action::new(action))
}

fn user() -> RequestContext {
    RequestContext::with_subject("user:u1")
}

#[tokio::test]
async fn every_pair_gets_exactly_one_result() {
    let harness = Harness::new();
    harness.backend.allow("u1", "project", "p1", "edit");
    harness.backend.allow("u1", "project", "p3", "view");
    harness.backend.delay_checks(Duration::from_millis(5));
    let authz = harness.facade(10);

    let checks = vec![
        pair("project", "p1", "edit"),
        pair("project", "p1", "view"),
        pair("project", "p2", "edit"),
        pair("project", "p3", "view"),
        pair("organization", "o1", "view"),
    ];
    let expected: HashSet<(String, String, String)> = checks
        .iter()
        .map(|c| {
            (
                c.resource.id.clone(),
                c.resource.namespace_id.clone(),
                c.action.as_str().to_string(),
            )
        })
        .collect();

    let permissions = authz.check_all(&user(), checks).await.expect("bulk");
    assert_eq!(permissions.len(), 5);
    let keys: HashSet<(String, String, String)> = permissions
        .iter()
        .map(|p| {
            let (id, ns, permission) = p.key();
            (id.to_string(), ns.to_string(), permission.to_string())
        })
        .collect();
    assert_eq!(keys, expected);

    let allowed: HashSet<_> = permissions
        .iter()
        .filter(|p| p.allowed)
        .map(|p| (p.object_id.as_str(), p.permission.as_str()))
        .collect();
    assert_eq!(allowed, HashSet::from([("p1", "edit"), ("p3", "view")]));
}

#[tokio::test]
async fn bulk_check_authz_pairs_resources_with_actions() {
    let harness = Harness::new();
    harness.backend.allow("u1", "group", "g1", "view");
    let authz = harness.facade(10);

    let permissions = authz
        .bulk_check_authz(
            &user(),
            &[Resource::reference("group", "g1"), Resource::reference("group", "g2")],
            &[Action::view(), Action::view()],
        )
        .await
        .expect("bulk");
    assert_eq!(permissions.len(), 2);
    assert!(permissions.iter().any(|p| p.object_id == "g1" && p.allowed));
    assert!(permissions.iter().any(|p| p.object_id == "g2" && !p.allowed));
}

#[tokio::test]
async fn panicking_check_fails_the_batch_instead_of_hanging() {
    let harness = Harness::new();
    harness.backend.allow("u1", "project", "p1", "view");
    harness.backend.panic_checks_on("p-poison");
    let authz = harness.facade(10);

    let checks = vec![
        pair("project", "p1", "view"),
        pair("project", "p-poison", "view"),
        pair("project", "p2", "view"),
    ];
    let outcome = tokio::time::timeout(Duration::from_secs(2), authz.check_all(&user(), checks))
        .await
        .expect("collector must not hang");
    let err = outcome.expect_err("panicked check");
    assert!(matches!(err, RelationError::CheckTaskFailed(_)));
}

#[tokio::test]
async fn first_error_fails_the_whole_batch() {
    let harness = Harness::new();
    harness.backend.allow("u1", "project", "p1", "view");
    harness.backend.fail_checks_on("p-broken");
    harness.backend.delay_checks(Duration::from_millis(300));
    let authz = harness.facade(10);

    let checks = vec![
        pair("project", "p1", "view"),
        pair("project", "p-broken", "view"),
        pair("project", "p2", "view"),
        pair("project", "p3", "view"),
    ];
    let started = std::time::Instant::now();
    let err = authz
        .check_all(&user(), checks)
        .await
        .expect_err("one check fails");
    assert!(matches!(err, RelationError::Backend(_)));
    assert!(started.elapsed() < Duration::from_millis(300));

    // The slow checks were abandoned, not finished in the background.
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(harness.backend.completed_checks(), 0);
}

#[tokio::test]
async fn batch_size_is_enforced_before_any_backend_call() {
    let harness = Harness::new();
    let authz = harness.facade(3);

    let err = authz
        .check_all(&user(), Vec::new())
        .await
        .expect_err("empty");
    assert!(matches!(
        err,
        RelationError::BulkLimit {
            requested: 0,
            limit: 3
        }
    ));

    let too_many = (0..4).map(|i| pair("project", &format!("p{i}"), "view")).collect();
    let err = authz
        .check_all(&user(), too_many)
        .await
        .expect_err("over limit");
    assert!(matches!(
        err,
        RelationError::BulkLimit {
            requested: 4,
            limit: 3
        }
    ));
    assert!(harness.backend.calls().is_empty());

    let at_limit = (0..3).map(|i| pair("project", &format!("p{i}"), "view")).collect();
    authz.check_all(&user(), at_limit).await.expect("at limit");
}

#[tokio::test]
async fn single_shape_is_checked_inline() {
    let harness = Harness::new();
    harness.backend.allow("u1", "project", "proj-42", "edit");
    let authz = harness.facade(10);

    let outcome = authz
        .check_resource_permission(
            &user(),
            CheckRequest::Single(pair("project", "proj-42", "edit")),
        )
        .await
        .expect("single");
    assert_eq!(outcome, CheckOutcome::Single(true));
    assert_eq!(harness.backend.calls().len(), 1);

    let outcome = authz
        .check_resource_permission(
            &user(),
            CheckRequest::Bulk(vec![pair("project", "proj-42", "edit")]),
        )
        .await
        .expect("bulk");
    match outcome {
        CheckOutcome::Bulk(permissions) => {
            assert_eq!(permissions.len(), 1);
            assert!(permissions[0].allowed);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn unauthenticated_is_distinct_from_backend_failure() {
    let harness = Harness::new();
    harness.backend.fail_checks_on("p1");
    let authz = harness.facade(10);

    let err = authz
        .check_authz(
            &RequestContext::anonymous(),
            &Resource::reference("project", "p1"),
            &Action::view(),
        )
        .await
        .expect_err("anonymous");
    assert!(matches!(
        err,
        RelationError::Unauthenticated(AuthnError::MissingIdentity)
    ));

    let err = authz
        .check_all(&RequestContext::anonymous(), vec![pair("project", "p1", "view")])
        .await
        .expect_err("anonymous bulk");
    assert!(matches!(err, RelationError::Unauthenticated(_)));
    assert!(harness.backend.calls().is_empty());

    let err = authz
        .check_authz(&user(), &Resource::reference("project", "p1"), &Action::view())
        .await
        .expect_err("backend");
    assert!(matches!(err, RelationError::Backend(_)));
}

#[tokio::test]
async fn denied_is_not_an_error() {
    let harness = Harness::new();
    let authz = harness.facade(10);
    let allowed = authz
        .check_authz(&user(), &Resource::reference("project", "p1"), &Action::edit())
        .await
        .expect("denied, not failed");
    assert!(!allowed);
}

#[tokio::test]
async fn global_listing_fails_fast_and_inverts_results() {
    let harness = Harness::new();
    harness.backend.allow("u1", "project", "p1", "view");
    harness.backend.allow("u1", "project", "p1", "edit");
    harness.backend.allow("u1", "group", "g1", "view");
    let authz = harness.facade(10);

    let listed = authz
        .list_resource_of_user_global(
            &user(),
            &["project".to_string(), "group".to_string()],
            &["edit".to_string(), "view".to_string()],
        )
        .await
        .expect("global");
    assert_eq!(listed["project"]["p1"], vec!["edit", "view"]);
    assert_eq!(listed["group"]["g1"], vec!["view"]);

    let lookups = harness
        .backend
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::Lookup(..)))
        .count();
    assert_eq!(lookups, 4);
}
