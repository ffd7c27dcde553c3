use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gantry_core::backend::Backend;
use gantry_core::gateway::{Gateway, RegisterError};
use gantry_core::reflection::resolver::ResolveError;
use gantry_core::routes::RouteError;
use http::Method;
use library_service::{FixtureReflection, conflict_set, library_set, library_set_v2};
use tonic::Code;
use tonic_reflection::server::v1::ServerReflectionServer;

type FixtureBackend = Backend<ServerReflectionServer<FixtureReflection>>;
type FixtureGateway = Gateway<ServerReflectionServer<FixtureReflection>>;

const GET_ITEM: &str = "/library.v1.LibraryService/GetItem";
const PING: &str = "/library.v1.LibraryService/Ping";

fn fixture_backend(fixture: &FixtureReflection) -> FixtureBackend {
    Backend::new(fixture.server())
}

#[tokio::test]
async fn test_register_publishes_annotated_routes() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    gateway
        .register(&backend)
        .await
        .expect("Failed to register backend");

    let state = gateway.load();
    assert!(state.is_registered(&backend));

    let matched = state
        .match_method(&Method::GET, "/v1/items/42")
        .expect("Failed to match GET /v1/items/42");
    assert_eq!(matched.method, GET_ITEM);
    assert_eq!(matched.variables.get("id").map(String::as_str), Some("42"));

    let conn = state
        .pick_method_conn(&matched.method)
        .expect("Failed to pick a backend for the matched method");
    assert_eq!(conn.backend, backend);
    assert_eq!(conn.method.name, GET_ITEM);
    assert_eq!(
        conn.method.descriptor.input().full_name(),
        "library.v1.GetItemRequest"
    );

    // Every binding of every annotated method landed, across both services.
    assert!(state.match_method(&Method::GET, "/v1/items").is_ok());
    assert!(state.match_method(&Method::POST, "/v1/items").is_ok());
    assert!(state.match_method(&Method::PUT, "/v1/items/42").is_ok());
    assert!(state.match_method(&Method::PATCH, "/v1/items/42").is_ok());
    assert!(state.match_method(&Method::DELETE, "/v1/items/42").is_ok());
    assert!(state.match_method(&Method::POST, "/v1/admin/purge").is_ok());

    let blob = state
        .match_method(&Method::GET, "/v1/blobs/covers/large/1.png")
        .expect("Failed to match catch-all route");
    assert_eq!(blob.method, "/library.v1.LibraryService/ReadBlob");
    assert_eq!(
        blob.variables.get("path").map(String::as_str),
        Some("covers/large/1.png")
    );
}

#[tokio::test]
async fn test_unannotated_methods_stay_grpc_only() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    gateway
        .register(&backend)
        .await
        .expect("Failed to register backend");

    let err = gateway.load().pick_method_conn(PING).unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);
    assert_eq!(err.message(), format!("method {PING} not implemented"));
}

#[tokio::test]
async fn test_unknown_routes_and_methods() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    gateway
        .register(&backend)
        .await
        .expect("Failed to register backend");
    let state = gateway.load();

    let err = state.match_method(&Method::GET, "/v1/unknown").unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    // Known path, wrong verb.
    let err = state.match_method(&Method::DELETE, "/v1/items").unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = state
        .pick_method_conn("/library.v1.LibraryService/Missing")
        .unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);
}

#[tokio::test]
async fn test_remove_unpublishes_routes_and_methods() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    gateway
        .register(&backend)
        .await
        .expect("Failed to register backend");

    assert!(gateway.remove(&backend).await);

    let state = gateway.load();
    assert!(!state.is_registered(&backend));
    assert_eq!(
        state.match_method(&Method::GET, "/v1/items/42").unwrap_err().code(),
        Code::NotFound
    );
    assert_eq!(
        state.pick_method_conn(GET_ITEM).unwrap_err().code(),
        Code::Unimplemented
    );

    // Removing a backend that is not registered reports false.
    assert!(!gateway.remove(&backend).await);
}

#[tokio::test]
async fn test_methods_fan_out_across_backends() {
    let fixture_a = FixtureReflection::serving(library_set());
    let fixture_b = FixtureReflection::serving(library_set());
    let a = fixture_backend(&fixture_a);
    let b = fixture_backend(&fixture_b);
    let gateway = Gateway::new();

    gateway.register(&a).await.expect("Failed to register backend a");
    gateway.register(&b).await.expect("Failed to register backend b");

    let state = gateway.load();
    let mut seen = HashSet::new();
    for _ in 0..200 {
        let conn = state
            .pick_method_conn(GET_ITEM)
            .expect("Failed to pick a backend");
        seen.insert(conn.backend);
    }
    assert_eq!(seen.len(), 2, "uniform picks should hit both backends");

    // Removing one backend leaves the shared routes on the survivor.
    assert!(gateway.remove(&a).await);
    let state = gateway.load();
    assert!(state.match_method(&Method::GET, "/v1/items/7").is_ok());
    for _ in 0..20 {
        assert_eq!(state.pick_method_conn(GET_ITEM).unwrap().backend, b);
    }
}

#[tokio::test]
async fn test_reregistering_an_unchanged_backend_is_a_noop() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    gateway
        .register(&backend)
        .await
        .expect("Failed to register backend");
    let after_first = fixture.request_count();

    gateway
        .register(&backend)
        .await
        .expect("Failed to re-register backend");

    // The second round stops at the fingerprint check: one ListServices plus
    // one FileContainingSymbol per service, no import fetches.
    assert_eq!(fixture.request_count() - after_first, 3);

    let state = gateway.load();
    assert!(state.match_method(&Method::GET, "/v1/items/42").is_ok());
    assert!(gateway.remove(&backend).await);
    assert!(!gateway.remove(&backend).await);
}

#[tokio::test]
async fn test_changed_backend_replaces_its_routes() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    gateway
        .register(&backend)
        .await
        .expect("Failed to register backend");
    assert!(gateway.load().match_method(&Method::GET, "/v1/items/42").is_ok());

    // The backend rolls out a new schema: GetItem moves paths.
    fixture.swap(library_set_v2());
    gateway
        .register(&backend)
        .await
        .expect("Failed to re-register backend after rollout");

    let state = gateway.load();
    let matched = state
        .match_method(&Method::GET, "/v1/objects/42")
        .expect("Failed to match the rolled-out route");
    assert_eq!(matched.method, GET_ITEM);

    // The old GET binding is gone; sibling verbs on the old path survive
    // because the rollout kept them.
    assert_eq!(
        state.match_method(&Method::GET, "/v1/items/42").unwrap_err().code(),
        Code::NotFound
    );
    assert!(state.match_method(&Method::DELETE, "/v1/items/42").is_ok());

    // Still exactly one registration for this backend.
    let conn = state.pick_method_conn(GET_ITEM).unwrap();
    assert_eq!(conn.backend, backend);
}

#[tokio::test]
async fn test_conflicting_backend_registers_nothing() {
    let fixture = FixtureReflection::serving(conflict_set());
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    let err = gateway.register(&backend).await.unwrap_err();
    assert!(matches!(
        err,
        RegisterError::Route(RouteError::Conflict { .. })
    ));

    // All-or-nothing: the clean method from the same backend is absent too.
    let state = gateway.load();
    assert_eq!(
        state.match_method(&Method::GET, "/v1/ok").unwrap_err().code(),
        Code::NotFound
    );
    assert!(!state.is_registered(&backend));
    assert!(!gateway.remove(&backend).await);
}

#[tokio::test]
async fn test_failed_registration_keeps_the_previous_snapshot() {
    let healthy_fixture = FixtureReflection::serving(library_set());
    let healthy = fixture_backend(&healthy_fixture);
    let conflicted_fixture = FixtureReflection::serving(conflict_set());
    let conflicted = fixture_backend(&conflicted_fixture);
    let gateway = Gateway::new();

    gateway
        .register(&healthy)
        .await
        .expect("Failed to register healthy backend");

    gateway
        .register(&conflicted)
        .await
        .expect_err("conflicting backend should fail to register");

    let state = gateway.load();
    assert!(state.is_registered(&healthy));
    assert!(state.match_method(&Method::GET, "/v1/items/42").is_ok());
    assert!(state.match_method(&Method::GET, "/v1/ok").is_err());
}

#[tokio::test]
async fn test_backend_without_reflection_fails_to_register() {
    let fixture = FixtureReflection::refusing();
    let backend = fixture_backend(&fixture);
    let gateway = Gateway::new();

    let err = gateway.register(&backend).await.unwrap_err();

    match err {
        RegisterError::Resolve(ResolveError::ServerStreamInitFailed(status)) => {
            assert_eq!(
                status.code(),
                Code::Unimplemented,
                "Expected UNIMPLEMENTED status, but got: {status:?}"
            );
        }
        e => panic!("Expected Resolve(ServerStreamInitFailed), got: {e:?}"),
    }
    assert!(!gateway.load().is_registered(&backend));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshots_stay_coherent_under_churn() {
    let fixture = FixtureReflection::serving(library_set());
    let backend = fixture_backend(&fixture);
    let gateway: Arc<FixtureGateway> = Arc::new(Gateway::new());
    let stop = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..2 {
        let gateway = Arc::clone(&gateway);
        let stop = Arc::clone(&stop);
        readers.push(tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                // Whatever a writer is doing, one snapshot must be internally
                // consistent: a matched route has a pickable backend, and a
                // missing route means the method is gone too.
                let state = gateway.load();
                match state.match_method(&Method::GET, "/v1/items/7") {
                    Ok(matched) => {
                        state
                            .pick_method_conn(&matched.method)
                            .expect("route published without a backend");
                    }
                    Err(_) => {
                        assert!(
                            state.pick_method_conn(GET_ITEM).is_err(),
                            "backend published without its routes"
                        );
                    }
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    for _ in 0..25 {
        gateway
            .register(&backend)
            .await
            .expect("Failed to register backend");
        assert!(gateway.remove(&backend).await);
    }

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.await.expect("reader task panicked");
    }
}
