//! End-to-end routing behavior with a running rebuild scheduler.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use ingress_router::ingress::{EventHandler, IngressKey};
use ingress_router::routing::{notifier, IngressRouter, RebuildScheduler, RouterSettings};

mod common;
use common::ingress;

fn settings(debounce_ms: u64) -> RouterSettings {
    RouterSettings {
        debounce: Duration::from_millis(debounce_ms),
        signal_capacity: 1000,
        wait_for_initial_sync: true,
    }
}

async fn started(debounce_ms: u64) -> (IngressRouter, CancellationToken) {
    let router = IngressRouter::new(settings(debounce_ms));
    let cancel = CancellationToken::new();
    router.start(cancel.clone()).unwrap();
    (router, cancel)
}

/// Wait until the published generation reaches `generation`.
async fn wait_generation(router: &IngressRouter, generation: u64) {
    let mut rx = router.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|g| *g >= generation))
        .await
        .expect("timed out waiting for rebuild")
        .unwrap();
}

#[tokio::test]
async fn test_concrete_scenario() {
    let (router, cancel) = started(20).await;
    router.on_add(&ingress("ns1", "name1", "foo.com", &[("/", "svc11", 80), ("/subpath", "svc12", 80)]));
    router.on_add(&ingress("ns2", "name2", "bar.com", &[("/", "svc2", 80)]));
    router.on_synced();
    router.wait_until_ready().await;

    let m = router.match_route("foo.com", "/path1").unwrap();
    assert_eq!((&*m.namespace, &*m.name, &*m.backend), ("ns1", "name1", "svc11.ns1.svc:80"));

    let m = router.match_route("foo.com", "/subpath/x").unwrap();
    assert_eq!(&*m.backend, "svc12.ns1.svc:80");

    let m = router.match_route("bar.com", "/some-path").unwrap();
    assert_eq!((&*m.namespace, &*m.name, &*m.backend), ("ns2", "name2", "svc2.ns2.svc:80"));

    let m = router.match_route("bar.com", "/subpath").unwrap();
    assert_eq!(&*m.name, "name2");

    assert!(router.match_route("unknown.com", "/x").is_none());
    cancel.cancel();
}

#[tokio::test]
async fn test_readiness_unblocks_on_empty_first_build() {
    let (router, cancel) = started(20).await;

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { router.wait_until_ready().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(waiters.iter().all(|w| !w.is_finished()));
    assert_eq!(router.generation(), 0);

    router.on_synced();
    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
    }

    assert_eq!(router.current().unwrap().route_count(), 0);
    // Later calls return immediately.
    tokio::time::timeout(Duration::from_millis(10), router.wait_until_ready()).await.unwrap();
    cancel.cancel();
}

#[tokio::test]
async fn test_debounce_coalesces_burst() {
    let (router, cancel) = started(100).await;
    router.on_synced();
    router.wait_until_ready().await;
    assert_eq!(router.generation(), 1);

    for i in 0..20 {
        let path = format!("/p{}", i);
        router.on_add(&ingress("ns", &format!("ing-{}", i), "foo.com", &[(path.as_str(), "svc", 80)]));
    }
    router.remove(&IngressKey::new("ns", "ing-0"));

    wait_generation(&router, 2).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(router.generation(), 2);

    let table = router.current().unwrap();
    assert_eq!(table.route_count(), 19);
    assert!(router.match_route("foo.com", "/p0").is_none());
    assert!(router.match_route("foo.com", "/p19").is_some());
    cancel.cancel();
}

#[tokio::test]
async fn test_equivalent_readd_does_not_rebuild() {
    let (router, cancel) = started(20).await;
    let rule = ingress("ns", "a", "foo.com", &[("/", "svc", 80)]);
    router.on_add(&rule);
    router.on_synced();
    router.wait_until_ready().await;
    let before = router.current().unwrap();

    router.on_add(&rule.clone());
    router.on_update(&rule, &rule.clone());
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(router.generation(), 1);
    assert!(Arc::ptr_eq(&before, &router.current().unwrap()));
    cancel.cancel();
}

#[tokio::test]
async fn test_removal_makes_routes_unreachable() {
    let (router, cancel) = started(20).await;
    let rule = ingress("ns1", "name1", "foo.com", &[("/", "svc11", 80)]);
    router.on_add(&rule);
    router.on_synced();
    router.wait_until_ready().await;
    assert!(router.match_route("foo.com", "/path1").is_some());

    router.on_delete(&rule);
    wait_generation(&router, 2).await;
    assert!(router.match_route("foo.com", "/path1").is_none());
    cancel.cancel();
}

#[tokio::test]
async fn test_ungated_router_builds_immediately() {
    let router = IngressRouter::new(RouterSettings {
        wait_for_initial_sync: false,
        ..settings(20)
    });
    let cancel = CancellationToken::new();
    router.start(cancel.clone()).unwrap();

    router.wait_until_ready_timeout(Duration::from_secs(5)).await.unwrap();
    assert!(!router.is_synced());
    cancel.cancel();
}

#[tokio::test]
async fn test_cancel_stops_rebuilds() {
    let router = IngressRouter::new(settings(20));
    let cancel = CancellationToken::new();
    let handle = router.start(cancel.clone()).unwrap();
    router.on_synced();
    router.wait_until_ready().await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

    router.on_add(&ingress("ns", "late", "foo.com", &[("/", "svc", 80)]));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(router.generation(), 1);
    assert!(router.match_route("foo.com", "/").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_tables() {
    let (router, cancel) = started(5).await;
    router.on_add(&ingress("ns", "stable", "stable.com", &[("/", "svc", 80), ("/api", "api", 80)]));
    router.on_synced();
    router.wait_until_ready().await;

    let stop = Arc::new(AtomicBool::new(false));
    let misses = Arc::new(AtomicUsize::new(0));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let router = router.clone();
            let stop = stop.clone();
            let misses = misses.clone();
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    match router.match_route("stable.com", "/api/v1") {
                        Some(m) if &*m.backend == "api.ns.svc:80" => {}
                        _ => {
                            misses.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for i in 0..50 {
        let path = format!("/{}", i);
        router.on_add(&ingress("ns", &format!("churn-{}", i % 5), "churn.com", &[(path.as_str(), "svc", 80)]));
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(misses.load(Ordering::Relaxed), 0);
    assert!(router.generation() > 1);
    cancel.cancel();
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_table() {
    let router = IngressRouter::default();
    let rule = ingress("ns1", "name1", "foo.com", &[("/", "svc11", 80)]);
    router.upsert(rule.clone());

    let (tx, rx) = notifier::channel(16);
    let calls = Arc::new(AtomicUsize::new(0));
    let scheduler = {
        let router = router.clone();
        let calls = calls.clone();
        RebuildScheduler::new(rx, Duration::from_millis(10), move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("route table build failed");
            }
            router.rebuild();
        })
    };
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    wait_generation(&router, 1).await;
    let before = router.current().unwrap();

    router.remove(&rule.key());
    tx.notify();
    tokio::time::timeout(Duration::from_secs(5), async {
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(router.generation(), 1);
    assert!(Arc::ptr_eq(&before, &router.current().unwrap()));
    assert!(router.match_route("foo.com", "/path1").is_some());

    // The loop survives and the next rebuild catches up with the store.
    tx.notify();
    wait_generation(&router, 2).await;
    assert!(router.match_route("foo.com", "/path1").is_none());

    cancel.cancel();
    handle.await.unwrap();
}
