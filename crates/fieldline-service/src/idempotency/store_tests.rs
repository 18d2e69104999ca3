//! Behavioral tests for the idempotency execution gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{IdempotencyStore, MemoryBackend};
use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Receipt {
    id: u32,
    note: String,
}

fn store_with_ttl(ttl: Duration) -> IdempotencyStore {
    IdempotencyStore::new(Arc::new(MemoryBackend::new()), ttl)
}

fn store() -> IdempotencyStore {
    store_with_ttl(Duration::from_secs(60))
}

#[test_log::test(tokio::test)]
async fn replay_executes_operation_exactly_once() {
    let store = store();
    let calls = AtomicUsize::new(0);

    let run = |id: u32| {
        let calls = &calls;
        let store = &store;
        async move {
            store
                .with_idempotency(Some("charge-1"), "payments", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Receipt {
                        id,
                        note: "charged".to_owned(),
                    })
                })
                .await
        }
    };

    let first = run(1).await.expect("first call should succeed");
    let second = run(2).await.expect("replay should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!first.was_idempotent);
    assert!(second.was_idempotent);
    // The replay observes the original result, not a second execution.
    assert_eq!(second.response, first.response);
    assert_eq!(second.response.id, 1);
}

#[test_log::test(tokio::test)]
async fn failed_operation_is_not_cached() {
    let store = store();
    let calls = AtomicUsize::new(0);

    let failed: Result<super::IdempotentResponse<Receipt>, _> = store
        .with_idempotency(Some("charge-2"), "payments", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("boom"))
        })
        .await;
    assert!(matches!(failed, Err(ServiceError::Operation(_))));

    let retried = store
        .with_idempotency(Some("charge-2"), "payments", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(Receipt {
                id: 7,
                note: "recovered".to_owned(),
            })
        })
        .await
        .expect("retry under the same key should run");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!retried.was_idempotent);
    assert_eq!(retried.response.id, 7);
}

#[test_log::test(tokio::test)]
async fn scopes_isolate_identical_literal_keys() {
    let store = store();
    let payment_calls = AtomicUsize::new(0);
    let email_calls = AtomicUsize::new(0);

    let paid = store
        .with_idempotency(Some("k"), "payments", || async {
            payment_calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>("charged".to_owned())
        })
        .await
        .expect("payment op should run");
    let sent = store
        .with_idempotency(Some("k"), "emails", || async {
            email_calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>("sent".to_owned())
        })
        .await
        .expect("email op should run");

    assert_eq!(payment_calls.load(Ordering::SeqCst), 1);
    assert_eq!(email_calls.load(Ordering::SeqCst), 1);
    assert!(!paid.was_idempotent);
    assert!(!sent.was_idempotent);
    assert_eq!(paid.response, "charged");
    assert_eq!(sent.response, "sent");
}

#[test_log::test(tokio::test)]
async fn absent_key_always_executes() {
    let store = store();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let outcome = store
            .with_idempotency(None, "payments", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(42_u32)
            })
            .await
            .expect("operation should run");
        assert!(!outcome.was_idempotent);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn concurrent_same_key_callers_share_one_execution() {
    let store = Arc::new(store());
    let calls = Arc::new(AtomicUsize::new(0));

    let futures = (0..10).map(|_| {
        let store = Arc::clone(&store);
        let calls = Arc::clone(&calls);
        async move {
            store
                .with_idempotency(Some("slow-1"), "payments", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, anyhow::Error>(Receipt {
                        id: 99,
                        note: "slow".to_owned(),
                    })
                })
                .await
        }
    });

    let outcomes = futures::future::join_all(futures).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let mut executed = 0;
    for outcome in outcomes {
        let outcome = outcome.expect("every caller should get the shared result");
        assert_eq!(outcome.response.id, 99);
        if !outcome.was_idempotent {
            executed += 1;
        }
    }
    // Exactly one caller ran the operation; the rest joined its flight.
    assert_eq!(executed, 1);
}

#[test_log::test(tokio::test)]
async fn joiners_observe_leader_failure_and_key_stays_retryable() {
    let store = Arc::new(store());
    let calls = Arc::new(AtomicUsize::new(0));

    let futures = (0..3).map(|_| {
        let store = Arc::clone(&store);
        let calls = Arc::clone(&calls);
        async move {
            store
                .with_idempotency(Some("flaky-1"), "payments", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<Receipt, _>(anyhow::anyhow!("downstream unavailable"))
                })
                .await
        }
    });

    let outcomes = futures::future::join_all(futures).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for outcome in outcomes {
        assert!(matches!(
            outcome,
            Err(ServiceError::Operation(_) | ServiceError::JoinedFlightFailed(_))
        ));
    }

    // The failed flight left nothing behind; a retry executes fresh.
    let retried = store
        .with_idempotency(Some("flaky-1"), "payments", || async {
            Ok::<_, anyhow::Error>(Receipt {
                id: 1,
                note: "recovered".to_owned(),
            })
        })
        .await
        .expect("retry should run");
    assert!(!retried.was_idempotent);
}

#[test_log::test(tokio::test)]
async fn dropped_in_flight_execution_releases_the_key() {
    let store = store();
    let calls = AtomicUsize::new(0);

    // Abandon the leader mid-flight, as a request timeout would.
    let stuck = store.with_idempotency(Some("stuck-1"), "payments", || async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, anyhow::Error>(1_u32)
    });
    let abandoned = tokio::time::timeout(Duration::from_millis(20), stuck).await;
    assert!(abandoned.is_err());

    // The key must not stay bound to the dead flight; the next caller
    // leads a fresh execution.
    for round in 0..3 {
        let outcome = store
            .with_idempotency(Some("stuck-1"), "payments", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(2_u32)
            })
            .await
            .expect("retry after an abandoned execution should run");

        assert_eq!(outcome.response, 2);
        assert_eq!(outcome.was_idempotent, round > 0);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test_log::test(tokio::test)]
async fn expired_entry_is_a_miss() {
    let store = store_with_ttl(Duration::from_millis(200));
    let calls = AtomicUsize::new(0);

    let run = || {
        let calls = &calls;
        let store = &store;
        async move {
            store
                .with_idempotency(Some("evt-9"), "webhooks", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>("handled".to_owned())
                })
                .await
                .expect("operation should run")
        }
    };

    let first = run().await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    let second = run().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!first.was_idempotent);
    assert!(!second.was_idempotent);
}

#[test_log::test(tokio::test)]
async fn clear_drops_memoized_results() {
    let store = store();

    let first = store
        .with_idempotency(Some("k"), "payments", || async {
            Ok::<_, anyhow::Error>(1_u32)
        })
        .await
        .expect("operation should run");
    store.clear().await.expect("clear should succeed");
    let second = store
        .with_idempotency(Some("k"), "payments", || async {
            Ok::<_, anyhow::Error>(2_u32)
        })
        .await
        .expect("operation should run");

    assert!(!first.was_idempotent);
    assert!(!second.was_idempotent);
    assert_eq!(second.response, 2);
}
