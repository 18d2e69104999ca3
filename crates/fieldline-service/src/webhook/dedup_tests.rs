//! Behavioral tests for webhook dedup composition, over a stub ledger.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value as JsonValue;

use super::{WebhookLedger, with_webhook_deduplication};
use crate::error::{ServiceError, ServiceResult};
use fieldline_core::error::CoreError;

#[derive(Default)]
struct StubLedger {
    seen: Mutex<HashSet<(String, String)>>,
    check_unreachable: bool,
    records: AtomicUsize,
}

impl StubLedger {
    fn lock_seen(&self) -> std::sync::MutexGuard<'_, HashSet<(String, String)>> {
        match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WebhookLedger for StubLedger {
    fn already_processed<'a>(
        &'a self,
        provider: &'a str,
        event_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            if self.check_unreachable {
                return Err(ServiceError::Core(CoreError::InvariantViolation(
                    "ledger unreachable",
                )));
            }
            Ok(self
                .lock_seen()
                .contains(&(provider.to_owned(), event_id.to_owned())))
        })
    }

    fn record_processed<'a>(
        &'a self,
        provider: &'a str,
        event_id: &'a str,
        _metadata: Option<&'a JsonValue>,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>> {
        Box::pin(async move {
            // Mirrors the durable store: a duplicate insert is a no-op.
            self.lock_seen()
                .insert((provider.to_owned(), event_id.to_owned()));
            self.records.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[test_log::test(tokio::test)]
async fn duplicate_delivery_is_suppressed() {
    let ledger = StubLedger::default();
    let calls = AtomicUsize::new(0);

    let first = with_webhook_deduplication(&ledger, "stripe", "evt_123", None, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, anyhow::Error>("handled".to_owned())
    })
    .await
    .expect("first delivery should process");

    let second = with_webhook_deduplication(&ledger, "stripe", "evt_123", None, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, anyhow::Error>("handled again".to_owned())
    })
    .await
    .expect("redelivery should short-circuit");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.as_deref(), Some("handled"));
    // Only the seen flag persists; the redelivery gets no replayed result.
    assert_eq!(second, None);
}

#[test_log::test(tokio::test)]
async fn providers_partition_event_ids() {
    let ledger = StubLedger::default();
    let calls = AtomicUsize::new(0);

    for provider in ["stripe", "twilio"] {
        let outcome = with_webhook_deduplication(&ledger, provider, "evt_123", None, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(())
        })
        .await
        .expect("delivery should process");
        assert!(outcome.is_some());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn unreachable_ledger_fails_closed() {
    let ledger = StubLedger {
        check_unreachable: true,
        ..StubLedger::default()
    };
    let calls = AtomicUsize::new(0);

    let outcome = with_webhook_deduplication(&ledger, "stripe", "evt_9", None, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, anyhow::Error>(())
    })
    .await;

    // No answer means the guarded side effect must not run.
    assert!(outcome.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.records.load(Ordering::SeqCst), 0);
}

#[test_log::test(tokio::test)]
async fn failed_handler_is_not_marked_processed() {
    let ledger = StubLedger::default();

    let outcome: ServiceResult<Option<()>> =
        with_webhook_deduplication(&ledger, "stripe", "evt_5", None, || async {
            Err(anyhow::anyhow!("handler blew up"))
        })
        .await;

    assert!(matches!(outcome, Err(ServiceError::Operation(_))));
    assert_eq!(ledger.records.load(Ordering::SeqCst), 0);

    // The provider's retry now processes normally.
    let retried = with_webhook_deduplication(&ledger, "stripe", "evt_5", None, || async {
        Ok::<_, anyhow::Error>(())
    })
    .await
    .expect("retry should process");
    assert!(retried.is_some());
    assert_eq!(ledger.records.load(Ordering::SeqCst), 1);
}

#[test_log::test(tokio::test)]
async fn metadata_is_forwarded_to_the_ledger() {
    let ledger = StubLedger::default();
    let metadata = serde_json::json!({"delivery_attempt": 1});

    let outcome =
        with_webhook_deduplication(&ledger, "resend", "email_1", Some(&metadata), || async {
            Ok::<_, anyhow::Error>(())
        })
        .await
        .expect("delivery should process");

    assert!(outcome.is_some());
    assert_eq!(ledger.records.load(Ordering::SeqCst), 1);
}
