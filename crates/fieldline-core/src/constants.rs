/// Retention window for generic idempotency records, in seconds (24 hours).
pub const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 86_400;

/// Interval between expiry sweeps of the in-process idempotency store.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Webhook dedup rows are retained this long before the external cleanup
/// job purges them. The purge schedule itself is owned elsewhere.
pub const WEBHOOK_RETENTION_DAYS: i64 = 90;

/// Request headers consulted for a client-supplied idempotency key, in
/// precedence order.
pub const IDEMPOTENCY_KEY_HEADERS: [&str; 2] = ["idempotency-key", "x-idempotency-key"];
