// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order engine
// ============================================================================
//
// Covers:
// - Order mutations per operation (add_to_cart, buy_now, cancel_item, ...)
// - Rejections per operation and error reason
// - Version-guard conflicts and retry outcomes
// - Member discount tiers applied
// - Operation latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Operation Metrics
    pub order_operations: IntCounterVec,
    pub order_rejections: IntCounterVec,
    pub order_operation_duration: HistogramVec,

    // Concurrency Metrics
    pub order_conflicts: IntCounterVec,
    pub retry_attempts_total: IntCounterVec,
    pub retry_success: IntCounterVec,
    pub retry_failure: IntCounterVec,

    // Pricing Metrics
    pub discount_tiers_applied: IntCounterVec,
    pub orders_auto_cancelled: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let order_operations = IntCounterVec::new(
            Opts::new("order_operations_total", "Order operations completed successfully"),
            &["operation"],
        )?;
        registry.register(Box::new(order_operations.clone()))?;

        let order_rejections = IntCounterVec::new(
            Opts::new("order_rejections_total", "Order operations rejected"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(order_rejections.clone()))?;

        let order_operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Order operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(order_operation_duration.clone()))?;

        let order_conflicts = IntCounterVec::new(
            Opts::new("order_conflicts_total", "Order saves rejected by the version guard"),
            &["operation"],
        )?;
        registry.register(Box::new(order_conflicts.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_success = IntCounterVec::new(
            Opts::new("retry_success_total", "Operations that succeeded on a retry"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_success.clone()))?;

        let retry_failure = IntCounterVec::new(
            Opts::new("retry_failure_total", "Operations still conflicting after all attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_failure.clone()))?;

        let discount_tiers_applied = IntCounterVec::new(
            Opts::new("discount_tiers_applied_total", "Member discount rate used when repricing"),
            &["rate"],
        )?;
        registry.register(Box::new(discount_tiers_applied.clone()))?;

        let orders_auto_cancelled = IntCounterVec::new(
            Opts::new("orders_auto_cancelled_total", "Orders cancelled because their last item was removed"),
            &["previous_status"],
        )?;
        registry.register(Box::new(orders_auto_cancelled.clone()))?;

        Ok(Self {
            registry,
            order_operations,
            order_rejections,
            order_operation_duration,
            order_conflicts,
            retry_attempts_total,
            retry_success,
            retry_failure,
            discount_tiers_applied,
            orders_auto_cancelled,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a finished operation
    pub fn record_operation(&self, operation: &str, duration_secs: f64, outcome: Result<(), &str>) {
        match outcome {
            Ok(()) => self.order_operations.with_label_values(&[operation]).inc(),
            Err(reason) => self.order_rejections.with_label_values(&[operation, reason]).inc(),
        }
        self.order_operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    /// Helper to record a version-guard conflict
    pub fn record_conflict(&self, operation: &str) {
        self.order_conflicts.with_label_values(&[operation]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    /// Helper to record retry outcome
    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        if success {
            self.retry_success.with_label_values(&[operation]).inc();
        } else {
            self.retry_failure.with_label_values(&[operation]).inc();
        }
    }

    pub fn record_discount_rate(&self, rate: &str) {
        self.discount_tiers_applied.with_label_values(&[rate]).inc();
    }

    pub fn record_auto_cancel(&self, previous_status: &str) {
        self.orders_auto_cancelled.with_label_values(&[previous_status]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("add_to_cart", 0.01, Ok(()));
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_operation_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("cancel_item", 0.002, Ok(()));
        metrics.record_operation("cancel_item", 0.001, Err("permission_denied"));
        metrics.record_operation("cancel_item", 0.001, Err("permission_denied"));

        assert_eq!(metrics.order_operations.with_label_values(&["cancel_item"]).get(), 1);
        assert_eq!(
            metrics
                .order_rejections
                .with_label_values(&["cancel_item", "permission_denied"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .order_operation_duration
                .with_label_values(&["cancel_item"])
                .get_sample_count(),
            3
        );
    }

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_conflict("add_to_cart");
        metrics.record_retry_attempt("add_to_cart", 2);
        metrics.record_retry_outcome("add_to_cart", true);

        assert_eq!(metrics.order_conflicts.with_label_values(&["add_to_cart"]).get(), 1);
        assert_eq!(metrics.retry_attempts_total.with_label_values(&["add_to_cart", "2"]).get(), 1);
        assert_eq!(metrics.retry_success.with_label_values(&["add_to_cart"]).get(), 1);
        assert_eq!(metrics.retry_failure.with_label_values(&["add_to_cart"]).get(), 0);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let metrics = Metrics::new().unwrap();
        let again = IntCounterVec::new(
            Opts::new("order_operations_total", "dup"),
            &["operation"],
        )
        .unwrap();
        assert!(metrics.registry().register(Box::new(again)).is_err());
    }
}
