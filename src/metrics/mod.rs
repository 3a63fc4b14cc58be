use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::order::OrderStatus;

// ============================================================================
// Metrics Module - Prometheus metrics for the order engine
// ============================================================================
//
// Provides metrics for:
// - Order creation (throughput, latency, rejections by reason)
// - Stock reserved by successful orders
// - Reference collisions and retried creation attempts
// - Status transitions
//
// All metrics are registered with one registry and scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order creation
    pub orders_created: IntCounter,
    pub order_rejections: IntCounterVec,
    pub order_create_duration: Histogram,
    pub order_attempt_retries: IntCounter,

    // Stock and references
    pub stock_units_reserved: IntCounter,
    pub reference_collisions: IntCounter,

    // Lifecycle
    pub status_transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_rejections = IntCounterVec::new(
            Opts::new("order_rejections_total", "Order operations rejected, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(order_rejections.clone()))?;

        let order_create_duration = Histogram::with_opts(
            HistogramOpts::new("order_create_duration_seconds", "Order creation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(order_create_duration.clone()))?;

        let order_attempt_retries = IntCounter::new(
            "order_attempt_retries_total",
            "Order creation attempts re-run after a transient store conflict",
        )?;
        registry.register(Box::new(order_attempt_retries.clone()))?;

        let stock_units_reserved = IntCounter::new(
            "stock_units_reserved_total",
            "Product units reserved by committed orders",
        )?;
        registry.register(Box::new(stock_units_reserved.clone()))?;

        let reference_collisions = IntCounter::new(
            "reference_collisions_total",
            "Order reference candidates rejected because they were taken",
        )?;
        registry.register(Box::new(reference_collisions.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_rejections,
            order_create_duration,
            order_attempt_retries,
            stock_units_reserved,
            reference_collisions,
            status_transitions,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self, units_reserved: u64, duration_secs: f64) {
        self.orders_created.inc();
        self.stock_units_reserved.inc_by(units_reserved);
        self.order_create_duration.observe(duration_secs);
    }

    pub fn record_rejection(&self, reason: &str) {
        self.order_rejections.with_label_values(&[reason]).inc();
    }

    pub fn record_reference_collisions(&self, count: u32) {
        self.reference_collisions.inc_by(count as u64);
    }

    pub fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
        self.status_transitions
            .with_label_values(&[&from.to_string(), &to.to_string()])
            .inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection("insufficient_stock");
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_order_created() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created(3, 0.02);

        let gathered = metrics.registry().gather();
        let created = gathered.iter().find(|m| m.name() == "orders_created_total").unwrap();
        assert_eq!(created.metric[0].counter.value, Some(1.0));

        let reserved = gathered.iter().find(|m| m.name() == "stock_units_reserved_total").unwrap();
        assert_eq!(reserved.metric[0].counter.value, Some(3.0));
    }

    #[test]
    fn test_record_rejections_by_reason() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection("insufficient_stock");
        metrics.record_rejection("product_not_found");
        metrics.record_rejection("insufficient_stock");

        let gathered = metrics.registry().gather();
        let rejections = gathered.iter().find(|m| m.name() == "order_rejections_total").unwrap();
        assert_eq!(rejections.metric.len(), 2);
    }

    #[test]
    fn test_render_contains_transitions() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition(OrderStatus::Pending, OrderStatus::Ready);

        let text = metrics.render().unwrap();
        assert!(text.contains("order_status_transitions_total"));
        assert!(text.contains("from=\"PENDING\""));
    }
}
