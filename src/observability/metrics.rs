use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub fulfillments_total: IntCounterVec,
    pub fulfillment_latency_seconds: HistogramVec,
    pub payment_events_in_queue: IntGauge,
    pub assignment_transitions_total: IntCounterVec,
    pub loyalty_updates_total: IntCounterVec,
    pub workers_by_availability: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let fulfillments_total = IntCounterVec::new(
            Opts::new("fulfillments_total", "Total fulfillment runs by outcome"),
            &["outcome"],
        )
        .expect("valid fulfillments_total metric");

        let fulfillment_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fulfillment_latency_seconds",
                "Latency of fulfillment runs in seconds",
            ),
            &["outcome"],
        )
        .expect("valid fulfillment_latency_seconds metric");

        let payment_events_in_queue = IntGauge::new(
            "payment_events_in_queue",
            "Payment completed events waiting for the fulfillment engine",
        )
        .expect("valid payment_events_in_queue metric");

        let assignment_transitions_total = IntCounterVec::new(
            Opts::new(
                "assignment_transitions_total",
                "Assignment state machine transitions",
            ),
            &["transition"],
        )
        .expect("valid assignment_transitions_total metric");

        let loyalty_updates_total = IntCounterVec::new(
            Opts::new("loyalty_updates_total", "Loyalty recalculations by resulting tier"),
            &["tier"],
        )
        .expect("valid loyalty_updates_total metric");

        let workers_by_availability = IntGaugeVec::new(
            Opts::new("workers_by_availability", "Delivery workers per availability"),
            &["availability"],
        )
        .expect("valid workers_by_availability metric");

        registry
            .register(Box::new(fulfillments_total.clone()))
            .expect("register fulfillments_total");
        registry
            .register(Box::new(fulfillment_latency_seconds.clone()))
            .expect("register fulfillment_latency_seconds");
        registry
            .register(Box::new(payment_events_in_queue.clone()))
            .expect("register payment_events_in_queue");
        registry
            .register(Box::new(assignment_transitions_total.clone()))
            .expect("register assignment_transitions_total");
        registry
            .register(Box::new(loyalty_updates_total.clone()))
            .expect("register loyalty_updates_total");
        registry
            .register(Box::new(workers_by_availability.clone()))
            .expect("register workers_by_availability");

        Self {
            registry,
            fulfillments_total,
            fulfillment_latency_seconds,
            payment_events_in_queue,
            assignment_transitions_total,
            loyalty_updates_total,
            workers_by_availability,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
