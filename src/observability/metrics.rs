use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub delivery_transitions_total: IntCounterVec,
    pub rejected_transitions_total: IntCounterVec,
    pub cost_settlements_total: IntCounterVec,
    pub staff_workload: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let delivery_transitions_total = IntCounterVec::new(
            Opts::new(
                "delivery_transitions_total",
                "Accepted delivery status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid delivery_transitions_total metric");

        let rejected_transitions_total = IntCounterVec::new(
            Opts::new(
                "rejected_transitions_total",
                "Lifecycle actions refused by a guard",
            ),
            &["action"],
        )
        .expect("valid rejected_transitions_total metric");

        let cost_settlements_total = IntCounterVec::new(
            Opts::new("cost_settlements_total", "Settlement changes on delivery costs"),
            &["action"],
        )
        .expect("valid cost_settlements_total metric");

        let staff_workload = IntGaugeVec::new(
            Opts::new(
                "staff_workload",
                "Deliveries held by a staff member on their most recent assignment day",
            ),
            &["staff_id"],
        )
        .expect("valid staff_workload metric");

        registry
            .register(Box::new(delivery_transitions_total.clone()))
            .expect("register delivery_transitions_total");
        registry
            .register(Box::new(rejected_transitions_total.clone()))
            .expect("register rejected_transitions_total");
        registry
            .register(Box::new(cost_settlements_total.clone()))
            .expect("register cost_settlements_total");
        registry
            .register(Box::new(staff_workload.clone()))
            .expect("register staff_workload");

        Self {
            registry,
            delivery_transitions_total,
            rejected_transitions_total,
            cost_settlements_total,
            staff_workload,
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
