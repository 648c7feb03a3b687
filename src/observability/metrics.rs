use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub push_deliveries_total: IntCounterVec,
    pub positions_ingested_total: IntCounter,
    pub ws_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "mission_transitions_total",
                "Mission lifecycle transitions by kind and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid mission_transitions_total metric");

        let push_deliveries_total = IntCounterVec::new(
            Opts::new(
                "push_deliveries_total",
                "Push notification deliveries by outcome",
            ),
            &["outcome"],
        )
        .expect("valid push_deliveries_total metric");

        let positions_ingested_total = IntCounter::new(
            "positions_ingested_total",
            "Total accepted position samples",
        )
        .expect("valid positions_ingested_total metric");

        let ws_sessions = IntGauge::new("ws_sessions", "Currently open real-time sessions")
            .expect("valid ws_sessions metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register mission_transitions_total");
        registry
            .register(Box::new(push_deliveries_total.clone()))
            .expect("register push_deliveries_total");
        registry
            .register(Box::new(positions_ingested_total.clone()))
            .expect("register positions_ingested_total");
        registry
            .register(Box::new(ws_sessions.clone()))
            .expect("register ws_sessions");

        Self {
            registry,
            transitions_total,
            push_deliveries_total,
            positions_ingested_total,
            ws_sessions,
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
