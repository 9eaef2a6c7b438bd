// Prometheus metrics definitions for the Eras server.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Live WebSocket connections.
    pub static ref CONNECTED_WEBSOCKETS: IntGauge =
        IntGauge::new("eras_connected_websockets", "Live WebSocket connections").unwrap();

    /// Current phase: 0 lobby, 1 playing, 2 ended.
    pub static ref GAME_PHASE: IntGauge =
        IntGauge::new("eras_game_phase", "Current game phase (0 lobby, 1 playing, 2 ended)").unwrap();

    /// Attacks currently filling.
    pub static ref ACTIVE_ATTACKS: IntGauge =
        IntGauge::new("eras_active_attacks", "Attacks currently filling").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    pub static ref TICKS_TOTAL: IntCounter =
        IntCounter::new("eras_ticks_total", "Simulation ticks processed").unwrap();

    /// Client commands, by command type and outcome (accepted, rejected, malformed).
    pub static ref COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("eras_commands_total", "Client commands received"),
        &["command", "outcome"],
    )
    .unwrap();

    /// Territories captured by completed attacks, by attacker kind.
    pub static ref CAPTURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("eras_captures_total", "Territories captured by attacks"),
        &["attacker_kind"],
    )
    .unwrap();

    /// Factions reduced to zero territories, by kind.
    pub static ref ELIMINATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("eras_eliminations_total", "Factions eliminated"),
        &["kind"],
    )
    .unwrap();

    pub static ref ZOMBIE_CONVERSIONS_TOTAL: IntCounter = IntCounter::new(
        "eras_zombie_conversions_total",
        "Territories taken by the zombie horde",
    )
    .unwrap();

    pub static ref MATCHES_STARTED_TOTAL: IntCounter =
        IntCounter::new("eras_matches_started_total", "Matches started").unwrap();

    /// Matches finished, by outcome (horde, survivors).
    pub static ref MATCHES_ENDED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("eras_matches_ended_total", "Matches finished"),
        &["outcome"],
    )
    .unwrap();

    /// Full-state snapshots published to sessions.
    pub static ref BROADCASTS_TOTAL: IntCounter =
        IntCounter::new("eras_broadcasts_total", "State snapshots broadcast").unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Per-tick processing time in milliseconds.
    pub static ref TICK_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("eras_tick_duration_ms", "Per-tick processing time in ms")
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0]),
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(CONNECTED_WEBSOCKETS.clone()),
            Box::new(GAME_PHASE.clone()),
            Box::new(ACTIVE_ATTACKS.clone()),
            Box::new(TICKS_TOTAL.clone()),
            Box::new(COMMANDS_TOTAL.clone()),
            Box::new(CAPTURES_TOTAL.clone()),
            Box::new(ELIMINATIONS_TOTAL.clone()),
            Box::new(ZOMBIE_CONVERSIONS_TOTAL.clone()),
            Box::new(MATCHES_STARTED_TOTAL.clone()),
            Box::new(MATCHES_ENDED_TOTAL.clone()),
            Box::new(BROADCASTS_TOTAL.clone()),
            Box::new(TICK_DURATION_MS.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::warn!("Failed to register metric: {e}");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
