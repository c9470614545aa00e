//! Minimal metrics registry for the hub.
//!
//! Counter and gauge types with dynamic labels backed by `DashMap`. Labels
//! are flattened into sorted key vectors to keep deterministic ordering.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

/// `name` or `name{k="v",...}`.
fn series(name: &str, key: &LabelKey) -> String {
    if key.is_empty() {
        return name.to_string();
    }
    let label_str = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}{{{label_str}}}")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for one label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{} {}", series(name, r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{} {}", series(name, r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct HubMetrics {
    pub ws_upgrades: CounterVec,
    pub tls_handshake_failures: CounterVec,
    pub channels_accepted: CounterVec,
    pub channels_active: GaugeVec,
    pub channels_closed: CounterVec,
    pub identity_unresolved: CounterVec,
    pub frames_in: CounterVec,
    pub frames_out: CounterVec,
    pub envelope_errors: CounterVec,
    pub acks_sent: CounterVec,
    draining: AtomicBool,
}

impl HubMetrics {
    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render all registered metrics plus any extra lines provided by callers.
    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.ws_upgrades.render("agentwire_ws_upgrades_total", &mut out);
        self.tls_handshake_failures
            .render("agentwire_tls_handshake_failures_total", &mut out);
        self.channels_accepted
            .render("agentwire_channels_accepted_total", &mut out);
        self.channels_active.render("agentwire_channels_active", &mut out);
        self.channels_closed
            .render("agentwire_channels_closed_total", &mut out);
        self.identity_unresolved
            .render("agentwire_identity_unresolved_total", &mut out);
        self.frames_in.render("agentwire_frames_in_total", &mut out);
        self.frames_out.render("agentwire_frames_out_total", &mut out);
        self.envelope_errors
            .render("agentwire_envelope_errors_total", &mut out);
        self.acks_sent.render("agentwire_acks_sent_total", &mut out);

        let draining = if self.is_draining() { 1 } else { 0 };
        let _ = writeln!(
            out,
            "# TYPE agentwire_draining gauge\nagentwire_draining {}",
            draining
        );
        for (k, v) in extra {
            let _ = writeln!(out, "{} {}", k, v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_order_independent() {
        let c = CounterVec::default();
        c.inc(&[("a", "1"), ("b", "2")]);
        c.inc(&[("b", "2"), ("a", "1")]);
        assert_eq!(c.get(&[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn render_prometheus_text() {
        let m = HubMetrics::default();
        m.channels_accepted.inc(&[]);
        m.channels_closed.inc(&[("reason", "peer_closed")]);
        m.envelope_errors.inc(&[("code", "say \"hi\"")]);
        m.channels_active.inc(&[]);
        m.channels_active.dec(&[]);

        let out = m.render(&[("agentwire_channels_live", 0)]);
        assert!(out.contains("agentwire_channels_accepted_total 1\n"), "{out}");
        assert!(out.contains("agentwire_channels_closed_total{reason=\"peer_closed\"} 1"), "{out}");
        assert!(out.contains("code=\"say \\\"hi\\\"\""), "{out}");
        assert!(out.contains("agentwire_channels_active 0\n"), "{out}");
        assert!(out.contains("agentwire_draining 0"), "{out}");
        assert!(out.contains("agentwire_channels_live 0"), "{out}");
    }
}
