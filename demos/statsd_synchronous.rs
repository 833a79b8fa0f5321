use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use metrics_exporter_statsd::{Metric, Registry, StatsdBuilder};

/// A minimal registry: one counter and one gauge, updated by the main loop.
#[derive(Default)]
struct DemoRegistry {
    requests: AtomicI64,
    queue_depth: AtomicI64,
}

impl Registry for DemoRegistry {
    fn for_each(&self, f: &mut dyn FnMut(&str, Metric)) {
        f("demo.requests", Metric::Counter(self.requests.load(Ordering::Relaxed)));
        f("demo.queue_depth", Metric::Gauge(self.queue_depth.load(Ordering::Relaxed)));
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(DemoRegistry::default());

    StatsdBuilder::default()
        .with_remote_address("localhost:8125")
        .expect("failed to parse remote address")
        .with_sample_interval(Duration::from_secs(1))
        .build(Arc::clone(&registry))
        .expect("failed to build statsd exporter")
        .detach();

    // Loop over and over, pretending to do some work.
    loop {
        registry.requests.fetch_add(1, Ordering::Relaxed);
        registry.queue_depth.store(i64::from(rand_ish()), Ordering::Relaxed);
        thread::sleep(Duration::from_millis(250));
    }
}

/// Cheap wobble for the gauge so the collector sees something moving.
fn rand_ish() -> u8 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 32) as u8
}
