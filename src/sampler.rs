use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::debug;

use crate::{formatter::LineFormatter, queue::LineSender, registry::Registry};

/// Drives the sampling loop: one synchronous registry sweep per interval.
///
/// The sampler is fully decoupled from the network path. Its only blocking
/// point is the sleep between rounds, and enqueueing never blocks, so a slow
/// or unreachable collector can never stall metric producers. The sampler owns
/// the queue's only sender; when it exits, the queue closes and the forwarder
/// drains out.
pub(crate) struct Sampler<R> {
    registry: R,
    lines: LineSender,
    formatter: LineFormatter,
    sample_interval: Duration,
    shutdown: Receiver<()>,
}

impl<R> Sampler<R>
where
    R: Registry,
{
    pub fn new(
        registry: R,
        lines: LineSender,
        sample_interval: Duration,
        shutdown: Receiver<()>,
    ) -> Self {
        Sampler { registry, lines, formatter: LineFormatter::new(), sample_interval, shutdown }
    }

    /// Runs sampling rounds until shutdown is signalled.
    ///
    /// The inter-round sleep doubles as the shutdown wait, so the loop exits
    /// promptly instead of finishing a full interval first.
    pub fn run(mut self) {
        loop {
            self.sample_once();

            match self.shutdown.recv_timeout(self.sample_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Sampler shutting down.");
    }

    fn sample_once(&mut self) {
        let Self { registry, lines, formatter, .. } = self;

        registry.for_each(&mut |name, metric| {
            formatter.emit(name, &metric, |line| lines.push(line));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use crossbeam_channel::bounded;

    use super::Sampler;
    use crate::{
        queue::line_queue,
        registry::{Metric, Registry},
    };

    struct StaticRegistry(Vec<(String, Metric)>);

    impl Registry for StaticRegistry {
        fn for_each(&self, f: &mut dyn FnMut(&str, Metric)) {
            for (name, metric) in &self.0 {
                f(name, metric.clone());
            }
        }
    }

    #[test]
    fn one_round_enqueues_lines_in_iteration_order() {
        let registry = StaticRegistry(vec![
            ("requests".to_string(), Metric::Counter(42)),
            ("queue.depth".to_string(), Metric::Gauge(7)),
        ]);

        let (tx, rx) = line_queue(16);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        // A long interval guarantees exactly one round before shutdown.
        let sampler = Sampler::new(registry, tx, Duration::from_secs(60), shutdown_rx);
        let handle = thread::spawn(move || sampler.run());

        shutdown_tx.send(()).unwrap();
        handle.join().unwrap();

        // The sampler was the only sender, so the queue is now closed and
        // drains exactly the round's lines.
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["requests:42|kv\n".to_string(), "queue.depth:7|kv\n".to_string()]);
    }

    #[test]
    fn dropped_shutdown_channel_stops_the_loop() {
        let registry = StaticRegistry(Vec::new());
        let (tx, _rx) = line_queue(4);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        drop(shutdown_tx);

        let sampler = Sampler::new(registry, tx, Duration::from_secs(60), shutdown_rx);

        // Runs a single round and returns instead of sleeping forever.
        sampler.run();
    }
}
