use std::{net::SocketAddr, thread, time::Duration};

use crossbeam_channel::{bounded, Sender};
use thiserror::Error;

use crate::{
    forwarder::{sync::Forwarder, ForwarderConfiguration, RemoteAddr},
    queue,
    registry::Registry,
    sampler::Sampler,
};

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_PACKET_LEN: usize = 1400;
const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// The smallest line the formatter can produce; a packet must at least fit it.
const SMALLEST_VALID_LINE: &str = "a:0|kv\n";

/// Errors that could occur while building a statsd exporter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse or resolve the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// A configured value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Details about the offending value.
        reason: String,
    },

    /// Failed to spawn a background thread for the exporter.
    #[error("failed to spawn background thread for exporter")]
    Backend,
}

/// Builder for a statsd exporter.
pub struct StatsdBuilder {
    remote_addr: RemoteAddr,
    sample_interval: Duration,
    flush_interval: Duration,
    reconnect_cooldown: Duration,
    write_timeout: Duration,
    max_packet_len: usize,
    queue_capacity: usize,
}

impl StatsdBuilder {
    /// Set the remote address to forward metrics to.
    ///
    /// The address needs to be in the format of `<host>:<port>`, and is
    /// resolved once, when the builder is configured.
    ///
    /// Defaults to sending to `127.0.0.1:8125`.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an
    /// error will be returned indicating the reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addr = RemoteAddr::try_from(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the interval at which the registry is sampled.
    ///
    /// Every interval, the registry is iterated once and a snapshot of every
    /// metric is formatted and enqueued for forwarding.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Set the interval at which a partially-filled packet is flushed.
    ///
    /// This bounds how long a formatted line can sit in the packet buffer
    /// waiting for the buffer to fill up. It is independent of the sample
    /// interval.
    ///
    /// Defaults to 100 milliseconds.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set how long the exporter waits before reconnecting after a failure.
    ///
    /// While waiting, queued lines are discarded so that backlog stays
    /// bounded; no reconnect is attempted until the cooldown elapses, which
    /// avoids hot-looping against an unreachable collector.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = cooldown;
        self
    }

    /// Set the write timeout for forwarding packets.
    ///
    /// When the write timeout is reached, the write is treated like any other
    /// write failure: the packet is dropped and the exporter enters its
    /// reconnect cooldown.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the maximum packet length.
    ///
    /// Formatted lines are batched into packets no larger than this, except
    /// when a single line is larger by itself, in which case it is sent alone.
    ///
    /// Defaults to 1400 bytes.
    #[must_use]
    pub fn with_maximum_packet_length(mut self, max_packet_len: usize) -> Self {
        self.max_packet_len = max_packet_len;
        self
    }

    /// Set the capacity of the line queue between the sampler and the
    /// forwarder.
    ///
    /// When the queue is full, newly formatted lines are dropped rather than
    /// blocking the sampling loop.
    ///
    /// Defaults to 4096 lines.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Builds the exporter and spawns its background threads.
    ///
    /// One thread samples `registry` on the configured interval; the other
    /// batches the resulting lines into packets and forwards them. The two
    /// communicate only through the bounded line queue, so registry producers
    /// are never blocked by the network.
    ///
    /// # Errors
    ///
    /// If a configured value is out of range, or if a background thread could
    /// not be spawned, an error is returned.
    pub fn build<R>(self, registry: R) -> Result<StatsdExporter, BuildError>
    where
        R: Registry + Send + 'static,
    {
        if self.max_packet_len < SMALLEST_VALID_LINE.len() {
            return Err(BuildError::InvalidConfiguration {
                reason: format!(
                    "maximum packet length must be at least {} bytes",
                    SMALLEST_VALID_LINE.len()
                ),
            });
        }

        if self.queue_capacity == 0 {
            return Err(BuildError::InvalidConfiguration {
                reason: "queue capacity must be non-zero".to_string(),
            });
        }

        let (line_tx, line_rx) = queue::line_queue(self.queue_capacity);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let forwarder_config = ForwarderConfiguration {
            remote_addr: self.remote_addr,
            max_packet_len: self.max_packet_len,
            flush_interval: self.flush_interval,
            reconnect_cooldown: self.reconnect_cooldown,
            write_timeout: self.write_timeout,
        };

        let forwarder = Forwarder::new(forwarder_config, line_rx);
        let forwarder_handle = thread::Builder::new()
            .name("statsd-exporter-forwarder".to_string())
            .spawn(move || forwarder.run())
            .map_err(|_| BuildError::Backend)?;

        let sampler = Sampler::new(registry, line_tx, self.sample_interval, shutdown_rx);
        let sampler_handle = thread::Builder::new()
            .name("statsd-exporter-sampler".to_string())
            .spawn(move || sampler.run())
            .map_err(|_| BuildError::Backend)?;

        Ok(StatsdExporter {
            shutdown: shutdown_tx,
            sampler: sampler_handle,
            forwarder: forwarder_handle,
        })
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            remote_addr: RemoteAddr(vec![SocketAddr::from(([127, 0, 0, 1], 8125))]),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            reconnect_cooldown: DEFAULT_RECONNECT_COOLDOWN,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Handle to a running statsd exporter.
///
/// Dropping the handle shuts the exporter down the same way [`shutdown`]
/// does, just without waiting for the background threads; call [`detach`] to
/// let the exporter run for the remaining life of the process instead.
///
/// [`shutdown`]: StatsdExporter::shutdown
/// [`detach`]: StatsdExporter::detach
pub struct StatsdExporter {
    shutdown: Sender<()>,
    sampler: thread::JoinHandle<()>,
    forwarder: thread::JoinHandle<()>,
}

impl StatsdExporter {
    /// Shuts the exporter down and waits for its background threads.
    ///
    /// The sampler stops promptly, which closes the line queue; the forwarder
    /// drains whatever the queue still holds up to the close point and then
    /// exits. A final partially-filled packet is not flushed -- delivery is
    /// best-effort to the end.
    pub fn shutdown(self) {
        let _ = self.shutdown.try_send(());
        let _ = self.sampler.join();
        let _ = self.forwarder.join();
    }

    /// Detaches the background threads, leaving the exporter running for the
    /// remaining life of the process.
    pub fn detach(self) {
        // Leaking the sender keeps the shutdown channel open forever, so the
        // sampler never observes a disconnect.
        std::mem::forget(self.shutdown);
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::{BuildError, StatsdBuilder};
    use crate::registry::{Metric, Registry};

    struct StaticRegistry(Vec<(String, Metric)>);

    impl Registry for StaticRegistry {
        fn for_each(&self, f: &mut dyn FnMut(&str, Metric)) {
            for (name, metric) in &self.0 {
                f(name, metric.clone());
            }
        }
    }

    #[test]
    fn rejects_invalid_remote_address() {
        let result = StatsdBuilder::default().with_remote_address("not an address");
        assert!(matches!(result, Err(BuildError::InvalidRemoteAddress { .. })));
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let result = StatsdBuilder::default()
            .with_queue_capacity(0)
            .build(StaticRegistry(Vec::new()));
        assert!(matches!(result, Err(BuildError::InvalidConfiguration { .. })));
    }

    #[test]
    fn rejects_tiny_packet_length() {
        let result = StatsdBuilder::default()
            .with_maximum_packet_length(3)
            .build(StaticRegistry(Vec::new()));
        assert!(matches!(result, Err(BuildError::InvalidConfiguration { .. })));
    }

    #[test]
    fn end_to_end_counter_reaches_the_collector() {
        let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
        collector.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let addr = collector.local_addr().unwrap();

        let registry = StaticRegistry(vec![("requests".to_string(), Metric::Counter(42))]);

        let exporter = StatsdBuilder::default()
            .with_remote_address(addr.to_string())
            .unwrap()
            .with_sample_interval(Duration::from_millis(20))
            .with_flush_interval(Duration::from_millis(10))
            .build(registry)
            .unwrap();

        let mut buf = [0u8; 2048];
        let len = collector.recv(&mut buf).unwrap();
        let packet = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(packet.contains("requests:42|kv\n"));

        exporter.shutdown();
    }
}
