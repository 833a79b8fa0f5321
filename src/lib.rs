//! An exporter for relaying metrics to a [statsd]-compatible collector over UDP.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! The exporter samples a metrics registry -- any type implementing
//! [`Registry`] -- at a fixed interval, formats a snapshot of every metric
//! into `<bucket>:<value>|kv` wire lines, and forwards them in size-bounded
//! UDP packets:
//!
//! ```no_run
//! # use metrics_exporter_statsd::{Metric, Registry, StatsdBuilder};
//! # struct AppRegistry;
//! # impl Registry for AppRegistry {
//! #     fn for_each(&self, _f: &mut dyn FnMut(&str, Metric)) {}
//! # }
//! # let registry = AppRegistry;
//! let exporter = StatsdBuilder::default()
//!     .with_remote_address("statsd.internal:8125")
//!     .expect("failed to parse remote address")
//!     .build(registry)
//!     .expect("failed to build statsd exporter");
//!
//! // Keep the handle around to shut the exporter down later, or let it run
//! // for the life of the process:
//! exporter.detach();
//! ```
//!
//! # Behavior
//!
//! ## Best-effort delivery
//!
//! Metrics ride on UDP with no acknowledgment and no retransmission. The
//! exporter never retries a failed packet: on a write failure it drops the
//! packet, logs a warning, and enters a reconnect cooldown before opening a
//! fresh socket. While disconnected it keeps consuming the line queue and
//! discards what it reads, so backlog cannot grow without bound.
//!
//! ## Backpressure
//!
//! The sampling loop and the network path communicate only through a bounded
//! queue with a non-blocking producer side. When the queue is full, newly
//! formatted lines are dropped. Metric producers are never blocked, slowed, or
//! aborted by a slow or unreachable collector.
//!
//! ## Packet batching
//!
//! Formatted lines are accumulated into packets of at most the configured
//! maximum length (1400 bytes by default) and flushed either when the next
//! line would not fit or on a short periodic timer, whichever comes first.
//! Lines are never split across packets.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder, StatsdExporter};

mod formatter;
mod forwarder;
mod packet;
mod queue;

mod registry;
pub use self::registry::{
    HistogramSnapshot, Metric, MeterSnapshot, RateSet, Registry, TimerSnapshot,
};

mod sampler;
