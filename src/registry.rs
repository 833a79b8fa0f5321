use std::sync::Arc;

/// A source of metrics to export.
///
/// The exporter treats the registry as an opaque collaborator: once per
/// sampling round it is iterated synchronously, in whatever order the registry
/// chooses, and is never mutated. All statistical work -- percentiles, rates,
/// distributions -- happens upstream; the exporter only reads the snapshots
/// the registry hands out.
pub trait Registry {
    /// Calls `f` once for every registered metric, passing the metric's name
    /// and a point-in-time snapshot of its value.
    fn for_each(&self, f: &mut dyn FnMut(&str, Metric));
}

impl<R> Registry for Arc<R>
where
    R: Registry + ?Sized,
{
    fn for_each(&self, f: &mut dyn FnMut(&str, Metric)) {
        (**self).for_each(f);
    }
}

/// A point-in-time snapshot of a single metric.
///
/// A snapshot is taken once, at iteration time, so every wire line emitted for
/// one metric is derived from the same underlying state. The set of kinds is
/// closed and stable, which lets the formatter match on it exhaustively.
#[derive(Clone, Debug)]
pub enum Metric {
    /// An integer event count.
    Counter(i64),

    /// An instantaneous integer value.
    Gauge(i64),

    /// An instantaneous floating-point value.
    GaugeFloat(f64),

    /// A sampled distribution of values.
    Histogram(HistogramSnapshot),

    /// An event rate tracker.
    Meter(MeterSnapshot),

    /// A rate-annotated histogram, typically of durations.
    Timer(TimerSnapshot),
}

/// Summary statistics for a sampled distribution.
#[derive(Clone, Debug)]
pub struct HistogramSnapshot {
    /// Number of recorded samples.
    pub count: u64,

    /// Smallest recorded sample.
    pub min: f64,

    /// Largest recorded sample.
    pub max: f64,

    /// Arithmetic mean of the recorded samples.
    pub mean: f64,

    /// Standard deviation of the recorded samples.
    pub std_dev: f64,

    percentiles: Vec<(f64, f64)>,
}

impl HistogramSnapshot {
    /// Creates a snapshot from precomputed summary statistics.
    ///
    /// `percentiles` maps quantiles (in the `0.0..=1.0` range) to the sample
    /// value at that quantile. How the upstream computes them is its own
    /// business.
    pub fn new(
        count: u64,
        min: f64,
        max: f64,
        mean: f64,
        std_dev: f64,
        percentiles: Vec<(f64, f64)>,
    ) -> Self {
        HistogramSnapshot { count, min, max, mean, std_dev, percentiles }
    }

    /// Returns the sample value at each requested quantile, in request order.
    ///
    /// The lookup is total: quantiles the upstream did not provide resolve to
    /// `0.0` rather than failing.
    pub fn percentiles(&self, quantiles: &[f64]) -> Vec<f64> {
        quantiles
            .iter()
            .map(|quantile| {
                self.percentiles
                    .iter()
                    .find(|(candidate, _)| (candidate - quantile).abs() < f64::EPSILON)
                    .map_or(0.0, |(_, value)| *value)
            })
            .collect()
    }
}

/// An event count and its rates over the standard reporting windows.
#[derive(Clone, Copy, Debug)]
pub struct MeterSnapshot {
    /// Number of recorded events.
    pub count: u64,

    /// Rates of the recorded events.
    pub rates: RateSet,
}

/// A histogram of durations annotated with the rate at which they occurred.
#[derive(Clone, Debug)]
pub struct TimerSnapshot {
    /// Distribution of the recorded durations.
    pub histogram: HistogramSnapshot,

    /// Rates of the recorded events.
    pub rates: RateSet,
}

/// Event rates over the standard reporting windows.
#[derive(Clone, Copy, Debug)]
pub struct RateSet {
    /// One-minute exponentially-weighted rate.
    pub one_minute: f64,

    /// Five-minute exponentially-weighted rate.
    pub five_minute: f64,

    /// Fifteen-minute exponentially-weighted rate.
    pub fifteen_minute: f64,

    /// Mean rate since the metric was created.
    pub mean: f64,
}
