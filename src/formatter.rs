use crate::registry::{HistogramSnapshot, Metric, RateSet};

/// Quantiles emitted for histograms and timers.
const EMITTED_QUANTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 0.999];

/// Wire suffix appended to every line.
const WIRE_SUFFIX: &str = "|kv";

/// Formats metric snapshots into newline-terminated statsd lines.
///
/// One formatter is owned by the sampling loop and reused across rounds; the
/// integer and float scratch buffers avoid re-allocating per value. Formatting
/// is total -- it cannot fail or block -- and has no side effects beyond the
/// lines it hands to the caller.
pub(crate) struct LineFormatter {
    int_buf: itoa::Buffer,
    float_buf: ryu::Buffer,
}

impl LineFormatter {
    pub fn new() -> Self {
        LineFormatter { int_buf: itoa::Buffer::new(), float_buf: ryu::Buffer::new() }
    }

    /// Emits every wire line for `metric` through `push`, in the fixed order
    /// for its kind.
    ///
    /// All values come from the snapshot taken at iteration time, so the lines
    /// for one metric are internally consistent. Timers emit the histogram
    /// line set followed by the meter line set.
    pub fn emit<F>(&mut self, name: &str, metric: &Metric, mut push: F)
    where
        F: FnMut(String),
    {
        match metric {
            Metric::Counter(count) => push(self.int_line(name, "", *count)),
            Metric::Gauge(value) => push(self.int_line(name, "", *value)),
            Metric::GaugeFloat(value) => push(self.float_line(name, "", *value)),
            Metric::Histogram(histogram) => self.emit_histogram(name, histogram, &mut push),
            Metric::Meter(meter) => self.emit_rates(name, meter.count, &meter.rates, &mut push),
            Metric::Timer(timer) => {
                self.emit_histogram(name, &timer.histogram, &mut push);
                self.emit_rates(name, timer.histogram.count, &timer.rates, &mut push);
            }
        }
    }

    fn emit_histogram<F>(&mut self, name: &str, histogram: &HistogramSnapshot, push: &mut F)
    where
        F: FnMut(String),
    {
        let percentiles = histogram.percentiles(&EMITTED_QUANTILES);

        push(self.int_line(name, ".count", histogram.count));
        push(self.float_line(name, ".min", histogram.min));
        push(self.float_line(name, ".max", histogram.max));
        push(self.float_line(name, ".mean", histogram.mean));
        push(self.float_line(name, ".std-dev", histogram.std_dev));
        push(self.float_line(name, ".50-percentile", percentiles[0]));
        push(self.float_line(name, ".75-percentile", percentiles[1]));
        push(self.float_line(name, ".95-percentile", percentiles[2]));
        push(self.float_line(name, ".99-percentile", percentiles[3]));
        push(self.float_line(name, ".999-percentile", percentiles[4]));
    }

    fn emit_rates<F>(&mut self, name: &str, count: u64, rates: &RateSet, push: &mut F)
    where
        F: FnMut(String),
    {
        push(self.int_line(name, ".count", count));
        push(self.float_line(name, ".one-minute", rates.one_minute));
        push(self.float_line(name, ".five-minute", rates.five_minute));
        push(self.float_line(name, ".fifteen-minute", rates.fifteen_minute));
        push(self.float_line(name, ".mean", rates.mean));
    }

    fn int_line<V>(&mut self, name: &str, suffix: &str, value: V) -> String
    where
        V: itoa::Integer,
    {
        build_line(name, suffix, self.int_buf.format(value))
    }

    fn float_line(&mut self, name: &str, suffix: &str, value: f64) -> String {
        build_line(name, suffix, self.float_buf.format(value))
    }
}

fn build_line(name: &str, suffix: &str, value: &str) -> String {
    let mut line =
        String::with_capacity(name.len() + suffix.len() + value.len() + WIRE_SUFFIX.len() + 2);
    line.push_str(name);
    line.push_str(suffix);
    line.push(':');
    line.push_str(value);
    line.push_str(WIRE_SUFFIX);
    line.push('\n');
    line
}
