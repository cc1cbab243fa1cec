//! Lock-free latency histogram with Prometheus text output.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bounds of the histogram buckets, in microseconds.
/// Counter updates range from in-memory (a few μs) to fsynced RocksDB writes.
pub const LATENCY_BUCKETS_US: [u64; 10] = [
    5, 10, 25, 50, 100, 250, 1_000, 5_000, 25_000, 100_000,
];

pub const BUCKETS: usize = LATENCY_BUCKETS_US.len();

/// Point-in-time copy of a histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramSnapshot {
    pub sum: u64,
    pub count: u64,
    /// Cumulative counts, one per entry of `LATENCY_BUCKETS_US`
    pub buckets: [u64; BUCKETS],
}

/// Thread-safe histogram of microsecond latencies.
///
/// # Example
///
/// ```
/// use seqstore::metrics::Histogram;
///
/// let histogram = Histogram::new();
/// histogram.observe(40);
///
/// let snapshot = histogram.snapshot();
/// assert_eq!(snapshot.count, 1);
/// assert_eq!(snapshot.sum, 40);
/// ```
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    buckets: [AtomicU64; BUCKETS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records one observation in microseconds.
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        // Buckets are cumulative: bump every bucket whose bound covers the value
        for (bucket, &bound) in self.buckets.iter().zip(LATENCY_BUCKETS_US.iter()) {
            if value_us <= bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            buckets: std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed)),
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Renders the histogram in Prometheus exposition format.
    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let snapshot = self.snapshot();
        let mut output = String::with_capacity(768);

        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (count, bound) in snapshot.buckets.iter().zip(LATENCY_BUCKETS_US.iter()) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, bound, count);
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, snapshot.count);
        let _ = writeln!(output, "{}_sum {}", name, snapshot.sum);
        let _ = writeln!(output, "{}_count {}", name, snapshot.count);

        output
    }
}
