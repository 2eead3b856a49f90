//! Benchmark utilities and performance testing
//!
//! Simple wall-clock measurements of the generic and compiled paths; the
//! criterion suites under `benches/` are the real numbers.

use std::time::{Duration, Instant};

use crate::codec::Codec;
use crate::error::Result;
use crate::schema::Schema;
use crate::value::Value;

/// Simple benchmark statistics
#[derive(Debug, Clone)]
pub struct BenchStats {
    /// Number of operations
    pub count: usize,
    /// Total duration
    pub total_duration: Duration,
    /// Average time per operation
    pub avg_ns_per_op: u64,
    /// Operations per second
    pub ops_per_sec: f64,
}

impl BenchStats {
    /// Create new stats from measurements
    pub fn new(count: usize, total_duration: Duration) -> Self {
        let total_ns = total_duration.as_nanos() as u64;
        let avg_ns_per_op = if count > 0 {
            total_ns / count as u64
        } else {
            0
        };
        let ops_per_sec = if total_ns > 0 {
            (count as f64) * 1_000_000_000.0 / (total_ns as f64)
        } else {
            0.0
        };

        Self {
            count,
            total_duration,
            avg_ns_per_op,
            ops_per_sec,
        }
    }
}

impl std::fmt::Display for BenchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ops, {:.2}ms total, {} ns/op, {:.0} ops/sec",
            self.count,
            self.total_duration.as_secs_f64() * 1000.0,
            self.avg_ns_per_op,
            self.ops_per_sec
        )
    }
}

/// Order record with some variation per index
pub fn sample_order(i: usize) -> Value {
    let symbol = if i % 3 == 0 { "AAPL" } else { "MSFT" };
    let note = if i % 5 == 0 {
        Value::from("test note")
    } else {
        Value::Null
    };
    Value::object([
        ("seq", Value::from(i as f64)),
        ("ts", Value::Date(1_700_000_000_000 + i as i64)),
        ("price", Value::from(50.0 + (i % 1000) as f64 / 100.0)),
        ("qty", Value::from((100 + i % 900) as f64)),
        ("symbol", Value::from(symbol)),
        ("note", note),
    ])
}

/// Schema of [`sample_order`]
pub fn order_schema() -> Schema {
    Schema::object([
        ("seq", Schema::PositiveInteger),
        ("ts", Schema::Date),
        ("price", Schema::Number),
        ("qty", Schema::Integer),
        ("symbol", Schema::String),
        ("note", Schema::nullable(Schema::String)),
    ])
}

/// Benchmark self-describing encoding with inference
pub fn bench_generic_encode(count: usize) -> Result<BenchStats> {
    let codec = Codec::new();
    let start = Instant::now();

    for i in 0..count {
        let bytes = codec.encode(&sample_order(i), None)?;
        std::hint::black_box(bytes);
    }

    Ok(BenchStats::new(count, start.elapsed()))
}

/// Benchmark compiled encoding
pub fn bench_compiled_encode(count: usize) -> Result<BenchStats> {
    let compiled = Codec::new().compile(order_schema())?;
    let start = Instant::now();

    for i in 0..count {
        let bytes = compiled.encode(&sample_order(i))?;
        std::hint::black_box(bytes);
    }

    Ok(BenchStats::new(count, start.elapsed()))
}

/// Benchmark compiled decoding of pre-encoded payloads
pub fn bench_compiled_decode(count: usize) -> Result<BenchStats> {
    let compiled = Codec::new().compile(order_schema())?;
    let payloads = (0..count)
        .map(|i| compiled.encode(&sample_order(i)))
        .collect::<Result<Vec<_>>>()?;

    let start = Instant::now();
    for payload in &payloads {
        let value = compiled.decode(payload)?;
        std::hint::black_box(value);
    }

    Ok(BenchStats::new(count, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bench_stats() {
        let stats = BenchStats::new(1000, Duration::from_nanos(1_000_000));
        assert_eq!(stats.count, 1000);
        assert_eq!(stats.avg_ns_per_op, 1000);
        assert!((stats.ops_per_sec - 1_000_000.0).abs() < 0.1);
    }

    #[test]
    fn test_generic_encode_bench() {
        let stats = bench_generic_encode(100).unwrap();
        assert_eq!(stats.count, 100);
        assert!(stats.ops_per_sec > 0.0);
    }

    #[test]
    fn test_compiled_benches() {
        assert_eq!(bench_compiled_encode(50).unwrap().count, 50);
        assert_eq!(bench_compiled_decode(50).unwrap().count, 50);
    }

    #[test]
    fn test_sample_matches_schema() {
        let codec = Codec::new();
        for i in 0..10 {
            let value = sample_order(i);
            let bytes = codec.encode(&value, Some(&order_schema())).unwrap();
            assert!(codec.decode(&bytes).unwrap().deep_eq(&value));
        }
    }
}
