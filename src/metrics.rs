//! Metrics collector for load runs
//!
//! Every worker feeds one [`Sample`] per completed request into a shared
//! [`MetricsCollector`]. Latencies go into an HDR histogram, so memory stays
//! bounded no matter how long the run is. Once all workers are joined,
//! [`MetricsCollector::finalize`] turns the aggregate into a [`MetricsReport`]
//! with percentiles and a small queuing analysis:
//!
//! - arrival rate λ = requests / (last issue − first issue)
//! - service rate μ = successes / (window + wait for the last response)
//! - traffic intensity ρ = λ / μ, [`OVERLOAD_SENTINEL`] when μ is zero

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::Mutex;

/// Traffic intensity reported when nothing succeeded
pub const OVERLOAD_SENTINEL: f64 = 999.0;

/// Outcome of one remote call
#[derive(Debug, Clone)]
pub struct Sample {
    /// When the request was sent
    pub issued_at: Instant,

    pub latency: Duration,

    pub success: bool,

    /// HTTP status, if the service answered
    pub status_code: Option<u16>,

    pub error: Option<String>,
}

impl Sample {
    pub fn success(issued_at: Instant, latency: Duration, status_code: u16) -> Self {
        Self {
            issued_at,
            latency,
            success: true,
            status_code: Some(status_code),
            error: None,
        }
    }

    pub fn failure(
        issued_at: Instant,
        latency: Duration,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            issued_at,
            latency,
            success: false,
            status_code,
            error: Some(error.into()),
        }
    }
}

struct Aggregate {
    latencies: Histogram<u64>,
    first_issued: Option<Instant>,
    last_issued: Option<Instant>,
    last_completed: Option<Instant>,
    status_codes: BTreeMap<u16, u64>,
    errors: BTreeMap<String, u64>,
}

/// Thread-safe running aggregate of request samples
pub struct MetricsCollector {
    requests: AtomicU64,
    successes: AtomicU64,
    aggregate: Mutex<Aggregate>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            aggregate: Mutex::new(Aggregate {
                // auto-resizing histogram, 3 significant digits
                latencies: Histogram::new(3).expect("3 significant digits is a valid precision"),
                first_issued: None,
                last_issued: None,
                last_completed: None,
                status_codes: BTreeMap::new(),
                errors: BTreeMap::new(),
            }),
        }
    }

    pub fn add(&self, sample: Sample) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if sample.success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }

        let completed_at = sample.issued_at + sample.latency;
        let micros = u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX);

        let mut aggregate = self.aggregate.lock();
        aggregate.latencies.saturating_record(micros.max(1));

        aggregate.first_issued = Some(match aggregate.first_issued {
            Some(first) => first.min(sample.issued_at),
            None => sample.issued_at,
        });
        aggregate.last_issued = Some(match aggregate.last_issued {
            Some(last) => last.max(sample.issued_at),
            None => sample.issued_at,
        });
        aggregate.last_completed = Some(match aggregate.last_completed {
            Some(last) => last.max(completed_at),
            None => completed_at,
        });

        if let Some(code) = sample.status_code {
            *aggregate.status_codes.entry(code).or_default() += 1;
        }
        if let Some(error) = sample.error {
            *aggregate.errors.entry(error).or_default() += 1;
        }
    }

    /// Samples added so far
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Compute the final statistics
    ///
    /// Call only after every producer has stopped adding samples.
    pub fn finalize(&self) -> MetricsReport {
        let requests = self.requests();
        let successes = self.successes();
        let aggregate = self.aggregate.lock();

        let latencies = if aggregate.latencies.is_empty() {
            LatencySummary::default()
        } else {
            let h = &aggregate.latencies;
            LatencySummary {
                min: Duration::from_micros(h.min()),
                mean: Duration::from_micros(h.mean().round() as u64),
                p50: Duration::from_micros(h.value_at_quantile(0.50)),
                p95: Duration::from_micros(h.value_at_quantile(0.95)),
                p99: Duration::from_micros(h.value_at_quantile(0.99)),
                max: Duration::from_micros(h.max()),
            }
        };

        let (window, wait) = match (
            aggregate.first_issued,
            aggregate.last_issued,
            aggregate.last_completed,
        ) {
            (Some(first), Some(last), Some(completed)) => (
                last.saturating_duration_since(first),
                completed.saturating_duration_since(last),
            ),
            _ => (Duration::ZERO, Duration::ZERO),
        };

        let success_ratio = if requests == 0 {
            0.0
        } else {
            successes as f64 / requests as f64
        };

        let arrival_rate = if window.is_zero() {
            0.0
        } else {
            requests as f64 / window.as_secs_f64()
        };

        let service_window = window + wait;
        let throughput = if service_window.is_zero() {
            0.0
        } else {
            successes as f64 / service_window.as_secs_f64()
        };

        MetricsReport {
            requests,
            successes,
            failures: requests - successes,
            success_ratio,
            latencies,
            window,
            wait,
            arrival_rate,
            throughput,
            traffic_intensity: traffic_intensity(arrival_rate, throughput),
            status_codes: aggregate.status_codes.clone(),
            errors: aggregate.errors.clone(),
        }
    }
}

/// ρ = λ / μ, or [`OVERLOAD_SENTINEL`] when μ is not positive
pub fn traffic_intensity(arrival_rate: f64, service_rate: f64) -> f64 {
    if service_rate <= 0.0 {
        return OVERLOAD_SENTINEL;
    }
    arrival_rate / service_rate
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

/// Final statistics of a run
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,

    /// Successes / requests, in `[0, 1]`
    pub success_ratio: f64,

    pub latencies: LatencySummary,

    /// First to last request issue
    pub window: Duration,

    /// Time between the last issue and the last response
    pub wait: Duration,

    /// λ, requests per second
    pub arrival_rate: f64,

    /// μ, successful requests per second
    pub throughput: f64,

    /// ρ = λ / μ
    pub traffic_intensity: f64,

    pub status_codes: BTreeMap<u16, u64>,

    /// Failure count per error class
    pub errors: BTreeMap<String, u64>,
}

impl MetricsReport {
    pub fn load(&self) -> LoadAssessment {
        LoadAssessment::from_intensity(self.traffic_intensity)
    }

    pub fn response_time(&self) -> ResponseTimeGrade {
        ResponseTimeGrade::from_mean(self.latencies.mean)
    }

    pub fn is_overloaded(&self) -> bool {
        self.traffic_intensity >= 1.0
    }
}

/// System load derived from traffic intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAssessment {
    Low,
    Moderate,
    High,
    Overloaded,
}

impl LoadAssessment {
    pub fn from_intensity(rho: f64) -> Self {
        if rho >= 1.0 {
            LoadAssessment::Overloaded
        } else if rho >= 0.8 {
            LoadAssessment::High
        } else if rho >= 0.5 {
            LoadAssessment::Moderate
        } else {
            LoadAssessment::Low
        }
    }

    pub fn health(&self) -> &'static str {
        match self {
            LoadAssessment::Overloaded => "system cannot keep up with demand",
            LoadAssessment::High => "system near capacity, consider scaling",
            LoadAssessment::Moderate => "system handling load well",
            LoadAssessment::Low => "system has excess capacity",
        }
    }
}

impl fmt::Display for LoadAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadAssessment::Low => "LOW LOAD",
            LoadAssessment::Moderate => "MODERATE LOAD",
            LoadAssessment::High => "HIGH LOAD",
            LoadAssessment::Overloaded => "OVERLOADED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTimeGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ResponseTimeGrade {
    pub fn from_mean(mean: Duration) -> Self {
        if mean < Duration::from_millis(100) {
            ResponseTimeGrade::Excellent
        } else if mean < Duration::from_millis(500) {
            ResponseTimeGrade::Good
        } else if mean < Duration::from_secs(1) {
            ResponseTimeGrade::Fair
        } else {
            ResponseTimeGrade::Poor
        }
    }
}

impl fmt::Display for ResponseTimeGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResponseTimeGrade::Excellent => "Excellent (< 100ms)",
            ResponseTimeGrade::Good => "Good (< 500ms)",
            ResponseTimeGrade::Fair => "Fair (< 1s)",
            ResponseTimeGrade::Poor => "Poor (> 1s)",
        };
        f.write_str(label)
    }
}
