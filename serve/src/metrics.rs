//! Minimal Prometheus text-exposition metrics: request counts and a latency
//! histogram, labeled by path/method/status. Hand-rolled rather than pulling
//! in a metrics crate — the surface is narrow enough that a small
//! purpose-built counter map is simpler than a generic dependency.

use std::collections::HashMap;
use std::sync::Mutex;

/// Upper bounds of each latency bucket, in seconds, `+Inf` implied last.
const LATENCY_BUCKETS_S: [f64; 8] = [0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Default)]
struct Series {
    count: u64,
    sum_s: f64,
    buckets: [u64; LATENCY_BUCKETS_S.len()],
}

#[derive(Default)]
pub struct Metrics {
    series: Mutex<HashMap<(String, String, u16), Series>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &str, path: &str, status: u16, latency_s: f64) {
        let key = (method.to_string(), path.to_string(), status);
        let mut guard = self.series.lock().expect("metrics mutex poisoned");
        let series = guard.entry(key).or_default();
        series.count += 1;
        series.sum_s += latency_s;
        for (i, bound) in LATENCY_BUCKETS_S.iter().enumerate() {
            if latency_s <= *bound {
                series.buckets[i] += 1;
            }
        }
    }

    /// Renders all recorded series as Prometheus text exposition format.
    pub fn render(&self) -> String {
        let guard = self.series.lock().expect("metrics mutex poisoned");
        let mut out = String::new();
        out.push_str("# HELP openbridge_http_requests_total Total HTTP requests handled.\n");
        out.push_str("# TYPE openbridge_http_requests_total counter\n");
        for ((method, path, status), series) in guard.iter() {
            out.push_str(&format!(
                "openbridge_http_requests_total{{method=\"{method}\",path=\"{path}\",status=\"{status}\"}} {}\n",
                series.count
            ));
        }
        out.push_str("# HELP openbridge_http_request_duration_seconds HTTP request latency.\n");
        out.push_str("# TYPE openbridge_http_request_duration_seconds histogram\n");
        for ((method, path, status), series) in guard.iter() {
            let mut cumulative = 0u64;
            for (i, bound) in LATENCY_BUCKETS_S.iter().enumerate() {
                cumulative += series.buckets[i];
                out.push_str(&format!(
                    "openbridge_http_request_duration_seconds_bucket{{method=\"{method}\",path=\"{path}\",status=\"{status}\",le=\"{bound}\"}} {cumulative}\n"
                ));
            }
            out.push_str(&format!(
                "openbridge_http_request_duration_seconds_bucket{{method=\"{method}\",path=\"{path}\",status=\"{status}\",le=\"+Inf\"}} {}\n",
                series.count
            ));
            out.push_str(&format!(
                "openbridge_http_request_duration_seconds_sum{{method=\"{method}\",path=\"{path}\",status=\"{status}\"}} {}\n",
                series.sum_s
            ));
            out.push_str(&format!(
                "openbridge_http_request_duration_seconds_count{{method=\"{method}\",path=\"{path}\",status=\"{status}\"}} {}\n",
                series.count
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_renders_a_counter_line() {
        let metrics = Metrics::new();
        metrics.record("POST", "/v1/responses", 200, 0.02);
        let rendered = metrics.render();
        assert!(rendered.contains(
            "openbridge_http_requests_total{method=\"POST\",path=\"/v1/responses\",status=\"200\"} 1"
        ));
    }

    #[test]
    fn latency_falls_into_the_correct_bucket() {
        let metrics = Metrics::new();
        metrics.record("GET", "/healthz", 200, 0.06);
        let rendered = metrics.render();
        assert!(rendered.contains("le=\"0.05\""));
        assert!(rendered.contains("le=\"0.1\""));
    }
}
