use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// How a metric's samples are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Arithmetic series with percentile queries (latencies).
    Trend,
    /// Fraction of non-zero samples (failure/pass ratios).
    Rate,
    /// Sum of samples (drop counts).
    Counter,
}

/// One recorded observation. Append-only for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

impl MetricSample {
    pub fn trend(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Trend, value)
    }

    pub fn rate(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Rate, value)
    }

    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Counter, value)
    }

    fn new(name: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug)]
struct MetricSeries {
    kind: MetricKind,
    samples: Vec<(BTreeMap<String, String>, f64)>,
}

/// In-memory sample store for one run.
///
/// Queries accept an optional `(tag, value)` scope so thresholds can apply
/// to a single endpoint rather than the whole metric.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: HashMap<String, MetricSeries>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: MetricSample) {
        let MetricSample {
            name,
            kind,
            value,
            tags,
        } = sample;
        let series = self.metrics.entry(name).or_insert_with(|| MetricSeries {
            kind,
            samples: Vec::new(),
        });
        series.samples.push((tags, value));
    }

    pub fn kind(&self, metric: &str) -> Option<MetricKind> {
        self.metrics.get(metric).map(|s| s.kind)
    }

    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.metrics.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Raw values for a metric, optionally restricted to samples carrying
    /// the given tag value.
    pub fn values(&self, metric: &str, scope: Option<(&str, &str)>) -> Vec<f64> {
        let Some(series) = self.metrics.get(metric) else {
            return Vec::new();
        };
        series
            .samples
            .iter()
            .filter(|(tags, _)| match scope {
                Some((key, value)) => tags.get(key).map(String::as_str) == Some(value),
                None => true,
            })
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn trend(&self, metric: &str, scope: Option<(&str, &str)>) -> Option<Trend> {
        Trend::from_values(self.values(metric, scope))
    }

    /// Fraction of non-zero samples, or `None` when no samples match.
    pub fn rate(&self, metric: &str, scope: Option<(&str, &str)>) -> Option<f64> {
        let values = self.values(metric, scope);
        if values.is_empty() {
            return None;
        }
        let hits = values.iter().filter(|v| **v != 0.0).count();
        Some(hits as f64 / values.len() as f64)
    }

    /// Sum of samples; zero when none match.
    pub fn count(&self, metric: &str, scope: Option<(&str, &str)>) -> f64 {
        self.values(metric, scope).iter().sum()
    }

    /// Distinct values of a tag across a metric's samples, sorted.
    pub fn tag_values(&self, metric: &str, tag: &str) -> Vec<String> {
        let Some(series) = self.metrics.get(metric) else {
            return Vec::new();
        };
        let mut out: Vec<String> = series
            .samples
            .iter()
            .filter_map(|(tags, _)| tags.get(tag).cloned())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Summary of a trend metric's sample set.
#[derive(Debug, Clone)]
pub struct Trend {
    sorted: Vec<f64>,
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl Trend {
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let count = values.len();
        let sum: f64 = values.iter().sum();
        Some(Self {
            count,
            avg: sum / count as f64,
            min: values[0],
            max: values[count - 1],
            sorted: values,
        })
    }

    /// Percentile by linear interpolation over the sorted sample set.
    pub fn percentile(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 100.0);
        let rank = p / 100.0 * (self.count - 1) as f64;
        let lo = rank.floor() as usize;
        let frac = rank - lo as f64;
        if lo + 1 >= self.count {
            return self.sorted[self.count - 1];
        }
        self.sorted[lo] + (self.sorted[lo + 1] - self.sorted[lo]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_samples() {
        let trend = Trend::from_values(vec![10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(trend.percentile(0.0), 10.0);
        assert_eq!(trend.percentile(100.0), 40.0);
        assert_eq!(trend.percentile(50.0), 25.0);
        assert!((trend.percentile(95.0) - 38.5).abs() < 1e-9);
    }

    #[test]
    fn trend_of_empty_sample_set_is_absent() {
        assert!(Trend::from_values(Vec::new()).is_none());
    }

    #[test]
    fn rate_counts_non_zero_fraction() {
        let mut registry = MetricRegistry::new();
        for value in [0.0, 0.0, 0.0, 1.0] {
            registry.record(MetricSample::rate("http_req_failed", value));
        }
        assert_eq!(registry.rate("http_req_failed", None), Some(0.25));
        assert_eq!(registry.rate("unknown_metric", None), None);
    }

    #[test]
    fn scoped_queries_filter_on_tag_value() {
        let mut registry = MetricRegistry::new();
        registry.record(
            MetricSample::trend("http_req_duration", 100.0).with_tag("endpoint", "home"),
        );
        registry.record(
            MetricSample::trend("http_req_duration", 300.0).with_tag("endpoint", "deployments"),
        );

        let home = registry
            .trend("http_req_duration", Some(("endpoint", "home")))
            .unwrap();
        assert_eq!(home.count, 1);
        assert_eq!(home.max, 100.0);

        let all = registry.trend("http_req_duration", None).unwrap();
        assert_eq!(all.count, 2);
        assert_eq!(
            registry.tag_values("http_req_duration", "endpoint"),
            vec!["deployments".to_string(), "home".to_string()]
        );
    }

    #[test]
    fn counter_sums_samples() {
        let mut registry = MetricRegistry::new();
        registry.record(MetricSample::counter("dropped_iterations", 1.0));
        registry.record(MetricSample::counter("dropped_iterations", 1.0));
        assert_eq!(registry.count("dropped_iterations", None), 2.0);
        assert_eq!(registry.count("missing", None), 0.0);
    }
}
