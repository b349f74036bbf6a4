use crate::metrics::MetricRegistry;
use std::fmt;

/// Aggregate queried by a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Percentile(f64),
    Rate,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// A pass/fail predicate over an aggregated metric, evaluated once at run
/// completion. Parsed from compact expressions, e.g.
/// `("http_req_duration{endpoint:home}", "p(95)<400")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    /// Optional `(tag, value)` restriction on the sample set.
    pub scope: Option<(String, String)>,
    pub aggregate: Aggregate,
    pub comparison: Comparison,
    pub bound: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("empty threshold selector or expression")]
    Empty,
    #[error("malformed metric selector `{0}`")]
    BadSelector(String),
    #[error("unknown aggregate in `{0}`")]
    BadAggregate(String),
    #[error("missing comparison operator in `{0}`")]
    MissingComparison(String),
    #[error("invalid bound in `{0}`")]
    BadBound(String),
}

/// Result of evaluating one threshold over the full sample set.
#[derive(Debug, Clone)]
pub struct ThresholdOutcome {
    pub threshold: Threshold,
    /// Absent when no samples matched the metric/scope.
    pub observed: Option<f64>,
    pub passed: bool,
}

impl ThresholdOutcome {
    /// Positive slack when passing, negative when breached. Absent without
    /// samples.
    pub fn margin(&self) -> Option<f64> {
        let observed = self.observed?;
        Some(match self.threshold.comparison {
            Comparison::Lt | Comparison::Le => self.threshold.bound - observed,
            Comparison::Gt | Comparison::Ge => observed - self.threshold.bound,
        })
    }
}

impl Threshold {
    /// Parse a `metric{tag:value}` selector plus a predicate expression.
    pub fn parse(selector: &str, expr: &str) -> Result<Self, ThresholdParseError> {
        let selector = selector.trim();
        let expr = expr.trim();
        if selector.is_empty() || expr.is_empty() {
            return Err(ThresholdParseError::Empty);
        }

        let (metric, scope) = parse_selector(selector)?;
        let (agg_text, comparison, bound_text) = split_expression(expr)?;

        let aggregate = parse_aggregate(agg_text)
            .ok_or_else(|| ThresholdParseError::BadAggregate(expr.to_string()))?;
        let bound: f64 = bound_text
            .trim()
            .parse()
            .map_err(|_| ThresholdParseError::BadBound(expr.to_string()))?;

        Ok(Self {
            metric,
            scope,
            aggregate,
            comparison,
            bound,
        })
    }

    pub fn evaluate(&self, registry: &MetricRegistry) -> ThresholdOutcome {
        let scope = self
            .scope
            .as_ref()
            .map(|(tag, value)| (tag.as_str(), value.as_str()));

        let observed = match self.aggregate {
            Aggregate::Percentile(p) => registry.trend(&self.metric, scope).map(|t| t.percentile(p)),
            Aggregate::Rate => registry.rate(&self.metric, scope),
            Aggregate::Avg => registry.trend(&self.metric, scope).map(|t| t.avg),
            Aggregate::Min => registry.trend(&self.metric, scope).map(|t| t.min),
            Aggregate::Max => registry.trend(&self.metric, scope).map(|t| t.max),
        };

        // No samples means nothing breached.
        let passed = observed.map_or(true, |v| self.comparison.holds(v, self.bound));

        ThresholdOutcome {
            threshold: self.clone(),
            observed,
            passed,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metric)?;
        if let Some((tag, value)) = &self.scope {
            write!(f, "{{{tag}:{value}}}")?;
        }
        write!(f, ": ")?;
        match self.aggregate {
            Aggregate::Percentile(p) => write!(f, "p({p})")?,
            Aggregate::Rate => write!(f, "rate")?,
            Aggregate::Avg => write!(f, "avg")?,
            Aggregate::Min => write!(f, "min")?,
            Aggregate::Max => write!(f, "max")?,
        }
        write!(f, "{}{}", self.comparison.symbol(), self.bound)
    }
}

fn parse_selector(
    selector: &str,
) -> Result<(String, Option<(String, String)>), ThresholdParseError> {
    match selector.split_once('{') {
        None => Ok((selector.to_string(), None)),
        Some((metric, rest)) => {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| ThresholdParseError::BadSelector(selector.to_string()))?;
            let (tag, value) = inner
                .split_once(':')
                .ok_or_else(|| ThresholdParseError::BadSelector(selector.to_string()))?;
            if metric.is_empty() || tag.is_empty() || value.is_empty() {
                return Err(ThresholdParseError::BadSelector(selector.to_string()));
            }
            Ok((
                metric.to_string(),
                Some((tag.trim().to_string(), value.trim().to_string())),
            ))
        }
    }
}

fn split_expression(expr: &str) -> Result<(&str, Comparison, &str), ThresholdParseError> {
    // Two-character operators must be tried first.
    for (symbol, comparison) in [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ] {
        if let Some((lhs, rhs)) = expr.split_once(symbol) {
            return Ok((lhs, comparison, rhs));
        }
    }
    Err(ThresholdParseError::MissingComparison(expr.to_string()))
}

fn parse_aggregate(text: &str) -> Option<Aggregate> {
    match text.trim() {
        "rate" => Some(Aggregate::Rate),
        "avg" => Some(Aggregate::Avg),
        "min" => Some(Aggregate::Min),
        "max" => Some(Aggregate::Max),
        other => {
            let inner = other.strip_prefix("p(")?.strip_suffix(')')?;
            let p: f64 = inner.trim().parse().ok()?;
            Some(Aggregate::Percentile(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percentile_expression() {
        let t = Threshold::parse("http_req_duration", "p(95)<500").unwrap();
        assert_eq!(t.metric, "http_req_duration");
        assert_eq!(t.scope, None);
        assert_eq!(t.aggregate, Aggregate::Percentile(95.0));
        assert_eq!(t.comparison, Comparison::Lt);
        assert_eq!(t.bound, 500.0);
    }

    #[test]
    fn parses_scoped_rate_expression() {
        let t = Threshold::parse("http_req_duration{endpoint:webhook_ingest}", "rate<=0.01")
            .unwrap();
        assert_eq!(
            t.scope,
            Some(("endpoint".to_string(), "webhook_ingest".to_string()))
        );
        assert_eq!(t.aggregate, Aggregate::Rate);
        assert_eq!(t.comparison, Comparison::Le);
    }

    #[test]
    fn display_round_trips_the_spec_shape() {
        let t = Threshold::parse("http_req_duration{endpoint:home}", "p(95)<400").unwrap();
        assert_eq!(t.to_string(), "http_req_duration{endpoint:home}: p(95)<400");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Threshold::parse("", "p(95)<1").is_err());
        assert!(Threshold::parse("m{endpoint", "p(95)<1").is_err());
        assert!(Threshold::parse("m", "median<1").is_err());
        assert!(Threshold::parse("m", "p(95)500").is_err());
        assert!(Threshold::parse("m", "p(95)<abc").is_err());
    }
}
