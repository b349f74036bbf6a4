use crate::routines::Routine;
use std::sync::Arc;
use std::time::Duration;

/// One step of a staged executor: a target (rate or worker count, depending
/// on the model) held for a window of time. Targets change only at stage
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub target: u64,
    pub duration: Duration,
}

impl Stage {
    pub fn new(target: u64, duration: Duration) -> Self {
        Self { target, duration }
    }
}

/// Arrival model for one workload.
///
/// The rate family controls the rate of iteration *starts*, decoupled from
/// iteration latency, with a bounded reusable worker pool. The VU family
/// controls the number of concurrently active workers; iteration rate is an
/// emergent property of iteration latency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executor {
    RampingRate {
        start_rate: u64,
        pre_allocated_vus: u64,
        max_vus: u64,
        stages: Vec<Stage>,
    },
    ConstantRate {
        rate: u64,
        duration: Duration,
        pre_allocated_vus: u64,
        max_vus: u64,
    },
    RampingVus {
        start_vus: u64,
        stages: Vec<Stage>,
    },
    ConstantVus {
        vus: u64,
        duration: Duration,
    },
}

impl Executor {
    /// Startup validation. A malformed workload must fail the run before
    /// any request is sent.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Executor::RampingRate {
                pre_allocated_vus,
                max_vus,
                stages,
                ..
            } => {
                validate_stages(stages)?;
                validate_pool(*pre_allocated_vus, *max_vus)
            }
            Executor::ConstantRate {
                rate,
                duration,
                pre_allocated_vus,
                max_vus,
            } => {
                if *rate == 0 {
                    return Err("rate must be non-zero".to_string());
                }
                if duration.is_zero() {
                    return Err("duration must be non-zero".to_string());
                }
                validate_pool(*pre_allocated_vus, *max_vus)
            }
            Executor::RampingVus { stages, .. } => validate_stages(stages),
            Executor::ConstantVus { vus, duration } => {
                if *vus == 0 {
                    return Err("vus must be non-zero".to_string());
                }
                if duration.is_zero() {
                    return Err("duration must be non-zero".to_string());
                }
                Ok(())
            }
        }
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            Executor::RampingRate { stages, .. } | Executor::RampingVus { stages, .. } => {
                stages.iter().map(|s| s.duration).sum()
            }
            Executor::ConstantRate { duration, .. } | Executor::ConstantVus { duration, .. } => {
                *duration
            }
        }
    }
}

fn validate_stages(stages: &[Stage]) -> Result<(), String> {
    if stages.is_empty() {
        return Err("stage list must not be empty".to_string());
    }
    if stages.iter().any(|s| s.duration.is_zero()) {
        return Err("stage durations must be non-zero".to_string());
    }
    Ok(())
}

fn validate_pool(pre_allocated: u64, max_vus: u64) -> Result<(), String> {
    if max_vus == 0 {
        return Err("max_vus must be non-zero".to_string());
    }
    if pre_allocated > max_vus {
        return Err(format!(
            "pre_allocated_vus ({pre_allocated}) exceeds max_vus ({max_vus})"
        ));
    }
    Ok(())
}

/// A named workload: one executor driving one iteration routine.
pub struct Workload {
    pub name: String,
    pub executor: Executor,
    pub routine: Arc<dyn Routine>,
}

impl Workload {
    pub fn new(name: impl Into<String>, executor: Executor, routine: Arc<dyn Routine>) -> Self {
        Self {
            name: name.into(),
            executor,
            routine,
        }
    }
}

/// High-level error type for scenario runs.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("no workloads configured")]
    Empty,
    #[error("workload `{workload}`: {reason}")]
    Invalid { workload: String, reason: String },
    #[error("execution error: {0}")]
    Execution(String),
}
