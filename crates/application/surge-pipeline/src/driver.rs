use crate::report::{RunReport, WorkloadSummary};
use crate::routines::Routine;
use crate::scenario::{Executor, ScenarioError, Stage, Workload};
use futures::future::join_all;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surge_core::{MetricRegistry, MetricSample, Threshold};
use surge_infra::CallOutcome;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

pub const METRIC_HTTP_REQ_DURATION: &str = "http_req_duration";
pub const METRIC_HTTP_REQ_FAILED: &str = "http_req_failed";
pub const METRIC_CHECKS: &str = "checks";
pub const METRIC_INGEST_LATENCY_MS: &str = "ingest_latency_ms";
pub const METRIC_DROPPED_ITERATIONS: &str = "dropped_iterations";

const METRIC_CHANNEL_CAPACITY: usize = 4096;

/// Per-worker state handed to every iteration. Never shared across
/// workers; the session flag in particular is worker-local by contract.
pub struct WorkerContext {
    pub worker_id: u64,
    pub logged_in: bool,
    metrics: mpsc::Sender<MetricSample>,
}

impl WorkerContext {
    pub fn new(worker_id: u64, metrics: mpsc::Sender<MetricSample>) -> Self {
        Self {
            worker_id,
            logged_in: false,
            metrics,
        }
    }

    pub async fn record(&self, sample: MetricSample) {
        // The collector outlives every worker; a send error only happens
        // during teardown and loses nothing worth keeping.
        let _ = self.metrics.send(sample).await;
    }

    /// Standard pair of samples for one target call: latency trend plus
    /// failure rate, both tagged with the endpoint discriminator.
    pub async fn record_call(&self, outcome: &CallOutcome) {
        let millis = outcome.duration.as_secs_f64() * 1000.0;
        self.record(
            MetricSample::trend(METRIC_HTTP_REQ_DURATION, millis)
                .with_tag("endpoint", outcome.endpoint),
        )
        .await;
        self.record(
            MetricSample::rate(METRIC_HTTP_REQ_FAILED, if outcome.ok { 0.0 } else { 1.0 })
                .with_tag("endpoint", outcome.endpoint),
        )
        .await;
    }

    pub async fn record_check(&self, check: &str, passed: bool) {
        self.record(
            MetricSample::rate(METRIC_CHECKS, if passed { 1.0 } else { 0.0 })
                .with_tag("check", check),
        )
        .await;
    }
}

/// Runs one or more named workloads concurrently, collects their samples,
/// and judges the configured thresholds once everything has finished.
#[derive(Default)]
pub struct ScenarioDriver {
    workloads: Vec<Workload>,
    thresholds: Vec<Threshold>,
}

impl ScenarioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workloads.push(workload);
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn with_thresholds(mut self, thresholds: impl IntoIterator<Item = Threshold>) -> Self {
        self.thresholds.extend(thresholds);
        self
    }

    pub async fn run(self) -> Result<RunReport, ScenarioError> {
        if self.workloads.is_empty() {
            return Err(ScenarioError::Empty);
        }
        for workload in &self.workloads {
            workload
                .executor
                .validate()
                .map_err(|reason| ScenarioError::Invalid {
                    workload: workload.name.clone(),
                    reason,
                })?;
        }

        let (tx, mut rx) = mpsc::channel::<MetricSample>(METRIC_CHANNEL_CAPACITY);
        let collector = tokio::spawn(async move {
            let mut registry = MetricRegistry::new();
            while let Some(sample) = rx.recv().await {
                registry.record(sample);
            }
            registry
        });

        let mut handles = Vec::with_capacity(self.workloads.len());
        for workload in self.workloads {
            handles.push(tokio::spawn(run_workload(workload, tx.clone())));
        }
        // The collector drains until the last worker-held sender is gone.
        drop(tx);

        let mut workloads = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            workloads.push(joined.map_err(|e| ScenarioError::Execution(e.to_string()))?);
        }
        let registry = collector
            .await
            .map_err(|e| ScenarioError::Execution(e.to_string()))?;

        let thresholds = self
            .thresholds
            .iter()
            .map(|threshold| threshold.evaluate(&registry))
            .collect();

        Ok(RunReport {
            registry,
            workloads,
            thresholds,
        })
    }
}

async fn run_workload(workload: Workload, tx: mpsc::Sender<MetricSample>) -> WorkloadSummary {
    let Workload {
        name,
        executor,
        routine,
    } = workload;
    debug!(workload = %name, "workload starting");

    match executor {
        Executor::RampingRate {
            start_rate,
            pre_allocated_vus,
            max_vus,
            stages,
        } => {
            let plan = ramping_rate_plan(start_rate, &stages);
            run_arrival_rate(name, plan, pre_allocated_vus, max_vus, routine, tx).await
        }
        Executor::ConstantRate {
            rate,
            duration,
            pre_allocated_vus,
            max_vus,
        } => {
            let plan = vec![RateStep { rate, duration }];
            run_arrival_rate(name, plan, pre_allocated_vus, max_vus, routine, tx).await
        }
        Executor::RampingVus { start_vus, stages } => {
            run_looping_vus(name, start_vus, stages, routine, tx).await
        }
        Executor::ConstantVus { vus, duration } => {
            run_looping_vus(name, vus, vec![Stage::new(vus, duration)], routine, tx).await
        }
    }
}

struct RateStep {
    rate: u64,
    duration: Duration,
}

/// Expand ramp stages into per-second rate steps, interpolating linearly
/// from the previous target to the stage target.
fn ramping_rate_plan(start_rate: u64, stages: &[Stage]) -> Vec<RateStep> {
    let mut steps = Vec::new();
    let mut previous = start_rate as f64;
    for stage in stages {
        let whole_secs = stage.duration.as_secs();
        if whole_secs == 0 {
            // Sub-second stage: jump straight to the target.
            steps.push(RateStep {
                rate: stage.target,
                duration: stage.duration,
            });
        } else {
            for second in 0..whole_secs {
                let fraction = (second + 1) as f64 / whole_secs as f64;
                let rate = previous + (stage.target as f64 - previous) * fraction;
                steps.push(RateStep {
                    rate: rate.round() as u64,
                    duration: Duration::from_secs(1),
                });
            }
            let remainder = stage.duration - Duration::from_secs(whole_secs);
            if !remainder.is_zero() {
                steps.push(RateStep {
                    rate: stage.target,
                    duration: remainder,
                });
            }
        }
        previous = stage.target as f64;
    }
    steps
}

/// Arrival-rate execution: the limiter guarantees the rate of iteration
/// starts; a bounded pool of reusable worker contexts caps concurrency.
/// Scheduled starts that find the pool empty and fully grown are dropped
/// and counted, never silently absorbed.
async fn run_arrival_rate(
    name: String,
    plan: Vec<RateStep>,
    pre_allocated_vus: u64,
    max_vus: u64,
    routine: Arc<dyn Routine>,
    tx: mpsc::Sender<MetricSample>,
) -> WorkloadSummary {
    let pool: Arc<Mutex<Vec<WorkerContext>>> = Arc::new(Mutex::new(Vec::new()));
    let mut created: u64 = 0;
    {
        let mut idle = pool.lock().await;
        for _ in 0..pre_allocated_vus.min(max_vus) {
            idle.push(WorkerContext::new(created, tx.clone()));
            created += 1;
        }
    }

    let completed = Arc::new(AtomicU64::new(0));
    let mut started: u64 = 0;
    let mut dropped: u64 = 0;

    for step in plan {
        let step_deadline = Instant::now() + step.duration;
        let Some(rate) = NonZeroU32::new(step.rate.min(u32::MAX as u64) as u32) else {
            sleep_until(step_deadline).await;
            continue;
        };
        debug!(workload = %name, rate = rate.get(), "rate step");
        let limiter = RateLimiter::direct(Quota::per_second(rate).allow_burst(nonzero!(1u32)));

        loop {
            tokio::select! {
                _ = limiter.until_ready() => {
                    if Instant::now() >= step_deadline {
                        break;
                    }
                    let idle = pool.lock().await.pop();
                    let ctx = match idle {
                        Some(ctx) => Some(ctx),
                        None if created < max_vus => {
                            created += 1;
                            Some(WorkerContext::new(created - 1, tx.clone()))
                        }
                        None => None,
                    };
                    match ctx {
                        Some(mut ctx) => {
                            started += 1;
                            let pool = Arc::clone(&pool);
                            let routine = Arc::clone(&routine);
                            let completed = Arc::clone(&completed);
                            tokio::spawn(async move {
                                routine.run(&mut ctx).await;
                                completed.fetch_add(1, Ordering::Relaxed);
                                pool.lock().await.push(ctx);
                            });
                        }
                        None => {
                            dropped += 1;
                            warn!(workload = %name, "iteration dropped: worker pool exhausted");
                            let _ = tx
                                .send(
                                    MetricSample::counter(METRIC_DROPPED_ITERATIONS, 1.0)
                                        .with_tag("scenario", name.clone()),
                                )
                                .await;
                        }
                    }
                }
                _ = sleep_until(step_deadline) => break,
            }
        }
    }

    // The window is closed: let in-flight iterations finish, start nothing.
    loop {
        if pool.lock().await.len() as u64 == created {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    pool.lock().await.clear();
    debug!(workload = %name, started, dropped, "workload finished");

    WorkloadSummary {
        name,
        iterations_started: started,
        iterations_completed: completed.load(Ordering::Relaxed),
        dropped_iterations: dropped,
    }
}

/// Looping-VU execution: each active worker runs its routine back-to-back;
/// the stage list steps the active-worker count at stage boundaries.
async fn run_looping_vus(
    name: String,
    start_vus: u64,
    stages: Vec<Stage>,
    routine: Arc<dyn Routine>,
    tx: mpsc::Sender<MetricSample>,
) -> WorkloadSummary {
    // Pre-spawn every worker the plan can need; workers above the current
    // target idle until their index comes into range.
    let worker_count = stages
        .iter()
        .map(|s| s.target)
        .max()
        .unwrap_or(0)
        .max(start_vus);
    let (target_tx, target_rx) = watch::channel(Some(0u64));
    let started = Arc::new(AtomicU64::new(0));
    let completed = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::with_capacity(worker_count as usize);
    for index in 0..worker_count {
        let mut ctx = WorkerContext::new(index, tx.clone());
        let routine = Arc::clone(&routine);
        let target = target_rx.clone();
        let started = Arc::clone(&started);
        let completed = Arc::clone(&completed);
        handles.push(tokio::spawn(async move {
            loop {
                let active = *target.borrow();
                match active {
                    None => break,
                    Some(active) if index < active => {
                        started.fetch_add(1, Ordering::Relaxed);
                        routine.run(&mut ctx).await;
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(_) => sleep(Duration::from_millis(25)).await,
                }
            }
        }));
    }
    drop(target_rx);

    for stage in &stages {
        debug!(workload = %name, target = stage.target, "vu stage");
        let _ = target_tx.send(Some(stage.target));
        sleep(stage.duration).await;
    }
    let _ = target_tx.send(None);
    let _ = join_all(handles).await;
    debug!(workload = %name, "workload finished");

    WorkloadSummary {
        name,
        iterations_started: started.load(Ordering::Relaxed),
        iterations_completed: completed.load(Ordering::Relaxed),
        dropped_iterations: 0,
    }
}
