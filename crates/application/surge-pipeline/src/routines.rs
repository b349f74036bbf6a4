use crate::driver::{WorkerContext, METRIC_INGEST_LATENCY_MS};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surge_core::metrics::MetricSample;
use surge_core::{EventFactory, EventParams};
use surge_infra::{LoginIdentity, TargetClient};
use tokio::time::sleep;
use tracing::warn;

/// One iteration of a workload. Implementations pace themselves with an
/// explicit delay; that delay is part of the iteration contract.
#[async_trait]
pub trait Routine: Send + Sync {
    async fn run(&self, ctx: &mut WorkerContext);
}

/// Which event types an ingest workload mixes in, keyed off the shared
/// sequence number.
enum IngestMix {
    /// Rotating selector over the last digit of the sequence: mostly
    /// deploys with rollback/publish slots, plus one slot that emits a
    /// custom (non-catalog) type when enabled and a plain deploy when not.
    Stepped { include_custom_types: bool },
    /// A rollback every n-th event, deploys otherwise.
    RollbackEvery(u64),
}

/// Write-path iteration: build one event from the shared sequence counter,
/// deliver it signed, record latency and outcome.
pub struct IngestRoutine {
    client: Arc<TargetClient>,
    factory: EventFactory,
    sequence: AtomicU64,
    mix: IngestMix,
    chain_prefix: &'static str,
    chain_group: u64,
    pipeline_run_prefix: Option<&'static str>,
    pace: Duration,
}

impl IngestRoutine {
    /// The ramping ingest profile: stepped type mix, chains of three,
    /// explicit pipeline run ids, 50 ms pacing.
    pub fn stepped(
        client: Arc<TargetClient>,
        factory: EventFactory,
        include_custom_types: bool,
    ) -> Self {
        Self {
            client,
            factory,
            sequence: AtomicU64::new(0),
            mix: IngestMix::Stepped {
                include_custom_types,
            },
            chain_prefix: "lt-chain",
            chain_group: 3,
            pipeline_run_prefix: Some("lt-run"),
            pace: Duration::from_millis(50),
        }
    }

    /// The mixed-scenario ingest profile: rollback every sixth event,
    /// chains of four, 20 ms pacing.
    pub fn rollback_every_sixth(client: Arc<TargetClient>, factory: EventFactory) -> Self {
        Self {
            client,
            factory,
            sequence: AtomicU64::new(0),
            mix: IngestMix::RollbackEvery(6),
            chain_prefix: "mixed-chain",
            chain_group: 4,
            pipeline_run_prefix: None,
            pace: Duration::from_millis(20),
        }
    }
}

#[async_trait]
impl Routine for IngestRoutine {
    async fn run(&self, ctx: &mut WorkerContext) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        // The stepped mix keys everything off the last digit of the
        // sequence; the steady mix keys off the raw sequence.
        let (event_type, basis) = match &self.mix {
            IngestMix::Stepped {
                include_custom_types,
            } => {
                let selector = sequence % 10;
                let event_type = match selector {
                    7 => "service.rolledback",
                    8 => "service.published",
                    9 if *include_custom_types => "dev.cdevents.pipeline.run.started.0.3.0",
                    _ => "service.deployed",
                };
                (event_type, selector)
            }
            IngestMix::RollbackEvery(n) => {
                let event_type = if sequence % n == 0 {
                    "service.rolledback"
                } else {
                    "service.deployed"
                };
                (event_type, sequence)
            }
        };

        let params = EventParams {
            event_type: Some(event_type.to_string()),
            service: Some(if basis % 2 == 0 { "orders" } else { "billing" }.to_string()),
            environment: Some(
                if basis % 3 == 0 {
                    "production"
                } else {
                    "staging"
                }
                .to_string(),
            ),
            sequence: Some(sequence),
            chain_id: Some(format!(
                "{}-{}",
                self.chain_prefix,
                sequence / self.chain_group
            )),
            pipeline_run: self
                .pipeline_run_prefix
                .map(|prefix| format!("{prefix}-{sequence}")),
            ..EventParams::default()
        };

        let event = self.factory.build(&params);
        let outcome = self.client.post_webhook(&event).await;
        ctx.record_call(&outcome).await;
        ctx.record_check("webhook accepted", outcome.ok).await;
        if let IngestMix::Stepped { .. } = self.mix {
            let millis = outcome.duration.as_secs_f64() * 1000.0;
            ctx.record(MetricSample::trend(METRIC_INGEST_LATENCY_MS, millis))
                .await;
        }

        sleep(self.pace).await;
    }
}

/// Which read endpoints a read workload exercises.
enum ReadMix {
    /// Weighted sweep over the dashboard surfaces: 40% service grid,
    /// 25% deployments list, 20% service detail, 15% home.
    Weighted,
    /// A single service-detail page, hammered.
    ServiceDetail { service: String },
}

/// Read-path iteration: make sure this worker holds a session, hit one read
/// endpoint, record the outcome.
pub struct ReadRoutine {
    client: Arc<TargetClient>,
    identity: LoginIdentity,
    mix: ReadMix,
    check_name: &'static str,
    pace: Duration,
}

impl ReadRoutine {
    /// The ramping read profile: weighted endpoint sweep, 100 ms pacing.
    pub fn weighted(client: Arc<TargetClient>) -> Self {
        Self {
            client,
            identity: LoginIdentity::default(),
            mix: ReadMix::Weighted,
            check_name: "read status 200",
            pace: Duration::from_millis(100),
        }
    }

    /// The mixed-scenario read profile: one service detail page, 80 ms
    /// pacing.
    pub fn service_detail(client: Arc<TargetClient>, service: impl Into<String>) -> Self {
        Self {
            client,
            identity: LoginIdentity::default(),
            mix: ReadMix::ServiceDetail {
                service: service.into(),
            },
            check_name: "service detail 200",
            pace: Duration::from_millis(80),
        }
    }

    /// Idempotent per worker: the login runs once, and even a failed login
    /// marks the worker as attempted. Later reads may then fail
    /// unauthorized, which is exactly the degraded behavior the harness is
    /// meant to observe.
    async fn ensure_session(&self, ctx: &mut WorkerContext) {
        if ctx.logged_in {
            return;
        }
        let outcome = self.client.dev_login(&self.identity).await;
        ctx.record_call(&outcome).await;
        ctx.record_check("dev login redirect", outcome.ok).await;
        if !outcome.ok {
            warn!(worker = ctx.worker_id, "dev login did not redirect");
        }
        ctx.logged_in = true;
    }
}

#[async_trait]
impl Routine for ReadRoutine {
    async fn run(&self, ctx: &mut WorkerContext) {
        self.ensure_session(ctx).await;

        let outcome = match &self.mix {
            ReadMix::Weighted => {
                let roll: f64 = rand::thread_rng().gen();
                if roll < 0.40 {
                    self.client.get_services_grid("all").await
                } else if roll < 0.65 {
                    self.client.get_deployments().await
                } else if roll < 0.85 {
                    self.client.get_service_detail("orders").await
                } else {
                    self.client.get_home().await
                }
            }
            ReadMix::ServiceDetail { service } => self.client.get_service_detail(service).await,
        };

        ctx.record_call(&outcome).await;
        ctx.record_check(self.check_name, outcome.ok).await;

        sleep(self.pace).await;
    }
}
