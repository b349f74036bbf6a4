use anyhow::{Context, Result};
use std::sync::Arc;
use surge_core::metrics::MetricKind;
use surge_core::{EventFactory, EventTypeCatalog, Threshold};
use surge_infra::TargetClient;
use surge_pipeline::{
    Executor, IngestRoutine, ReadRoutine, RunReport, ScenarioDriver, Stage, Workload,
};

/// Connection settings shared by every scenario.
pub struct TargetOpts {
    pub base_url: String,
    pub auth_token: String,
    pub webhook_secret: String,
}

pub struct IngestOpts {
    pub start_rate: u64,
    pub rates: [u64; 3],
    pub stages: [String; 3],
    pub pre_vus: u64,
    pub max_vus: u64,
    pub include_custom_types: bool,
}

pub struct ReadOpts {
    pub start_vus: u64,
    pub vus: [u64; 2],
    pub stages: [String; 3],
}

pub struct MixedOpts {
    pub ingest_rate: u64,
    pub duration: String,
    pub ingest_pre_vus: u64,
    pub ingest_max_vus: u64,
    pub read_vus: u64,
}

fn build_target(target: &TargetOpts) -> Result<Arc<TargetClient>> {
    let http = surge_infra::default_http_client(surge_config::DEFAULT_REQUEST_TIMEOUT)
        .context("Failed to build HTTP client")?;
    let client = TargetClient::new(
        http,
        target.base_url.as_str(),
        target.auth_token.as_str(),
        target.webhook_secret.as_str(),
    )
    .context("Invalid webhook credentials")?;
    Ok(Arc::new(client))
}

fn parse_stage(target: u64, duration: &str) -> Result<Stage> {
    let duration = surge_config::parse_duration(duration)
        .map_err(|reason| anyhow::anyhow!("invalid stage duration: {reason}"))?;
    Ok(Stage::new(target, duration))
}

fn parse_thresholds(pairs: &[(&str, &str)]) -> Result<Vec<Threshold>> {
    let mut thresholds = Vec::with_capacity(pairs.len());
    for (selector, expr) in pairs {
        thresholds.push(Threshold::parse(selector, expr)?);
    }
    Ok(thresholds)
}

/// Ramping write load against the webhook ingest endpoint.
pub async fn cmd_ingest(target: TargetOpts, opts: IngestOpts) -> Result<RunReport> {
    let client = build_target(&target)?;
    let factory = EventFactory::new(Arc::new(EventTypeCatalog::builtin()));
    let routine = Arc::new(IngestRoutine::stepped(
        client,
        factory,
        opts.include_custom_types,
    ));

    let stages = vec![
        parse_stage(opts.rates[0], &opts.stages[0])?,
        parse_stage(opts.rates[1], &opts.stages[1])?,
        parse_stage(opts.rates[2], &opts.stages[2])?,
    ];
    let workload = Workload::new(
        "ingest_step",
        Executor::RampingRate {
            start_rate: opts.start_rate,
            pre_allocated_vus: opts.pre_vus,
            max_vus: opts.max_vus,
            stages,
        },
        routine,
    );
    let thresholds = parse_thresholds(&[
        ("http_req_failed", "rate<0.01"),
        ("http_req_duration", "p(95)<500"),
        ("ingest_latency_ms", "p(95)<350"),
    ])?;

    println!(":: Ingest scenario against {}", target.base_url);
    let report = ScenarioDriver::new()
        .with_workload(workload)
        .with_thresholds(thresholds)
        .run()
        .await?;
    print_report(&report);
    Ok(report)
}

/// Ramping session-based read load across the dashboard pages.
pub async fn cmd_read(target: TargetOpts, opts: ReadOpts) -> Result<RunReport> {
    let client = build_target(&target)?;
    let routine = Arc::new(ReadRoutine::weighted(client));

    let stages = vec![
        parse_stage(opts.vus[0], &opts.stages[0])?,
        parse_stage(opts.vus[1], &opts.stages[1])?,
        parse_stage(0, &opts.stages[2])?,
    ];
    let workload = Workload::new(
        "read_mix",
        Executor::RampingVus {
            start_vus: opts.start_vus,
            stages,
        },
        routine,
    );
    let thresholds = parse_thresholds(&[
        ("http_req_failed", "rate<0.01"),
        ("http_req_duration{endpoint:home}", "p(95)<400"),
        ("http_req_duration{endpoint:services_grid}", "p(95)<400"),
        ("http_req_duration{endpoint:deployments}", "p(95)<450"),
        ("http_req_duration{endpoint:service_detail}", "p(95)<450"),
    ])?;

    println!(":: Read scenario against {}", target.base_url);
    let report = ScenarioDriver::new()
        .with_workload(workload)
        .with_thresholds(thresholds)
        .run()
        .await?;
    print_report(&report);
    Ok(report)
}

/// Concurrent constant-rate writes and constant-VU reads sharing one run
/// window.
pub async fn cmd_mixed(target: TargetOpts, opts: MixedOpts) -> Result<RunReport> {
    let client = build_target(&target)?;
    let factory = EventFactory::new(Arc::new(EventTypeCatalog::builtin()));
    let duration = surge_config::parse_duration(&opts.duration)
        .map_err(|reason| anyhow::anyhow!("invalid duration: {reason}"))?;

    let ingest = Workload::new(
        "mixed_ingest",
        Executor::ConstantRate {
            rate: opts.ingest_rate,
            duration,
            pre_allocated_vus: opts.ingest_pre_vus,
            max_vus: opts.ingest_max_vus,
        },
        Arc::new(IngestRoutine::rollback_every_sixth(client.clone(), factory)),
    );
    let read = Workload::new(
        "mixed_read",
        Executor::ConstantVus {
            vus: opts.read_vus,
            duration,
        },
        Arc::new(ReadRoutine::service_detail(client, "orders")),
    );
    let thresholds = parse_thresholds(&[
        ("http_req_failed", "rate<0.02"),
        ("http_req_duration", "p(95)<700"),
        ("http_req_duration{endpoint:webhook_ingest}", "p(95)<450"),
        ("http_req_duration{endpoint:service_detail}", "p(95)<600"),
    ])?;

    println!(":: Mixed scenario against {}", target.base_url);
    let report = ScenarioDriver::new()
        .with_workload(ingest)
        .with_workload(read)
        .with_thresholds(thresholds)
        .run()
        .await?;
    print_report(&report);
    Ok(report)
}

/// Post-run summary. A failing run still prints everything; the verdict is
/// the last line, not an early exit.
pub fn print_report(report: &RunReport) {
    println!("\n:: Workloads");
    for workload in &report.workloads {
        println!(
            "   {:<14} started {:>8}  completed {:>8}  dropped {:>6}",
            workload.name,
            workload.iterations_started,
            workload.iterations_completed,
            workload.dropped_iterations
        );
    }

    println!("\n:: Metrics");
    for name in report.registry.metric_names() {
        match report.registry.kind(name) {
            Some(MetricKind::Trend) => {
                if let Some(trend) = report.registry.trend(name, None) {
                    println!(
                        "   {name}: count={} avg={:.2} min={:.2} max={:.2} p(90)={:.2} p(95)={:.2} p(99)={:.2}",
                        trend.count,
                        trend.avg,
                        trend.min,
                        trend.max,
                        trend.percentile(90.0),
                        trend.percentile(95.0),
                        trend.percentile(99.0)
                    );
                }
                for endpoint in report.registry.tag_values(name, "endpoint") {
                    if let Some(trend) =
                        report.registry.trend(name, Some(("endpoint", endpoint.as_str())))
                    {
                        println!(
                            "     {{endpoint:{endpoint}}}: count={} avg={:.2} p(95)={:.2}",
                            trend.count,
                            trend.avg,
                            trend.percentile(95.0)
                        );
                    }
                }
            }
            Some(MetricKind::Rate) => {
                if let Some(rate) = report.registry.rate(name, None) {
                    println!("   {name}: rate={:.2}%", rate * 100.0);
                }
            }
            Some(MetricKind::Counter) => {
                println!("   {name}: count={}", report.registry.count(name, None));
            }
            None => {}
        }
    }

    println!("\n:: Thresholds");
    for outcome in &report.thresholds {
        let verdict = if outcome.passed { "PASS" } else { "FAIL" };
        match outcome.observed {
            Some(observed) => println!(
                "   {verdict} {} (observed {:.2}, margin {:+.2})",
                outcome.threshold,
                observed,
                outcome.margin().unwrap_or_default()
            ),
            None => println!("   {verdict} {} (no samples)", outcome.threshold),
        }
    }

    println!(
        "\n:: Result: {}",
        if report.passed() { "PASS" } else { "FAIL" }
    );
}
