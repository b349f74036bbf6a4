use clap::{Parser, Subcommand};
use surge_cli::commands::{self, IngestOpts, MixedOpts, ReadOpts, TargetOpts};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(long, env = "BASE_URL", default_value = surge_config::DEFAULT_BASE_URL, global = true)]
    base_url: String,
    #[arg(long, env = "AUTH_TOKEN", default_value = surge_config::DEFAULT_AUTH_TOKEN, global = true)]
    auth_token: String,
    #[arg(long, env = "WEBHOOK_SECRET", default_value = surge_config::DEFAULT_WEBHOOK_SECRET, global = true)]
    webhook_secret: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ramping write load against the webhook ingest endpoint
    Ingest {
        #[arg(long, env = "INGEST_START_RPS", default_value_t = surge_config::DEFAULT_INGEST_START_RPS)]
        start_rate: u64,
        #[arg(long, env = "INGEST_RPS_1", default_value_t = surge_config::DEFAULT_INGEST_RPS[0])]
        rate1: u64,
        #[arg(long, env = "INGEST_RPS_2", default_value_t = surge_config::DEFAULT_INGEST_RPS[1])]
        rate2: u64,
        #[arg(long, env = "INGEST_RPS_3", default_value_t = surge_config::DEFAULT_INGEST_RPS[2])]
        rate3: u64,
        #[arg(long, env = "INGEST_STAGE_1", default_value = surge_config::DEFAULT_INGEST_STAGES[0])]
        stage1: String,
        #[arg(long, env = "INGEST_STAGE_2", default_value = surge_config::DEFAULT_INGEST_STAGES[1])]
        stage2: String,
        #[arg(long, env = "INGEST_STAGE_3", default_value = surge_config::DEFAULT_INGEST_STAGES[2])]
        stage3: String,
        #[arg(long, env = "PRE_VUS", default_value_t = surge_config::DEFAULT_PRE_VUS)]
        pre_vus: u64,
        #[arg(long, env = "MAX_VUS", default_value_t = surge_config::DEFAULT_MAX_VUS)]
        max_vus: u64,
        /// Mix in event types outside the default catalog
        #[arg(long, env = "INGEST_INCLUDE_CUSTOM_TYPES")]
        include_custom_types: bool,
    },
    /// Ramping session-based read load across the dashboard pages
    Read {
        #[arg(long, env = "READ_START_VUS", default_value_t = surge_config::DEFAULT_READ_START_VUS)]
        start_vus: u64,
        #[arg(long, env = "READ_VUS_1", default_value_t = surge_config::DEFAULT_READ_VUS[0])]
        vus1: u64,
        #[arg(long, env = "READ_VUS_2", default_value_t = surge_config::DEFAULT_READ_VUS[1])]
        vus2: u64,
        #[arg(long, env = "READ_STAGE_1", default_value = surge_config::DEFAULT_READ_STAGES[0])]
        stage1: String,
        #[arg(long, env = "READ_STAGE_2", default_value = surge_config::DEFAULT_READ_STAGES[1])]
        stage2: String,
        #[arg(long, env = "READ_STAGE_3", default_value = surge_config::DEFAULT_READ_STAGES[2])]
        stage3: String,
    },
    /// Concurrent constant-rate writes and constant-VU reads
    Mixed {
        #[arg(long, env = "MIXED_INGEST_RPS", default_value_t = surge_config::DEFAULT_MIXED_INGEST_RPS)]
        ingest_rate: u64,
        #[arg(long, env = "MIXED_DURATION", default_value = surge_config::DEFAULT_MIXED_DURATION)]
        duration: String,
        #[arg(long, env = "MIXED_INGEST_PRE_VUS", default_value_t = surge_config::DEFAULT_PRE_VUS)]
        ingest_pre_vus: u64,
        #[arg(long, env = "MIXED_INGEST_MAX_VUS", default_value_t = surge_config::DEFAULT_MAX_VUS)]
        ingest_max_vus: u64,
        #[arg(long, env = "MIXED_READ_VUS", default_value_t = surge_config::DEFAULT_MIXED_READ_VUS)]
        read_vus: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    let target = TargetOpts {
        base_url: cli.base_url,
        auth_token: cli.auth_token,
        webhook_secret: cli.webhook_secret,
    };

    let report = match cli.command {
        Commands::Ingest {
            start_rate,
            rate1,
            rate2,
            rate3,
            stage1,
            stage2,
            stage3,
            pre_vus,
            max_vus,
            include_custom_types,
        } => {
            commands::cmd_ingest(
                target,
                IngestOpts {
                    start_rate,
                    rates: [rate1, rate2, rate3],
                    stages: [stage1, stage2, stage3],
                    pre_vus,
                    max_vus,
                    include_custom_types,
                },
            )
            .await?
        }
        Commands::Read {
            start_vus,
            vus1,
            vus2,
            stage1,
            stage2,
            stage3,
        } => {
            commands::cmd_read(
                target,
                ReadOpts {
                    start_vus,
                    vus: [vus1, vus2],
                    stages: [stage1, stage2, stage3],
                },
            )
            .await?
        }
        Commands::Mixed {
            ingest_rate,
            duration,
            ingest_pre_vus,
            ingest_max_vus,
            read_vus,
        } => {
            commands::cmd_mixed(
                target,
                MixedOpts {
                    ingest_rate,
                    duration,
                    ingest_pre_vus,
                    ingest_max_vus,
                    read_vus,
                },
            )
            .await?
        }
    };

    // A breached threshold is a terminal judgment, not a startup failure:
    // the summary has already been printed by the time we get here.
    if !report.passed() {
        std::process::exit(2);
    }
    Ok(())
}
