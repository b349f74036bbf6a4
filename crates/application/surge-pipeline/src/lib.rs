pub mod driver;
pub mod report;
pub mod routines;
pub mod scenario;

// Re-export core driver components
pub use driver::{
    ScenarioDriver, WorkerContext, METRIC_CHECKS, METRIC_DROPPED_ITERATIONS,
    METRIC_HTTP_REQ_DURATION, METRIC_HTTP_REQ_FAILED, METRIC_INGEST_LATENCY_MS,
};
pub use report::{RunReport, WorkloadSummary};
pub use routines::{IngestRoutine, ReadRoutine, Routine};
pub use scenario::{Executor, ScenarioError, Stage, Workload};
