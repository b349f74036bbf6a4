use crate::catalog::EventTypeCatalog;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// CDEvents envelope spec version carried by every event.
pub const SPEC_VERSION: &str = "0.5.0";

pub const DEFAULT_SOURCE: &str = "loadtest/surge";
pub const DEFAULT_SERVICE: &str = "orders";
pub const DEFAULT_ENVIRONMENT: &str = "staging";
pub const DEFAULT_ACTOR: &str = "loadtest-bot";

/// Prefix for synthesized event ids, so harness traffic is recognizable in
/// the target's logs.
pub const EVENT_ID_PREFIX: &str = "lt";

/// A deployment-lifecycle event as delivered on the wire.
///
/// Immutable once built; serialized exactly once per delivery so the signed
/// bytes and the transmitted bytes are the same sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub context: EventContext,
    pub subject: EventSubject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: String,
    pub specversion: String,
    #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubject {
    pub id: String,
    pub source: String,
    pub content: SubjectContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectContent {
    pub environment: EnvironmentRef,
    pub artifact_id: String,
    pub pipeline: PipelineRef,
    pub actor: ActorRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRef {
    pub run_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRef {
    pub name: String,
}

/// Sparse inputs for one event. Every `None` takes a deterministic default.
#[derive(Debug, Clone, Default)]
pub struct EventParams {
    pub service: Option<String>,
    pub environment: Option<String>,
    /// Short type name, resolved through the catalog.
    pub event_type: Option<String>,
    pub sequence: Option<u64>,
    pub chain_id: Option<String>,
    pub actor: Option<String>,
    pub pipeline_run: Option<String>,
    pub pipeline_url: Option<String>,
    pub source: Option<String>,
    pub artifact: Option<String>,
}

pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Builds [`DomainEvent`]s from sparse parameters.
///
/// The clock is injected so tests can pin timestamps; everything else is a
/// pure function of the inputs.
pub struct EventFactory {
    catalog: Arc<EventTypeCatalog>,
    clock: Clock,
}

impl EventFactory {
    pub fn new(catalog: Arc<EventTypeCatalog>) -> Self {
        Self::with_clock(catalog, Box::new(Utc::now))
    }

    pub fn with_clock(catalog: Arc<EventTypeCatalog>, clock: Clock) -> Self {
        Self { catalog, clock }
    }

    pub fn build(&self, params: &EventParams) -> DomainEvent {
        let now = (self.clock)();
        // When no sequence is given, fall back to the clock so ids still
        // differ between calls made at distinct instants.
        let seq_token = params
            .sequence
            .map(|s| s.to_string())
            .unwrap_or_else(|| now.timestamp_millis().to_string());

        let service = params.service.as_deref().unwrap_or(DEFAULT_SERVICE);
        let environment = params
            .environment
            .as_deref()
            .unwrap_or(DEFAULT_ENVIRONMENT);
        let source = params.source.as_deref().unwrap_or(DEFAULT_SOURCE);
        let short_type = params.event_type.as_deref().unwrap_or("service.deployed");

        let artifact = params
            .artifact
            .clone()
            .unwrap_or_else(|| format!("pkg:generic/{service}@{seq_token}"));
        let pipeline_run = params
            .pipeline_run
            .clone()
            .unwrap_or_else(|| format!("run-{seq_token}"));

        DomainEvent {
            context: EventContext {
                id: format!("{EVENT_ID_PREFIX}-{service}-{seq_token}"),
                source: source.to_string(),
                event_type: self.catalog.resolve(short_type),
                timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                specversion: SPEC_VERSION.to_string(),
                chain_id: params.chain_id.clone(),
            },
            subject: EventSubject {
                id: format!("service/{service}"),
                source: source.to_string(),
                content: SubjectContent {
                    environment: EnvironmentRef {
                        id: environment.to_string(),
                    },
                    artifact_id: artifact,
                    pipeline: PipelineRef {
                        run_id: pipeline_run,
                        url: params.pipeline_url.clone().unwrap_or_default(),
                    },
                    actor: ActorRef {
                        name: params
                            .actor
                            .clone()
                            .unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
                    },
                },
            },
        }
    }
}
