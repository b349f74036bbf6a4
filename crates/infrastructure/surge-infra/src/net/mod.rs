use crate::signing::{self, SignError};
use reqwest::{redirect, Client, RequestBuilder, StatusCode};
use std::time::{Duration, Instant};
use surge_core::DomainEvent;
use tracing::warn;

// Endpoint discriminators carried as the `endpoint` metric tag.
pub const EP_WEBHOOK_INGEST: &str = "webhook_ingest";
pub const EP_DEV_LOGIN: &str = "dev_login";
pub const EP_HOME: &str = "home";
pub const EP_SERVICES_GRID: &str = "services_grid";
pub const EP_DEPLOYMENTS: &str = "deployments";
pub const EP_SERVICE_DETAIL: &str = "service_detail";

/// Client tuned for harness traffic: per-request timeout, no automatic
/// redirect following (login redirects are asserted, not chased), and a
/// cookie store so the session established by the dev login flows to the
/// read endpoints.
pub fn default_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .cookie_store(true)
        .build()
}

/// Result of one target call. Purely observational: transport and protocol
/// failures are data for the metrics layer, never control flow.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub endpoint: &'static str,
    /// `None` on transport failure (refused, timed out, reset).
    pub status: Option<u16>,
    pub duration: Duration,
    pub ok: bool,
}

/// Identity attributes for the development login form.
#[derive(Debug, Clone)]
pub struct LoginIdentity {
    pub email: String,
    pub nickname: String,
    pub name: String,
    pub next: String,
}

impl Default for LoginIdentity {
    fn default() -> Self {
        Self {
            email: "loadtest-admin@example.local".to_string(),
            nickname: "loadtest-user".to_string(),
            name: "Load Test User".to_string(),
            next: "/".to_string(),
        }
    }
}

/// HTTP facade over the deployment-tracking target service.
#[derive(Debug)]
pub struct TargetClient {
    http: Client,
    base_url: String,
    auth_token: String,
    webhook_secret: String,
}

impl TargetClient {
    /// Credentials are validated here so a missing secret fails the run
    /// before any request is sent.
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Result<Self, SignError> {
        let auth_token = auth_token.into();
        let webhook_secret = webhook_secret.into();
        signing::webhook_headers(b"", &webhook_secret, &auth_token)?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            auth_token,
            webhook_secret,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Deliver one signed event. The payload is serialized exactly once and
    /// those bytes feed both the signature and the request body.
    pub async fn post_webhook(&self, event: &DomainEvent) -> CallOutcome {
        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(err) => {
                warn!("event serialization failed: {err}");
                return CallOutcome {
                    endpoint: EP_WEBHOOK_INGEST,
                    status: None,
                    duration: Duration::ZERO,
                    ok: false,
                };
            }
        };
        let headers = match signing::webhook_headers(&body, &self.webhook_secret, &self.auth_token)
        {
            Ok(headers) => headers,
            Err(err) => {
                // Credentials were validated at construction; anything here
                // is a bug, but still observational.
                warn!("webhook header assembly failed: {err}");
                return CallOutcome {
                    endpoint: EP_WEBHOOK_INGEST,
                    status: None,
                    duration: Duration::ZERO,
                    ok: false,
                };
            }
        };

        let request = self
            .http
            .post(format!("{}/webhooks/cdevents", self.base_url))
            .headers(headers)
            .body(body);
        self.execute(EP_WEBHOOK_INGEST, request, |status| status.as_u16() < 300)
            .await
    }

    /// Establish a session. Success is a redirect (302/303); anything else
    /// is a recorded failure, not an abort.
    pub async fn dev_login(&self, identity: &LoginIdentity) -> CallOutcome {
        let form = [
            ("email", identity.email.as_str()),
            ("nickname", identity.nickname.as_str()),
            ("name", identity.name.as_str()),
            ("next", identity.next.as_str()),
        ];
        let request = self
            .http
            .post(format!("{}/auth/dev/login", self.base_url))
            .form(&form);
        self.execute(EP_DEV_LOGIN, request, |status| {
            matches!(status.as_u16(), 302 | 303)
        })
        .await
    }

    pub async fn get_home(&self) -> CallOutcome {
        let request = self.http.get(format!("{}/", self.base_url));
        self.execute(EP_HOME, request, |status| status.is_success())
            .await
    }

    pub async fn get_services_grid(&self, env: &str) -> CallOutcome {
        let request = self
            .http
            .get(format!("{}/services/grid", self.base_url))
            .query(&[("env", env)]);
        self.execute(EP_SERVICES_GRID, request, |status| status.is_success())
            .await
    }

    pub async fn get_deployments(&self) -> CallOutcome {
        let request = self.http.get(format!("{}/deployments", self.base_url));
        self.execute(EP_DEPLOYMENTS, request, |status| status.is_success())
            .await
    }

    pub async fn get_service_detail(&self, service: &str) -> CallOutcome {
        let request = self.http.get(format!("{}/s/{service}", self.base_url));
        self.execute(EP_SERVICE_DETAIL, request, |status| status.is_success())
            .await
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
        ok_when: impl Fn(StatusCode) -> bool,
    ) -> CallOutcome {
        let started = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                // Drain the body so the measured duration covers the full
                // response, not just the header exchange.
                let _ = response.bytes().await;
                CallOutcome {
                    endpoint,
                    status: Some(status.as_u16()),
                    duration: started.elapsed(),
                    ok: ok_when(status),
                }
            }
            Err(err) => {
                warn!(endpoint, "request failed: {err}");
                CallOutcome {
                    endpoint,
                    status: None,
                    duration: started.elapsed(),
                    ok: false,
                }
            }
        }
    }
}
