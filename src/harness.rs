//! Probe harness: drives every registered adapter through a health check
//! and a minimal chat round trip, collecting timing and status.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::factory::AdapterFactory;
use crate::types::{AdapterCapabilities, AdapterConfig, Message};

const DEFAULT_PROBE_MESSAGE: &str = "Hello, can you respond with just 'OK'?";
const PREVIEW_CHARS: usize = 100;

/// Outcome of probing one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Health check passed and the chat probe returned a response.
    Success,
    /// Health check failed; no generation was attempted.
    Unhealthy,
    /// Some stage raised an error.
    Error,
}

/// Per-provider result record.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub provider: String,
    pub model: Option<String>,
    pub status: ProbeStatus,
    pub error: Option<String>,
    pub capabilities: Option<AdapterCapabilities>,
    pub health_check_duration: Option<Duration>,
    pub chat_duration: Option<Duration>,
    /// First characters of the probe response content.
    pub response_preview: Option<String>,
}

impl ProbeReport {
    fn pending(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: None,
            status: ProbeStatus::Error,
            error: None,
            capabilities: None,
            health_check_duration: None,
            chat_duration: None,
            response_preview: None,
        }
    }
}

/// Tally derived from a probe run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSummary {
    pub total: usize,
    pub succeeded: usize,
    pub unhealthy: usize,
    pub failed: usize,
}

impl ProbeSummary {
    pub fn from_reports(reports: &[ProbeReport]) -> Self {
        let mut summary = Self {
            total: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match report.status {
                ProbeStatus::Success => summary.succeeded += 1,
                ProbeStatus::Unhealthy => summary.unhealthy += 1,
                ProbeStatus::Error => summary.failed += 1,
            }
        }
        summary
    }
}

/// Exercises registered adapters through the shared contract. A failure in
/// one provider's probe is recorded in its report and never propagates into
/// the run of another.
pub struct ProbeHarness {
    factory: AdapterFactory,
    probe_message: String,
}

impl ProbeHarness {
    pub fn new(factory: AdapterFactory) -> Self {
        Self {
            factory,
            probe_message: DEFAULT_PROBE_MESSAGE.to_string(),
        }
    }

    pub fn with_probe_message(mut self, message: impl Into<String>) -> Self {
        self.probe_message = message.into();
        self
    }

    pub fn factory(&self) -> &AdapterFactory {
        &self.factory
    }

    /// Probe a single provider: create, report capabilities, health-check,
    /// then one minimal generation, releasing the adapter at the end.
    pub async fn probe(
        &self,
        provider: &str,
        config: Option<AdapterConfig>,
        model: Option<&str>,
    ) -> ProbeReport {
        let mut report = ProbeReport::pending(provider);

        let adapter = match self.factory.create(provider, config, model) {
            Ok(adapter) => adapter,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.model = Some(adapter.config().model.clone());
        report.capabilities = Some(adapter.capabilities());

        let started = Instant::now();
        let healthy = adapter.health_check().await;
        report.health_check_duration = Some(started.elapsed());

        if !healthy {
            report.status = ProbeStatus::Unhealthy;
            report.error = Some("health check failed".to_string());
            adapter.close().await;
            return report;
        }

        let messages = [Message::user(self.probe_message.as_str())];
        let started = Instant::now();
        match adapter.chat(&messages).await {
            Ok(response) => {
                report.chat_duration = Some(started.elapsed());
                report.status = ProbeStatus::Success;
                report.response_preview =
                    Some(response.content.chars().take(PREVIEW_CHARS).collect());
            }
            Err(e) => {
                report.chat_duration = Some(started.elapsed());
                report.error = Some(e.to_string());
            }
        }

        adapter.close().await;
        report
    }

    /// Probe every registered provider sequentially, in registry order.
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::new();
        for provider in self.factory.supported_providers() {
            reports.push(self.probe(&provider, None, None).await);
        }
        reports
    }
}
