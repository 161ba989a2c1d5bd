//! Market advisor backed by a generative model.
//!
//! Both operations are gated by [`FeatureFlag::AiAdvisor`] and share the
//! `gemini-api` breaker. When the model is unusable the answer comes from the
//! static degradation tables.

use crate::guard::{GuardedCall, GuardedOperation};
use crate::prompts;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::Guarded;
use bulwark_core::degradation::{self, DegradationPolicy};
use bulwark_core::{BreakerStatus, FeatureFlag, FlagSnapshot, PriceSummary, TrendPeriod, TrendRecord};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Breaker name shared by every model call.
pub const ADVISOR_BREAKER: &str = "gemini-api";

pub const MIN_QUERY_CHARS: usize = 5;
pub const MAX_QUERY_CHARS: usize = 500;

/// Request validation errors. Dependency failures never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisorError {
    #[error("Price data must contain at least one price")]
    EmptyPriceData,

    #[error("Price data contains a non-finite value at index {index}")]
    InvalidPrice { index: usize },

    #[error("Query must be between {min} and {max} characters, got {len}")]
    InvalidQuery { len: usize, min: usize, max: usize },
}

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Degraded,
}

/// Snapshot for health endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorStatus {
    pub service: String,
    pub status: ServiceHealth,
    pub provider: String,
    pub breaker: BreakerStatus,
    pub available: bool,
    pub features: FlagSnapshot,
}

/// Trend analysis and trading advice with graceful degradation.
pub struct AdvisorService {
    guard: GuardedOperation,
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
}

impl AdvisorService {
    /// The guard's breaker should be the registry's [`ADVISOR_BREAKER`].
    pub fn new(guard: GuardedOperation, provider: Arc<dyn LlmProvider>) -> Self {
        let completion = CompletionConfig::new(provider.default_model());
        Self {
            guard,
            provider,
            completion,
        }
    }

    /// Override model and sampling settings.
    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    /// Guard wrapping every model call.
    pub fn guard(&self) -> &GuardedOperation {
        &self.guard
    }

    /// Analyze a price series for `period`.
    ///
    /// On the live path the analysis is also stored as a [`TrendRecord`]; a
    /// storage failure is logged and does not change the answer.
    pub async fn analyze_trends(
        &self,
        period: TrendPeriod,
        prices: &[f64],
        session: Option<&str>,
    ) -> Result<Guarded<String>, AdvisorError> {
        if let Some(index) = prices.iter().position(|p| !p.is_finite()) {
            return Err(AdvisorError::InvalidPrice { index });
        }
        let summary = PriceSummary::from_prices(prices).ok_or(AdvisorError::EmptyPriceData)?;

        let call = GuardedCall::new(
            "ai.trends",
            FeatureFlag::AiAdvisor,
            format!("{} ({} prices)", period, summary.samples),
            correlation_id(session),
        );
        let messages = vec![
            ChatMessage::system(prompts::ADVISOR_SYSTEM_PROMPT),
            ChatMessage::user(prompts::trend_prompt(period, &summary)),
        ];

        let live = move || async move {
            let response = self.provider.complete(messages, &self.completion).await?;
            let record = TrendRecord::new(period, &summary, response.content.clone());
            if let Err(e) = self.guard.audit().record_trend(record).await {
                tracing::warn!(period = %period, error = %e, "Failed to store trend analysis");
            }
            Ok::<_, ProviderError>(response.content)
        };

        let degrade = || degradation::trends().resolve(period.as_str()).to_string();

        Ok(self.guard.run(call, live, degrade).await)
    }

    /// Answer a free-form question.
    pub async fn generate_advice(
        &self,
        query: &str,
        session: Option<&str>,
    ) -> Result<Guarded<String>, AdvisorError> {
        let len = query.chars().count();
        if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&len) {
            return Err(AdvisorError::InvalidQuery {
                len,
                min: MIN_QUERY_CHARS,
                max: MAX_QUERY_CHARS,
            });
        }

        let call = GuardedCall::new(
            "ai.advice",
            FeatureFlag::AiAdvisor,
            query,
            correlation_id(session),
        );
        let messages = vec![
            ChatMessage::system(prompts::ADVISOR_SYSTEM_PROMPT),
            ChatMessage::user(prompts::advice_prompt(query)),
        ];

        let live = move || async move {
            self.provider
                .complete(messages, &self.completion)
                .await
                .map(|response| response.content)
        };

        let degrade = || degradation::advice().resolve(query).to_string();

        Ok(self.guard.run(call, live, degrade).await)
    }

    /// Health, breaker and flag snapshot for status endpoints.
    pub async fn status(&self) -> AdvisorStatus {
        let breaker = self.guard.breaker().status();
        let available = breaker.is_available();
        AdvisorStatus {
            service: "AI Advisor".to_string(),
            status: if available {
                ServiceHealth::Healthy
            } else {
                ServiceHealth::Degraded
            },
            provider: self.provider.name().to_string(),
            breaker,
            available,
            features: self.guard.flags().get_all_flags().await,
        }
    }
}

impl std::fmt::Debug for AdvisorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorService")
            .field("provider", &self.provider.name())
            .field("model", &self.completion.model)
            .field("guard", &self.guard)
            .finish()
    }
}

fn correlation_id(session: Option<&str>) -> String {
    match session {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => format!("session-{}", Utc::now().timestamp_millis()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::flags::FeatureFlagStore;
    use crate::providers::{CompletionResponse, TokenUsage, UnconfiguredProvider};
    use crate::resilience::CircuitBreaker;
    use async_trait::async_trait;
    use bulwark_core::{BreakerSettings, FallbackReason, FlagSettings, TrendDirection};
    use parking_lot::Mutex;

    struct CannedProvider {
        reply: &'static str,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl CannedProvider {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen.lock().push(messages);
            Ok(CompletionResponse {
                content: self.reply.to_string(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn service(
        ai_enabled: bool,
        provider: Arc<dyn LlmProvider>,
    ) -> (AdvisorService, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let flags = FlagSettings::default().with_default(FeatureFlag::AiAdvisor, ai_enabled);
        let guard = GuardedOperation::new(
            Arc::new(FeatureFlagStore::without_backend(&flags)),
            Arc::new(CircuitBreaker::new(ADVISOR_BREAKER, BreakerSettings::default())),
            sink.clone(),
        );
        (AdvisorService::new(guard, provider), sink)
    }

    #[tokio::test]
    async fn test_live_trend_analysis_is_stored() {
        let provider = Arc::new(CannedProvider::new("Outlook is bullish this week."));
        let (advisor, sink) = service(true, provider.clone());

        let result = advisor
            .analyze_trends(TrendPeriod::SevenDays, &[31.5, 32.0, 31.8, 32.5], Some("s-1"))
            .await
            .unwrap();

        assert_eq!(result, Guarded::live("Outlook is bullish this week.".to_string()));

        let trends = sink.trends();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].direction, TrendDirection::Up);
        assert_eq!(trends[0].high_price, 32.5);

        let records = sink.records();
        assert_eq!(records[0].operation, "ai.trends");
        assert_eq!(records[0].correlation_id, "s-1");

        let seen = provider.seen.lock();
        assert!(seen[0][1].content.contains("7D period"));
    }

    #[tokio::test]
    async fn test_disabled_flag_uses_trend_table() {
        let (advisor, sink) = service(false, Arc::new(CannedProvider::new("live")));

        let result = advisor
            .analyze_trends(TrendPeriod::OneYear, &[30.0], None)
            .await
            .unwrap();

        assert_eq!(result.value, degradation::trends().resolve("1Y"));
        assert_eq!(result.fallback_reason, Some(FallbackReason::FlagDisabled));
        assert!(sink.trends().is_empty());
        assert!(sink.records()[0].correlation_id.starts_with("session-"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_degrades_advice() {
        let (advisor, _sink) = service(true, Arc::new(UnconfiguredProvider::new("no key")));

        let result = advisor
            .generate_advice("Where should I store my bars?", Some("s-2"))
            .await
            .unwrap();

        assert_eq!(result.value, degradation::advice().resolve("Where should I store my bars?"));
        assert_eq!(result.fallback_reason, Some(FallbackReason::UpstreamFailure));
        assert_eq!(advisor.guard().breaker().status().metrics.failure_count, 1);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (advisor, sink) = service(true, Arc::new(CannedProvider::new("live")));

        assert_eq!(
            advisor.analyze_trends(TrendPeriod::OneDay, &[], None).await,
            Err(AdvisorError::EmptyPriceData)
        );
        assert_eq!(
            advisor
                .analyze_trends(TrendPeriod::OneDay, &[30.0, f64::NAN], None)
                .await,
            Err(AdvisorError::InvalidPrice { index: 1 })
        );
        assert!(matches!(
            advisor.generate_advice("buy", None).await,
            Err(AdvisorError::InvalidQuery { len: 3, .. })
        ));
        let long = "x".repeat(MAX_QUERY_CHARS + 1);
        assert!(advisor.generate_advice(&long, None).await.is_err());

        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_breaker_and_flags() {
        let (advisor, _) = service(true, Arc::new(CannedProvider::new("live")));
        let status = advisor.status().await;

        assert_eq!(status.breaker.name, ADVISOR_BREAKER);
        assert!(status.available);
        assert_eq!(status.status, ServiceHealth::Healthy);
        assert!(status.features[&FeatureFlag::AiAdvisor]);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["features"]["FEATURE_AI_ADVISOR"], true);
        assert_eq!(json["breaker"]["state"], "CLOSED");
    }
}
