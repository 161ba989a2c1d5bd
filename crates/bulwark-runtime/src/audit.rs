//! Persistence collaborator for audit and trend records.
//!
//! Guarded operations hand every record to an [`AuditSink`] and never let a
//! sink failure change their result.

use async_trait::async_trait;
use bulwark_core::{AuditRecord, TrendPeriod, TrendRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Upper bound on history queries.
pub const MAX_HISTORY: usize = 100;

/// Errors from persisting records.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Record rejected: {0}")]
    Rejected(String),
}

/// Where audit and trend records go.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one guarded-call record.
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;

    /// Persist a trend analysis produced on the live path.
    async fn record_trend(&self, _trend: TrendRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Keeps records in memory, newest last.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
    trends: RwLock<Vec<TrendRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call record, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    /// Every trend record, oldest first.
    pub fn trends(&self) -> Vec<TrendRecord> {
        self.trends.read().clone()
    }

    /// Records for one correlation id, newest first, at most `limit` (capped at
    /// [`MAX_HISTORY`]).
    pub fn history(&self, correlation_id: &str, limit: usize) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .filter(|r| r.correlation_id == correlation_id)
            .take(limit.min(MAX_HISTORY))
            .cloned()
            .collect()
    }

    /// Trend analyses for one period, newest first.
    pub fn trend_history(&self, period: TrendPeriod, limit: usize) -> Vec<TrendRecord> {
        self.trends
            .read()
            .iter()
            .rev()
            .filter(|t| t.period == period)
            .take(limit.min(MAX_HISTORY))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.write().push(record);
        Ok(())
    }

    async fn record_trend(&self, trend: TrendRecord) -> Result<(), AuditError> {
        self.trends.write().push(trend);
        Ok(())
    }
}

/// One line of a JSON Lines audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditLine {
    Call(AuditRecord),
    Trend(TrendRecord),
}

/// Appends records to a file, one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesAuditSink {
    /// Sink appending to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// File the sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &AuditLine) -> Result<(), AuditError> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every line back. Malformed lines are skipped with a warning.
    pub async fn read_all(&self) -> Result<Vec<AuditLine>, AuditError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(parsed) => lines.push(parsed),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), line = number + 1, error = %e, "Skipping malformed audit line")
                }
            }
        }
        Ok(lines)
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.append(&AuditLine::Call(record)).await
    }

    async fn record_trend(&self, trend: TrendRecord) -> Result<(), AuditError> {
        self.append(&AuditLine::Trend(trend)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::{FallbackReason, PriceSummary};
    use serde_json::json;

    fn record(session: &str, input: &str) -> AuditRecord {
        AuditRecord::new("ai.advice", input, json!("answer"), None, session)
    }

    #[tokio::test]
    async fn test_memory_history_newest_first() {
        let sink = MemoryAuditSink::new();
        sink.record(record("s-1", "first")).await.unwrap();
        sink.record(record("s-2", "other")).await.unwrap();
        sink.record(record("s-1", "second")).await.unwrap();

        let history = sink.history("s-1", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].input, "second");
        assert_eq!(history[1].input, "first");
        assert_eq!(sink.history("s-1", 1).len(), 1);
    }

    #[tokio::test]
    async fn test_memory_history_is_capped() {
        let sink = MemoryAuditSink::new();
        for i in 0..(MAX_HISTORY + 20) {
            sink.record(record("s-1", &i.to_string())).await.unwrap();
        }
        assert_eq!(sink.history("s-1", usize::MAX).len(), MAX_HISTORY);
    }

    #[tokio::test]
    async fn test_trend_history_filters_by_period() {
        let sink = MemoryAuditSink::new();
        let summary = PriceSummary::from_prices(&[30.0, 31.0]).unwrap();
        sink.record_trend(TrendRecord::new(TrendPeriod::OneDay, &summary, "flat"))
            .await
            .unwrap();
        sink.record_trend(TrendRecord::new(TrendPeriod::SevenDays, &summary, "bullish"))
            .await
            .unwrap();

        let week = sink.trend_history(TrendPeriod::SevenDays, 5);
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].analysis, "bullish");
    }

    #[tokio::test]
    async fn test_null_sink_accepts_everything() {
        let sink = NullAuditSink;
        assert!(sink.record(record("s", "q")).await.is_ok());
        let summary = PriceSummary::from_prices(&[1.0]).unwrap();
        assert!(sink
            .record_trend(TrendRecord::new(TrendPeriod::OneHour, &summary, "x"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_json_lines_append_and_read_back() {
        let path = std::env::temp_dir().join(format!(
            "bulwark-audit-{}-{}.jsonl",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let sink = JsonLinesAuditSink::new(&path);
        assert!(sink.read_all().await.unwrap().is_empty());

        let degraded = AuditRecord::new(
            "ai.trends",
            "7D",
            json!("fallback"),
            Some(FallbackReason::BreakerOpen),
            "s-9",
        );
        sink.record(degraded.clone()).await.unwrap();
        let summary = PriceSummary::from_prices(&[30.0]).unwrap();
        sink.record_trend(TrendRecord::new(TrendPeriod::SevenDays, &summary, "steady"))
            .await
            .unwrap();

        let lines = sink.read_all().await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], AuditLine::Call(degraded));
        assert!(matches!(&lines[1], AuditLine::Trend(t) if t.period == TrendPeriod::SevenDays));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_json_lines_keeps_trend_of_huge_prices() {
        let path = std::env::temp_dir().join(format!(
            "bulwark-audit-huge-{}-{}.jsonl",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let sink = JsonLinesAuditSink::new(&path);

        let summary = PriceSummary::from_prices(&[f64::MAX, f64::MAX]).unwrap();
        sink.record_trend(TrendRecord::new(TrendPeriod::OneYear, &summary, "bullish"))
            .await
            .unwrap();

        let lines = sink.read_all().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(matches!(&lines[0], AuditLine::Trend(t) if t.average_price.is_finite()));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
