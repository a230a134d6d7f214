//! Audit trail — every transparency record goes to one or more sinks.
//!
//! Sinks are append-only. Nothing in Clarion reads audit history back
//! except tests and operator tooling.

use clarion_core::TransparencyRecord;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::error::TransparencyError;

/// Where records are written.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &TransparencyRecord);
}

/// Bounded in-memory log that also forwards to other sinks.
pub struct AuditLog {
    records: Mutex<VecDeque<TransparencyRecord>>,
    retain: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("record_count", &self.count())
            .field("retain", &self.retain)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl AuditLog {
    /// Keep the most recent `retain` records, no forwarding.
    pub fn new(retain: usize) -> Self {
        Self::with_sinks(retain, Vec::new())
    }

    pub fn with_sinks(retain: usize, sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            retain,
            sinks,
        }
    }

    /// Store a record and hand it to every sink.
    pub fn append(&self, record: TransparencyRecord) {
        for sink in &self.sinks {
            sink.record(&record);
        }

        if self.retain == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.len() == self.retain {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<TransparencyRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Retained records where enhancement was attempted and nothing succeeded.
    pub fn degraded(&self) -> Vec<TransparencyRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.degraded())
            .cloned()
            .collect()
    }

    pub fn find(&self, request_id: &str) -> Option<TransparencyRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.request_id.to_string() == request_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for AuditLog {
    fn record(&self, record: &TransparencyRecord) {
        self.append(record.clone());
    }
}

/// Writes each record as a structured `AUDIT` tracing event.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, record: &TransparencyRecord) {
        tracing::info!(
            request_id = %record.request_id,
            personas = ?record.persona_ids,
            tier = %record.tier,
            complexity = record.complexity.value,
            calls = record.enhancement_calls.len(),
            frameworks = record.framework_matches.len(),
            issues = ?record.issues,
            "AUDIT"
        );
    }
}

/// Appends records as JSON lines to a file.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl std::fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink").field("path", &self.path).finish()
    }
}

impl JsonlSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TransparencyError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlSink {
    fn record(&self, record: &TransparencyRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(request_id = %record.request_id, error = %e, "Failed to serialize audit record");
                return;
            }
        };
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}") {
            warn!(path = %self.path.display(), error = %e, "Failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clarion_core::{
        CallOutcome, ComplexityScore, EnhancementCall, EnhancementTier, RequestId,
    };
    use std::sync::Arc;

    fn record(skipped: bool) -> TransparencyRecord {
        let calls = if skipped {
            vec![EnhancementCall {
                server_id: "sequential".into(),
                server_name: "Systematic Analysis".into(),
                persona_id: "diego".into(),
                capability: "systematic_analysis".into(),
                request_payload: String::new(),
                started_at: Utc::now(),
                attempts: 0,
                outcome: CallOutcome::CircuitOpenSkipped,
            }]
        } else {
            vec![]
        };
        TransparencyRecord {
            request_id: RequestId::new(),
            persona_ids: vec!["diego".into()],
            tier: EnhancementTier::SingleServer,
            complexity: ComplexityScore::zero(),
            enhancement_calls: calls,
            framework_matches: vec![],
            issues: vec![],
            composed_disclosure_text: "🎯 Diego | Engineering Leadership".into(),
            created_at: Utc::now(),
        }
    }

    /// Shares its log with the test so forwarding can be observed.
    struct Forward(Arc<AuditLog>);

    impl AuditSink for Forward {
        fn record(&self, record: &TransparencyRecord) {
            self.0.record(record);
        }
    }

    #[test]
    fn append_and_find() {
        let log = AuditLog::new(10);
        let r = record(false);
        let id = r.request_id.to_string();
        log.append(r);
        log.append(record(true));

        assert_eq!(log.count(), 2);
        assert!(log.find(&id).is_some());
        assert!(log.find("missing").is_none());
        assert_eq!(log.degraded().len(), 1);
    }

    #[test]
    fn retention_drops_oldest() {
        let log = AuditLog::new(2);
        let first = record(false);
        let first_id = first.request_id.to_string();
        log.append(first);
        log.append(record(false));
        log.append(record(false));
        assert_eq!(log.count(), 2);
        assert!(log.find(&first_id).is_none());
    }

    #[test]
    fn zero_retention_still_forwards() {
        let seen = Arc::new(AuditLog::new(10));
        let log = AuditLog::with_sinks(0, vec![Box::new(Forward(Arc::clone(&seen)))]);
        log.append(record(false));
        assert_eq!(log.count(), 0);
        assert_eq!(seen.count(), 1);
    }

    #[test]
    fn clear_empties_the_log() {
        let log = AuditLog::default();
        log.append(record(false));
        log.clear();
        assert_eq!(log.count(), 0);
    }

    #[test]
    fn jsonl_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("records.jsonl");
        let sink = JsonlSink::open(&path).unwrap();
        sink.record(&record(false));
        sink.record(&record(true));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TransparencyRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.enhancement_calls.len(), 1);
        assert_eq!(parsed.enhancement_calls[0].outcome, CallOutcome::CircuitOpenSkipped);
    }

    #[test]
    fn jsonl_sink_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        JsonlSink::open(&path).unwrap().record(&record(false));
        JsonlSink::open(&path).unwrap().record(&record(false));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn tracing_sink_does_not_panic() {
        TracingSink.record(&record(true));
    }
}
