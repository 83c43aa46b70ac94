use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Severity of a lifecycle event, one per terminal log colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Shared handle to a session's `events.jsonl`.
///
/// Each record starts with `type`, `session_id` and `ts`; payload keys are
/// written after them and win on collision. Clones append to the same file
/// and never interleave partial lines.
#[derive(Debug, Clone)]
pub struct EventWriter {
    sink: Arc<EventSink>,
}

#[derive(Debug)]
struct EventSink {
    path: PathBuf,
    session_id: String,
    append: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            sink: Arc::new(EventSink {
                path: path.into(),
                session_id: session_id.into(),
                append: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.sink.path
    }

    pub fn session_id(&self) -> &str {
        &self.sink.session_id
    }

    /// Appends one record and returns it as written.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut record = self.header(event_type);
        record.extend(payload);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        if let Some(dir) = self.sink.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let _held = self
            .sink
            .append
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.sink.path)?
            .write_all(&line)?;

        Ok(Value::Object(record))
    }

    /// Emits an event carrying `level` and a human-readable `message`, unless
    /// the payload already sets them.
    pub fn log(
        &self,
        event_type: &str,
        level: EventLevel,
        message: impl Into<String>,
        mut payload: EventPayload,
    ) -> anyhow::Result<Value> {
        if !payload.contains_key("level") {
            payload.insert("level".into(), Value::from(level.as_str()));
        }
        if !payload.contains_key("message") {
            payload.insert("message".into(), Value::from(message.into()));
        }
        self.emit(event_type, payload)
    }

    fn header(&self, event_type: &str) -> EventPayload {
        let mut record = EventPayload::new();
        record.insert("type".into(), Value::from(event_type));
        record.insert("session_id".into(), Value::from(self.session_id()));
        record.insert(
            "ts".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    fn read_records(path: &Path) -> anyhow::Result<Vec<Value>> {
        fs::read_to_string(path)?
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).map_err(anyhow::Error::from))
            .collect()
    }

    #[test]
    fn record_carries_header_and_payload() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "forge-1");

        let mut payload = EventPayload::new();
        payload.insert("idea_id".into(), json!("idea-7"));
        let written = writer.emit("verification_started", payload)?;

        let records = read_records(&path)?;
        assert_eq!(records, vec![written]);
        assert_eq!(records[0]["type"], json!("verification_started"));
        assert_eq!(records[0]["session_id"], json!("forge-1"));
        assert_eq!(records[0]["idea_id"], json!("idea-7"));
        DateTime::parse_from_rfc3339(records[0]["ts"].as_str().unwrap_or_default())?;
        Ok(())
    }

    #[test]
    fn log_respects_explicit_level() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = EventWriter::new(dir.path().join("events.jsonl"), "forge-1");

        let tagged = writer.log(
            "verification_failed",
            EventLevel::Error,
            "Verification failed: Moon Vault",
            EventPayload::new(),
        )?;
        assert_eq!(tagged["level"], json!("error"));
        assert_eq!(tagged["message"], json!("Verification failed: Moon Vault"));

        let mut payload = EventPayload::new();
        payload.insert("level".into(), json!("warning"));
        let overridden = writer.log("batch_saved", EventLevel::Success, "saved", payload)?;
        assert_eq!(overridden["level"], json!("warning"));
        Ok(())
    }

    #[test]
    fn concurrent_clones_write_whole_lines() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "forge-1");

        thread::scope(|scope| {
            for worker in 0..4 {
                let writer = writer.clone();
                scope.spawn(move || {
                    for step in 0..25 {
                        let mut payload = EventPayload::new();
                        payload.insert("worker".into(), json!(worker));
                        payload.insert("step".into(), json!(step));
                        writer.emit("idea_synthesized", payload).ok();
                    }
                });
            }
        });

        let records = read_records(&path)?;
        assert_eq!(records.len(), 100);
        assert!(records
            .iter()
            .all(|record| record["type"] == json!("idea_synthesized")));
        Ok(())
    }
}
