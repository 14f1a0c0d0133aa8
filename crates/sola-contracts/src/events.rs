use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Session log for one studio run, written as `events.jsonl`.
///
/// Every line names its event `type`, the `session_id` that produced it and a
/// `ts` with microsecond precision. Payload keys are applied after those, so a
/// caller may replace them. Clones share the file and its lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    log: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    append: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            log: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                append: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }

    pub fn session_id(&self) -> &str {
        &self.log.session_id
    }

    /// Appends one event and returns the record as written.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let record = self.compose(event_type, payload);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        self.append(&line)?;
        Ok(record)
    }

    fn compose(&self, event_type: &str, payload: EventPayload) -> Value {
        let mut record = Map::from_iter([
            ("type".to_string(), Value::from(event_type)),
            ("session_id".to_string(), Value::from(self.session_id())),
            ("ts".to_string(), Value::from(timestamp())),
        ]);
        record.extend(payload);
        Value::Object(record)
    }

    fn append(&self, line: &str) -> anyhow::Result<()> {
        let path = self.path();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating session log dir {}", dir.display()))?;
        }
        let _held = self
            .log
            .append
            .lock()
            .map_err(|_| anyhow!("session log lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("appending to session log {}", path.display()))
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
