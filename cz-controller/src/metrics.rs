//! Append-only NDJSON record of training attempts.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TrainEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub generation: u32,
    pub accepted: bool,
    pub buffer_count: u64,
    pub samples: usize,
    pub first_loss: Option<f32>,
    pub last_loss: Option<f32>,
}

pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Append one event as a single JSON line. Metrics must never take the loop
/// down, so callers ignore the result after logging it.
pub fn append_event(path: impl AsRef<Path>, event: &TrainEventV1) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_append_as_json_lines() {
        let path = std::env::temp_dir().join(format!("cz-metrics-{}.ndjson", std::process::id()));
        std::fs::remove_file(&path).ok();

        for accepted in [true, false] {
            let ev = TrainEventV1 {
                event: "train_v1",
                ts_ms: now_ms(),
                generation: 1,
                accepted,
                buffer_count: 512,
                samples: 307,
                first_loss: Some(2.5),
                last_loss: Some(2.1),
            };
            append_event(&path, &ev).unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains("\"event\":\"train_v1\"")));
        std::fs::remove_file(&path).ok();
    }
}
