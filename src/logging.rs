//! JSON line-delimited event logging.
//!
//! Progress events (layer started, filter kept, filter skipped) are appended
//! as one JSON object per line. Logging failures never abort a run; callers
//! report them to stderr and continue.

use std::fs::OpenOptions;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::json;

const LOG_PATH: &str = "filter_ascent_log.jsonl";

/// Append a single event line to the log file.
pub fn log_event<T: Serialize>(event: &str, payload: &T) -> io::Result<()> {
    let payload = serde_json::to_value(payload)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let line = json!({ "event": event, "payload": payload });

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_PATH)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Log an event, reporting any failure to stderr instead of propagating it.
pub fn log_or_warn<T: Serialize>(event: &str, payload: &T) {
    if let Err(err) = log_event(event, payload) {
        eprintln!("failed to log event {event}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_serializes_payload() {
        // Exercise the serialization path; file IO is covered by the
        // end-to-end run.
        let payload = json!({ "layer": "conv_1", "filter": 3 });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["filter"], 3);
    }
}
