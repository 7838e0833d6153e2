use std::io::Write;
use std::sync::{Arc, Mutex};

use tubegrab_core::core::events::{frame, EventEmitter, EventStatus, MetadataPayload, StatusEvent};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes framed payloads to the protocol stream (stdout) and a bracketed
/// diagnostic line for every error event to the diagnostic stream (stderr).
#[derive(Clone)]
pub struct LineEventEmitter {
    out: SharedWriter,
    diag: SharedWriter,
}

impl LineEventEmitter {
    pub fn new(out: Box<dyn Write + Send>, diag: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            diag: Arc::new(Mutex::new(diag)),
        }
    }

    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    fn write_line(writer: &SharedWriter, line: &str) {
        let mut w = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(w, "{}", line).and_then(|_| w.flush()) {
            tracing::warn!("failed to write event line: {}", e);
        }
    }

    fn write_framed<T: serde::Serialize>(&self, payload: &T) {
        match frame(payload) {
            Ok(line) => Self::write_line(&self.out, &line),
            Err(e) => tracing::error!("failed to serialize event: {}", e),
        }
    }
}

impl EventEmitter for LineEventEmitter {
    fn emit_metadata(&self, payload: &MetadataPayload) {
        self.write_framed(payload);
    }

    fn emit_status(&self, event: &StatusEvent) {
        self.write_framed(event);
        if event.status == EventStatus::Error {
            let message = event.message.as_deref().unwrap_or("unknown error");
            Self::write_line(&self.diag, &format!("[ERROR] {}: {}", event.id, message));
        }
    }
}
