//! Per-item progress state machine.
//!
//! The engine reports progress once per stream and streams interleave, so the
//! raw samples for one item can repeat, regress or keep arriving after the
//! item is done. The tracker turns them into a clean stream: `downloading`
//! percents strictly increase, and `finished` is emitted at most once per id.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

use regex::Regex;

use crate::core::events::{StatusEvent, TotalBytes};

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());

/// One raw progress data point as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub id: String,
    pub status: String,
    pub percent_text: String,
    pub total_bytes: Option<u64>,
}

impl RawSample {
    pub fn new(id: impl Into<String>, status: impl Into<String>, percent_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            percent_text: percent_text.into(),
            total_bytes: None,
        }
    }

    pub fn with_total_bytes(mut self, total: Option<u64>) -> Self {
        self.total_bytes = total;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("finished")
    }

    pub fn is_downloading(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("downloading")
    }
}

/// Parses an engine percent string such as `"\x1b[0;94m 42.3%\x1b[0m"`.
/// Anything unparsable counts as 0; the result is clamped to `[0, 100]`.
pub fn parse_percent(text: &str) -> f64 {
    let cleaned = ANSI_RE.replace_all(text, "");
    let cleaned = cleaned.trim().trim_end_matches('%').trim();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressState {
    pub last_reported_percent: f64,
    pub finished_reported: bool,
    pub failed_reported: bool,
}

impl ProgressState {
    fn is_terminal(&self) -> bool {
        self.finished_reported || self.failed_reported
    }
}

/// Shared id → state map. Ids are owned by exactly one download task, the
/// mutex only protects the map structure against concurrent inserts.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    states: Mutex<HashMap<String, ProgressState>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProgressState>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("progress state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Feeds one raw sample. Returns the event to emit, if any.
    /// Only `downloading` and `finished` samples count; failures surface
    /// through the engine's result instead.
    pub fn observe(&self, sample: &RawSample, output_path: &str) -> Option<StatusEvent> {
        if !sample.is_downloading() && !sample.is_complete() {
            return None;
        }
        let percent = parse_percent(&sample.percent_text);
        let mut states = self.lock();

        let first_sample = !states.contains_key(&sample.id);
        let state = states.entry(sample.id.clone()).or_default();
        if state.is_terminal() {
            return None;
        }

        if sample.is_complete() || percent >= 100.0 {
            state.finished_reported = true;
            state.last_reported_percent = 100.0;
            return Some(StatusEvent::finished(
                sample.id.clone(),
                output_path,
                TotalBytes::from(sample.total_bytes),
            ));
        }

        if first_sample || percent > state.last_reported_percent {
            state.last_reported_percent = percent;
            return Some(StatusEvent::downloading(
                sample.id.clone(),
                percent,
                TotalBytes::from(sample.total_bytes),
            ));
        }

        None
    }

    /// Marks `id` as complete outside of the sample stream (engine returned
    /// successfully, or the output already existed).
    pub fn finish(&self, id: &str, output_path: &str, total_bytes: TotalBytes) -> Option<StatusEvent> {
        let mut states = self.lock();
        let state = states.entry(id.to_string()).or_default();
        if state.is_terminal() {
            return None;
        }
        state.finished_reported = true;
        state.last_reported_percent = 100.0;
        Some(StatusEvent::finished(id, output_path, total_bytes))
    }

    /// Moves `id` into the error terminal. A failure after a stream already
    /// reported `finished` (e.g. a failing merge) is still surfaced once.
    pub fn fail(&self, id: &str, message: &str) -> Option<StatusEvent> {
        let mut states = self.lock();
        let state = states.entry(id.to_string()).or_default();
        if state.failed_reported {
            return None;
        }
        state.failed_reported = true;
        Some(StatusEvent::error(id, message))
    }

    pub fn forget(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn state(&self, id: &str) -> Option<ProgressState> {
        self.lock().get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventStatus;
    use std::sync::Arc;

    fn sample(id: &str, status: &str, pct: &str) -> RawSample {
        RawSample::new(id, status, pct)
    }

    fn feed(tracker: &ProgressTracker, samples: &[RawSample]) -> Vec<StatusEvent> {
        samples
            .iter()
            .filter_map(|s| tracker.observe(s, "/out/x.mkv"))
            .collect()
    }

    #[test]
    fn parse_percent_strips_ansi_and_suffix() {
        assert_eq!(parse_percent("\u{1b}[0;94m 42.3%\u{1b}[0m"), 42.3);
        assert_eq!(parse_percent("  7%"), 7.0);
        assert_eq!(parse_percent("100.0%"), 100.0);
    }

    #[test]
    fn parse_percent_falls_back_to_zero() {
        assert_eq!(parse_percent("N/A"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("NaN%"), 0.0);
        assert_eq!(parse_percent("-5%"), 0.0);
        assert_eq!(parse_percent("250%"), 100.0);
    }

    #[test]
    fn downloading_percents_strictly_increase() {
        let tracker = ProgressTracker::new();
        let events = feed(
            &tracker,
            &[
                sample("a", "downloading", "1.0%"),
                sample("a", "downloading", "5.0%"),
                sample("a", "downloading", "5.0%"),
                sample("a", "downloading", "3.2%"),
                sample("a", "downloading", "12.0%"),
                sample("a", "downloading", "0.4%"),
                sample("a", "downloading", "40.0%"),
            ],
        );
        let percents: Vec<f64> = events.iter().filter_map(|e| e.percent).collect();
        assert_eq!(percents, vec![1.0, 5.0, 12.0, 40.0]);
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn finished_emitted_once_and_stragglers_dropped() {
        let tracker = ProgressTracker::new();
        let events = feed(
            &tracker,
            &[
                sample("a", "downloading", "60%"),
                sample("a", "finished", "100%"),
                // audio stream starts after the video stream completed
                sample("a", "downloading", "2%"),
                sample("a", "finished", "100%"),
                sample("a", "downloading", "100%"),
            ],
        );
        let finished: Vec<_> = events
            .iter()
            .filter(|e| e.status == EventStatus::Finished)
            .collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].percent, Some(100.0));
        assert_eq!(finished[0].output_path.as_deref(), Some("/out/x.mkv"));
        assert_eq!(events.len(), 2);
        assert!(tracker.finish("a", "/out/x.mkv", TotalBytes::Unknown).is_none());
    }

    #[test]
    fn hundred_percent_counts_as_finished() {
        let tracker = ProgressTracker::new();
        let ev = tracker
            .observe(&sample("a", "downloading", "100.0%"), "/o")
            .unwrap();
        assert_eq!(ev.status, EventStatus::Finished);
        let state = tracker.state("a").unwrap();
        assert!(state.finished_reported);
        assert_eq!(state.last_reported_percent, 100.0);
    }

    #[test]
    fn unparsable_first_sample_still_produces_event() {
        let tracker = ProgressTracker::new();
        let ev = tracker
            .observe(&sample("a", "downloading", "garbage"), "/o")
            .unwrap();
        assert_eq!(ev.status, EventStatus::Downloading);
        assert_eq!(ev.percent, Some(0.0));
        assert!(tracker
            .observe(&sample("a", "downloading", "garbage"), "/o")
            .is_none());
    }

    #[test]
    fn error_status_samples_are_ignored() {
        let tracker = ProgressTracker::new();
        assert!(tracker.observe(&sample("a", "error", "40%"), "/o").is_none());
        assert!(tracker.state("a").is_none());

        tracker.observe(&sample("a", "downloading", "10%"), "/o");
        assert!(tracker.observe(&sample("a", "error", "90%"), "/o").is_none());
        assert_eq!(tracker.state("a").unwrap().last_reported_percent, 10.0);
    }

    #[test]
    fn total_bytes_carried_through() {
        let tracker = ProgressTracker::new();
        let ev = tracker
            .observe(
                &sample("a", "downloading", "10%").with_total_bytes(Some(2048)),
                "/o",
            )
            .unwrap();
        assert_eq!(ev.total_bytes, TotalBytes::Known(2048));
    }

    #[test]
    fn fail_is_terminal_and_reported_once() {
        let tracker = ProgressTracker::new();
        tracker.observe(&sample("a", "downloading", "10%"), "/o");
        let ev = tracker.fail("a", "HTTP Error 403").unwrap();
        assert_eq!(ev.status, EventStatus::Error);
        assert!(tracker.fail("a", "again").is_none());
        assert!(tracker.observe(&sample("a", "downloading", "50%"), "/o").is_none());
        assert!(tracker.finish("a", "/o", TotalBytes::Unknown).is_none());
    }

    #[test]
    fn forget_drops_state() {
        let tracker = ProgressTracker::new();
        tracker.observe(&sample("a", "downloading", "10%"), "/o");
        assert!(tracker.state("a").is_some());
        tracker.forget("a");
        assert!(tracker.state("a").is_none());
    }

    #[test]
    fn ids_do_not_interfere() {
        let tracker = ProgressTracker::new();
        tracker.observe(&sample("b", "downloading", "20%"), "/b");
        tracker.observe(&sample("a", "downloading", "70%"), "/a");
        tracker.observe(&sample("a", "finished", "100%"), "/a");

        let b = tracker.state("b").unwrap();
        assert!(!b.finished_reported);
        assert_eq!(b.last_reported_percent, 20.0);

        let ev = tracker
            .observe(&sample("b", "downloading", "45%"), "/b")
            .unwrap();
        assert_eq!(ev.status, EventStatus::Downloading);
        assert_eq!(ev.percent, Some(45.0));
    }

    #[test]
    fn concurrent_workers_keep_their_own_state() {
        let tracker = Arc::new(ProgressTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|w| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    let id = format!("item-{w}");
                    let mut last = -1.0;
                    let mut finished = 0;
                    for step in 0..=100 {
                        let pct = format!("{}%", step);
                        if let Some(ev) = tracker.observe(&RawSample::new(&id, "downloading", pct), "/o") {
                            match ev.status {
                                EventStatus::Downloading => {
                                    let p = ev.percent.unwrap();
                                    assert!(p > last);
                                    last = p;
                                }
                                EventStatus::Finished => finished += 1,
                                EventStatus::Error => unreachable!(),
                            }
                        }
                    }
                    finished
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), 1);
        }
        for w in 0..8 {
            assert!(tracker.state(&format!("item-{w}")).unwrap().finished_reported);
        }
    }
}
