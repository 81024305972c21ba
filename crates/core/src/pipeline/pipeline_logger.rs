use std::collections::HashMap;
use std::time::Instant;

/// Stages of the per-frame loop, in the order they run.
pub const STAGES: [&str; 5] = ["decode", "detect", "track", "filter", "encode"];

/// Metric name for the number of faces detected in a frame.
pub const FACES_METRIC: &str = "faces_per_frame";

/// Observer for job events that don't belong in the job's result.
///
/// Keeps the job loop independent of where its diagnostics end up.
pub trait PipelineLogger: Send {
    fn progress(&mut self, current: usize, total: usize);

    /// Time spent in `stage` for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Called once when the job stops, however it stops.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Default)]
struct Series {
    total: f64,
    count: usize,
}

impl Series {
    fn push(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Logs progress every `throttle_frames` frames through `log` and keeps
/// running totals for an end-of-job summary.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Series>,
    metrics: HashMap<String, Series>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Mean duration of `stage` per frame, if it was ever timed.
    pub fn mean_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Series::mean)
    }

    pub fn mean_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Series::mean)
    }

    /// The summary text, or `None` before any frame was timed.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Job summary ({} frames, {:.1}s):",
            self.frames_seen,
            elapsed_ms / 1000.0
        )];

        // Known stages in loop order, then anything else alphabetically.
        let mut extra: Vec<_> = self
            .timings
            .keys()
            .filter(|k| !STAGES.contains(&k.as_str()))
            .map(String::as_str)
            .collect();
        extra.sort_unstable();
        let mut order: Vec<&str> = STAGES.to_vec();
        order.extend(extra);
        for stage in order {
            let Some(series) = self.timings.get(stage) else {
                continue;
            };
            let share = if elapsed_ms > 0.0 {
                series.total / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:8} avg {:6.1}ms  total {:7.0}ms  ({share:4.1}%)",
                series.mean(),
                series.total
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort_unstable();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", self.metrics[name].mean()));
        }

        if self.frames_seen > 0 && elapsed_ms > 0.0 {
            let fps = self.frames_seen as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(25)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current.min(total) as f64 / total as f64 * 100.0;
            log::info!("Processed {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processed {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_string()).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
