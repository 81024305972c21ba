use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::filtering::domain::filter_config::FilterConfig;
use crate::filtering::infrastructure::filter_engine::FilterEngine;
use crate::pipeline::job_error::JobError;
use crate::pipeline::job_state::JobState;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger, FACES_METRIC};
use crate::shared::video_metadata::VideoMetadata;
use crate::tracking::domain::identity_lookup::IdentityLookup;
use crate::tracking::domain::tracker_config::TrackerConfig;
use crate::tracking::face_tracker::FaceTracker;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// One run of the privacy filter over one source video.
///
/// Frames are decoded, detected, tracked, filtered and encoded strictly in
/// order on the calling thread. Output goes to a `.part` file next to
/// `output_path` and is renamed into place only when every frame has been
/// written; a canceled or failed run removes it.
///
/// A job is single-use: a second `run` fails with [`JobError::AlreadyRun`].
pub struct Job {
    source_path: PathBuf,
    output_path: PathBuf,
    state: JobState,
    frames_total: usize,
    frames_processed: usize,
    cancel_requested: bool,
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    detector: Arc<dyn FaceDetector>,
    identity: Option<Arc<dyn IdentityLookup + Send + Sync>>,
    tracker: FaceTracker,
    logger: Box<dyn PipelineLogger>,
}

impl Job {
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Arc<dyn FaceDetector>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            state: JobState::Idle,
            frames_total: 0,
            frames_processed: 0,
            cancel_requested: false,
            reader,
            writer,
            detector,
            identity: None,
            tracker: FaceTracker::default(),
            logger: Box::new(NullPipelineLogger),
        }
    }

    /// Recognition used in identity-aware mode. Without it every face is
    /// blurred.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityLookup + Send + Sync>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_tracker_config(mut self, config: TrackerConfig) -> Self {
        self.tracker = FaceTracker::new(config);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Where the finished video lands. Only exists once the job is
    /// [`JobState::Completed`].
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Frame count reported by the container. Zero when unknown.
    pub fn frames_total(&self) -> usize {
        self.frames_total
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Tracker state as of the last processed frame.
    pub fn tracker(&self) -> &FaceTracker {
        &self.tracker
    }

    /// Processes the whole source and returns the output path.
    ///
    /// `on_progress` receives `frames_processed / frames_total` after every
    /// written frame; `is_canceled` is polled right after it.
    pub fn run(
        &mut self,
        config: &FilterConfig,
        on_progress: &mut dyn FnMut(f64),
        is_canceled: &dyn Fn() -> bool,
    ) -> Result<PathBuf, JobError> {
        if self.state != JobState::Idle {
            return Err(JobError::AlreadyRun);
        }
        self.state = JobState::Running;
        log::info!(
            "Job started: {} -> {}",
            self.source_path.display(),
            self.output_path.display()
        );

        let result = self.execute(config, on_progress, is_canceled);
        self.state = match &result {
            Ok(_) => JobState::Completed,
            Err(JobError::Canceled) => JobState::Canceled,
            Err(_) => JobState::Failed,
        };
        self.logger.summary();

        match &result {
            Ok(path) => log::info!(
                "Job completed after {} frames: {}",
                self.frames_processed,
                path.display()
            ),
            Err(JobError::Canceled) => {
                log::info!("Job canceled after {} frames", self.frames_processed)
            }
            Err(e) => log::error!("Job failed: {e}"),
        }
        result
    }

    fn execute(
        &mut self,
        config: &FilterConfig,
        on_progress: &mut dyn FnMut(f64),
        is_canceled: &dyn Fn() -> bool,
    ) -> Result<PathBuf, JobError> {
        let metadata = self
            .reader
            .open(&self.source_path)
            .map_err(|source| JobError::SourceOpen {
                path: self.source_path.clone(),
                source,
            })?;
        self.frames_total = metadata.total_frames;
        self.logger.info(&format!(
            "Source: {}x{} @ {:.2} fps, {} frames",
            metadata.width, metadata.height, metadata.fps, metadata.total_frames
        ));

        let part_path = part_path_for(&self.output_path);
        if let Err(source) = self.writer.open(&part_path, &metadata) {
            self.reader.close();
            discard(&part_path);
            return Err(JobError::OutputCreate {
                path: part_path,
                source,
            });
        }

        self.tracker.reset();
        let outcome = self.process_frames(config, &metadata, on_progress, is_canceled);
        self.reader.close();

        let closed = self.writer.close();
        let outcome = outcome.and_then(|()| {
            closed.map_err(|source| JobError::FrameWrite {
                index: self.frames_processed,
                source,
            })
        });
        if let Err(e) = outcome {
            discard(&part_path);
            return Err(e);
        }

        fs::rename(&part_path, &self.output_path).map_err(|e| {
            discard(&part_path);
            JobError::OutputCreate {
                path: self.output_path.clone(),
                source: e.into(),
            }
        })?;
        Ok(self.output_path.clone())
    }

    fn process_frames(
        &mut self,
        config: &FilterConfig,
        metadata: &VideoMetadata,
        on_progress: &mut dyn FnMut(f64),
        is_canceled: &dyn Fn() -> bool,
    ) -> Result<(), JobError> {
        let mode = config.mode();
        let mut engine = FilterEngine::new(config);
        let identity: Option<&dyn IdentityLookup> =
            self.identity.as_deref().map(|l| l as &dyn IdentityLookup);
        let mut frames = self.reader.frames();

        loop {
            let t = Instant::now();
            let mut frame = match frames.next() {
                None => return Ok(()),
                Some(Ok(frame)) => frame,
                Some(Err(source)) => {
                    return Err(JobError::FrameRead {
                        index: self.frames_processed,
                        source,
                    })
                }
            };
            self.logger.timing("decode", elapsed_ms(t));

            let t = Instant::now();
            let detections = match self.detector.detect_faces(&frame) {
                Ok(regions) => regions,
                Err(e) => {
                    log::warn!(
                        "Frame {}: detection failed, treating as no faces: {e}",
                        frame.index()
                    );
                    Vec::new()
                }
            };
            self.logger.timing("detect", elapsed_ms(t));
            self.logger.metric(FACES_METRIC, detections.len() as f64);

            let t = Instant::now();
            let faces = self.tracker.update(&frame, &detections, mode, identity);
            self.logger.timing("track", elapsed_ms(t));

            let t = Instant::now();
            for face in &faces {
                engine.apply(&mut frame, &face.region, face.action);
            }
            self.logger.timing("filter", elapsed_ms(t));

            let t = Instant::now();
            self.writer
                .write(&frame)
                .map_err(|source| JobError::FrameWrite {
                    index: self.frames_processed,
                    source,
                })?;
            self.logger.timing("encode", elapsed_ms(t));

            self.frames_processed += 1;
            self.logger.progress(self.frames_processed, self.frames_total);
            on_progress(metadata.progress_fraction(self.frames_processed));

            if is_canceled() {
                self.cancel_requested = true;
                return Err(JobError::Canceled);
            }
        }
    }
}

/// `clip.mp4` becomes `clip.part.mp4`, keeping the extension the muxer
/// picks its container from.
fn part_path_for(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.file_stem().unwrap_or_default());
    name.push(".part");
    if let Some(ext) = output.extension() {
        name.push(".");
        name.push(ext);
    }
    output.with_file_name(name)
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Discarded partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial output {}: {e}", path.display()),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
