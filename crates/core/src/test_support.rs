//! Stub models and video endpoints shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::embedding::Embedding;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoError, VideoReader};
use crate::video::domain::video_writer::VideoWriter;

pub fn solid_frame(index: usize, w: u32, h: u32, rgb: [u8; 3]) -> Frame {
    let data = rgb.iter().copied().cycle().take((w * h * 3) as usize).collect();
    Frame::new(data, w, h, 3, index)
}

/// Non-linear pattern that any blur or mosaic visibly changes.
pub fn gradient_frame(index: usize, w: u32, h: u32) -> Frame {
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[
                ((x * x + 3 * y) % 251) as u8,
                ((y * y + 5 * x) % 241) as u8,
                ((x * y) % 239) as u8,
            ]);
        }
    }
    Frame::new(data, w, h, 3, index)
}

pub fn encode_png(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn metadata(w: u32, h: u32, total_frames: usize) -> VideoMetadata {
    VideoMetadata {
        width: w,
        height: h,
        fps: 25.0,
        frame_rate: Some((25, 1)),
        total_frames,
        codec: "stub".to_string(),
        source_path: None,
    }
}

// ── Models ───────────────────────────────────────────────────────────

/// Returns the same boxes for every frame, or fails.
pub struct StubDetector {
    faces: Option<Vec<Region>>,
}

impl StubDetector {
    /// `n` 8x8 boxes spaced 10 px apart along the top edge.
    pub fn faces(n: usize) -> Self {
        let faces = (0..n as i32).map(|i| Region::new(i * 10, 0, 8, 8)).collect();
        Self { faces: Some(faces) }
    }

    pub fn failing() -> Self {
        Self { faces: None }
    }
}

impl FaceDetector for StubDetector {
    fn detect_faces(&self, _frame: &Frame) -> Result<Vec<Region>, DetectionError> {
        self.faces
            .clone()
            .ok_or_else(|| DetectionError::inference("stub detector failure"))
    }
}

/// Boxes keyed by frame index. Frames listed in `failing` return an error.
#[derive(Default)]
pub struct ScriptedDetector {
    pub by_frame: HashMap<usize, Vec<Region>>,
    pub failing: HashSet<usize>,
}

impl ScriptedDetector {
    /// The same boxes on every frame in `frames`.
    pub fn constant(frames: std::ops::Range<usize>, faces: &[Region]) -> Self {
        Self {
            by_frame: frames.map(|i| (i, faces.to_vec())).collect(),
            failing: HashSet::new(),
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<Region>, DetectionError> {
        if self.failing.contains(&frame.index()) {
            return Err(DetectionError::inference("scripted failure"));
        }
        Ok(self
            .by_frame
            .get(&frame.index())
            .cloned()
            .unwrap_or_default())
    }
}

/// Embeds a face as the mean colour of its box, scaled to `0.0..=1.0`.
pub struct StubEmbedder;

impl FaceEmbedder for StubEmbedder {
    fn embed(&self, frame: &Frame, region: &Region) -> Result<Embedding, DetectionError> {
        let crop = frame.crop(region).ok_or(DetectionError::EmptyRegion)?;
        let pixels = (crop.width() * crop.height()) as f32;
        let mut sums = [0.0f32; 3];
        for px in crop.data().chunks_exact(crop.channels() as usize) {
            for c in 0..3 {
                sums[c] += px[c] as f32;
            }
        }
        Ok(Embedding::new(
            sums.iter().map(|s| s / pixels / 255.0).collect(),
        ))
    }
}

// ── Video ────────────────────────────────────────────────────────────

/// Serves frames from memory.
pub struct StubReader {
    metadata: VideoMetadata,
    frames: Vec<Frame>,
    fail_open: bool,
    fail_at: Option<usize>,
}

impl StubReader {
    pub fn new(frames: Vec<Frame>) -> Self {
        let (w, h) = frames
            .first()
            .map_or((16, 16), |f| (f.width(), f.height()));
        Self {
            metadata: metadata(w, h, frames.len()),
            frames,
            fail_open: false,
            fail_at: None,
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new())
        }
    }

    /// Yields an error in place of frame `index` and stops.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        if self.fail_open {
            return Err(format!("cannot open {}", path.display()).into());
        }
        Ok(VideoMetadata {
            source_path: Some(path.to_path_buf()),
            ..self.metadata.clone()
        })
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, VideoError>> + '_> {
        let fail_at = self.fail_at;
        Box::new(
            self.frames
                .drain(..)
                .enumerate()
                .map_while(move |(i, frame)| match fail_at {
                    Some(n) if i > n => None,
                    Some(n) if i == n => Some(Err("corrupt packet".into())),
                    _ => Some(Ok(frame)),
                }),
        )
    }

    fn close(&mut self) {}
}

/// What a [`StubWriter`] saw, shared with the test.
#[derive(Default)]
pub struct WriterLog {
    pub opened_path: Option<PathBuf>,
    pub frames: Vec<Frame>,
    pub closed: bool,
}

/// Records frames in memory and touches the output path on open so file
/// cleanup can be observed.
pub struct StubWriter {
    log: Arc<Mutex<WriterLog>>,
    fail_open: bool,
    fail_write_at: Option<usize>,
}

impl StubWriter {
    pub fn new() -> (Self, Arc<Mutex<WriterLog>>) {
        let log = Arc::new(Mutex::new(WriterLog::default()));
        let writer = Self {
            log: Arc::clone(&log),
            fail_open: false,
            fail_write_at: None,
        };
        (writer, log)
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new().0
        }
    }

    pub fn failing_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }
}

impl VideoWriter for StubWriter {
    fn open(&mut self, path: &Path, _metadata: &VideoMetadata) -> Result<(), VideoError> {
        if self.fail_open {
            return Err(format!("cannot create {}", path.display()).into());
        }
        fs::write(path, b"stub")?;
        self.log.lock().unwrap().opened_path = Some(path.to_path_buf());
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), VideoError> {
        let mut log = self.log.lock().unwrap();
        if self.fail_write_at == Some(log.frames.len()) {
            return Err("disk full".into());
        }
        log.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), VideoError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}
