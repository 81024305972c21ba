/// Minimum overlap for a detection to continue an existing track.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// Axis-aligned face bounding box in frame pixel coordinates.
///
/// Boxes coming from a detector may extend past the frame edges (or lie
/// entirely outside it); every pixel operation goes through [`Region::clamp_to`]
/// first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from `[x1, y1, x2, y2]` float corners, rounding outward.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let left = x1.min(x2).floor() as i32;
        let top = y1.min(y2).floor() as i32;
        let right = x1.max(x2).ceil() as i32;
        let bottom = y1.max(y2).ceil() as i32;
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersects the region with a `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` when the visible part is empty, so callers never
    /// index outside the frame buffer.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Region> {
        let fw = frame_width.min(i32::MAX as u32) as i32;
        let fh = frame_height.min(i32::MAX as u32) as i32;
        let x1 = self.x.clamp(0, fw);
        let y1 = self.y.clamp(0, fh);
        let x2 = self.x.saturating_add(self.width).clamp(0, fw);
        let y2 = self.y.saturating_add(self.height).clamp(0, fh);
        let clamped = Region::new(x1, y1, x2 - x1, y2 - y1);
        (!clamped.is_empty()).then_some(clamped)
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let union = self.area() as f64 + other.area() as f64 - inter;
        inter / union
    }
}
