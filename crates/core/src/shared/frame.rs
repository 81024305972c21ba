use ndarray::ArrayView3;

use super::region::Region;

/// A single decoded video frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The whole frame as a region, for clamping boxes against.
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the part of `region` that lies inside the frame into a new
    /// tightly-packed frame. Returns `None` when nothing is visible.
    pub fn crop(&self, region: &Region) -> Option<Frame> {
        let visible = region.clamp_to(self.width, self.height)?;
        let channels = self.channels as usize;
        let fw = self.width as usize;
        let (x, y) = (visible.x as usize, visible.y as usize);
        let (w, h) = (visible.width as usize, visible.height as usize);

        let mut pixels = Vec::with_capacity(w * h * channels);
        for row in y..y + h {
            let start = (row * fw + x) * channels;
            pixels.extend_from_slice(&self.data[start..start + w * channels]);
        }
        Some(Frame::new(
            pixels,
            w as u32,
            h as u32,
            self.channels,
            self.index,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let mut data = vec![0u8; 12];
        data[6] = 255; // row=1, col=0, R
        let frame = Frame::new(data, 2, 2, 3, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }

    #[test]
    fn test_bounds_covers_frame() {
        let frame = gradient_frame(8, 4);
        assert_eq!(frame.bounds(), Region::new(0, 0, 8, 4));
    }

    #[test]
    fn test_crop_copies_visible_pixels() {
        let frame = gradient_frame(10, 10);
        let crop = frame.crop(&Region::new(2, 3, 4, 2)).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 2);
        // top-left of the crop is source pixel (2, 3)
        assert_eq!(&crop.data()[0..3], &[2, 3, 0]);
        // bottom-right is (5, 4)
        assert_eq!(&crop.data()[crop.data().len() - 3..], &[5, 4, 0]);
    }

    #[test]
    fn test_crop_clamps_partially_outside_region() {
        let frame = gradient_frame(10, 10);
        let crop = frame.crop(&Region::new(-5, 8, 8, 8)).unwrap();
        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 2);
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let frame = gradient_frame(10, 10);
        assert!(frame.crop(&Region::new(20, 20, 5, 5)).is_none());
    }
}
