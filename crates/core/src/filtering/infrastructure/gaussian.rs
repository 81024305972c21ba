//! Separable Gaussian smoothing over a tightly packed pixel buffer.
//!
//! Large kernels run on a downscaled copy and are scaled back up, which keeps
//! the cost per face roughly constant regardless of box size.

/// Kernels above this size are applied at reduced resolution.
const DIRECT_KERNEL_LIMIT: usize = 50;

/// Odd kernel size for a `width` × `height` box: the smaller side times
/// `strength`, at least 3.
pub fn kernel_size_for(width: usize, height: usize, strength: f64) -> usize {
    let raw = (width.min(height) as f64 * strength).round().max(3.0) as usize;
    raw | 1
}

/// 1D Gaussian kernel of odd `kernel_size`, sigma = `kernel_size / 6`
/// (OpenCV's sigma=0 convention).
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&w| (w / sum) as f32).collect()
}

/// Reusable kernels and scratch space for blurring many boxes.
#[derive(Default)]
pub struct GaussianBlur {
    temp: Vec<f32>,
    kernels: Vec<(usize, Vec<f32>)>,
}

impl GaussianBlur {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blurs `data` (`width` × `height` × `channels`) in place. Edge pixels
    /// are replicated, so nothing outside the buffer is read.
    pub fn blur(
        &mut self,
        data: &mut [u8],
        width: usize,
        height: usize,
        channels: usize,
        kernel_size: usize,
    ) {
        if kernel_size <= 1 || width == 0 || height == 0 {
            return;
        }

        let scale = (kernel_size / DIRECT_KERNEL_LIMIT).max(1);
        if scale == 1 || width < scale * 2 || height < scale * 2 {
            let kernel = self.kernel(kernel_size);
            separable_blur(data, width, height, channels, &kernel, &mut self.temp);
            return;
        }

        let small_kernel = self.kernel((kernel_size / scale) | 1);
        let (mut small, sw, sh) = downscale(data, width, height, channels, scale);
        separable_blur(&mut small, sw, sh, channels, &small_kernel, &mut self.temp);
        let upscaled = upscale(&small, sw, sh, channels, width, height);
        data.copy_from_slice(&upscaled);
    }

    fn kernel(&mut self, size: usize) -> Vec<f32> {
        if let Some((_, k)) = self.kernels.iter().find(|(s, _)| *s == size) {
            return k.clone();
        }
        let k = gaussian_kernel_1d(size);
        // Face sizes drift slowly, so a handful of cached sizes covers a run.
        if self.kernels.len() >= 16 {
            self.kernels.remove(0);
        }
        self.kernels.push((size, k.clone()));
        k
    }
}

fn separable_blur(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    let half = (kernel.len() / 2) as isize;
    temp.resize(width * height * channels, 0.0);

    // Horizontal pass: data -> temp
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                    sum += data[(y * width + sx) * channels + c] as f32 * w;
                }
                temp[(y * width + x) * channels + c] = sum;
            }
        }
    }

    // Vertical pass: temp -> data
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy =
                        (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                    sum += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Area-average downscale by an integer factor.
fn downscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    scale: usize,
) -> (Vec<u8>, usize, usize) {
    let new_w = width / scale;
    let new_h = height / scale;
    let mut out = vec![0u8; new_w * new_h * channels];
    let count = (scale * scale) as u32;

    for y in 0..new_h {
        for x in 0..new_w {
            for c in 0..channels {
                let mut sum = 0u32;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (sx, sy) = (x * scale + dx, y * scale + dy);
                        sum += data[(sy * width + sx) * channels + c] as u32;
                    }
                }
                out[(y * new_w + x) * channels + c] = (sum / count) as u8;
            }
        }
    }

    (out, new_w, new_h)
}

/// Bilinear upscale to `target_w` × `target_h`.
fn upscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    target_w: usize,
    target_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; target_w * target_h * channels];
    let x_ratio = (width as f32 - 1.0) / (target_w as f32 - 1.0).max(1.0);
    let y_ratio = (height as f32 - 1.0) / (target_h as f32 - 1.0).max(1.0);

    for y in 0..target_h {
        let src_y = y as f32 * y_ratio;
        let y0 = (src_y.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = src_y - y0 as f32;

        for x in 0..target_w {
            let src_x = x as f32 * x_ratio;
            let x0 = (src_x.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = src_x - x0 as f32;

            for c in 0..channels {
                let at = |px: usize, py: usize| data[(py * width + px) * channels + c] as f32;
                let val = at(x0, y0) * (1.0 - fx) * (1.0 - fy)
                    + at(x1, y0) * fx * (1.0 - fy)
                    + at(x0, y1) * (1.0 - fx) * fy
                    + at(x1, y1) * fx * fy;
                out[(y * target_w + x) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::tiny_box(4, 4, 0.5, 3)]
    #[case::even_rounds_up(20, 40, 0.5, 11)]
    #[case::odd_kept(22, 30, 0.5, 11)]
    #[case::full_strength(100, 80, 1.0, 81)]
    fn test_kernel_size_for(
        #[case] w: usize,
        #[case] h: usize,
        #[case] strength: f64,
        #[case] expected: usize,
    ) {
        assert_eq!(kernel_size_for(w, h, strength), expected);
    }

    #[test]
    fn test_kernel_sums_to_one_and_is_symmetric() {
        let k = gaussian_kernel_1d(7);
        assert_relative_eq!(k.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        for i in 0..k.len() / 2 {
            assert_relative_eq!(k[i], k[k.len() - 1 - i], epsilon = 1e-6);
        }
        assert!(k.iter().all(|&v| v <= k[3]));
    }

    #[test]
    fn test_uniform_buffer_unchanged() {
        let mut data = vec![128u8; 10 * 10 * 3];
        GaussianBlur::new().blur(&mut data, 10, 10, 3, 5);
        assert!(data.iter().all(|&v| (v as i32 - 128).abs() <= 1));
    }

    #[test]
    fn test_bright_pixel_spreads() {
        let mut data = vec![0u8; 10 * 10 * 3];
        let center = (5 * 10 + 5) * 3;
        data[center..center + 3].copy_from_slice(&[255, 255, 255]);

        GaussianBlur::new().blur(&mut data, 10, 10, 3, 5);

        assert!(data[center] < 255);
        assert!(data[(5 * 10 + 6) * 3] > 0);
    }

    #[test]
    fn test_kernel_size_1_is_identity() {
        let mut data: Vec<u8> = (0..75).map(|v| v as u8).collect();
        let original = data.clone();
        GaussianBlur::new().blur(&mut data, 5, 5, 3, 1);
        assert_eq!(data, original);
    }

    #[test]
    fn test_large_kernel_takes_downscaled_path() {
        // Left half black, right half white: the edge must soften.
        let (w, h) = (200, 200);
        let mut data = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in w / 2..w {
                let i = (y * w + x) * 3;
                data[i..i + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        GaussianBlur::new().blur(&mut data, w, h, 3, 151);
        let at_edge = data[(100 * w + w / 2) * 3];
        assert!(at_edge > 0 && at_edge < 255, "edge value {at_edge}");
    }

    #[test]
    fn test_downscale_upscale_uniform_roundtrip() {
        let data = vec![100u8; 8 * 8 * 3];
        let (small, sw, sh) = downscale(&data, 8, 8, 3, 2);
        assert_eq!((sw, sh), (4, 4));
        let big = upscale(&small, sw, sh, 3, 8, 8);
        assert!(big.iter().all(|&v| (v as i32 - 100).abs() <= 1));
    }
}
