//! Mosaic filter over a tightly packed pixel buffer.

/// Number of mosaic cells across the shorter side of a box.
const CELLS_ACROSS: usize = 8;

/// Cell edge in pixels for a `width` × `height` box (at least 2).
pub fn block_size_for(width: usize, height: usize) -> usize {
    (width.min(height) / CELLS_ACROSS).max(2)
}

/// Replaces every `block` × `block` cell with one colour.
///
/// Each cell is downsampled over its own pixels plus a one-pixel apron into
/// the neighbouring cells (clipped to the buffer), then upsampled by
/// repetition. The apron makes the mosaic blend slightly across cell
/// borders, so pixelating an already pixelated box changes it again.
pub fn pixelate(data: &mut [u8], width: usize, height: usize, channels: usize, block: usize) {
    if block <= 1 || width == 0 || height == 0 {
        return;
    }

    let source = data.to_vec();
    let mut sums = vec![0u32; channels];

    for cell_y in (0..height).step_by(block) {
        let cell_bottom = (cell_y + block).min(height);
        let y0 = cell_y.saturating_sub(1);
        let y1 = (cell_bottom + 1).min(height);

        for cell_x in (0..width).step_by(block) {
            let cell_right = (cell_x + block).min(width);
            let x0 = cell_x.saturating_sub(1);
            let x1 = (cell_right + 1).min(width);

            sums.iter_mut().for_each(|s| *s = 0);
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = (y * width + x) * channels;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += source[i + c] as u32;
                    }
                }
            }
            let count = ((y1 - y0) * (x1 - x0)) as u32;

            for y in cell_y..cell_bottom {
                for x in cell_x..cell_right {
                    let i = (y * width + x) * channels;
                    for (c, sum) in sums.iter().enumerate() {
                        data[i + c] = ((sum + count / 2) / count) as u8;
                    }
                }
            }
        }
    }
}
