//! Adaptive quantization field estimation.
//!
//! Produces one multiplier per 8x8 block of the luma plane. Flat regions
//! keep the neutral value 0.575; locally busy regions mask quantization
//! noise and receive lower values, which downstream turns into stronger
//! zero-biasing. The estimate is deterministic: same plane, same field.

use crate::image::PlaneF32;

/// Field value used when adaptive quantization is disabled, and the value
/// a perfectly flat image produces.
pub const FLAT_QUANT_FIELD: f32 = 0.575;

/// Lower clamp of the field so `qfmax` and the aq strength stay bounded.
const QUANT_FIELD_MIN: f32 = 0.3;

/// Gain applied to the local contrast measure before the masking curve.
const MASKING_GAIN: f32 = 28.0;

/// Per-block quantization field over the block grid.
#[derive(Debug, Clone)]
pub struct QuantField {
    xsize_blocks: usize,
    ysize_blocks: usize,
    values: Vec<f32>,
}

impl QuantField {
    /// A field filled with one value.
    #[must_use]
    pub fn filled(xsize_blocks: usize, ysize_blocks: usize, value: f32) -> Self {
        Self {
            xsize_blocks,
            ysize_blocks,
            values: vec![value; xsize_blocks * ysize_blocks],
        }
    }

    /// Field width in blocks.
    #[must_use]
    pub fn xsize_blocks(&self) -> usize {
        self.xsize_blocks
    }

    /// Field height in blocks.
    #[must_use]
    pub fn ysize_blocks(&self) -> usize {
        self.ysize_blocks
    }

    /// Value at block (bx, by).
    #[inline]
    #[must_use]
    pub fn get(&self, bx: usize, by: usize) -> f32 {
        self.values[by * self.xsize_blocks + bx]
    }

    /// Minimum and maximum over the field.
    #[must_use]
    pub fn min_max(&self) -> (f32, f32) {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    }

    /// Averages the field down to a subsampled component's block grid.
    #[must_use]
    pub fn downsample(&self, factor: usize) -> QuantField {
        if factor <= 1 {
            return self.clone();
        }
        let xs = self.xsize_blocks / factor;
        let ys = self.ysize_blocks / factor;
        let mut values = Vec::with_capacity(xs * ys);
        for by in 0..ys {
            for bx in 0..xs {
                let mut sum = 0.0;
                for dy in 0..factor {
                    for dx in 0..factor {
                        sum += self.get(bx * factor + dx, by * factor + dy);
                    }
                }
                values.push(sum / (factor * factor) as f32);
            }
        }
        QuantField {
            xsize_blocks: xs,
            ysize_blocks: ys,
            values,
        }
    }
}

/// Estimates the initial quantization field from the luma plane.
///
/// The plane holds level-shifted samples; rows beyond the image are
/// already padded by edge replication, so every block reads full data.
#[must_use]
pub fn initial_quant_field(
    distance: f32,
    y_plane: &PlaneF32,
    xsize_blocks: usize,
    ysize_blocks: usize,
) -> QuantField {
    let strength = 1.0 / (1.0 + 0.47 * distance.max(0.01));
    let mut values = Vec::with_capacity(xsize_blocks * ysize_blocks);
    for by in 0..ysize_blocks {
        for bx in 0..xsize_blocks {
            let contrast = block_contrast(y_plane, bx, by);
            let masking = (contrast * MASKING_GAIN).sqrt();
            let qf = FLAT_QUANT_FIELD / (1.0 + masking * strength);
            values.push(qf.clamp(QUANT_FIELD_MIN, FLAT_QUANT_FIELD));
        }
    }
    QuantField {
        xsize_blocks,
        ysize_blocks,
        values,
    }
}

/// Initial DC quantization divisor for a perceptual distance.
///
/// Below the knee the effective DC distance tracks the input distance;
/// above it the non-linearity flattens the growth.
#[must_use]
pub fn initial_quant_dc(distance: f32) -> f32 {
    const DC_MUL: f32 = 2.9;
    const DC_QUANT: f32 = 1.12;
    const DC_QUANT_POW: f32 = 0.57;
    let distance = distance.max(0.01);
    let effective = (0.85 * distance)
        .max(distance.min(DC_MUL * (distance / DC_MUL).powf(DC_QUANT_POW)));
    DC_QUANT / effective
}

/// Mean squared local gradient inside one block, on [0, 1]-normalized
/// samples.
fn block_contrast(plane: &PlaneF32, bx: usize, by: usize) -> f32 {
    let x0 = bx * 8;
    let y0 = by * 8;
    let xmax = plane.xsize() - 1;
    let ymax = plane.ysize() - 1;
    let mut sum = 0.0f32;
    for y in y0..y0 + 8 {
        let yc = y.min(ymax);
        let yn = (y + 1).min(ymax);
        for x in x0..x0 + 8 {
            let xc = x.min(xmax);
            let xn = (x + 1).min(xmax);
            let v = (plane.get(xc, yc) + 128.0) / 255.0;
            let gx = (plane.get(xn, yc) + 128.0) / 255.0 - v;
            let gy = (plane.get(xc, yn) + 128.0) / 255.0 - v;
            sum += gx * gx + gy * gy;
        }
    }
    sum / 64.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_plane(value: f32, w: usize, h: usize) -> PlaneF32 {
        let mut plane = PlaneF32::new(w, h);
        for y in 0..h {
            for v in plane.row_mut(y) {
                *v = value;
            }
        }
        plane
    }

    #[test]
    fn flat_image_yields_neutral_field() {
        let plane = flat_plane(0.0, 16, 16);
        let field = initial_quant_field(1.0, &plane, 2, 2);
        let (min, max) = field.min_max();
        assert_eq!(min, FLAT_QUANT_FIELD);
        assert_eq!(max, FLAT_QUANT_FIELD);
    }

    #[test]
    fn textured_blocks_get_lower_values() {
        let mut plane = flat_plane(0.0, 16, 8);
        // Checkerboard the right half.
        for y in 0..8 {
            for x in 8..16 {
                plane.row_mut(y)[x] = if (x + y) % 2 == 0 { 100.0 } else { -100.0 };
            }
        }
        let field = initial_quant_field(1.0, &plane, 2, 1);
        assert_eq!(field.get(0, 0), FLAT_QUANT_FIELD);
        assert!(field.get(1, 0) < FLAT_QUANT_FIELD);
        assert!(field.get(1, 0) >= QUANT_FIELD_MIN);
    }

    #[test]
    fn field_is_deterministic() {
        let mut plane = flat_plane(0.0, 8, 8);
        for y in 0..8 {
            for (x, v) in plane.row_mut(y).iter_mut().enumerate() {
                *v = ((x * 31 + y * 17) % 251) as f32 - 128.0;
            }
        }
        let a = initial_quant_field(1.5, &plane, 1, 1);
        let b = initial_quant_field(1.5, &plane, 1, 1);
        assert_eq!(a.get(0, 0), b.get(0, 0));
    }

    #[test]
    fn downsample_averages() {
        let mut field = QuantField::filled(2, 2, 0.0);
        field.values = vec![0.4, 0.6, 0.2, 0.4];
        let down = field.downsample(2);
        assert_eq!(down.xsize_blocks(), 1);
        assert!((down.get(0, 0) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn dc_quant_decreases_with_distance() {
        let mut prev = initial_quant_dc(0.1);
        for d in [0.5f32, 1.0, 2.0, 4.0, 8.0, 16.0] {
            let q = initial_quant_dc(d);
            assert!(q < prev, "not decreasing at {d}");
            assert!(q > 0.0);
            prev = q;
        }
        // Distance 1.0 sits below the knee: effective distance is 1.0.
        assert!((initial_quant_dc(1.0) - 1.12).abs() < 1e-3);
    }
}
