//! Coefficient building: per-component DCT and quantization.
//!
//! Each component's plane is downsampled to its sampling grid, cut into
//! 8x8 blocks, transformed and quantized against its table with the
//! per-block zero-bias threshold driven by the adaptive quant field.
//! Output blocks are stored row-major over the component's block grid,
//! 64 natural-order coefficients each.

use crate::adaptive_quant::QuantField;
use crate::consts::{DCT_BLOCK_SIZE, DCT_SIZE};
use crate::dct::forward_dct_8x8;
use crate::image::{Image3F, PlaneF32};
use crate::quant::{QuantTable, ZeroBiasParams};
use crate::types::{ComponentInfo, QuantMode};

/// Quantized coefficients of one component.
#[derive(Debug, Clone)]
pub struct ComponentCoeffs {
    /// Block grid width
    pub width_in_blocks: usize,
    /// Block grid height
    pub height_in_blocks: usize,
    /// 64 coefficients per block, natural order, blocks row-major
    pub coeffs: Vec<i16>,
}

impl ComponentCoeffs {
    /// The 64 coefficients of block (bx, by).
    #[inline]
    #[must_use]
    pub fn block(&self, bx: usize, by: usize) -> &[i16] {
        let start = (by * self.width_in_blocks + bx) * DCT_BLOCK_SIZE;
        &self.coeffs[start..start + DCT_BLOCK_SIZE]
    }
}

/// Computes quantized DCT coefficients for every component.
///
/// `quant_tables` is indexed by each component's `quant_tbl_no`; `qf` is
/// the adaptive field over the full-resolution block grid. Deterministic:
/// identical inputs produce identical coefficients.
pub fn compute_coefficients(
    input: &Image3F,
    components: &[ComponentInfo],
    max_h_samp_factor: u8,
    quant_tables: &[QuantTable],
    mode: QuantMode,
    distance: f32,
    use_adaptive_quantization: bool,
    qf: &QuantField,
) -> Vec<ComponentCoeffs> {
    components
        .iter()
        .map(|comp| {
            let factor = (max_h_samp_factor / comp.h_samp_factor) as usize;
            let plane = downsample_plane(input.plane(comp.component_index as usize), factor);
            let field = qf.downsample(factor);
            let table = &quant_tables[comp.quant_tbl_no as usize];
            let zero_bias = if use_adaptive_quantization {
                ZeroBiasParams::for_mode(mode, distance, comp.component_index as usize)
            } else {
                ZeroBiasParams::neutral()
            };
            quantize_component(
                &plane,
                comp.width_in_blocks as usize,
                comp.height_in_blocks as usize,
                table,
                &zero_bias,
                &field,
            )
        })
        .collect()
}

fn quantize_component(
    plane: &PlaneF32,
    width_in_blocks: usize,
    height_in_blocks: usize,
    table: &QuantTable,
    zero_bias: &ZeroBiasParams,
    field: &QuantField,
) -> ComponentCoeffs {
    let mut coeffs = Vec::with_capacity(width_in_blocks * height_in_blocks * DCT_BLOCK_SIZE);
    let field_xmax = field.xsize_blocks().saturating_sub(1);
    let field_ymax = field.ysize_blocks().saturating_sub(1);
    let mut block = [0.0f32; DCT_BLOCK_SIZE];
    for by in 0..height_in_blocks {
        for bx in 0..width_in_blocks {
            extract_block(plane, bx, by, &mut block);
            let dct = forward_dct_8x8(&block);
            let aq = field_to_strength(field.get(bx.min(field_xmax), by.min(field_ymax)));
            for k in 0..DCT_BLOCK_SIZE {
                let q = table.values[k] as f32;
                let qval = dct[k] / q;
                let out = if qval.abs() < zero_bias.threshold(k, aq) {
                    0
                } else {
                    qval.round() as i16
                };
                coeffs.push(out);
            }
        }
    }
    ComponentCoeffs {
        width_in_blocks,
        height_in_blocks,
        coeffs,
    }
}

/// Maps a quant-field value to the zero-bias strength multiplier.
#[inline]
fn field_to_strength(qf: f32) -> f32 {
    (0.6 / qf - 1.0).max(0.0)
}

/// Copies block (bx, by) out of the plane, clamping reads at the edges.
fn extract_block(plane: &PlaneF32, bx: usize, by: usize, block: &mut [f32; DCT_BLOCK_SIZE]) {
    let xmax = plane.xsize() - 1;
    let ymax = plane.ysize() - 1;
    for y in 0..DCT_SIZE {
        let py = (by * DCT_SIZE + y).min(ymax);
        for x in 0..DCT_SIZE {
            let px = (bx * DCT_SIZE + x).min(xmax);
            block[y * DCT_SIZE + x] = plane.get(px, py);
        }
    }
}

/// Box-averages a plane down by `factor` in each dimension.
fn downsample_plane(plane: &PlaneF32, factor: usize) -> PlaneF32 {
    if factor <= 1 {
        return plane.clone();
    }
    let new_x = plane.xsize() / factor;
    let new_y = plane.ysize() / factor;
    let mut out = PlaneF32::new(new_x, new_y);
    let norm = 1.0 / (factor * factor) as f32;
    for y in 0..new_y {
        let row = out.row_mut(y);
        for (x, item) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for dy in 0..factor {
                for dx in 0..factor {
                    sum += plane.get(x * factor + dx, y * factor + dy);
                }
            }
            *item = sum * norm;
        }
    }
    out
}
