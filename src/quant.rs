//! Quantizer planning: global/DC/AC scales, per-component quantization
//! matrices, and the zero-bias parameters consumed by the coefficient
//! builder.

use crate::adaptive_quant::initial_quant_dc;
use crate::color_encoding::TransferFunction;
use crate::consts::{
    BASE_QUANT_MATRIX_STD, BASE_QUANT_MATRIX_XYB, BASE_QUANT_MATRIX_YCBCR, DCT_BLOCK_SIZE,
    GLOBAL_SCALE_STD, GLOBAL_SCALE_XYB, GLOBAL_SCALE_YCBCR,
};
use crate::quality::distance_to_linear_quality;
use crate::types::QuantMode;

/// One quantization table in natural order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    /// Quantizer steps in natural (row-major) order
    pub values: [u16; DCT_BLOCK_SIZE],
    /// 0 for 8-bit entries, 1 for 16-bit entries
    pub precision: u8,
}

/// The DC and AC scales derived from distance, mode and transfer function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantScales {
    /// Multiplier for the DC entry of each base matrix
    pub dc_scale: f32,
    /// Multiplier for the AC entries of each base matrix
    pub ac_scale: f32,
}

/// Computes the global, DC and AC scales per the quantizer plan.
///
/// `qfmax` is the maximum of the adaptive quant field.
#[must_use]
pub fn compute_quant_scales(
    mode: QuantMode,
    distance: f32,
    qfmax: f32,
    transfer: TransferFunction,
) -> QuantScales {
    let mut global_scale = match mode {
        QuantMode::Xyb => GLOBAL_SCALE_XYB,
        QuantMode::YCbCr => GLOBAL_SCALE_YCBCR,
        QuantMode::Std => GLOBAL_SCALE_STD,
    };
    if mode != QuantMode::Xyb {
        match transfer {
            TransferFunction::Pq => global_scale *= 0.4,
            TransferFunction::Hlg => global_scale *= 0.5,
            _ => {}
        }
    }
    if mode == QuantMode::Std {
        let linear = 0.01 * distance_to_linear_quality(distance);
        QuantScales {
            dc_scale: global_scale * linear,
            ac_scale: global_scale * linear,
        }
    } else {
        QuantScales {
            dc_scale: global_scale / initial_quant_dc(distance),
            ac_scale: global_scale * distance / qfmax,
        }
    }
}

/// Derives the quantization tables for table slots `0..num_tables`.
///
/// With `force_baseline` the steps clamp to [1, 255]; otherwise entries
/// may use 16-bit precision up to 32767.
#[must_use]
pub fn add_jpeg_quant_matrices(
    mode: QuantMode,
    num_tables: usize,
    scales: QuantScales,
    force_baseline: bool,
) -> Vec<QuantTable> {
    let max_step = if force_baseline { 255 } else { 32767 };
    (0..num_tables)
        .map(|tbl| {
            let base = base_matrix(mode, tbl);
            let mut values = [0u16; DCT_BLOCK_SIZE];
            for (k, v) in values.iter_mut().enumerate() {
                let scale = if k == 0 { scales.dc_scale } else { scales.ac_scale };
                let q = (base[k] * scale).round();
                *v = (q as i64).clamp(1, max_step) as u16;
            }
            let precision = u8::from(values.iter().any(|&v| v > 255));
            QuantTable { values, precision }
        })
        .collect()
}

/// Base matrix row for one table slot under the given mode.
fn base_matrix(mode: QuantMode, tbl: usize) -> &'static [f32] {
    match mode {
        QuantMode::Xyb => {
            let start = tbl.min(2) * DCT_BLOCK_SIZE;
            &BASE_QUANT_MATRIX_XYB[start..start + DCT_BLOCK_SIZE]
        }
        QuantMode::YCbCr => {
            let start = tbl.min(2) * DCT_BLOCK_SIZE;
            &BASE_QUANT_MATRIX_YCBCR[start..start + DCT_BLOCK_SIZE]
        }
        QuantMode::Std => {
            let start = if tbl == 0 { 0 } else { DCT_BLOCK_SIZE };
            &BASE_QUANT_MATRIX_STD[start..start + DCT_BLOCK_SIZE]
        }
    }
}

// Zero-bias thresholds. Small coefficients below the threshold collapse
// to zero before rounding; the threshold blends between a high-quality
// and a low-quality multiplier table by distance, and the per-block
// adaptive strength scales the multiplier.

const DIST_HQ: f32 = 1.0;
const DIST_LQ: f32 = 3.0;

/// Zero-bias multipliers for YCbCr at distance >= 3.0, per component.
#[rustfmt::skip]
const ZERO_BIAS_MUL_YCBCR_LQ: [f32; 192] = [
    // c = 0 (Y)
    0.0000, 0.0568, 0.3880, 0.6190, 0.6190, 0.4490, 0.4490, 0.6187,
    0.0568, 0.5829, 0.6189, 0.6190, 0.6190, 0.7190, 0.6190, 0.6189,
    0.3880, 0.6189, 0.6190, 0.6190, 0.6190, 0.6190, 0.6187, 0.6100,
    0.6190, 0.6190, 0.6190, 0.6190, 0.5890, 0.3839, 0.7160, 0.6190,
    0.6190, 0.6190, 0.6190, 0.5890, 0.6190, 0.3880, 0.5860, 0.4790,
    0.4490, 0.7190, 0.6190, 0.3839, 0.3880, 0.6190, 0.6190, 0.6190,
    0.4490, 0.6190, 0.6187, 0.7160, 0.5860, 0.6190, 0.6204, 0.6190,
    0.6187, 0.6189, 0.6100, 0.6190, 0.4790, 0.6190, 0.6190, 0.3480,
    // c = 1 (Cb)
    0.0000, 1.1640, 0.9373, 1.1319, 0.8016, 0.9136, 1.1530, 0.9430,
    1.1640, 0.9188, 0.9160, 1.1980, 1.1830, 0.9758, 0.9430, 0.9430,
    0.9373, 0.9160, 0.8430, 1.1720, 0.7083, 0.9430, 0.9430, 0.9430,
    1.1319, 1.1980, 1.1720, 1.1490, 0.8547, 0.9430, 0.9430, 0.9430,
    0.8016, 1.1830, 0.7083, 0.8547, 0.9430, 0.9430, 0.9430, 0.9430,
    0.9136, 0.9758, 0.9430, 0.9430, 0.9430, 0.9430, 0.9430, 0.9430,
    1.1530, 0.9430, 0.9430, 0.9430, 0.9430, 0.9430, 0.9430, 0.9480,
    0.9430, 0.9430, 0.9430, 0.9430, 0.9430, 0.9430, 0.9480, 0.9430,
    // c = 2 (Cr)
    0.0000, 1.3190, 0.4308, 0.4460, 0.0661, 0.0660, 0.2660, 0.2960,
    1.3190, 0.3280, 0.3093, 0.0750, 0.0505, 0.1594, 0.3060, 0.2113,
    0.4308, 0.3093, 0.3060, 0.1182, 0.0500, 0.3060, 0.3915, 0.2426,
    0.4460, 0.0750, 0.1182, 0.0512, 0.0500, 0.2130, 0.3930, 0.1590,
    0.0661, 0.0505, 0.0500, 0.0500, 0.3055, 0.3360, 0.5148, 0.5403,
    0.0660, 0.1594, 0.3060, 0.2130, 0.3360, 0.5060, 0.5874, 0.3060,
    0.2660, 0.3060, 0.3915, 0.3930, 0.5148, 0.5874, 0.3060, 0.3060,
    0.2960, 0.2113, 0.2426, 0.1590, 0.5403, 0.3060, 0.3060, 0.3060,
];

/// Zero-bias multipliers for YCbCr at distance <= 1.0, per component.
#[rustfmt::skip]
const ZERO_BIAS_MUL_YCBCR_HQ: [f32; 192] = [
    // c = 0 (Y)
    0.0000, 0.0044, 0.2521, 0.6547, 0.8161, 0.6130, 0.8841, 0.8155,
    0.0044, 0.6831, 0.6553, 0.6295, 0.7848, 0.7843, 0.8474, 0.7836,
    0.2521, 0.6553, 0.7834, 0.7829, 0.8161, 0.8072, 0.7743, 0.9242,
    0.6547, 0.6295, 0.7829, 0.8654, 0.7829, 0.6986, 0.7818, 0.7726,
    0.8161, 0.7848, 0.8161, 0.7829, 0.7471, 0.7827, 0.7843, 0.7653,
    0.6130, 0.7843, 0.8072, 0.6986, 0.7827, 0.7848, 0.9508, 0.7653,
    0.8841, 0.8474, 0.7743, 0.7818, 0.7843, 0.9508, 0.7839, 0.8437,
    0.8155, 0.7836, 0.9242, 0.7726, 0.7653, 0.7653, 0.8437, 0.7819,
    // c = 1 (Cb)
    0.0000, 1.0816, 1.0556, 1.2876, 1.1554, 1.1567, 1.8851, 0.5488,
    1.0816, 1.1537, 1.1850, 1.0712, 1.1671, 2.0719, 1.0544, 1.4764,
    1.0556, 1.1850, 1.2870, 1.1981, 1.8181, 1.2618, 1.0564, 1.1191,
    1.2876, 1.0712, 1.1981, 1.4753, 2.0609, 1.0564, 1.2645, 1.0564,
    1.1554, 1.1671, 1.8181, 2.0609, 0.7324, 1.1163, 0.8464, 1.0564,
    1.1567, 2.0719, 1.2618, 1.0564, 1.1163, 1.0040, 1.0564, 1.0564,
    1.8851, 1.0544, 1.0564, 1.2645, 0.8464, 1.0564, 1.0564, 1.0564,
    0.5488, 1.4764, 1.1191, 1.0564, 1.0564, 1.0564, 1.0564, 1.0564,
    // c = 2 (Cr)
    0.0000, 0.5392, 0.6659, 0.8968, 0.6829, 0.6328, 0.5802, 0.4836,
    0.5392, 0.6746, 0.6760, 0.6102, 0.6015, 0.6958, 0.7327, 0.4897,
    0.6659, 0.6760, 0.6957, 0.6543, 0.4396, 0.6330, 0.7081, 0.2583,
    0.8968, 0.6102, 0.6543, 0.5913, 0.6457, 0.5828, 0.5139, 0.3565,
    0.6829, 0.6015, 0.4396, 0.6457, 0.5633, 0.4263, 0.6371, 0.5949,
    0.6328, 0.6958, 0.6330, 0.5828, 0.4263, 0.2847, 0.2909, 0.6629,
    0.5802, 0.7327, 0.7081, 0.5139, 0.6371, 0.2909, 0.6644, 0.6644,
    0.4836, 0.4897, 0.2583, 0.3565, 0.5949, 0.6629, 0.6644, 0.6644,
];

/// Zero-bias AC offsets for YCbCr, per component.
const ZERO_BIAS_OFFSET_YCBCR_AC: [f32; 3] = [0.590_82, 0.581_46, 0.579_88];

/// Zero-bias AC offsets for XYB, per component.
const ZERO_BIAS_OFFSET_XYB_AC: [f32; 3] = [0.548_0, 0.562_5, 0.533_6];

/// Flat zero-bias multiplier used by the XYB mode.
const ZERO_BIAS_MUL_XYB: f32 = 0.5;

/// Zero-bias rounding parameters for one component.
#[derive(Debug, Clone)]
pub struct ZeroBiasParams {
    /// Multiplier per coefficient, scaled by the adaptive strength
    pub mul: [f32; DCT_BLOCK_SIZE],
    /// Offset per coefficient
    pub offset: [f32; DCT_BLOCK_SIZE],
}

impl ZeroBiasParams {
    /// Parameters for component `c` under the given mode and distance.
    #[must_use]
    pub fn for_mode(mode: QuantMode, distance: f32, component: usize) -> Self {
        let c = component.min(2);
        let mut mul = [0.0f32; DCT_BLOCK_SIZE];
        let mut offset = [0.0f32; DCT_BLOCK_SIZE];
        match mode {
            QuantMode::Xyb => {
                for k in 1..DCT_BLOCK_SIZE {
                    mul[k] = ZERO_BIAS_MUL_XYB;
                    offset[k] = ZERO_BIAS_OFFSET_XYB_AC[c];
                }
            }
            QuantMode::YCbCr | QuantMode::Std => {
                let mix_lq = ((distance - DIST_HQ) / (DIST_LQ - DIST_HQ)).clamp(0.0, 1.0);
                let mix_hq = 1.0 - mix_lq;
                for k in 1..DCT_BLOCK_SIZE {
                    let lq = ZERO_BIAS_MUL_YCBCR_LQ[c * DCT_BLOCK_SIZE + k];
                    let hq = ZERO_BIAS_MUL_YCBCR_HQ[c * DCT_BLOCK_SIZE + k];
                    mul[k] = mix_lq * lq + mix_hq * hq;
                    offset[k] = ZERO_BIAS_OFFSET_YCBCR_AC[c];
                }
            }
        }
        Self { mul, offset }
    }

    /// Parameters that never bias, used when adaptive quantization is off
    /// for the standard-tables path.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            mul: [0.0; DCT_BLOCK_SIZE],
            offset: [0.0; DCT_BLOCK_SIZE],
        }
    }

    /// Threshold below which the quantized magnitude at `k` collapses to
    /// zero.
    #[inline]
    #[must_use]
    pub fn threshold(&self, k: usize, aq_strength: f32) -> f32 {
        self.offset[k] + self.mul[k] * aq_strength
    }
}
