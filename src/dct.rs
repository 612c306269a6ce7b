//! Forward 8x8 DCT.
//!
//! Separable float DCT-II with the standard JPEG normalization
//! `F(u,v) = 1/4 C(u) C(v) sum f(x,y) cos(..) cos(..)`, so that the
//! quantized coefficients match what a conformant decoder expects to
//! dequantize with the DQT values.

use crate::consts::{DCT_BLOCK_SIZE, DCT_SIZE};

/// cos((2x + 1) u pi / 16) for x, u in 0..8, indexed `[u][x]`.
const COS_TABLE: [[f32; 8]; 8] = build_cos_table();

const fn build_cos_table() -> [[f32; 8]; 8] {
    // cos(k pi / 32) for k in 0..64 reduced mod symmetry; const fp math is
    // not available for cos, so the table is spelled out.
    [
        [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        [
            0.980_785_25,
            0.831_469_6,
            0.555_570_2,
            0.195_090_32,
            -0.195_090_32,
            -0.555_570_2,
            -0.831_469_6,
            -0.980_785_25,
        ],
        [
            0.923_879_5,
            0.382_683_43,
            -0.382_683_43,
            -0.923_879_5,
            -0.923_879_5,
            -0.382_683_43,
            0.382_683_43,
            0.923_879_5,
        ],
        [
            0.831_469_6,
            -0.195_090_32,
            -0.980_785_25,
            -0.555_570_2,
            0.555_570_2,
            0.980_785_25,
            0.195_090_32,
            -0.831_469_6,
        ],
        [
            0.707_106_77,
            -0.707_106_77,
            -0.707_106_77,
            0.707_106_77,
            0.707_106_77,
            -0.707_106_77,
            -0.707_106_77,
            0.707_106_77,
        ],
        [
            0.555_570_2,
            -0.980_785_25,
            0.195_090_32,
            0.831_469_6,
            -0.831_469_6,
            -0.195_090_32,
            0.980_785_25,
            -0.555_570_2,
        ],
        [
            0.382_683_43,
            -0.923_879_5,
            0.923_879_5,
            -0.382_683_43,
            -0.382_683_43,
            0.923_879_5,
            -0.923_879_5,
            0.382_683_43,
        ],
        [
            0.195_090_32,
            -0.555_570_2,
            0.831_469_6,
            -0.980_785_25,
            0.980_785_25,
            -0.831_469_6,
            0.555_570_2,
            -0.195_090_32,
        ],
    ]
}

const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// 1-D DCT-II of one length-8 lane: `out[u] = C(u)/2 * sum_x in[x] cos(..)`.
#[inline]
fn dct_1d(input: &[f32; 8], output: &mut [f32; 8]) {
    for (u, out) in output.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (x, &v) in input.iter().enumerate() {
            acc += v * COS_TABLE[u][x];
        }
        let cu = if u == 0 { INV_SQRT2 } else { 1.0 };
        *out = 0.5 * cu * acc;
    }
}

/// Forward 2-D DCT of a level-shifted 8x8 block in row-major order.
#[must_use]
pub fn forward_dct_8x8(samples: &[f32; DCT_BLOCK_SIZE]) -> [f32; DCT_BLOCK_SIZE] {
    let mut rows = [0.0f32; DCT_BLOCK_SIZE];
    let mut lane = [0.0f32; 8];
    let mut out_lane = [0.0f32; 8];

    for y in 0..DCT_SIZE {
        lane.copy_from_slice(&samples[y * DCT_SIZE..(y + 1) * DCT_SIZE]);
        dct_1d(&lane, &mut out_lane);
        rows[y * DCT_SIZE..(y + 1) * DCT_SIZE].copy_from_slice(&out_lane);
    }

    let mut coeffs = [0.0f32; DCT_BLOCK_SIZE];
    for x in 0..DCT_SIZE {
        for y in 0..DCT_SIZE {
            lane[y] = rows[y * DCT_SIZE + x];
        }
        dct_1d(&lane, &mut out_lane);
        for y in 0..DCT_SIZE {
            coeffs[y * DCT_SIZE + x] = out_lane[y];
        }
    }
    coeffs
}
