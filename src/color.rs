//! Color transforms for the YCbCr path.
//!
//! After staging, planes hold samples in [0, 1]. The transforms here
//! produce level-shifted samples centered on zero, which is what the DCT
//! stage consumes: `y' = y * 255 - 128`, chroma centered on zero.

/// BT.601 luma weights.
const R_TO_Y: f32 = 0.299;
const G_TO_Y: f32 = 0.587;
const B_TO_Y: f32 = 0.114;

const R_TO_CB: f32 = -0.168_736;
const G_TO_CB: f32 = -0.331_264;
const B_TO_CB: f32 = 0.5;

const R_TO_CR: f32 = 0.5;
const G_TO_CR: f32 = -0.418_688;
const B_TO_CR: f32 = -0.081_312;

/// Converts one row triple from RGB in [0, 1] to level-shifted YCbCr
/// in-place.
pub fn rgb_to_ycbcr_row(r_row: &mut [f32], g_row: &mut [f32], b_row: &mut [f32]) {
    let width = r_row.len();
    let mut x = 0;

    #[cfg(feature = "simd")]
    {
        use wide::f32x4;
        let scale = f32x4::splat(255.0);
        let shift = f32x4::splat(128.0);
        while x + 4 <= width {
            let r = f32x4::from([r_row[x], r_row[x + 1], r_row[x + 2], r_row[x + 3]]) * scale;
            let g = f32x4::from([g_row[x], g_row[x + 1], g_row[x + 2], g_row[x + 3]]) * scale;
            let b = f32x4::from([b_row[x], b_row[x + 1], b_row[x + 2], b_row[x + 3]]) * scale;
            let y = f32x4::splat(R_TO_Y) * r + f32x4::splat(G_TO_Y) * g + f32x4::splat(B_TO_Y) * b
                - shift;
            let cb =
                f32x4::splat(R_TO_CB) * r + f32x4::splat(G_TO_CB) * g + f32x4::splat(B_TO_CB) * b;
            let cr =
                f32x4::splat(R_TO_CR) * r + f32x4::splat(G_TO_CR) * g + f32x4::splat(B_TO_CR) * b;
            let (y, cb, cr) = (y.to_array(), cb.to_array(), cr.to_array());
            r_row[x..x + 4].copy_from_slice(&y);
            g_row[x..x + 4].copy_from_slice(&cb);
            b_row[x..x + 4].copy_from_slice(&cr);
            x += 4;
        }
    }

    while x < width {
        let r = r_row[x] * 255.0;
        let g = g_row[x] * 255.0;
        let b = b_row[x] * 255.0;
        r_row[x] = R_TO_Y * r + G_TO_Y * g + B_TO_Y * b - 128.0;
        g_row[x] = R_TO_CB * r + G_TO_CB * g + B_TO_CB * b;
        b_row[x] = R_TO_CR * r + G_TO_CR * g + B_TO_CR * b;
        x += 1;
    }
}
