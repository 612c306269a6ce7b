//! Scanline staging: demultiplexes interleaved input rows into the planar
//! float buffers.
//!
//! Integer samples are normalized to [0, 1]; float samples pass through
//! unscaled. The effective byte order is resolved from the configured
//! endianness at call time.

use crate::error::{Error, Result};
use crate::image::Image3F;
use crate::types::{Endianness, SampleType};

/// Stages `rows` into `input` starting at row `next_scanline`.
///
/// The caller has already truncated the batch so it fits below the image
/// height. Every row must carry `width * num_components` samples.
pub fn stage_scanlines(
    input: &mut Image3F,
    rows: &[&[u8]],
    next_scanline: usize,
    width: usize,
    num_components: usize,
    sample_type: SampleType,
    endianness: Endianness,
) -> Result<()> {
    let bytes_per_sample = sample_type.bytes_per_sample();
    let pwidth = num_components * bytes_per_sample;
    let row_bytes = width
        .checked_mul(pwidth)
        .ok_or(Error::SizeOverflow {
            context: "computing scanline stride",
        })?;
    let little = endianness.is_little();

    for (i, src) in rows.iter().enumerate() {
        if src.len() < row_bytes {
            return Err(Error::BufferTooSmall {
                expected: row_bytes,
                actual: src.len(),
            });
        }
        for c in 0..num_components {
            let plane = input.plane_mut(c);
            let dst = plane.row_mut(next_scanline + i);
            let base = c * bytes_per_sample;
            match sample_type {
                SampleType::U8 => {
                    for (x, out) in dst.iter_mut().enumerate().take(width) {
                        *out = src[base + x * pwidth] as f32 * (1.0 / 255.0);
                    }
                }
                SampleType::U16 => {
                    for (x, out) in dst.iter_mut().enumerate().take(width) {
                        let p = base + x * pwidth;
                        let raw = [src[p], src[p + 1]];
                        let v = if little {
                            u16::from_le_bytes(raw)
                        } else {
                            u16::from_be_bytes(raw)
                        };
                        *out = v as f32 * (1.0 / 65535.0);
                    }
                }
                SampleType::F32 => {
                    for (x, out) in dst.iter_mut().enumerate().take(width) {
                        let p = base + x * pwidth;
                        let raw = [src[p], src[p + 1], src[p + 2], src[p + 3]];
                        *out = if little {
                            f32::from_le_bytes(raw)
                        } else {
                            f32::from_be_bytes(raw)
                        };
                    }
                }
            }
        }
    }
    Ok(())
}
