//! Minimal color-encoding model derived from embedded ICC profiles.
//!
//! The encoder only needs three facts from a profile: whether the data is
//! gray, and whether the transfer function is PQ or HLG (which scale the
//! global quantizer). Everything else falls back to sRGB. Detection reads
//! the ICC header color-space signature and, when present, the `cicp` tag.

use crate::consts::{MARKER_APP2, XYB_ICC_PROFILE};
use crate::error::{Error, Result};

/// Transfer functions the quantizer planner distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferFunction {
    /// sRGB or anything else without special handling
    #[default]
    Srgb,
    /// Linear light
    Linear,
    /// SMPTE ST 2084 perceptual quantizer
    Pq,
    /// Hybrid log-gamma
    Hlg,
}

/// The subset of a color encoding the encoder acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorEncoding {
    /// Single-channel data
    pub gray: bool,
    /// Transfer function of the encoded samples
    pub transfer: TransferFunction,
}

impl ColorEncoding {
    /// The sRGB default, gray or color.
    #[must_use]
    pub const fn srgb(gray: bool) -> Self {
        Self {
            gray,
            transfer: TransferFunction::Srgb,
        }
    }

    /// Inspects an ICC profile blob.
    pub fn from_icc(icc: &[u8]) -> Result<Self> {
        if icc.len() < 132 {
            return Err(Error::CorruptIcc {
                reason: "profile shorter than header",
            });
        }
        let declared = u32::from_be_bytes([icc[0], icc[1], icc[2], icc[3]]) as usize;
        if declared > icc.len() {
            return Err(Error::CorruptIcc {
                reason: "declared size exceeds data",
            });
        }
        let gray = match &icc[16..20] {
            b"GRAY" => true,
            b"RGB " => false,
            _ => {
                return Err(Error::CorruptIcc {
                    reason: "unsupported data color space",
                })
            }
        };
        let transfer = read_cicp_transfer(icc).unwrap_or(TransferFunction::Srgb);
        Ok(Self { gray, transfer })
    }
}

/// Reads the transfer characteristics byte from a `cicp` tag, if any.
fn read_cicp_transfer(icc: &[u8]) -> Option<TransferFunction> {
    let tag_count = u32::from_be_bytes([icc[128], icc[129], icc[130], icc[131]]) as usize;
    let table_end = 132usize.checked_add(tag_count.checked_mul(12)?)?;
    if table_end > icc.len() {
        return None;
    }
    for i in 0..tag_count {
        let entry = 132 + i * 12;
        if &icc[entry..entry + 4] != b"cicp" {
            continue;
        }
        let offset =
            u32::from_be_bytes([icc[entry + 4], icc[entry + 5], icc[entry + 6], icc[entry + 7]])
                as usize;
        let size =
            u32::from_be_bytes([icc[entry + 8], icc[entry + 9], icc[entry + 10], icc[entry + 11]])
                as usize;
        // Tag layout: signature(4) reserved(4) primaries transfer matrix range.
        if size < 12 || offset.checked_add(size)? > icc.len() {
            return None;
        }
        return Some(match icc[offset + 9] {
            8 => TransferFunction::Linear,
            16 => TransferFunction::Pq,
            18 => TransferFunction::Hlg,
            _ => TransferFunction::Srgb,
        });
    }
    None
}

/// Wraps an ICC profile into a single-chunk APP2 marker blob.
///
/// Layout per the ICC profile-embedding technote: signature, sequence
/// number 1 of 1, then the profile bytes.
#[must_use]
pub fn create_icc_app_marker(icc: &[u8]) -> Vec<u8> {
    let mut marker = Vec::with_capacity(18 + icc.len());
    marker.push(0xFF);
    marker.push(MARKER_APP2);
    let size = 16 + icc.len();
    marker.push((size >> 8) as u8);
    marker.push((size & 0xFF) as u8);
    marker.extend_from_slice(b"ICC_PROFILE\0");
    marker.push(1);
    marker.push(1);
    marker.extend_from_slice(icc);
    marker
}

/// The APP2 marker carrying the synthesized XYB profile.
#[must_use]
pub fn create_xyb_icc_app_marker() -> Vec<u8> {
    create_icc_app_marker(&XYB_ICC_PROFILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_profile(space: &[u8; 4], cicp_transfer: Option<u8>) -> Vec<u8> {
        let mut icc = vec![0u8; 132];
        icc[16..20].copy_from_slice(space);
        if let Some(tf) = cicp_transfer {
            // One tag table entry pointing at a cicp tag at the end.
            icc[128..132].copy_from_slice(&1u32.to_be_bytes());
            let offset = icc.len() as u32 + 12;
            icc.extend_from_slice(b"cicp");
            icc.extend_from_slice(&offset.to_be_bytes());
            icc.extend_from_slice(&12u32.to_be_bytes());
            icc.extend_from_slice(b"cicp");
            icc.extend_from_slice(&[0; 4]);
            icc.extend_from_slice(&[1, tf, 0, 1]);
        }
        let len = icc.len() as u32;
        icc[0..4].copy_from_slice(&len.to_be_bytes());
        icc
    }

    #[test]
    fn gray_and_rgb_signatures() {
        let enc = ColorEncoding::from_icc(&minimal_profile(b"GRAY", None)).unwrap();
        assert!(enc.gray);
        assert_eq!(enc.transfer, TransferFunction::Srgb);

        let enc = ColorEncoding::from_icc(&minimal_profile(b"RGB ", None)).unwrap();
        assert!(!enc.gray);
    }

    #[test]
    fn cicp_transfer_detection() {
        let enc = ColorEncoding::from_icc(&minimal_profile(b"RGB ", Some(16))).unwrap();
        assert_eq!(enc.transfer, TransferFunction::Pq);
        let enc = ColorEncoding::from_icc(&minimal_profile(b"RGB ", Some(18))).unwrap();
        assert_eq!(enc.transfer, TransferFunction::Hlg);
        let enc = ColorEncoding::from_icc(&minimal_profile(b"RGB ", Some(13))).unwrap();
        assert_eq!(enc.transfer, TransferFunction::Srgb);
    }

    #[test]
    fn truncated_profiles_are_rejected() {
        assert!(ColorEncoding::from_icc(&[0u8; 16]).is_err());
        assert!(ColorEncoding::from_icc(&minimal_profile(b"CMYK", None)).is_err());
    }

    #[test]
    fn xyb_marker_shape() {
        let marker = create_xyb_icc_app_marker();
        assert_eq!(marker[0], 0xFF);
        assert_eq!(marker[1], MARKER_APP2);
        let len = ((marker[2] as usize) << 8) | marker[3] as usize;
        assert_eq!(len, marker.len() - 2);
        assert_eq!(&marker[4..16], b"ICC_PROFILE\0");
        assert_eq!(marker[16], 1);
        assert_eq!(marker[17], 1);
        assert_eq!(&marker[18..], &XYB_ICC_PROFILE[..]);
    }
}
