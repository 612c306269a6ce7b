//! # lumajpeg - Perceptually-Tuned JPEG Encoder
//!
//! lumajpeg produces baseline and progressive JPEG streams from pixel
//! scanlines, tuned around a perceptual distance target rather than the
//! classic quality knob. The interesting parts:
//!
//! - **Two color paths**: traditional BT.601 YCbCr, or the XYB
//!   perceptual colorspace with an embedded ICC profile so ICC-aware
//!   decoders restore sRGB.
//! - **Adaptive quantization**: a per-block field derived from the image
//!   content steers zero-biasing so visually busy regions compress
//!   harder without visible loss.
//! - **Optimized entropy coding**: Huffman tables are always built from
//!   the image's own symbol statistics, with incremental DHT emission
//!   across progressive scans.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lumajpeg::{CompressionContext, JpegColorSpace};
//!
//! let mut ctx = CompressionContext::new();
//! ctx.image_width = width;
//! ctx.image_height = height;
//! ctx.input_components = 3;
//! ctx.in_color_space = JpegColorSpace::Rgb;
//! ctx.set_defaults()?;
//! ctx.set_quality(90, true);
//! ctx.start_compress(true)?;
//! for row in rows {
//!     ctx.write_scanlines(&[row])?;
//! }
//! let mut jpeg = Vec::new();
//! ctx.finish_compress(&mut jpeg)?;
//! ```
//!
//! The encoder is single-threaded and owner-exclusive: one context per
//! encode, independent contexts for concurrent encodes.

// Core types and constants
mod consts;
mod error;
mod types;

// Pipeline stages
mod adaptive_quant;
mod bitstream;
mod coeffs;
mod color;
mod color_encoding;
mod dct;
mod encode;
mod entropy;
mod huffman;
mod image;
mod input;
mod markers;
mod quality;
mod quant;
mod scan_script;
mod xyb;

pub use bitstream::{Destination, StreamDestination};
pub use color_encoding::{ColorEncoding, TransferFunction};
pub use encode::{encode_rgb, CompressionContext, EncoderOptions};
pub use error::{Error, Result};
pub use quality::{
    distance_to_linear_quality, linear_quality_to_distance, quality_scaling, quality_to_distance,
};
pub use types::{ComponentInfo, Endianness, JpegColorSpace, QuantMode, SampleType, ScanInfo};
