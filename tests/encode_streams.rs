//! End-to-end bitstream tests for the compression context.

use lumajpeg::{CompressionContext, JpegColorSpace};

mod support;
use support::parse_stream;

fn gray_context(width: u32, height: u32) -> CompressionContext {
    let mut ctx = CompressionContext::new();
    ctx.image_width = width;
    ctx.image_height = height;
    ctx.input_components = 1;
    ctx.in_color_space = JpegColorSpace::Grayscale;
    ctx.set_defaults().unwrap();
    ctx
}

fn rgb_context(width: u32, height: u32) -> CompressionContext {
    let mut ctx = CompressionContext::new();
    ctx.image_width = width;
    ctx.image_height = height;
    ctx.input_components = 3;
    ctx.in_color_space = JpegColorSpace::Rgb;
    ctx.set_defaults().unwrap();
    ctx
}

fn encode_gray(mut ctx: CompressionContext, pixels: &[u8]) -> Vec<u8> {
    let width = ctx.image_width as usize;
    ctx.start_compress(true).unwrap();
    for row in pixels.chunks(width) {
        ctx.write_scanlines(&[row]).unwrap();
    }
    let mut out = Vec::new();
    ctx.finish_compress(&mut out).unwrap();
    out
}

fn encode_rgb_rows(mut ctx: CompressionContext, pixels: &[u8]) -> Vec<u8> {
    let width = ctx.image_width as usize;
    ctx.start_compress(true).unwrap();
    for row in pixels.chunks(width * 3) {
        ctx.write_scanlines(&[row]).unwrap();
    }
    let mut out = Vec::new();
    ctx.finish_compress(&mut out).unwrap();
    out
}

fn gradient_rgb(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 8) as u8);
            pixels.push((y * 10) as u8);
            pixels.push(((x + y) * 4) as u8);
        }
    }
    pixels
}

#[test]
fn constant_gray_survives_roundtrip_within_one() {
    // 16x16 constant gray at quality 90.
    let mut ctx = gray_context(16, 16);
    ctx.set_quality(90, true);
    let jpeg = encode_gray(ctx, &[128u8; 16 * 16]);

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    let decoded = decoder.decode().expect("decodable stream");
    assert_eq!(decoded.len(), 16 * 16);
    for &px in &decoded {
        assert!((px as i32 - 128).abs() <= 1, "pixel drifted to {px}");
    }
}

#[test]
fn rgb_gradient_default_params_is_progressive() {
    // 32x24 gradient with all defaults: progressive level 2 emits SOF2.
    let jpeg = encode_rgb_rows(rgb_context(32, 24), &gradient_rgb(32, 24));

    assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

    let stream = parse_stream(&jpeg);
    assert_eq!(stream.count(0xC2), 1, "expected exactly one SOF2");
    assert_eq!(stream.count(0xC0), 0, "baseline SOF0 must not appear");
    // 4:4:4 at level 2: every template expands per component.
    assert_eq!(stream.count(0xDA), 15);

    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    let decoded = decoder.decode().expect("decodable stream");
    assert_eq!(decoded.len(), 32 * 24 * 3);
}

#[test]
fn rgb_gradient_reconstructs_closely() {
    let original = gradient_rgb(32, 24);
    let jpeg = encode_rgb_rows(rgb_context(32, 24), &original);
    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    let decoded = decoder.decode().unwrap();

    let total_err: u64 = original
        .iter()
        .zip(&decoded)
        .map(|(&a, &b)| (a as i64 - b as i64).unsigned_abs())
        .sum();
    let mean_err = total_err as f64 / original.len() as f64;
    assert!(mean_err < 6.0, "mean error too high: {mean_err}");
}

#[test]
fn sequential_level0_is_baseline_single_scan() {
    let mut ctx = rgb_context(32, 24);
    ctx.set_progressive_level(0).unwrap();
    let jpeg = encode_rgb_rows(ctx, &gradient_rgb(32, 24));

    let stream = parse_stream(&jpeg);
    assert_eq!(stream.count(0xC0), 1);
    assert_eq!(stream.count(0xC2), 0);
    assert_eq!(stream.count(0xDA), 1);

    let sos = stream.first(0xDA).unwrap();
    // Interleaved scan over all three components, full band.
    assert_eq!(sos.payload[0], 3);
    let tail = &sos.payload[sos.payload.len() - 3..];
    assert_eq!(tail, &[0, 63, 0]);

    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    decoder.decode().expect("decodable baseline stream");
}

#[test]
fn level1_gray_emits_three_scans() {
    // 8x8 grayscale at progressive level 1.
    let mut ctx = gray_context(8, 8);
    ctx.set_progressive_level(1).unwrap();
    let pixels: Vec<u8> = (0..64).map(|i| (i * 3) as u8).collect();
    let jpeg = encode_gray(ctx, &pixels);

    let stream = parse_stream(&jpeg);
    assert_eq!(stream.count(0xC2), 1, "progressive SOF expected");
    let scans: Vec<[u8; 4]> = stream
        .all(0xDA)
        .iter()
        .map(|s| {
            let p = &s.payload;
            let n = p.len();
            [p[n - 3], p[n - 2], p[n - 1] >> 4, p[n - 1] & 0x0F]
        })
        .collect();
    assert_eq!(
        scans,
        vec![[0, 0, 0, 0], [1, 63, 0, 1], [1, 63, 1, 0]]
    );

    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    let decoded = decoder.decode().expect("decodable progressive stream");
    assert_eq!(decoded.len(), 64);
}

#[test]
fn level2_gray_emits_five_scans() {
    let mut ctx = gray_context(24, 16);
    ctx.set_quality(85, true);
    let pixels: Vec<u8> = (0..24 * 16).map(|i| (i % 251) as u8).collect();
    let jpeg = encode_gray(ctx, &pixels);

    let stream = parse_stream(&jpeg);
    assert_eq!(stream.count(0xDA), 5);
    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    decoder.decode().expect("decodable stream");
}

#[test]
fn restart_interval_writes_dri_and_markers() {
    let mut ctx = gray_context(32, 32);
    ctx.set_progressive_level(0).unwrap();
    ctx.restart_interval = 2;
    let pixels: Vec<u8> = (0..32 * 32).map(|i| (i * 7 % 256) as u8).collect();
    let jpeg = encode_gray(ctx, &pixels);

    let stream = parse_stream(&jpeg);
    let dri = stream.first(0xDD).expect("DRI present");
    assert_eq!(dri.payload, vec![0, 2]);

    // 16 MCUs with interval 2 leave 7 interior restart markers.
    let restarts = jpeg
        .windows(2)
        .filter(|w| w[0] == 0xFF && (0xD0..=0xD7).contains(&w[1]))
        .count();
    assert_eq!(restarts, 7);

    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    decoder.decode().expect("decodable stream with restarts");
}

#[test]
fn stuffed_ff_bytes_only_in_entropy_segments() {
    let jpeg = encode_rgb_rows(rgb_context(32, 24), &gradient_rgb(32, 24));
    let stream = parse_stream(&jpeg);
    // The parser itself verifies byte stuffing: any unstuffed 0xFF in a
    // scan body would surface as an unknown marker.
    for segment in stream.segments() {
        assert!(
            matches!(
                segment.marker,
                0xC0 | 0xC2 | 0xC4 | 0xD8 | 0xD9 | 0xDA | 0xDB | 0xDD | 0xE0..=0xEF | 0xFE
            ),
            "unexpected marker 0x{:02X}",
            segment.marker
        );
    }
}

#[test]
fn unsupported_subsampling_fails_start() {
    let mut ctx = gray_context(16, 16);
    ctx.components_mut()[0].h_samp_factor = 2;
    ctx.components_mut()[0].v_samp_factor = 1;
    let err = ctx.start_compress(true).unwrap_err();
    assert!(matches!(
        err,
        lumajpeg::Error::UnsupportedSubsampling { .. }
    ));
}

#[test]
fn standard_tables_match_annex_k_at_linear_scale_100() {
    let mut ctx = gray_context(16, 16);
    ctx.use_standard_quant_tables();
    // Linear scale 100 maps to quality 50, whose distance restores the
    // unscaled Annex K matrix.
    ctx.set_linear_quality(100, true);
    ctx.set_progressive_level(0).unwrap();
    let jpeg = encode_gray(ctx, &[200u8; 16 * 16]);

    let stream = parse_stream(&jpeg);
    let dqt = stream.first(0xDB).unwrap();
    assert_eq!(dqt.payload[0], 0x00);
    // First entries in zigzag order: 16, 11, 12, 14.
    assert_eq!(&dqt.payload[1..5], &[16, 11, 12, 14]);
}

#[test]
fn u16_and_f32_inputs_encode() {
    use lumajpeg::{Endianness, SampleType};

    // The same ramp as u16 big-endian and as little-endian floats.
    let width = 8usize;
    let height = 8usize;

    let mut ctx = gray_context(width as u32, height as u32);
    ctx.set_input_format(SampleType::U16, Endianness::Big);
    ctx.start_compress(true).unwrap();
    for y in 0..height {
        let mut row = Vec::with_capacity(width * 2);
        for x in 0..width {
            let v = ((x + y) * 4000) as u16;
            row.extend_from_slice(&v.to_be_bytes());
        }
        ctx.write_scanlines(&[&row]).unwrap();
    }
    let mut out_u16 = Vec::new();
    ctx.finish_compress(&mut out_u16).unwrap();

    let mut ctx = gray_context(width as u32, height as u32);
    ctx.set_input_format(SampleType::F32, Endianness::Little);
    ctx.start_compress(true).unwrap();
    for y in 0..height {
        let mut row = Vec::with_capacity(width * 4);
        for x in 0..width {
            let v = ((x + y) * 4000) as f32 * (1.0 / 65535.0);
            row.extend_from_slice(&v.to_le_bytes());
        }
        ctx.write_scanlines(&[&row]).unwrap();
    }
    let mut out_f32 = Vec::new();
    ctx.finish_compress(&mut out_f32).unwrap();

    // Identical sample values through either layout: identical streams.
    assert_eq!(out_u16, out_f32);
}

#[test]
fn one_shot_rgb_helper_produces_a_stream() {
    use imgref::Img;
    use rgb::RGB8;

    let width = 16usize;
    let height = 16usize;
    let pixels: Vec<RGB8> = (0..width * height)
        .map(|i| RGB8::new((i % 256) as u8, (i / 2 % 256) as u8, 80))
        .collect();
    let img = Img::new(pixels, width, height);
    let jpeg = lumajpeg::encode_rgb(img.as_ref(), &lumajpeg::EncoderOptions::default()).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let mut decoder = jpeg_decoder::Decoder::new(&jpeg[..]);
    decoder.decode().expect("decodable stream");
}
