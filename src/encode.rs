//! The compression context and its lifecycle.
//!
//! A context is created empty, configured through setters, then driven
//! through `start_compress`, `write_scanlines` and `finish_compress`.
//! Calling into it out of order returns `Error::BadCallSequence`; the
//! context stays droppable in every state.

use log::{debug, trace};

use imgref::ImgRef;
use rgb::{ComponentBytes, RGB8};

use crate::adaptive_quant::{initial_quant_field, QuantField, FLAT_QUANT_FIELD};
use crate::bitstream::Destination;
use crate::coeffs::compute_coefficients;
use crate::color::rgb_to_ycbcr_row;
use crate::color_encoding::{create_xyb_icc_app_marker, ColorEncoding};
use crate::consts::{
    div_ceil, JPEG_NATURAL_ORDER, MARKER_DHT, MARKER_DQT, MARKER_DRI, MARKER_EOI, MARKER_SOF0,
    MARKER_SOF2, MARKER_SOI, MARKER_SOS, MAX_COMPONENTS, MAX_DIMENSION,
};
use crate::entropy::{
    encode_scan, optimize_huffman_codes, EmitSink, FrameGeometry, JpegHuffmanCode, ScanCodingInfo,
};
use crate::error::{Error, Result};
use crate::huffman::{HuffmanEncoder, TableClass};
use crate::image::Image3F;
use crate::input::stage_scanlines;
use crate::markers::MarkerStore;
use crate::quality::{linear_quality_to_distance, quality_to_distance};
use crate::quant::{add_jpeg_quant_matrices, compute_quant_scales, QuantTable};
use crate::scan_script::{plan_scans, validate_scan_script};
use crate::types::{
    ComponentInfo, Endianness, JpegColorSpace, QuantMode, SampleType, ScanInfo, ScanScript,
};
use crate::xyb::image_to_scaled_xyb;

/// Display intensity the XYB transform is parameterized for.
const XYB_INTENSITY_TARGET: f32 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Params,
    Writing,
    Done,
}

/// Encoder-private settings populated by the parameter setters.
#[derive(Debug)]
struct EncoderMaster {
    distance: f32,
    xyb_mode: bool,
    use_std_tables: bool,
    use_adaptive_quantization: bool,
    progressive_level: i32,
    data_type: SampleType,
    endianness: Endianness,
    force_baseline: bool,
    jpeg_color_space: JpegColorSpace,
    markers: MarkerStore,
    input: Option<Image3F>,
}

impl Default for EncoderMaster {
    fn default() -> Self {
        Self {
            distance: 1.0,
            xyb_mode: false,
            use_std_tables: false,
            use_adaptive_quantization: true,
            progressive_level: 2,
            data_type: SampleType::U8,
            endianness: Endianness::Native,
            force_baseline: false,
            jpeg_color_space: JpegColorSpace::Unknown,
            markers: MarkerStore::new(),
            input: None,
        }
    }
}

/// The root object of one encode.
#[derive(Debug)]
pub struct CompressionContext {
    /// Image width in pixels
    pub image_width: u32,
    /// Image height in pixels
    pub image_height: u32,
    /// Number of channels in the input rows (1 or 3)
    pub input_components: usize,
    /// Color space of the input rows
    pub in_color_space: JpegColorSpace,
    /// Restart interval in MCUs; 0 disables restart markers
    pub restart_interval: u16,

    num_components: usize,
    comp_info: Vec<ComponentInfo>,
    scan_script: Option<ScanScript>,
    next_scanline: u32,
    max_h_samp_factor: u8,
    max_v_samp_factor: u8,
    max_shift: u32,
    xsize_blocks: usize,
    ysize_blocks: usize,
    progressive_mode: bool,
    state: State,
    master: EncoderMaster,
}

impl Default for CompressionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionContext {
    /// Creates an empty context with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            image_width: 0,
            image_height: 0,
            input_components: 0,
            in_color_space: JpegColorSpace::Unknown,
            restart_interval: 0,
            num_components: 0,
            comp_info: Vec::new(),
            scan_script: None,
            next_scanline: 0,
            max_h_samp_factor: 1,
            max_v_samp_factor: 1,
            max_shift: 0,
            xsize_blocks: 0,
            ysize_blocks: 0,
            progressive_mode: false,
            state: State::Params,
            master: EncoderMaster::default(),
        }
    }

    /// Switches the encoder to the XYB path. Requires 3-channel RGB
    /// input by the time defaults are populated.
    pub fn set_xyb_mode(&mut self) {
        self.master.xyb_mode = true;
    }

    /// Populates the component table from the input description.
    pub fn set_defaults(&mut self) -> Result<()> {
        if self.master.xyb_mode
            && (self.input_components != 3 || self.in_color_space != JpegColorSpace::Rgb)
        {
            return Err(Error::XybRequiresRgb);
        }
        self.num_components = self.input_components;
        self.comp_info = (0..self.num_components)
            .map(|c| ComponentInfo::with_index(c, (c + 1) as u8))
            .collect();
        if self.master.xyb_mode {
            for (comp, id) in self.comp_info.iter_mut().zip([b'R', b'G', b'B']) {
                comp.component_id = id;
            }
            // The blue channel carries the least spatial detail in XYB.
            self.comp_info[0].h_samp_factor = 2;
            self.comp_info[0].v_samp_factor = 2;
            self.comp_info[1].h_samp_factor = 2;
            self.comp_info[1].v_samp_factor = 2;
            self.comp_info[2].h_samp_factor = 1;
            self.comp_info[2].v_samp_factor = 1;
        }
        self.scan_script = None;
        Ok(())
    }

    /// Records the output colorspace.
    pub fn set_colorspace(&mut self, colorspace: JpegColorSpace) {
        self.master.jpeg_color_space = colorspace;
    }

    /// Sets the perceptual distance directly.
    pub fn set_distance(&mut self, distance: f32) {
        self.master.distance = distance;
    }

    /// Sets quality on the legacy 1-100 scale.
    pub fn set_quality(&mut self, quality: i32, force_baseline: bool) {
        self.master.distance = quality_to_distance(quality);
        self.master.force_baseline = force_baseline;
    }

    /// Sets quality on the libjpeg linear 0-5000 scale.
    pub fn set_linear_quality(&mut self, scale_factor: i32, force_baseline: bool) {
        self.master.distance = linear_quality_to_distance(scale_factor);
        self.master.force_baseline = force_baseline;
    }

    /// Retained for API compatibility; quantization tables are always
    /// derived from the distance.
    pub fn add_quant_table(
        &mut self,
        _which_tbl: usize,
        _basic_table: &[u16],
        _scale_factor: i32,
        _force_baseline: bool,
    ) {
    }

    /// Retained for API compatibility; table emission is never
    /// suppressed.
    pub fn suppress_tables(&mut self, _suppress: bool) {}

    /// Selects the default multi-pass progression.
    pub fn simple_progression(&mut self) {
        self.master.progressive_level = 2;
    }

    /// Sets the sample type and endianness of the input rows.
    pub fn set_input_format(&mut self, data_type: SampleType, endianness: Endianness) {
        self.master.data_type = data_type;
        self.master.endianness = endianness;
    }

    /// Enables or disables the adaptive quantization field.
    pub fn enable_adaptive_quantization(&mut self, enable: bool) {
        self.master.use_adaptive_quantization = enable;
    }

    /// Sets the progressive level: 0 sequential, 1 simple progression,
    /// 2 and above the default multi-pass script.
    pub fn set_progressive_level(&mut self, level: i32) -> Result<()> {
        if level < 0 {
            return Err(Error::InvalidProgressiveLevel { level });
        }
        self.master.progressive_level = level;
        Ok(())
    }

    /// Forces the Annex-K standard quantization matrices.
    pub fn use_standard_quant_tables(&mut self) {
        self.master.use_std_tables = true;
    }

    /// Installs a caller-provided scan script.
    pub fn write_scan_script(&mut self, scans: &[ScanInfo]) {
        self.scan_script = Some(ScanScript::User(scans.to_vec()));
    }

    /// The component table populated by `set_defaults`.
    #[must_use]
    pub fn components(&self) -> &[ComponentInfo] {
        &self.comp_info
    }

    /// Mutable access to the component table, e.g. to adjust sampling
    /// factors before `start_compress`.
    #[must_use]
    pub fn components_mut(&mut self) -> &mut [ComponentInfo] {
        &mut self.comp_info
    }

    /// Opens an APPn/COM marker for byte-at-a-time writing.
    pub fn write_m_header(&mut self, marker: u8, datalen: usize) -> Result<()> {
        self.master.markers.write_m_header(marker, datalen)
    }

    /// Appends one byte to the open marker.
    pub fn write_m_byte(&mut self, value: u8) -> Result<()> {
        self.master.markers.write_m_byte(value)
    }

    /// Stores an ICC profile as chunked APP2 markers.
    pub fn write_icc_profile(&mut self, icc: &[u8]) -> Result<()> {
        self.master.markers.write_icc_profile(icc)
    }

    /// Reassembles the ICC profile currently held in the marker store.
    #[must_use]
    pub fn parsed_icc_profile(&self) -> Option<Vec<u8>> {
        self.master.markers.icc_profile()
    }

    /// Validates sampling factors, derives the frame geometry and
    /// allocates the staging planes. `write_all_tables` is accepted for
    /// API compatibility; tables are always written.
    pub fn start_compress(&mut self, _write_all_tables: bool) -> Result<()> {
        if self.state != State::Params {
            return Err(Error::BadCallSequence {
                call: "start_compress",
                expected: "a freshly configured context",
            });
        }
        if self.comp_info.is_empty() {
            return Err(Error::BadCallSequence {
                call: "start_compress",
                expected: "set_defaults",
            });
        }
        if self.image_width == 0
            || self.image_height == 0
            || self.image_width > MAX_DIMENSION
            || self.image_height > MAX_DIMENSION
        {
            return Err(Error::InvalidDimensions {
                width: self.image_width,
                height: self.image_height,
            });
        }

        self.next_scanline = 0;
        self.progressive_mode = match &self.scan_script {
            Some(script) => {
                validate_scan_script(script.scans(), self.num_components)?;
                let first = script.scans()[0];
                first.ss != 0 || first.se != 63
            }
            None => self.master.progressive_level > 0,
        };

        self.max_h_samp_factor = 1;
        self.max_v_samp_factor = 1;
        for comp in &self.comp_info {
            self.max_h_samp_factor = self.max_h_samp_factor.max(comp.h_samp_factor);
            self.max_v_samp_factor = self.max_v_samp_factor.max(comp.v_samp_factor);
        }
        self.max_shift = 0;
        for comp in &self.comp_info {
            if comp.h_samp_factor != comp.v_samp_factor {
                return Err(Error::UnsupportedSubsampling {
                    h_samp_factor: comp.h_samp_factor,
                    v_samp_factor: comp.v_samp_factor,
                });
            }
            if comp.h_samp_factor == 0 || self.max_h_samp_factor % comp.h_samp_factor != 0 {
                return Err(Error::NonIntegralSubsamplingRatio {
                    samp_factor: comp.h_samp_factor,
                });
            }
            let factor = self.max_h_samp_factor / comp.h_samp_factor;
            let shift = match factor {
                1 => 0,
                2 => 1,
                4 => 2,
                8 => 3,
                _ => return Err(Error::InvalidSamplingFactor { factor }),
            };
            self.max_shift = self.max_shift.max(shift);
        }

        let align = 8usize << self.max_shift;
        self.xsize_blocks = div_ceil(self.image_width as usize, align) << self.max_shift;
        self.ysize_blocks = div_ceil(self.image_height as usize, align) << self.max_shift;

        let mut input = Image3F::new(self.xsize_blocks * 8, self.ysize_blocks * 8);
        input.shrink_to(self.image_width as usize, self.image_height as usize);
        self.master.input = Some(input);
        self.state = State::Writing;
        debug!(
            "start_compress: {}x{} components={} colorspace={:?} blocks={}x{} shift={} progressive={}",
            self.image_width,
            self.image_height,
            self.num_components,
            self.master.jpeg_color_space,
            self.xsize_blocks,
            self.ysize_blocks,
            self.max_shift,
            self.progressive_mode
        );
        Ok(())
    }

    /// Stages up to `rows.len()` scanlines, returning how many were
    /// consumed (fewer than requested near the bottom of the image).
    pub fn write_scanlines(&mut self, rows: &[&[u8]]) -> Result<u32> {
        if self.state != State::Writing {
            return Err(Error::BadCallSequence {
                call: "write_scanlines",
                expected: "start_compress",
            });
        }
        if self.num_components > MAX_COMPONENTS {
            return Err(Error::InvalidComponents {
                count: self.num_components,
            });
        }
        let remaining = (self.image_height - self.next_scanline) as usize;
        let num_lines = rows.len().min(remaining);
        let input = self.master.input.as_mut().ok_or(Error::BadCallSequence {
            call: "write_scanlines",
            expected: "start_compress",
        })?;
        stage_scanlines(
            input,
            &rows[..num_lines],
            self.next_scanline as usize,
            self.image_width as usize,
            self.num_components,
            self.master.data_type,
            self.master.endianness,
        )?;
        self.next_scanline += num_lines as u32;
        Ok(num_lines as u32)
    }

    /// Runs the color, quantization, coefficient and bitstream stages
    /// and writes the complete JPEG stream into `dest`.
    pub fn finish_compress(&mut self, dest: &mut dyn Destination) -> Result<()> {
        if self.state != State::Writing || self.next_scanline != self.image_height {
            return Err(Error::BadCallSequence {
                call: "finish_compress",
                expected: "all scanlines written",
            });
        }

        let use_xyb = self.master.xyb_mode;
        let use_aq = self.master.use_adaptive_quantization;
        let quant_mode = if use_xyb {
            QuantMode::Xyb
        } else if self.master.use_std_tables {
            QuantMode::Std
        } else {
            QuantMode::YCbCr
        };
        if use_xyb && self.num_components != 3 {
            return Err(Error::XybRequiresRgb);
        }

        let mut input = self.master.input.take().ok_or(Error::BadCallSequence {
            call: "finish_compress",
            expected: "start_compress",
        })?;
        if self.num_components == 1 {
            input.fan_out_plane0();
        }

        let gray = self.num_components == 1;
        let color_encoding = match self.master.markers.icc_profile() {
            Some(icc) => ColorEncoding::from_icc(&icc).unwrap_or_else(|err| {
                log::warn!("falling back to sRGB: {}", err);
                ColorEncoding::srgb(gray)
            }),
            None => ColorEncoding::srgb(gray),
        };
        if use_xyb {
            self.master
                .markers
                .set_icc_app_marker(create_xyb_icc_app_marker());
        }

        let width = self.image_width as usize;
        let height = self.image_height as usize;
        let distance = self.master.distance;

        if use_xyb {
            image_to_scaled_xyb(&mut input, width, height, XYB_INTENSITY_TARGET);
        } else {
            let [p0, p1, p2] = input.planes_mut();
            for y in 0..height {
                rgb_to_ycbcr_row(p0.row_mut(y), p1.row_mut(y), p2.row_mut(y));
            }
        }
        input.pad_to_capacity();
        trace!("color pipeline done, mode {:?}", quant_mode);

        let y_channel = usize::from(use_xyb);
        let qf = if use_aq {
            initial_quant_field(
                distance,
                input.plane(y_channel),
                self.xsize_blocks,
                self.ysize_blocks,
            )
        } else {
            QuantField::filled(self.xsize_blocks, self.ysize_blocks, FLAT_QUANT_FIELD)
        };
        let (qfmin, qfmax) = qf.min_max();
        trace!("quant field range [{qfmin}, {qfmax}]");

        let scales =
            compute_quant_scales(quant_mode, distance, qfmax, color_encoding.transfer);
        let num_tables = self
            .comp_info
            .iter()
            .map(|c| c.quant_tbl_no as usize + 1)
            .max()
            .unwrap_or(1);
        let quant_tables = add_jpeg_quant_matrices(
            quant_mode,
            num_tables,
            scales,
            self.master.force_baseline,
        );

        for comp in &mut self.comp_info {
            let factor = (self.max_h_samp_factor / comp.h_samp_factor) as usize;
            comp.width_in_blocks = (self.xsize_blocks / factor) as u32;
            comp.height_in_blocks = (self.ysize_blocks / factor) as u32;
        }

        let coeffs = compute_coefficients(
            &input,
            &self.comp_info,
            self.max_h_samp_factor,
            &quant_tables,
            quant_mode,
            distance,
            use_aq,
            &qf,
        );
        drop(input);

        if self.scan_script.is_none() {
            self.scan_script = Some(ScanScript::Planned(plan_scans(
                self.master.progressive_level,
                self.max_shift,
                self.num_components,
            )));
        }
        let scans: Vec<ScanInfo> = match &self.scan_script {
            Some(script) => script.scans().to_vec(),
            None => Vec::new(),
        };
        let scans = scans.as_slice();

        let geometry = FrameGeometry {
            width: self.image_width,
            height: self.image_height,
            max_h_samp_factor: self.max_h_samp_factor,
            max_v_samp_factor: self.max_v_samp_factor,
        };
        let (huffman_codes, coding_info) = optimize_huffman_codes(
            &geometry,
            &self.comp_info,
            &coeffs,
            scans,
            self.restart_interval,
        )?;
        debug!(
            "{} scans, {} optimized Huffman tables",
            scans.len(),
            huffman_codes.len()
        );

        dest.init_destination();
        dest.write_bytes(&[0xFF, MARKER_SOI])?;
        for marker in self.master.markers.markers() {
            dest.write_bytes(marker)?;
        }
        write_dqt(dest, &quant_tables)?;
        write_sof(
            dest,
            self.progressive_mode,
            self.image_width,
            self.image_height,
            &self.comp_info,
        )?;
        if self.restart_interval > 0 {
            write_dri(dest, self.restart_interval)?;
        }

        let mut dc_encoders: [Option<HuffmanEncoder>; 2] = [None, None];
        let mut ac_encoders: [Option<HuffmanEncoder>; 2] = [None, None];
        let mut dht_index = 0usize;
        for (scan, info) in scans.iter().zip(&coding_info) {
            let fresh = &huffman_codes[dht_index..dht_index + info.num_huffman_codes];
            if !fresh.is_empty() {
                write_dht(dest, fresh)?;
                for code in fresh {
                    let encoder = HuffmanEncoder::new(&code.table)?;
                    match code.class {
                        TableClass::Dc => dc_encoders[code.slot_id as usize] = Some(encoder),
                        TableClass::Ac => ac_encoders[code.slot_id as usize] = Some(encoder),
                    }
                }
                dht_index += info.num_huffman_codes;
            }
            write_sos(dest, scan, info, &self.comp_info)?;
            let mut sink = EmitSink::new(&dc_encoders, &ac_encoders);
            encode_scan(
                &geometry,
                &self.comp_info,
                &coeffs,
                scan,
                self.restart_interval,
                &mut sink,
            )?;
            dest.write_bytes(&sink.finish())?;
        }

        dest.write_bytes(&[0xFF, MARKER_EOI])?;
        dest.term_destination();
        self.state = State::Done;
        Ok(())
    }
}

/// Writes a marker segment with a two-byte length prefix.
fn write_segment(dest: &mut dyn Destination, marker: u8, payload: &[u8]) -> Result<()> {
    let length = payload.len() + 2;
    dest.write_bytes(&[0xFF, marker, (length >> 8) as u8, (length & 0xFF) as u8])?;
    dest.write_bytes(payload)
}

fn write_dqt(dest: &mut dyn Destination, tables: &[QuantTable]) -> Result<()> {
    let mut payload = Vec::new();
    for (id, table) in tables.iter().enumerate() {
        payload.push((table.precision << 4) | id as u8);
        for k in 0..64 {
            let value = table.values[JPEG_NATURAL_ORDER[k] as usize];
            if table.precision == 1 {
                payload.push((value >> 8) as u8);
            }
            payload.push((value & 0xFF) as u8);
        }
    }
    write_segment(dest, MARKER_DQT, &payload)
}

fn write_sof(
    dest: &mut dyn Destination,
    progressive: bool,
    width: u32,
    height: u32,
    components: &[ComponentInfo],
) -> Result<()> {
    let marker = if progressive { MARKER_SOF2 } else { MARKER_SOF0 };
    let mut payload = Vec::with_capacity(6 + components.len() * 3);
    payload.push(8);
    payload.extend_from_slice(&(height as u16).to_be_bytes());
    payload.extend_from_slice(&(width as u16).to_be_bytes());
    payload.push(components.len() as u8);
    for comp in components {
        payload.push(comp.component_id);
        payload.push((comp.h_samp_factor << 4) | comp.v_samp_factor);
        payload.push(comp.quant_tbl_no);
    }
    write_segment(dest, marker, &payload)
}

fn write_dri(dest: &mut dyn Destination, interval: u16) -> Result<()> {
    write_segment(dest, MARKER_DRI, &interval.to_be_bytes())
}

fn write_dht(dest: &mut dyn Destination, codes: &[JpegHuffmanCode]) -> Result<()> {
    let mut payload = Vec::new();
    for code in codes {
        payload.push((code.class.id() << 4) | code.slot_id);
        payload.extend_from_slice(&code.table.counts);
        payload.extend_from_slice(&code.table.values);
    }
    write_segment(dest, MARKER_DHT, &payload)
}

fn write_sos(
    dest: &mut dyn Destination,
    scan: &ScanInfo,
    info: &ScanCodingInfo,
    components: &[ComponentInfo],
) -> Result<()> {
    let mut payload = Vec::with_capacity(4 + scan.components().len() * 2);
    payload.push(scan.comps_in_scan);
    for (si, &ci) in scan.components().iter().enumerate() {
        payload.push(components[ci as usize].component_id);
        payload.push((info.dc_tbl_idx[si] << 4) | info.ac_tbl_idx[si]);
    }
    payload.push(scan.ss);
    payload.push(scan.se);
    payload.push((scan.ah << 4) | scan.al);
    write_segment(dest, MARKER_SOS, &payload)
}

/// Options for the one-shot RGB helper.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Perceptual distance target
    pub distance: f32,
    /// Encode through the XYB path
    pub xyb: bool,
    /// Progressive level (0 sequential, 1 simple, 2 default)
    pub progressive_level: i32,
    /// Content-adaptive quantization
    pub adaptive_quantization: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            distance: 1.0,
            xyb: false,
            progressive_level: 2,
            adaptive_quantization: true,
        }
    }
}

/// Encodes an 8-bit RGB image in one call.
pub fn encode_rgb(image: ImgRef<'_, RGB8>, options: &EncoderOptions) -> Result<Vec<u8>> {
    let mut ctx = CompressionContext::new();
    ctx.image_width = image.width() as u32;
    ctx.image_height = image.height() as u32;
    ctx.input_components = 3;
    ctx.in_color_space = JpegColorSpace::Rgb;
    if options.xyb {
        ctx.set_xyb_mode();
    }
    ctx.set_defaults()?;
    ctx.set_distance(options.distance);
    ctx.set_progressive_level(options.progressive_level)?;
    ctx.enable_adaptive_quantization(options.adaptive_quantization);
    ctx.start_compress(true)?;
    for row in image.rows() {
        ctx.write_scanlines(&[row.as_bytes()])?;
    }
    let mut output = Vec::new();
    ctx.finish_compress(&mut output)?;
    Ok(output)
}
