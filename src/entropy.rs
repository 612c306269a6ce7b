//! Entropy-coded scan generation.
//!
//! One scan encoder drives two passes through a sink abstraction: the
//! first pass feeds symbol histograms for Huffman optimization, the
//! second replays the identical symbol stream into the bit writer. The
//! control flow depends only on the coefficients, so the two passes are
//! guaranteed to agree.

use crate::bitstream::BitWriter;
use crate::coeffs::ComponentCoeffs;
use crate::consts::{div_ceil, JPEG_NATURAL_ORDER, MAX_COMPS_IN_SCAN};
use crate::error::{Error, Result};
use crate::huffman::{Histogram, HuffmanCodeTable, HuffmanEncoder, TableClass};
use crate::types::{ComponentInfo, ScanInfo};

/// Longest representable EOB run.
const MAX_EOB_RUN: u16 = 0x7FFF;

/// Correction bits buffered before an EOB run is forced out.
const MAX_CORR_BITS: usize = 937;

/// Frame-level geometry the scan walker needs.
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Maximum horizontal sampling factor
    pub max_h_samp_factor: u8,
    /// Maximum vertical sampling factor
    pub max_v_samp_factor: u8,
}

/// Huffman table slots referenced by one scan, plus the number of fresh
/// tables its DHT segment carries.
#[derive(Debug, Clone, Default)]
pub struct ScanCodingInfo {
    /// DC table slot per scan component
    pub dc_tbl_idx: [u8; MAX_COMPS_IN_SCAN],
    /// AC table slot per scan component
    pub ac_tbl_idx: [u8; MAX_COMPS_IN_SCAN],
    /// Fresh Huffman tables emitted just before this scan
    pub num_huffman_codes: usize,
}

/// One optimized Huffman table destined for a DHT segment.
#[derive(Debug, Clone)]
pub struct JpegHuffmanCode {
    /// DC or AC
    pub class: TableClass,
    /// Table slot the decoder installs it into
    pub slot_id: u8,
    /// The table itself
    pub table: HuffmanCodeTable,
}

/// Receiver for the scan encoder's symbol/bit stream.
pub trait TokenSink {
    /// One Huffman-coded symbol for the given table slot.
    fn symbol(&mut self, class: TableClass, slot: u8, symbol: u8) -> Result<()>;
    /// Raw bits following a symbol (or refinement/correction bits).
    fn bits(&mut self, value: u32, count: u8);
    /// Restart boundary between MCUs.
    fn restart(&mut self);
}

/// Pass-1 sink: collects per-slot symbol histograms.
#[derive(Debug, Default)]
pub struct HistogramSink {
    /// DC histograms by slot
    pub dc: [Histogram; 2],
    /// AC histograms by slot
    pub ac: [Histogram; 2],
}

impl TokenSink for HistogramSink {
    fn symbol(&mut self, class: TableClass, slot: u8, symbol: u8) -> Result<()> {
        match class {
            TableClass::Dc => self.dc[slot as usize].count(symbol),
            TableClass::Ac => self.ac[slot as usize].count(symbol),
        }
        Ok(())
    }

    fn bits(&mut self, _value: u32, _count: u8) {}

    fn restart(&mut self) {}
}

/// Pass-2 sink: writes the entropy-coded body through the bit writer.
#[derive(Debug)]
pub struct EmitSink<'a> {
    writer: BitWriter,
    dc_encoders: &'a [Option<HuffmanEncoder>; 2],
    ac_encoders: &'a [Option<HuffmanEncoder>; 2],
}

impl<'a> EmitSink<'a> {
    /// Creates a sink over the currently installed encoders.
    #[must_use]
    pub fn new(
        dc_encoders: &'a [Option<HuffmanEncoder>; 2],
        ac_encoders: &'a [Option<HuffmanEncoder>; 2],
    ) -> Self {
        Self {
            writer: BitWriter::new(),
            dc_encoders,
            ac_encoders,
        }
    }

    /// Finishes the scan body.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

impl TokenSink for EmitSink<'_> {
    fn symbol(&mut self, class: TableClass, slot: u8, symbol: u8) -> Result<()> {
        let encoder = match class {
            TableClass::Dc => self.dc_encoders[slot as usize].as_ref(),
            TableClass::Ac => self.ac_encoders[slot as usize].as_ref(),
        }
        .ok_or(Error::ScanEncodingFailed {
            reason: "scan references a Huffman table that was never defined",
        })?;
        let (code, len) = encoder.encode(symbol);
        if len == 0 {
            return Err(Error::ScanEncodingFailed {
                reason: "symbol missing from optimized Huffman table",
            });
        }
        self.writer.write_bits(code, len);
        Ok(())
    }

    fn bits(&mut self, value: u32, count: u8) {
        self.writer.write_bits(value, count);
    }

    fn restart(&mut self) {
        self.writer.write_restart_marker();
    }
}

/// Bit category of a value, i.e. the number of magnitude bits.
#[inline]
#[must_use]
pub fn category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// Magnitude bits of a value: ones-complement encoding for negatives.
#[inline]
#[must_use]
pub fn magnitude_bits(value: i32) -> u32 {
    if value >= 0 {
        value as u32
    } else {
        (value - 1) as u32 & ((1u32 << category(value)) - 1)
    }
}

/// Mutable per-scan encoder state.
struct ScanState {
    prev_dc: [i32; MAX_COMPS_IN_SCAN],
    eob_run: u16,
    corr_bits: Vec<u8>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            prev_dc: [0; MAX_COMPS_IN_SCAN],
            eob_run: 0,
            corr_bits: Vec::new(),
        }
    }

    fn reset_dc(&mut self) {
        self.prev_dc = [0; MAX_COMPS_IN_SCAN];
    }
}

/// DC table slot for a frame component: 0 for the first component, 1 for
/// the rest (luma/chroma clustering).
#[inline]
#[must_use]
pub fn table_slot(component_index: u8) -> u8 {
    u8::from(component_index != 0)
}

/// Encodes one scan, feeding every symbol and bit into `sink`.
pub fn encode_scan<S: TokenSink>(
    geometry: &FrameGeometry,
    components: &[ComponentInfo],
    coeffs: &[ComponentCoeffs],
    scan: &ScanInfo,
    restart_interval: u16,
    sink: &mut S,
) -> Result<()> {
    let mut state = ScanState::new();
    let restart = restart_interval as usize;
    let mut mcus_done = 0usize;

    if scan.comps_in_scan > 1 {
        let mcu_cols = div_ceil(
            geometry.width as usize,
            8 * geometry.max_h_samp_factor as usize,
        );
        let mcu_rows = div_ceil(
            geometry.height as usize,
            8 * geometry.max_v_samp_factor as usize,
        );
        for mcu_y in 0..mcu_rows {
            for mcu_x in 0..mcu_cols {
                maybe_restart(restart, &mut mcus_done, &mut state, scan, sink)?;
                for (si, &ci) in scan.components().iter().enumerate() {
                    let comp = &components[ci as usize];
                    let cc = &coeffs[ci as usize];
                    for v in 0..comp.v_samp_factor as usize {
                        for h in 0..comp.h_samp_factor as usize {
                            let bx = (mcu_x * comp.h_samp_factor as usize + h)
                                .min(cc.width_in_blocks - 1);
                            let by = (mcu_y * comp.v_samp_factor as usize + v)
                                .min(cc.height_in_blocks - 1);
                            encode_block(cc.block(bx, by), scan, si, ci, &mut state, sink)?;
                        }
                    }
                }
                mcus_done += 1;
            }
        }
    } else {
        let ci = scan.component_index[0];
        let comp = &components[ci as usize];
        let cc = &coeffs[ci as usize];
        // Data-unit counts per T.81 for a non-interleaved scan.
        let samples_x = div_ceil(
            geometry.width as usize * comp.h_samp_factor as usize,
            geometry.max_h_samp_factor as usize,
        );
        let samples_y = div_ceil(
            geometry.height as usize * comp.v_samp_factor as usize,
            geometry.max_v_samp_factor as usize,
        );
        let blocks_x = div_ceil(samples_x, 8);
        let blocks_y = div_ceil(samples_y, 8);
        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                maybe_restart(restart, &mut mcus_done, &mut state, scan, sink)?;
                encode_block(
                    cc.block(bx.min(cc.width_in_blocks - 1), by.min(cc.height_in_blocks - 1)),
                    scan,
                    0,
                    ci,
                    &mut state,
                    sink,
                )?;
                mcus_done += 1;
            }
        }
    }

    flush_scan_tail(&mut state, scan, sink)?;
    Ok(())
}

fn maybe_restart<S: TokenSink>(
    restart: usize,
    mcus_done: &mut usize,
    state: &mut ScanState,
    scan: &ScanInfo,
    sink: &mut S,
) -> Result<()> {
    if restart > 0 && *mcus_done > 0 && *mcus_done % restart == 0 {
        flush_scan_tail(state, scan, sink)?;
        sink.restart();
        state.reset_dc();
    }
    Ok(())
}

/// Flushes the pending EOB run and buffered correction bits.
fn flush_scan_tail<S: TokenSink>(
    state: &mut ScanState,
    scan: &ScanInfo,
    sink: &mut S,
) -> Result<()> {
    if state.eob_run > 0 {
        let slot = table_slot(scan.component_index[0]);
        emit_eob_run(state, slot, sink)?;
    }
    Ok(())
}

fn encode_block<S: TokenSink>(
    block: &[i16],
    scan: &ScanInfo,
    scan_comp: usize,
    frame_comp: u8,
    state: &mut ScanState,
    sink: &mut S,
) -> Result<()> {
    let slot = table_slot(frame_comp);
    if scan.ss == 0 {
        if scan.ah == 0 {
            encode_dc_first(block, scan, scan_comp, slot, state, sink)?;
            if scan.se > 0 {
                encode_ac_sequential(block, scan, slot, sink)?;
            }
        } else {
            // DC refinement carries one raw bit per block, no tables.
            sink.bits(((block[0] >> scan.al) & 1) as u32, 1);
        }
    } else if scan.ah == 0 {
        encode_ac_first(block, scan, slot, state, sink)?;
    } else {
        encode_ac_refinement(block, scan, slot, state, sink)?;
    }
    Ok(())
}

fn encode_dc_first<S: TokenSink>(
    block: &[i16],
    scan: &ScanInfo,
    scan_comp: usize,
    slot: u8,
    state: &mut ScanState,
    sink: &mut S,
) -> Result<()> {
    let dc = (block[0] as i32) >> scan.al;
    let diff = dc - state.prev_dc[scan_comp];
    state.prev_dc[scan_comp] = dc;
    let cat = category(diff);
    if cat > 11 {
        return Err(Error::ScanEncodingFailed {
            reason: "DC difference out of range",
        });
    }
    sink.symbol(TableClass::Dc, slot, cat)?;
    if cat > 0 {
        sink.bits(magnitude_bits(diff), cat);
    }
    Ok(())
}

fn encode_ac_sequential<S: TokenSink>(
    block: &[i16],
    scan: &ScanInfo,
    slot: u8,
    sink: &mut S,
) -> Result<()> {
    let mut run = 0u8;
    for k in 1..=scan.se as usize {
        let coef = block[JPEG_NATURAL_ORDER[k] as usize] as i32;
        if coef == 0 {
            run += 1;
            continue;
        }
        while run >= 16 {
            sink.symbol(TableClass::Ac, slot, 0xF0)?;
            run -= 16;
        }
        let cat = category(coef);
        if cat > 10 {
            return Err(Error::ScanEncodingFailed {
                reason: "AC coefficient out of range",
            });
        }
        sink.symbol(TableClass::Ac, slot, (run << 4) | cat)?;
        sink.bits(magnitude_bits(coef), cat);
        run = 0;
    }
    if run > 0 {
        sink.symbol(TableClass::Ac, slot, 0x00)?;
    }
    Ok(())
}

fn emit_eob_run<S: TokenSink>(state: &mut ScanState, slot: u8, sink: &mut S) -> Result<()> {
    if state.eob_run > 0 {
        let run = state.eob_run as u32;
        let nbits = 31 - run.leading_zeros();
        sink.symbol(TableClass::Ac, slot, (nbits << 4) as u8)?;
        if nbits > 0 {
            sink.bits(run & ((1 << nbits) - 1), nbits as u8);
        }
        state.eob_run = 0;
    }
    for bit in state.corr_bits.drain(..) {
        sink.bits(bit as u32, 1);
    }
    Ok(())
}

fn encode_ac_first<S: TokenSink>(
    block: &[i16],
    scan: &ScanInfo,
    slot: u8,
    state: &mut ScanState,
    sink: &mut S,
) -> Result<()> {
    let mut run = 0u32;
    for k in scan.ss as usize..=scan.se as usize {
        let coef = block[JPEG_NATURAL_ORDER[k] as usize] as i32;
        // The point transform shifts the magnitude, not the two's
        // complement value.
        let shifted = if coef < 0 {
            -((-coef) >> scan.al)
        } else {
            coef >> scan.al
        };
        if shifted == 0 {
            run += 1;
            continue;
        }
        if state.eob_run > 0 {
            emit_eob_run(state, slot, sink)?;
        }
        while run >= 16 {
            sink.symbol(TableClass::Ac, slot, 0xF0)?;
            run -= 16;
        }
        let cat = category(shifted);
        if cat > 10 {
            return Err(Error::ScanEncodingFailed {
                reason: "AC coefficient out of range",
            });
        }
        sink.symbol(TableClass::Ac, slot, ((run as u8) << 4) | cat)?;
        sink.bits(magnitude_bits(shifted), cat);
        run = 0;
    }
    if run > 0 {
        state.eob_run += 1;
        if state.eob_run == MAX_EOB_RUN {
            emit_eob_run(state, slot, sink)?;
        }
    }
    Ok(())
}

fn encode_ac_refinement<S: TokenSink>(
    block: &[i16],
    scan: &ScanInfo,
    slot: u8,
    state: &mut ScanState,
    sink: &mut S,
) -> Result<()> {
    let ss = scan.ss as usize;
    let se = scan.se as usize;

    // Shifted magnitudes, and the position of the last newly-nonzero
    // coefficient.
    let mut abs_vals = [0i32; 64];
    let mut eob_pos = 0usize;
    for k in ss..=se {
        let coef = block[JPEG_NATURAL_ORDER[k] as usize] as i32;
        let shifted = coef.unsigned_abs() as i32 >> scan.al;
        abs_vals[k] = shifted;
        if shifted == 1 {
            eob_pos = k;
        }
    }

    let mut run = 0u32;
    let mut block_bits: Vec<u8> = Vec::new();
    for k in ss..=se {
        let temp = abs_vals[k];
        if temp == 0 {
            run += 1;
            continue;
        }
        while run > 15 && k <= eob_pos {
            emit_eob_run(state, slot, sink)?;
            sink.symbol(TableClass::Ac, slot, 0xF0)?;
            run -= 16;
            for bit in block_bits.drain(..) {
                sink.bits(bit as u32, 1);
            }
        }
        if temp > 1 {
            // Previously nonzero: buffer its correction bit; the zero run
            // is not broken.
            block_bits.push((temp & 1) as u8);
            continue;
        }
        // Newly nonzero coefficient.
        emit_eob_run(state, slot, sink)?;
        sink.symbol(TableClass::Ac, slot, ((run as u8) << 4) | 1)?;
        let coef = block[JPEG_NATURAL_ORDER[k] as usize];
        sink.bits(u32::from(coef > 0), 1);
        for bit in block_bits.drain(..) {
            sink.bits(bit as u32, 1);
        }
        run = 0;
    }

    if run > 0 || !block_bits.is_empty() {
        state.eob_run += 1;
        state.corr_bits.append(&mut block_bits);
        if state.eob_run == MAX_EOB_RUN || state.corr_bits.len() > MAX_CORR_BITS {
            emit_eob_run(state, slot, sink)?;
        }
    }
    Ok(())
}

/// Runs the histogram pass over every scan and derives the optimized
/// Huffman tables plus each scan's coding info.
///
/// Tables install into slots 0 (first component) and 1 (the rest) per
/// class; a scan whose needed table matches the one already installed in
/// its slot does not re-emit it, so `dht_index` advances monotonically
/// over the returned code list.
pub fn optimize_huffman_codes(
    geometry: &FrameGeometry,
    components: &[ComponentInfo],
    coeffs: &[ComponentCoeffs],
    scans: &[ScanInfo],
    restart_interval: u16,
) -> Result<(Vec<JpegHuffmanCode>, Vec<ScanCodingInfo>)> {
    let mut huffman_codes = Vec::new();
    let mut coding_info = Vec::with_capacity(scans.len());
    let mut installed_dc: [Option<HuffmanCodeTable>; 2] = [None, None];
    let mut installed_ac: [Option<HuffmanCodeTable>; 2] = [None, None];

    for scan in scans {
        let mut sink = HistogramSink::default();
        encode_scan(geometry, components, coeffs, scan, restart_interval, &mut sink)?;

        let mut info = ScanCodingInfo::default();
        for (si, &ci) in scan.components().iter().enumerate() {
            info.dc_tbl_idx[si] = table_slot(ci);
            info.ac_tbl_idx[si] = table_slot(ci);
        }

        for slot in 0..2u8 {
            if !sink.dc[slot as usize].is_empty() {
                let table = sink.dc[slot as usize].build_code_table()?;
                if installed_dc[slot as usize].as_ref() != Some(&table) {
                    installed_dc[slot as usize] = Some(table.clone());
                    huffman_codes.push(JpegHuffmanCode {
                        class: TableClass::Dc,
                        slot_id: slot,
                        table,
                    });
                    info.num_huffman_codes += 1;
                }
            }
            if !sink.ac[slot as usize].is_empty() {
                let table = sink.ac[slot as usize].build_code_table()?;
                if installed_ac[slot as usize].as_ref() != Some(&table) {
                    installed_ac[slot as usize] = Some(table.clone());
                    huffman_codes.push(JpegHuffmanCode {
                        class: TableClass::Ac,
                        slot_id: slot,
                        table,
                    });
                    info.num_huffman_codes += 1;
                }
            }
        }
        coding_info.push(info);
    }
    Ok((huffman_codes, coding_info))
}
