//! Resumable block decoder: reads one DEFLATE block (uncompressed, fixed,
//! or dynamic Huffman) and writes its output into the sliding window,
//! suspending and resuming cleanly at any point where input runs out.
//!
//! The suspension points are modeled as an explicit `Phase` enum carrying
//! exactly the scratch state needed to resume, rather than unwinding a call
//! stack — a block may span many `step()` calls without losing progress.
//!
//! Within a compressed block, `step()` also runs a fast path: whenever the
//! bit reader already holds a full worst-case operation's worth of bits
//! (`tables::max_op_bits`) and the window has room for a worst-case match
//! (`tables::max_match_len`), one literal or length/distance operation is
//! decoded with a single combined occupancy check up front instead of a
//! `NeedMoreInput` check at every sub-step, since the lemma that bound
//! guarantees makes every read in that operation succeed.

use crate::bitreader::BitReader;
use crate::error::DecodeError;
use crate::huffman::HuffmanTable;
use crate::session::Mode;
use crate::tables::{
    self, distance_table, length_table, DEFLATE_MAX_CODEWORD_LEN, DEFLATE_MAX_PRE_CODEWORD_LEN,
    DEFLATE_NUM_LITLEN_SYMS, DEFLATE_NUM_OFFSET_SYMS, DEFLATE_NUM_PRECODE_SYMS,
    DISTANCE_TABLE_BITS, LITLEN_TABLE_BITS, PRECODE_LENS_PERMUTATION, PRECODE_TABLE_BITS,
};
use crate::window::SlidingWindow;

#[derive(Clone, Debug)]
enum Phase {
    ReadingBfinal,
    ReadingBtype,
    UncompressedLength,
    UncompressedComplement { len: u16 },
    UncompressedData { remaining: u16 },
    DynamicHeaderCounts,
    DynamicHeaderPrecodeLens {
        hlit: usize,
        hdist: usize,
        hclen: usize,
        index: usize,
        precode_lens: Vec<u8>,
    },
    DynamicHeaderCodeLens {
        hlit: usize,
        hdist: usize,
        index: usize,
        prev_len: u8,
        lens: Vec<u8>,
    },
    DynamicBuildTables { hlit: usize, hdist: usize, lens: Vec<u8> },
    CompressedSymbol,
    CompressedLengthExtra { length_symbol: u16 },
    CompressedDistanceSymbol { length: u32 },
    CompressedDistanceExtra { length: u32, distance_symbol: u16 },
    ContinuingCopy { length: u32, distance: u32 },
    Done,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum StepResult {
    /// Made progress; caller should call `step` again (after draining the
    /// window if it's full).
    Continue,
    /// Input exhausted mid-step; wait for more input before calling again.
    NeedMoreInput,
    /// The final block's last byte has been produced into the window.
    StreamEnded,
}

/// Persistent block-decoder state, owned by the session across calls.
#[derive(Clone, Debug)]
pub struct BlockDecoder {
    phase: Phase,
    is_final_block: bool,
    precode_table: HuffmanTable,
    litlen_table: HuffmanTable,
    distance_table: HuffmanTable,
    static_tables_loaded: bool,
}

impl BlockDecoder {
    pub fn new() -> Self {
        BlockDecoder {
            phase: Phase::ReadingBfinal,
            is_final_block: false,
            precode_table: HuffmanTable::new(PRECODE_TABLE_BITS),
            litlen_table: HuffmanTable::new(LITLEN_TABLE_BITS),
            distance_table: HuffmanTable::new(DISTANCE_TABLE_BITS),
            static_tables_loaded: false,
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::ReadingBfinal;
        self.is_final_block = false;
        self.precode_table.clear();
        self.litlen_table.clear();
        self.distance_table.clear();
        self.static_tables_loaded = false;
    }

    /// Drive the state machine forward by as much as the current input
    /// buffer and window free space allow. Writes decoded bytes into
    /// `window`. Returns once the window is full, input is exhausted, or the
    /// stream has ended.
    pub fn step(
        &mut self,
        mode: Mode,
        reader: &mut BitReader<'_>,
        window: &mut SlidingWindow,
    ) -> Result<StepResult, DecodeError> {
        loop {
            if window.is_full() {
                return Ok(StepResult::Continue);
            }

            reader.fill();
            if self.try_fast_path(mode, reader, window)? {
                continue;
            }

            match &mut self.phase {
                Phase::ReadingBfinal => {
                    if !reader.ensure_bits(1) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    self.is_final_block = reader.pop_bits(1) == 1;
                    self.phase = Phase::ReadingBtype;
                }
                Phase::ReadingBtype => {
                    if !reader.ensure_bits(2) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let btype = reader.pop_bits(2);
                    match btype {
                        0 => {
                            reader.align_byte();
                            self.phase = Phase::UncompressedLength;
                        }
                        1 => {
                            self.load_static_tables()?;
                            self.phase = Phase::CompressedSymbol;
                        }
                        2 => {
                            self.phase = Phase::DynamicHeaderCounts;
                        }
                        _ => {
                            return Err(DecodeError::data(format!(
                                "invalid block type {btype:#04x}"
                            )))
                        }
                    }
                }
                Phase::UncompressedLength => {
                    if !reader.ensure_bits(16) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let len = reader.pop_bits(16) as u16;
                    self.phase = Phase::UncompressedComplement { len };
                }
                Phase::UncompressedComplement { len } => {
                    let len = *len;
                    if !reader.ensure_bits(16) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let nlen = reader.pop_bits(16) as u16;
                    if nlen != !len {
                        return Err(DecodeError::data(format!(
                            "uncompressed block length {len:#06x} complement mismatch {nlen:#06x}"
                        )));
                    }
                    self.phase = Phase::UncompressedData { remaining: len };
                }
                Phase::UncompressedData { remaining } => {
                    if *remaining == 0 {
                        self.phase = Self::next_block_phase(self.is_final_block);
                        continue;
                    }
                    let cap = (window.free_space() as u32).min(*remaining as u32) as usize;
                    if cap == 0 {
                        return Ok(StepResult::Continue);
                    }
                    let mut buf = vec![0u8; cap];
                    let n = reader.read_aligned_bytes(&mut buf);
                    if n == 0 {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    window.write_bytes(&buf[..n]);
                    *remaining -= n as u16;
                }
                Phase::DynamicHeaderCounts => {
                    if !reader.ensure_bits(14) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let hlit = reader.pop_bits(5) as usize + 257;
                    let hdist = reader.pop_bits(5) as usize + 1;
                    let hclen = reader.pop_bits(4) as usize + 4;
                    if hlit > DEFLATE_NUM_LITLEN_SYMS || hdist > DEFLATE_NUM_OFFSET_SYMS {
                        return Err(DecodeError::data(format!(
                            "dynamic header HLIT/HDIST out of range: hlit={hlit} hdist={hdist}"
                        )));
                    }
                    self.phase = Phase::DynamicHeaderPrecodeLens {
                        hlit,
                        hdist,
                        hclen,
                        index: 0,
                        precode_lens: vec![0u8; DEFLATE_NUM_PRECODE_SYMS],
                    };
                }
                Phase::DynamicHeaderPrecodeLens { hlit, hdist, hclen, index, precode_lens } => {
                    let (hlit, hdist, hclen) = (*hlit, *hdist, *hclen);
                    if *index < hclen {
                        if !reader.ensure_bits(3) {
                            return Ok(StepResult::NeedMoreInput);
                        }
                        let len = reader.pop_bits(3) as u8;
                        let sym_pos = PRECODE_LENS_PERMUTATION[*index] as usize;
                        precode_lens[sym_pos] = len;
                        *index += 1;
                    } else {
                        self.precode_table.build(precode_lens.as_slice())?;
                        self.phase = Phase::DynamicHeaderCodeLens {
                            hlit,
                            hdist,
                            index: 0,
                            prev_len: 0,
                            lens: vec![0u8; hlit + hdist],
                        };
                    }
                }
                Phase::DynamicHeaderCodeLens { hlit, hdist, index, prev_len, lens } => {
                    let (hlit, hdist) = (*hlit, *hdist);
                    let total = hlit + hdist;
                    if *index >= total {
                        let owned_lens = std::mem::take(lens);
                        self.phase = Phase::DynamicBuildTables { hlit, hdist, lens: owned_lens };
                        continue;
                    }
                    reader.ensure_bits(7);
                    let peek = reader.peek_bits(7);
                    let (symbol, codelen) = match self.precode_table.lookup(peek) {
                        Ok(v) => v,
                        Err(_) if reader.bits_buffered() < DEFLATE_MAX_PRE_CODEWORD_LEN as u32 => {
                            return Ok(StepResult::NeedMoreInput)
                        }
                        Err(e) => return Err(e),
                    };
                    let extra_bits = match symbol {
                        0..=15 => 0,
                        16 => 2,
                        17 => 3,
                        18 => 7,
                        _ => unreachable!("precode table only emits symbols 0..=18"),
                    };
                    // Require the codeword AND its trailing extra bits to be
                    // buffered before consuming anything, so a short read
                    // never leaves the reader mid-symbol on resumption.
                    if (codelen as u32 + extra_bits) > reader.bits_buffered() {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    reader.consume(codelen as u32);

                    match symbol {
                        0..=15 => {
                            lens[*index] = symbol as u8;
                            *prev_len = symbol as u8;
                            *index += 1;
                        }
                        16 => {
                            if !reader.ensure_bits(2) {
                                return Ok(StepResult::NeedMoreInput);
                            }
                            if *index == 0 {
                                return Err(DecodeError::data(
                                    "repeat-previous code length with no previous symbol",
                                ));
                            }
                            let repeat = 3 + reader.pop_bits(2) as usize;
                            if *index + repeat > total {
                                return Err(DecodeError::data(
                                    "code length repeat overruns declared symbol count",
                                ));
                            }
                            for _ in 0..repeat {
                                lens[*index] = *prev_len;
                                *index += 1;
                            }
                        }
                        17 => {
                            if !reader.ensure_bits(3) {
                                return Ok(StepResult::NeedMoreInput);
                            }
                            let repeat = 3 + reader.pop_bits(3) as usize;
                            if *index + repeat > total {
                                return Err(DecodeError::data(
                                    "code length repeat (zeros) overruns declared symbol count",
                                ));
                            }
                            for _ in 0..repeat {
                                lens[*index] = 0;
                                *index += 1;
                            }
                            *prev_len = 0;
                        }
                        18 => {
                            if !reader.ensure_bits(7) {
                                return Ok(StepResult::NeedMoreInput);
                            }
                            let repeat = 11 + reader.pop_bits(7) as usize;
                            if *index + repeat > total {
                                return Err(DecodeError::data(
                                    "code length repeat (long zeros) overruns declared symbol count",
                                ));
                            }
                            for _ in 0..repeat {
                                lens[*index] = 0;
                                *index += 1;
                            }
                            *prev_len = 0;
                        }
                        _ => unreachable!("precode table only emits symbols 0..=18"),
                    }
                }
                Phase::DynamicBuildTables { hlit, hdist, lens } => {
                    let hlit = *hlit;
                    let hdist = *hdist;
                    self.litlen_table.build(&lens[..hlit])?;
                    self.distance_table.build(&lens[hlit..hlit + hdist])?;
                    self.static_tables_loaded = false;
                    self.phase = Phase::CompressedSymbol;
                }
                Phase::CompressedSymbol => {
                    reader.ensure_bits(15);
                    if reader.bits_buffered() == 0 {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let peek = reader.peek_bits(15);
                    let (symbol, len) = match self.litlen_table.lookup(peek) {
                        Ok(v) => v,
                        Err(_) if reader.bits_buffered() < DEFLATE_MAX_CODEWORD_LEN as u32 => {
                            return Ok(StepResult::NeedMoreInput)
                        }
                        Err(e) => return Err(e),
                    };
                    if (len as u32) > reader.bits_buffered() {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    reader.consume(len as u32);
                    if symbol < 256 {
                        window.write_byte(symbol as u8);
                    } else if symbol == 256 {
                        self.phase = Self::next_block_phase(self.is_final_block);
                    } else {
                        self.phase = Phase::CompressedLengthExtra { length_symbol: symbol };
                    }
                }
                Phase::CompressedLengthExtra { length_symbol } => {
                    let length_symbol = *length_symbol;
                    let idx = (length_symbol - 257) as usize;
                    let entry = length_table(mode)[idx];
                    if !reader.ensure_bits(entry.extra_bits as u32) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let extra = reader.pop_bits(entry.extra_bits as u32);
                    let length = entry.base + extra;
                    self.phase = Phase::CompressedDistanceSymbol { length };
                }
                Phase::CompressedDistanceSymbol { length } => {
                    let length = *length;
                    reader.ensure_bits(15);
                    if reader.bits_buffered() == 0 {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let peek = reader.peek_bits(15);
                    let (symbol, len) = match self.distance_table.lookup(peek) {
                        Ok(v) => v,
                        Err(_) if reader.bits_buffered() < DEFLATE_MAX_CODEWORD_LEN as u32 => {
                            return Ok(StepResult::NeedMoreInput)
                        }
                        Err(e) => return Err(e),
                    };
                    if (len as u32) > reader.bits_buffered() {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    reader.consume(len as u32);
                    self.phase = Phase::CompressedDistanceExtra { length, distance_symbol: symbol };
                }
                Phase::CompressedDistanceExtra { length, distance_symbol } => {
                    let (length, distance_symbol) = (*length, *distance_symbol);
                    let dtab = distance_table(mode);
                    let entry = dtab[distance_symbol as usize];
                    if entry.base == 0 {
                        return Err(DecodeError::data(format!(
                            "distance symbol {distance_symbol} is not valid in this mode"
                        )));
                    }
                    if !reader.ensure_bits(entry.extra_bits as u32) {
                        return Ok(StepResult::NeedMoreInput);
                    }
                    let extra = reader.pop_bits(entry.extra_bits as u32);
                    let distance = entry.base + extra;
                    self.phase = Phase::ContinuingCopy { length, distance };
                }
                Phase::ContinuingCopy { length, distance } => {
                    let (length, distance) = (*length, *distance);
                    let written = window.copy_match(length, distance)?;
                    if written < length {
                        self.phase = Phase::ContinuingCopy { length: length - written, distance };
                        return Ok(StepResult::Continue);
                    }
                    self.phase = Phase::CompressedSymbol;
                }
                Phase::Done => {
                    return Ok(StepResult::StreamEnded);
                }
            }
        }
    }

    /// Decode one literal or length/distance operation without intermediate
    /// `NeedMoreInput` checks, provided the reader already holds a full
    /// worst-case operation's worth of bits and the window has room for a
    /// worst-case match. Returns `Ok(true)` if an operation was decoded
    /// (caller should loop and try again), `Ok(false)` if the fast path's
    /// preconditions don't hold right now (caller falls through to the
    /// per-phase slow path).
    fn try_fast_path(
        &mut self,
        mode: Mode,
        reader: &mut BitReader<'_>,
        window: &mut SlidingWindow,
    ) -> Result<bool, DecodeError> {
        if !matches!(self.phase, Phase::CompressedSymbol) {
            return Ok(false);
        }
        if reader.bits_buffered() < tables::max_op_bits(mode) {
            return Ok(false);
        }
        if window.free_space() < tables::max_match_len(mode) as usize {
            return Ok(false);
        }

        let peek = reader.peek_bits(15);
        let (symbol, len) = self.litlen_table.lookup(peek)?;
        reader.consume(len as u32);

        if symbol < 256 {
            window.write_byte(symbol as u8);
            return Ok(true);
        }
        if symbol == 256 {
            self.phase = Self::next_block_phase(self.is_final_block);
            return Ok(true);
        }

        let idx = (symbol - 257) as usize;
        let lentry = length_table(mode)[idx];
        let extra = reader.pop_bits(lentry.extra_bits as u32);
        let length = lentry.base + extra;

        let dpeek = reader.peek_bits(15);
        let (dsymbol, dlen) = self.distance_table.lookup(dpeek)?;
        reader.consume(dlen as u32);

        let dentry = distance_table(mode)[dsymbol as usize];
        if dentry.base == 0 {
            return Err(DecodeError::data(format!(
                "distance symbol {dsymbol} is not valid in this mode"
            )));
        }
        let dextra = reader.pop_bits(dentry.extra_bits as u32);
        let distance = dentry.base + dextra;

        let written = window.copy_match(length, distance)?;
        debug_assert_eq!(written, length, "free_space() bound guarantees one full copy");
        Ok(true)
    }

    fn next_block_phase(is_final_block: bool) -> Phase {
        if is_final_block {
            Phase::Done
        } else {
            Phase::ReadingBfinal
        }
    }

    fn load_static_tables(&mut self) -> Result<(), DecodeError> {
        if self.static_tables_loaded {
            return Ok(());
        }
        let mut lens = [0u8; DEFLATE_NUM_LITLEN_SYMS];
        tables::fill_static_litlen_lens(&mut lens);
        self.litlen_table.build(&lens)?;

        let mut dlens = [0u8; DEFLATE_NUM_OFFSET_SYMS];
        tables::fill_static_offset_lens(&mut dlens);
        self.distance_table.build(&dlens)?;

        self.static_tables_loaded = true;
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }
}

impl Default for BlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}
