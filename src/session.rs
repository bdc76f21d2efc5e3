//! Session controller: init/reset lifecycle and the drain-then-step outer
//! decode loop tying the bit reader, block decoder, and sliding window
//! together.
//!
//! `Session` owns its state via RAII — `Drop` is the real destructor —
//! while still exposing an explicit `destroy()` for callers that want to
//! signal end-of-use without relying on scope exit.

use crate::bitreader::{BitReader, BitReaderState};
use crate::block::{BlockDecoder, StepResult};
use crate::error::{DecodeError, DecodeResult, DecodeStatus};
use crate::window::SlidingWindow;

/// Which wire-format variant a session is currently decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Deflate,
    Deflate64,
}

#[derive(Debug)]
pub struct Session {
    bitreader_state: BitReaderState,
    window: SlidingWindow,
    block: BlockDecoder,
    mode: Option<Mode>,
    last_error: Option<DecodeError>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            bitreader_state: BitReaderState::new(),
            window: SlidingWindow::new(),
            block: BlockDecoder::new(),
            mode: None,
            last_error: None,
        }
    }

    /// Re-initialize all session state, allowing a new stream (possibly in
    /// the other mode) to be decoded while reusing already-allocated Huffman
    /// table storage.
    pub fn reset(&mut self) {
        self.bitreader_state.reset();
        self.window.reset();
        self.block.reset();
        self.mode = None;
        self.last_error = None;
    }

    /// Explicit-intent destructor; ordinary `Drop` makes this optional.
    pub fn destroy(self) {}

    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(DecodeError::message)
    }

    pub fn decode_deflate(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecodeResult, DecodeError> {
        self.decode(Mode::Deflate, input, output)
    }

    pub fn decode_deflate64(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecodeResult, DecodeError> {
        self.decode(Mode::Deflate64, input, output)
    }

    fn decode(
        &mut self,
        mode: Mode,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecodeResult, DecodeError> {
        match self.mode {
            None => self.mode = Some(mode),
            Some(current) if current == mode => {}
            Some(_) => {
                let err = DecodeError::argument(
                    "cannot switch between DEFLATE and DEFLATE64 without reset()",
                );
                self.last_error = Some(err.clone());
                return Err(err);
            }
        }

        let result = self.run_decode_loop(mode, input, output);
        if let Err(ref e) = result {
            self.last_error = Some(e.clone());
        }
        result
    }

    fn run_decode_loop(
        &mut self,
        mode: Mode,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecodeResult, DecodeError> {
        let mut produced = 0usize;
        let mut reader = BitReader::new(&mut self.bitreader_state, input);

        loop {
            if produced < output.len() {
                let n = self.window.drain_to(&mut output[produced..]);
                produced += n;
            }

            if self.block.is_done() {
                // The decoder has seen the final block; report EndOfStream
                // only once the window has nothing left to drain, otherwise
                // the caller needs another call (with output capacity, not
                // input) to receive the remainder.
                let status = if self.window.unconsumed() == 0 {
                    DecodeStatus::EndOfStream
                } else {
                    DecodeStatus::Progress
                };
                return Ok(DecodeResult {
                    consumed_in: reader.bytes_consumed(),
                    produced_out: produced,
                    status,
                });
            }

            if produced == output.len() && self.window.is_full() {
                return Ok(DecodeResult {
                    consumed_in: reader.bytes_consumed(),
                    produced_out: produced,
                    status: DecodeStatus::Progress,
                });
            }

            match self.block.step(mode, &mut reader, &mut self.window)? {
                StepResult::Continue => continue,
                StepResult::StreamEnded => continue,
                StepResult::NeedMoreInput => {
                    // Drain whatever made it into the window this call, then
                    // report back — more input is required before further
                    // progress is possible.
                    if produced < output.len() {
                        let n = self.window.drain_to(&mut output[produced..]);
                        produced += n;
                    }
                    return Ok(DecodeResult {
                        consumed_in: reader.bytes_consumed(),
                        produced_out: produced,
                        status: DecodeStatus::Progress,
                    });
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_switch_without_reset_is_argument_error() {
        let mut s = Session::new();
        let mut out = [0u8; 16];
        let _ = s.decode_deflate(&[0x03], &mut out);
        let err = s.decode_deflate64(&[0x03], &mut out).unwrap_err();
        assert!(matches!(err, DecodeError::Argument(_)));
    }

    #[test]
    fn empty_final_fixed_block_reaches_end_of_stream() {
        let mut s = Session::new();
        let mut out = [0u8; 16];
        // bfinal=1, btype=01 (fixed), immediately followed by end-of-block
        // symbol 256 (7 zero bits): 10 bits total, spanning two bytes.
        let result = s.decode_deflate(&[0x03, 0x00], &mut out).unwrap();
        assert_eq!(result.status, DecodeStatus::EndOfStream);
        assert_eq!(result.produced_out, 0);
    }

    #[test]
    fn empty_final_uncompressed_block() {
        let mut s = Session::new();
        let mut out = [0u8; 16];
        let input = [0x01u8, 0x00, 0x00, 0xFF, 0xFF];
        let result = s.decode_deflate(&input, &mut out).unwrap();
        assert_eq!(result.status, DecodeStatus::EndOfStream);
        assert_eq!(result.produced_out, 0);
    }

    #[test]
    fn single_literal_via_fixed_block() {
        let mut s = Session::new();
        let mut out = [0u8; 4];
        // bfinal=1, btype=01, literal 'A' (0x41) in the static litlen table
        // (8-bit code, value 0x41+0x30=0x71 per RFC1951 static mapping),
        // followed by end-of-block (7 zero bits).
        // Static code for literal 0x41: 8-bit codes cover 0..143 with
        // codeword = 0x30 + symbol, MSB-first; encode by hand bit-by-bit.
        let bits = encode_fixed_literal_then_eob(0x41);
        let result = s.decode_deflate(&bits, &mut out).unwrap();
        assert_eq!(result.status, DecodeStatus::EndOfStream);
        assert_eq!(&out[..result.produced_out], &[0x41]);
    }

    /// Hand-assemble bfinal=1, btype=01 (fixed), one literal, then an
    /// end-of-block symbol, LSB-first per RFC 1951 §3.2.
    fn encode_fixed_literal_then_eob(literal: u8) -> Vec<u8> {
        let mut writer = BitWriter::new();
        writer.push(1, 1); // bfinal
        writer.push(0b01, 2); // btype = fixed
        let sym = literal as u16;
        let (code, len) = static_litlen_code(sym);
        writer.push_msb_first(code, len);
        let (eob_code, eob_len) = static_litlen_code(256);
        writer.push_msb_first(eob_code, eob_len);
        writer.finish()
    }

    /// RFC 1951 §3.2.6 static literal/length codes, returned MSB-first.
    fn static_litlen_code(symbol: u16) -> (u32, u32) {
        match symbol {
            0..=143 => (0b0011_0000 + symbol as u32, 8),
            144..=255 => (0b1_1001_0000 + (symbol as u32 - 144), 9),
            256..=279 => (symbol as u32 - 256, 7),
            280..=287 => (0b1100_0000 + (symbol as u32 - 280), 8),
            _ => unreachable!(),
        }
    }

    struct BitWriter {
        bytes: Vec<u8>,
        cur: u32,
        nbits: u32,
    }

    impl BitWriter {
        fn new() -> Self {
            BitWriter { bytes: Vec::new(), cur: 0, nbits: 0 }
        }

        /// Push `len` bits of `value`, LSB-first (matches the bitstream's
        /// own packing for raw block-header fields).
        fn push(&mut self, value: u32, len: u32) {
            self.cur |= value << self.nbits;
            self.nbits += len;
            while self.nbits >= 8 {
                self.bytes.push((self.cur & 0xFF) as u8);
                self.cur >>= 8;
                self.nbits -= 8;
            }
        }

        /// Push a Huffman codeword, which RFC 1951 stores MSB-first, by
        /// reversing it into the stream's LSB-first bit order.
        fn push_msb_first(&mut self, code: u32, len: u32) {
            let mut reversed = 0u32;
            for i in 0..len {
                reversed |= ((code >> (len - 1 - i)) & 1) << i;
            }
            self.push(reversed, len);
        }

        fn finish(mut self) -> Vec<u8> {
            if self.nbits > 0 {
                self.bytes.push((self.cur & 0xFF) as u8);
            }
            self.bytes
        }
    }
}
