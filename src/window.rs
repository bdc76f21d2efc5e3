//! Sliding-window ring buffer holding the last 64 KiB of decoded output, so
//! back-references can be resolved and partially-drained output can be
//! handed to the caller across many small reads.

use crate::error::DecodeError;

pub const WINDOW_SIZE: usize = 65536;

#[derive(Clone, Debug)]
pub struct SlidingWindow {
    buf: Box<[u8; WINDOW_SIZE]>,
    write_offset: usize,
    read_offset: usize,
    /// Bytes written but not yet drained. Tracked explicitly rather than
    /// derived from `write_offset - read_offset`, since those offsets alone
    /// can't tell an empty window from a full one when they coincide.
    unconsumed: usize,
    total_written: u64,
}

impl SlidingWindow {
    pub fn new() -> Self {
        SlidingWindow {
            buf: Box::new([0u8; WINDOW_SIZE]),
            write_offset: 0,
            read_offset: 0,
            unconsumed: 0,
            total_written: 0,
        }
    }

    pub fn reset(&mut self) {
        self.write_offset = 0;
        self.read_offset = 0;
        self.unconsumed = 0;
        self.total_written = 0;
    }

    /// Bytes written but not yet drained to the caller.
    pub fn unconsumed(&self) -> usize {
        self.unconsumed
    }

    /// Free space available for new writes without overwriting unconsumed
    /// history. Bounded by the ring's total capacity.
    pub fn free_space(&self) -> usize {
        WINDOW_SIZE - self.unconsumed
    }

    pub fn is_full(&self) -> bool {
        self.unconsumed == WINDOW_SIZE
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Distance the window has seen so far, capped at `WINDOW_SIZE`, i.e.
    /// how far back a valid back-reference may point.
    pub fn history_len(&self) -> usize {
        self.total_written.min(WINDOW_SIZE as u64) as usize
    }

    pub fn write_byte(&mut self, byte: u8) {
        debug_assert!(!self.is_full());
        self.buf[self.write_offset] = byte;
        self.write_offset = (self.write_offset + 1) % WINDOW_SIZE;
        self.unconsumed += 1;
        self.total_written += 1;
    }

    /// Copy as many bytes of `src` as fit into remaining free space. Returns
    /// the number of bytes written.
    pub fn write_bytes(&mut self, src: &[u8]) -> usize {
        let mut written = 0;
        let cap = self.free_space();
        let n = src.len().min(cap);
        while written < n {
            let chunk = (WINDOW_SIZE - self.write_offset).min(n - written);
            self.buf[self.write_offset..self.write_offset + chunk]
                .copy_from_slice(&src[written..written + chunk]);
            self.write_offset = (self.write_offset + chunk) % WINDOW_SIZE;
            written += chunk;
        }
        self.unconsumed += written;
        self.total_written += written as u64;
        written
    }

    /// Drain up to `out.len()` unconsumed bytes into `out`. Returns the
    /// number of bytes drained.
    pub fn drain_to(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.unconsumed);
        let mut done = 0;
        while done < n {
            let chunk = (WINDOW_SIZE - self.read_offset).min(n - done);
            out[done..done + chunk]
                .copy_from_slice(&self.buf[self.read_offset..self.read_offset + chunk]);
            self.read_offset = (self.read_offset + chunk) % WINDOW_SIZE;
            done += chunk;
        }
        self.unconsumed -= done;
        done
    }

    /// Apply a length/distance back-reference, writing up to `max_len` bytes
    /// (bounded additionally by free space) and returning how many bytes
    /// were actually written — less than requested only when the window
    /// filled up, in which case the decoder must resume the copy later.
    pub fn copy_match(&mut self, length: u32, distance: u32) -> Result<u32, DecodeError> {
        let distance = distance as usize;
        if distance == 0 || distance > self.history_len() {
            return Err(DecodeError::data(format!(
                "back-reference distance {distance} exceeds available history {}",
                self.history_len()
            )));
        }

        let mut remaining = length as usize;
        let mut written = 0u32;
        while remaining > 0 {
            if self.is_full() {
                break;
            }
            // Bound each chunk so copy_within never straddles a wrap on
            // either the read or write side, and never overlaps forward
            // past what's already been written this call (length > distance
            // is the RLE case: each chunk must not re-read bytes produced by
            // an earlier chunk in a way copy_within can't express safely).
            let chunk = remaining
                .min(distance)
                .min(self.free_space())
                .min(WINDOW_SIZE - self.write_offset);

            let src_start = (self.write_offset + WINDOW_SIZE - distance) % WINDOW_SIZE;
            if src_start + chunk <= WINDOW_SIZE {
                self.buf.copy_within(src_start..src_start + chunk, self.write_offset);
            } else {
                // Source wraps even though destination doesn't: copy byte by
                // byte, the rare/slow path.
                for i in 0..chunk {
                    let s = (src_start + i) % WINDOW_SIZE;
                    self.buf[self.write_offset + i] = self.buf[s];
                }
            }
            self.write_offset = (self.write_offset + chunk) % WINDOW_SIZE;
            self.unconsumed += chunk;
            self.total_written += chunk as u64;
            written += chunk as u32;
            remaining -= chunk;
        }
        Ok(written)
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_drain_roundtrips() {
        let mut w = SlidingWindow::new();
        w.write_bytes(b"hello");
        let mut out = [0u8; 5];
        let n = w.drain_to(&mut out);
        assert_eq!(n, 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn copy_match_repeats_pattern() {
        let mut w = SlidingWindow::new();
        w.write_bytes(b"a");
        let written = w.copy_match(4, 1).unwrap();
        assert_eq!(written, 4);
        let mut out = [0u8; 5];
        w.drain_to(&mut out);
        assert_eq!(&out, b"aaaaa");
    }

    #[test]
    fn copy_match_rejects_distance_beyond_history() {
        let mut w = SlidingWindow::new();
        w.write_bytes(b"a");
        let err = w.copy_match(1, 2).unwrap_err();
        assert!(matches!(err, DecodeError::Data(_)));
    }

    #[test]
    fn copy_match_rejects_zero_distance_on_empty_window() {
        let mut w = SlidingWindow::new();
        let err = w.copy_match(1, 1).unwrap_err();
        assert!(matches!(err, DecodeError::Data(_)));
    }

    #[test]
    fn filling_window_exactly_is_detected_as_full() {
        // Writing exactly WINDOW_SIZE bytes with no interleaving drain makes
        // write_offset wrap back around to equal read_offset; unconsumed()
        // and is_full() must not mistake that for an empty window.
        let mut w = SlidingWindow::new();
        let chunk = vec![7u8; WINDOW_SIZE];
        let n = w.write_bytes(&chunk);
        assert_eq!(n, WINDOW_SIZE);
        assert_eq!(w.unconsumed(), WINDOW_SIZE);
        assert_eq!(w.free_space(), 0);
        assert!(w.is_full());
    }

    #[test]
    fn write_bytes_wraps_around() {
        let mut w = SlidingWindow::new();
        let chunk = vec![1u8; WINDOW_SIZE - 4];
        w.write_bytes(&chunk);
        let mut sink = vec![0u8; WINDOW_SIZE - 4];
        w.drain_to(&mut sink);
        // Now read/write offsets are both near the end; write across the wrap.
        let more = [2u8; 8];
        let n = w.write_bytes(&more);
        assert_eq!(n, 8);
        let mut out = [0u8; 8];
        w.drain_to(&mut out);
        assert_eq!(out, more);
    }
}
