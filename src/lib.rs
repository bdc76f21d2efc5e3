//! Streaming, resumable DEFLATE (RFC 1951) and DEFLATE64 decompressor.
//!
//! The engine is a pull-style decoder: callers hand in bounded input and
//! output slices and get back exactly how many bytes of each were consumed
//! and produced, regardless of how the caller chooses to chunk the stream.
//! Compression, checksums, and the gzip/zlib outer-wrapper formats are out
//! of scope — this crate only inflates a raw DEFLATE or DEFLATE64 bitstream.

mod bitreader;
mod block;
mod error;
mod huffman;
mod session;
mod tables;
mod window;

pub use error::{DecodeError, DecodeResult, DecodeStatus};
pub use session::{Mode, Session};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_decodes_across_tiny_output_strides() {
        // Feed the whole input at once but drain it one byte at a time,
        // exercising the "stride independence" invariant.
        let mut writer_bits: Vec<u8> = Vec::new();
        {
            // bfinal=1, btype=00 (uncompressed), len=3 "abc"
            writer_bits.push(0b0000_0001); // bfinal=1, btype=00, rest padding
            writer_bits.push(0x03);
            writer_bits.push(0x00);
            writer_bits.push(0xFC);
            writer_bits.push(0xFF);
            writer_bits.extend_from_slice(b"abc");
        }

        let mut session = Session::new();
        let mut collected = Vec::new();
        let mut one_byte = [0u8; 1];
        let mut input = writer_bits.as_slice();

        loop {
            let result = session.decode_deflate(input, &mut one_byte).unwrap();
            input = &input[result.consumed_in..];
            collected.extend_from_slice(&one_byte[..result.produced_out]);
            if result.status == DecodeStatus::EndOfStream {
                break;
            }
            if result.consumed_in == 0 && result.produced_out == 0 {
                break;
            }
        }

        assert_eq!(collected, b"abc");
    }

    #[test]
    fn reset_allows_switching_modes() {
        let mut session = Session::new();
        let mut out = [0u8; 4];
        let _ = session.decode_deflate(&[0x03, 0x00], &mut out);
        session.reset();
        let result = session.decode_deflate64(&[0x03, 0x00], &mut out).unwrap();
        assert_eq!(result.status, DecodeStatus::EndOfStream);
    }
}
