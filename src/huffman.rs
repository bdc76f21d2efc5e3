//! Canonical Huffman decode table: flat direct-lookup array plus an
//! implicit binary tree for codewords longer than the direct table.
//!
//! Code assignment follows the usual canonical-Huffman construction: a
//! histogram of code lengths, a `first[]` recurrence for the lowest code at
//! each length, and a counting-sort of symbols into codeword order, with
//! over-subscription rejected as the codes are assigned. Lookup is a flat
//! array whose first `2^table_bits` entries are a direct table and whose
//! tail is a tree of paired nodes reached via a sentinel length, for
//! codewords longer than the direct table covers.

use crate::error::DecodeError;
use crate::tables::DEFLATE_MAX_CODEWORD_LEN;
use nightly_quirks::branch_pred::unlikely;

/// Marks a table slot as an indirect pointer into `tree` rather than a leaf.
/// Set outside the valid codeword-length range (1..=`DEFLATE_MAX_CODEWORD_LEN`)
/// so a real leaf can never be mistaken for a redirect.
pub const SENTINEL: u8 = 255;

#[derive(Clone, Copy, Debug, Default)]
pub struct Entry {
    pub length: u8,
    pub symbol: u16,
}

#[derive(Clone, Debug, Default)]
pub struct HuffmanTable {
    table_bits: u32,
    table: Vec<Entry>,
    tree: Vec<Entry>,
    max_symbol: u16,
}

impl HuffmanTable {
    pub fn new(table_bits: u32) -> Self {
        HuffmanTable {
            table_bits,
            table: vec![Entry::default(); 1usize << table_bits],
            tree: Vec::new(),
            max_symbol: 0,
        }
    }

    /// Reuse already-allocated storage for a fresh `build`.
    pub fn clear(&mut self) {
        self.table.iter_mut().for_each(|e| *e = Entry::default());
        self.tree.clear();
        self.max_symbol = 0;
    }

    /// Build the table from an array of code lengths indexed by symbol; a
    /// length of 0 means the symbol is unused. Lengths must not exceed 15.
    pub fn build(&mut self, lens: &[u8]) -> Result<(), DecodeError> {
        self.clear();

        let mut count = [0u32; 16];
        for &l in lens {
            debug_assert!(l <= DEFLATE_MAX_CODEWORD_LEN);
            count[l as usize] += 1;
        }
        count[0] = 0;

        // Check for over-subscription (too many codes of a length) and, as a
        // side effect, compute the canonical `first[]` code for each length.
        let mut code = 0u32;
        let mut first = [0u32; 16];
        for len in 1..=DEFLATE_MAX_CODEWORD_LEN as usize {
            code = (code + count[len - 1]) << 1;
            first[len] = code;
            let max_code = 1u32 << len;
            if unlikely(code + count[len] > max_code) {
                return Err(DecodeError::data(format!(
                    "over-subscribed Huffman code at length {len}"
                )));
            }
            code += count[len];
        }

        // Counting-sort: bucket symbols by length in canonical codeword
        // order, tracking the next free canonical code per length.
        let mut next_code = first;
        let mut symbols_by_len: [Vec<u16>; 16] = Default::default();
        for (symbol, &len) in lens.iter().enumerate() {
            if len == 0 {
                continue;
            }
            self.max_symbol = self.max_symbol.max(symbol as u16);
            symbols_by_len[len as usize].push(symbol as u16);
        }

        for len in 1..=DEFLATE_MAX_CODEWORD_LEN as usize {
            for &symbol in &symbols_by_len[len] {
                let canon_code = next_code[len];
                next_code[len] += 1;
                self.insert(canon_code, len as u8, symbol);
            }
        }

        Ok(())
    }

    fn insert(&mut self, canon_code: u32, len: u8, symbol: u16) {
        let reversed = reverse_bits(canon_code, len);
        let table_bits = self.table_bits;

        if len as u32 <= table_bits {
            // Direct entries: every table slot whose low `len` bits equal the
            // reversed codeword gets this leaf, since remaining high bits are
            // "don't care" for a shorter-than-table_bits code.
            let step = 1u32 << len;
            let mut idx = reversed;
            while idx < (1u32 << table_bits) {
                self.table[idx as usize] = Entry { length: len, symbol };
                idx += step;
            }
            return;
        }

        // Longer codes: walk/extend the tree keyed by the low `table_bits`
        // bits, then the remaining bits one at a time.
        let low = reversed & ((1u32 << table_bits) - 1);
        let mut entry = &mut self.table[low as usize];
        let mut remaining = len as u32 - table_bits;
        let mut bitpos = table_bits;

        loop {
            if entry.length != SENTINEL {
                // First time this slot needs a tree: allocate a fresh pair.
                let pair_index = self.tree.len() as u16;
                self.tree.push(Entry::default());
                self.tree.push(Entry::default());
                entry.length = SENTINEL;
                entry.symbol = pair_index;
            }
            let pair_index = entry.symbol as usize;
            let bit = (reversed >> bitpos) & 1;
            bitpos += 1;
            remaining -= 1;
            let slot = pair_index + bit as usize;

            if remaining == 0 {
                self.tree[slot] = Entry { length: len, symbol };
                return;
            }

            if self.tree[slot].length != SENTINEL {
                let pair_index = self.tree.len() as u16;
                self.tree.push(Entry::default());
                self.tree.push(Entry::default());
                self.tree[slot].length = SENTINEL;
                self.tree[slot].symbol = pair_index;
            }
            entry = &mut self.tree[slot];
        }
    }

    /// Decode one symbol from `peek`, the low bits of which (up to 15, or
    /// `table_bits` if that's all the caller could buffer) are the next
    /// codeword LSB-first. Returns `(symbol, codeword_len)`, or an error if
    /// the codeword doesn't correspond to any symbol (under-subscribed
    /// table with a gap the stream actually hit).
    pub fn lookup(&self, peek: u32) -> Result<(u16, u8), DecodeError> {
        let low = peek & ((1u32 << self.table_bits) - 1);
        let mut entry = self.table[low as usize];

        if unlikely(entry.length == 0) {
            return Err(DecodeError::data("invalid Huffman codeword"));
        }
        if entry.length != SENTINEL {
            return Ok((entry.symbol, entry.length));
        }

        let mut consumed = self.table_bits;
        loop {
            let pair_index = entry.symbol as usize;
            let bit = (peek >> consumed) & 1;
            consumed += 1;
            entry = self.tree[pair_index + bit as usize];
            if unlikely(entry.length == 0) {
                return Err(DecodeError::data("invalid Huffman codeword"));
            }
            if entry.length != SENTINEL {
                return Ok((entry.symbol, consumed as u8));
            }
        }
    }
}

fn reverse_bits(code: u32, len: u8) -> u32 {
    let mut v = code;
    let mut r = 0u32;
    for _ in 0..len {
        r = (r << 1) | (v & 1);
        v >>= 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_symbol_length_one_each() {
        // Two symbols of length 1: the minimal valid canonical code.
        let mut t = HuffmanTable::new(7);
        t.build(&[1, 1]).unwrap();
        let (sym0, len0) = t.lookup(0b0).unwrap();
        let (sym1, len1) = t.lookup(0b1).unwrap();
        assert_eq!(len0, 1);
        assert_eq!(len1, 1);
        assert_ne!(sym0, sym1);
    }

    #[test]
    fn over_subscribed_fails_at_build() {
        let mut t = HuffmanTable::new(7);
        // 3 symbols of length 1 can't fit in a 1-bit canonical code space.
        let err = t.build(&[1, 1, 1]).unwrap_err();
        assert!(matches!(err, DecodeError::Data(_)));
    }

    #[test]
    fn long_codes_use_tree_path() {
        let mut lens = [0u8; 19];
        // Force codes beyond table_bits=7 by using all 19 precode symbols
        // with varied small lengths summing to a complete code of max len 7.
        lens[0] = 2;
        lens[1] = 2;
        lens[2] = 2;
        lens[3] = 3;
        lens[4] = 3;
        lens[5] = 4;
        lens[6] = 4;
        lens[7] = 4;
        lens[8] = 4;
        let mut t = HuffmanTable::new(3);
        t.build(&lens).unwrap();
        // Table_bits=3 forces some length-4 codes into the tree path.
        let mut found_tree_entry = false;
        for v in 0..(1u32 << 3) {
            if t.table[v as usize].length == SENTINEL {
                found_tree_entry = true;
            }
        }
        assert!(found_tree_entry);
    }

    #[test]
    fn reset_reuses_storage() {
        let mut t = HuffmanTable::new(7);
        t.build(&[1, 1]).unwrap();
        let cap_before = t.table.capacity();
        t.build(&[2, 2, 2, 2]).unwrap();
        assert_eq!(t.table.capacity(), cap_before);
    }
}
