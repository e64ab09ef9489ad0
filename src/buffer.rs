//! Bit-addressable buffer: the wire-side collaborator of the RAW codec.
//!
//! The buffer owns a growable byte vector and addresses individual bits.
//! Absolute bit position `p` lands in byte `p / 8`; the bit within the byte
//! is `7 - p % 8` when the current order is MSB-first, `p % 8` otherwise.
//! [`RawBuffer::set_order`] switches the physical order and returns the
//! previous one, so a top-bit-order override can be scoped strictly LIFO.
//!
//! Payloads handed to [`put_bits`](RawBuffer::put_bits) are in canonical
//! form: byte `i` carries value bits `[8i, 8i + 8)`, least significant bit
//! first. The coding parameters permute those bits into wire order;
//! [`get_bits`](RawBuffer::get_bits) applies the inverse permutation, so the
//! two are exact inverses for every parameter combination.

use crate::descriptor::{BitOrder, ByteOrder, CodingParams, FieldOrder, HexOrder};
use crate::error::RawError;

/// One open extension-bit span: whether the marker polarity is reversed and
/// where the most recent continuation marker was written.
#[derive(Debug, Clone, Copy)]
struct ExtSpan {
    reverse: bool,
    last_marker: Option<(usize, bool)>, // (bit position, msb order at write time)
}

/// Bit-addressable read/write buffer.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    data: Vec<u8>,
    bit_len: usize,
    read_pos: usize,
    msb_first: bool,
    ext_spans: Vec<ExtSpan>,
}

impl Default for RawBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RawBuffer {
    /// Empty buffer for encoding, MSB-first bit addressing.
    pub fn new() -> Self {
        RawBuffer {
            data: Vec::new(),
            bit_len: 0,
            read_pos: 0,
            msb_first: true,
            ext_spans: Vec::new(),
        }
    }

    /// Buffer over existing wire bytes for decoding.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        RawBuffer {
            data: bytes.to_vec(),
            bit_len: bytes.len() * 8,
            read_pos: 0,
            msb_first: true,
            ext_spans: Vec::new(),
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// The wire bytes; bits past `bit_len` in the last byte are zero.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Switch the physical bit addressing order; returns the previous order.
    pub fn set_order(&mut self, msb_first: bool) -> bool {
        std::mem::replace(&mut self.msb_first, msb_first)
    }

    pub fn get_order(&self) -> bool {
        self.msb_first
    }

    fn mask(pos: usize, msb_first: bool) -> u8 {
        if msb_first {
            0x80 >> (pos % 8)
        } else {
            1 << (pos % 8)
        }
    }

    fn set_bit_at(&mut self, pos: usize, value: bool, msb_first: bool) {
        let byte = pos / 8;
        if self.data.len() <= byte {
            self.data.resize(byte + 1, 0);
        }
        let mask = Self::mask(pos, msb_first);
        if value {
            self.data[byte] |= mask;
        } else {
            self.data[byte] &= !mask;
        }
    }

    fn bit_at(&self, pos: usize, msb_first: bool) -> bool {
        self.data[pos / 8] & Self::mask(pos, msb_first) != 0
    }

    /// Append a single bit at the write position.
    pub fn put_bit(&mut self, value: bool) {
        let pos = self.bit_len;
        let msb = self.msb_first;
        self.set_bit_at(pos, value, msb);
        self.bit_len += 1;
    }

    /// Append `count` payload bits from `bytes` (canonical form), permuted
    /// into wire order by `cp`. `align` filler bits are emitted as zeros:
    /// after the payload when positive, before it when negative.
    pub fn put_bits(&mut self, count: usize, bytes: &[u8], cp: &CodingParams, align: isize) {
        if align < 0 {
            for _ in 0..(-align) as usize {
                self.put_bit(false);
            }
        }
        for k in bit_wire_order(count, cp) {
            self.put_bit(bytes[k / 8] & (1 << (k % 8)) != 0);
        }
        if align > 0 {
            for _ in 0..align as usize {
                self.put_bit(false);
            }
        }
    }

    /// Append `count` padding bits cycling through the first `pattern_len`
    /// bits of `pattern`; an empty pattern fills with zeros.
    pub fn put_pad(
        &mut self,
        count: usize,
        pattern: &[u8],
        pattern_len: usize,
        field_order: FieldOrder,
    ) {
        for i in 0..count {
            let bit = if pattern_len == 0 || pattern.is_empty() {
                false
            } else {
                let j = i % pattern_len;
                let j = match field_order {
                    FieldOrder::Lsb => j,
                    FieldOrder::Msb => pattern_len - 1 - j,
                };
                pattern[j / 8] & (1 << (j % 8)) != 0
            };
            self.put_bit(bit);
        }
    }

    /// Open an extension-bit span. Spans nest and survive across encode
    /// calls, so one logical span can cover several invocations.
    pub fn start_ext_bit(&mut self, reverse: bool) {
        self.ext_spans.push(ExtSpan {
            reverse,
            last_marker: None,
        });
    }

    /// Write a continuation marker ("more data follows") for the innermost
    /// open span and remember its position.
    pub fn put_ext_bit(&mut self) {
        let pos = self.bit_len;
        let msb = self.msb_first;
        if let Some(span) = self.ext_spans.last_mut() {
            let more = span.reverse;
            span.last_marker = Some((pos, msb));
            self.set_bit_at(pos, more, msb);
            self.bit_len += 1;
        }
    }

    /// Overwrite the most recent continuation marker of the innermost span.
    pub fn set_last_bit(&mut self, value: bool) {
        if let Some(span) = self.ext_spans.last() {
            if let Some((pos, msb)) = span.last_marker {
                self.set_bit_at(pos, value, msb);
            }
        }
    }

    /// Close the innermost span: the last marker becomes the terminator
    /// (1 for normal polarity, 0 for reverse).
    pub fn stop_ext_bit(&mut self) {
        if let Some(span) = self.ext_spans.last() {
            let terminator = !span.reverse;
            self.set_last_bit(terminator);
            self.ext_spans.pop();
        }
    }

    /// Bits not yet consumed by the read side.
    pub fn unread_bit_count(&self) -> usize {
        self.bit_len.saturating_sub(self.read_pos)
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Rewind the read cursor (speculative union decode).
    pub fn set_read_pos(&mut self, pos: usize) {
        self.read_pos = pos.min(self.bit_len);
    }

    /// Read a single bit at the read position.
    pub fn get_bit(&mut self) -> Result<bool, RawError> {
        if self.read_pos >= self.bit_len {
            return Err(RawError::incomplete(1, 0));
        }
        let bit = self.bit_at(self.read_pos, self.msb_first);
        self.read_pos += 1;
        Ok(bit)
    }

    /// Read `count` wire bits and reassemble the canonical payload bytes,
    /// inverting the permutation applied by [`put_bits`](Self::put_bits).
    pub fn get_bits(&mut self, count: usize, cp: &CodingParams) -> Result<Vec<u8>, RawError> {
        if self.unread_bit_count() < count {
            return Err(RawError::incomplete(count, self.unread_bit_count()));
        }
        let mut out = vec![0u8; count.div_ceil(8)];
        for k in bit_wire_order(count, cp) {
            if self.get_bit()? {
                out[k / 8] |= 1 << (k % 8);
            }
        }
        Ok(out)
    }

    /// Advance the read position to the next multiple of `padding` bits.
    /// With `padding == 0` this is a no-op.
    pub fn advance_for_padding(&mut self, padding: usize) -> Result<(), RawError> {
        if padding == 0 {
            return Ok(());
        }
        let next = self.read_pos.div_ceil(padding) * padding;
        if next > self.bit_len {
            return Err(RawError::incomplete(next - self.read_pos, self.unread_bit_count()));
        }
        self.read_pos = next;
        Ok(())
    }
}

/// The order in which canonical payload bit indices hit the wire for the
/// given coding parameters. Shared by `put_bits` and `get_bits` so the two
/// are always exact inverses.
fn bit_wire_order(count: usize, cp: &CodingParams) -> Vec<usize> {
    let mut order = Vec::with_capacity(count);
    if count == 0 {
        return order;
    }
    let nbytes = count.div_ceil(8);
    let top_valid = count - 8 * (nbytes - 1);
    let bytes: Vec<usize> = match cp.byte_order {
        ByteOrder::LsbFirst => (0..nbytes).collect(),
        ByteOrder::MsbFirst => (0..nbytes).rev().collect(),
    };
    for i in bytes {
        let nvalid = if i == nbytes - 1 { top_valid } else { 8 };
        let base = 8 * i;
        for j in 0..nvalid {
            let j = match cp.bit_order {
                BitOrder::LsbFirst => j,
                BitOrder::MsbFirst => nvalid - 1 - j,
            };
            // Hex digit swap applies to full octets only.
            let j = if cp.hex_order == HexOrder::HighFirst && nvalid == 8 {
                (j + 4) % 8
            } else {
                j
            };
            order.push(base + j);
        }
    }
    order
}
