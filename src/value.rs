//! Runtime values and the leaf encode/decode contract.
//!
//! [`RawValue`] is the closed universe of values the codec moves. Primitives
//! implement the leaf contract: [`raw_encode`](RawValue::raw_encode) turns a
//! value into a leaf payload (canonical bytes + bit length) per the
//! descriptor's sign/length rules, and [`raw_decode`] reads exactly the
//! descriptor-implied bit run back from the buffer in wire order. Composite
//! values (records, unions, sequences) never reach the leaf contract; the
//! [codec](crate::codec) walks them node by node.

use byteorder::{ByteOrder as _, LittleEndian};

use crate::buffer::RawBuffer;
use crate::descriptor::{Align, BitOrder, CodingParams, RawFieldDescriptor, SignMode, StringFormat};
use crate::error::RawError;

/// A single value (field or compound).
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    /// Sign + magnitude beyond the i64 range; magnitude bytes are LSB-first.
    BigInt { negative: bool, magnitude: Vec<u8> },
    /// Bit string: `len` valid bits, canonical byte layout.
    Bits { data: Vec<u8>, len: usize },
    Octets(Vec<u8>),
    CharStr(String),
    Enum(i64),
    Record(Vec<RawValue>),
    Union { variant: usize, value: Box<RawValue> },
    SeqOf(Vec<RawValue>),
    /// An omitted optional field; encodes nothing.
    Omit,
    /// A value that was never assigned; encoding it is an error.
    Unbound,
}

/// A leaf payload produced by `raw_encode`: canonical bytes, bit length,
/// resolved coding parameters and the alignment filler to emit with it
/// (positive: after the payload; negative: before it).
#[derive(Debug, Clone)]
pub struct Leaf {
    pub data: Vec<u8>,
    pub bit_len: usize,
    pub coding: CodingParams,
    pub align: isize,
}

impl RawValue {
    /// Encode this primitive value into a leaf payload per the descriptor.
    pub fn raw_encode(
        &self,
        desc: &RawFieldDescriptor,
        ambient: BitOrder,
    ) -> Result<Leaf, RawError> {
        let coding = CodingParams::resolve(desc, ambient);
        match self {
            RawValue::Bool(b) => {
                // All-bits-set-then-masked: true fills the whole field.
                let len = desc.field_length.max(1);
                let fill = if *b { 0xFF } else { 0x00 };
                let mut data = vec![fill; len.div_ceil(8)];
                mask_top_byte(&mut data, len);
                Ok(Leaf {
                    data,
                    bit_len: len,
                    coding,
                    align: 0,
                })
            }
            RawValue::Int(v) => {
                let len = int_field_length(desc, min_bits(*v));
                Ok(Leaf {
                    data: int_to_payload(*v, len, desc.comp),
                    bit_len: len,
                    coding,
                    align: 0,
                })
            }
            RawValue::BigInt { negative, magnitude } => {
                let len = int_field_length(desc, min_bits_bytes(*negative, magnitude));
                Ok(Leaf {
                    data: bigint_to_payload(*negative, magnitude, len, desc.comp),
                    bit_len: len,
                    coding,
                    align: 0,
                })
            }
            RawValue::Enum(v) => {
                // Enum sizing goes through encode_enum; a bare Enum leaf uses
                // the declared length like an integer.
                let len = int_field_length(desc, min_bits(*v));
                Ok(Leaf {
                    data: int_to_payload(*v, len, desc.comp),
                    bit_len: len,
                    coding,
                    align: 0,
                })
            }
            RawValue::Bits { data, len } => string_leaf(data.clone(), *len, desc, coding),
            RawValue::Octets(bytes) => string_leaf(bytes.clone(), bytes.len() * 8, desc, coding),
            RawValue::CharStr(s) => string_leaf(s.as_bytes().to_vec(), s.len() * 8, desc, coding),
            RawValue::Unbound => Err(RawError::unbound()),
            RawValue::Omit
            | RawValue::Record(_)
            | RawValue::Union { .. }
            | RawValue::SeqOf(_) => Err(RawError::unsupported()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(v) | RawValue::Enum(v) => Some(*v),
            RawValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }
}

/// Primitive kinds the decoder can be asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Bool,
    Int,
    Bits,
    Octets,
    CharStr,
    /// Enumerated with the given number of ordinals (sizes the field when the
    /// descriptor leaves the length at 0).
    Enum { ordinals: i64 },
}

/// Decode one primitive from the buffer. `limit` is the bit budget supplied
/// out of band by a preceding length field; variable-length strings consume
/// exactly that many bits (or the rest of the buffer when absent), while a
/// width-less integer requires the budget.
pub fn raw_decode(
    kind: PrimKind,
    desc: &RawFieldDescriptor,
    buf: &mut RawBuffer,
    limit: Option<usize>,
    ambient: BitOrder,
) -> Result<(RawValue, usize), RawError> {
    let coding = CodingParams::resolve(desc, ambient);
    let len = match kind {
        PrimKind::Bool => desc.field_length.max(1),
        PrimKind::Int => {
            if desc.field_length > 0 {
                desc.field_length
            } else {
                // A width-less integer is only decodable against a budget
                // from a preceding length field.
                match limit {
                    Some(l) => l,
                    None => return Err(RawError::unsupported()),
                }
            }
        }
        PrimKind::Enum { ordinals } => enum_field_length(desc, ordinals),
        PrimKind::Bits | PrimKind::Octets | PrimKind::CharStr => {
            if desc.field_length > 0 {
                desc.field_length
            } else {
                limit.unwrap_or_else(|| buf.unread_bit_count())
            }
        }
    };
    if let Some(l) = limit {
        if len > l {
            return Err(RawError::length_error(len, l));
        }
    }
    if len > buf.unread_bit_count() {
        return Err(RawError::incomplete(len, buf.unread_bit_count()));
    }
    let data = buf.get_bits(len, &coding)?;
    let value = match kind {
        PrimKind::Bool => RawValue::Bool(data.iter().any(|&b| b != 0)),
        PrimKind::Int | PrimKind::Enum { .. } => {
            match (kind, payload_to_int(&data, len, desc.comp)) {
                (PrimKind::Enum { .. }, Some(n)) => RawValue::Enum(n),
                (_, Some(n)) => RawValue::Int(n),
                (_, None) => RawValue::BigInt {
                    negative: false,
                    magnitude: data,
                },
            }
        }
        PrimKind::Bits => RawValue::Bits { data, len },
        PrimKind::Octets => RawValue::Octets(data),
        PrimKind::CharStr => {
            let s = match desc.string_format {
                StringFormat::Utf8 => String::from_utf8_lossy(&data).into_owned(),
                StringFormat::Ascii => data.iter().map(|&b| (b & 0x7F) as char).collect(),
            };
            RawValue::CharStr(s)
        }
    };
    Ok((value, len))
}

/// Number of bits needed for `value` in sign+magnitude representation
/// (one extra bit for the sign when negative). `min_bits(0) == 0`.
pub fn min_bits(value: i64) -> usize {
    let (mut magnitude, sign) = if value < 0 {
        (value.unsigned_abs(), 1)
    } else {
        (value as u64, 0)
    };
    let mut bits = 0;
    while magnitude != 0 {
        magnitude >>= 1;
        bits += 1;
    }
    if bits == 0 {
        0
    } else {
        bits + sign
    }
}

/// Arbitrary-precision variant of [`min_bits`]: sign + LSB-first magnitude
/// bytes. Agrees bit-for-bit with `min_bits` on the overlapping range.
pub fn min_bits_bytes(negative: bool, magnitude: &[u8]) -> usize {
    let mut bits = 0;
    for (i, &b) in magnitude.iter().enumerate() {
        if b != 0 {
            bits = i * 8 + (8 - b.leading_zeros() as usize);
        }
    }
    if bits == 0 {
        0
    } else {
        bits + negative as usize
    }
}

/// Effective bit width of an enumerated field: the declared length when
/// nonzero, otherwise the minimum bits for the ordinal count.
pub fn enum_field_length(desc: &RawFieldDescriptor, ordinals: i64) -> usize {
    if desc.field_length > 0 {
        desc.field_length
    } else {
        min_bits(ordinals)
    }
}

/// Encode an enumerated value by synthesizing a temporary integer descriptor
/// and delegating to the integer leaf codec. Enum values never have bespoke
/// bit packing of their own.
pub fn encode_enum(
    value: i64,
    desc: &RawFieldDescriptor,
    ordinals: i64,
    ambient: BitOrder,
) -> Result<Leaf, RawError> {
    let mut tmp = *desc;
    tmp.field_length = enum_field_length(desc, ordinals);
    RawValue::Int(value).raw_encode(&tmp, ambient)
}

/// Decode an enumerated value through the integer leaf codec.
pub fn decode_enum(
    desc: &RawFieldDescriptor,
    ordinals: i64,
    buf: &mut RawBuffer,
    ambient: BitOrder,
) -> Result<(i64, usize), RawError> {
    let mut tmp = *desc;
    tmp.field_length = enum_field_length(desc, ordinals);
    let (v, n) = raw_decode(PrimKind::Int, &tmp, buf, None, ambient)?;
    match v.as_i64() {
        Some(x) => Ok((x, n)),
        None => Err(RawError::unsupported()),
    }
}

/// Canonical payload of an i64 in `len` bits under the given sign mode.
/// Also used by the calculated-field resolvers to materialize length and
/// pointer leaves.
pub fn int_to_payload(value: i64, len: usize, comp: SignMode) -> Vec<u8> {
    let raw: u64 = match comp {
        SignMode::NoSignBit | SignMode::TwosCompl => value as u64,
        SignMode::SignBit => {
            let magnitude = value.unsigned_abs();
            if value < 0 && len > 0 && len <= 64 {
                magnitude | top_bit(len)
            } else {
                magnitude
            }
        }
    };
    let raw = if len >= 64 { raw } else { raw & ((1u64 << len) - 1) };
    let mut bytes = [0u8; 8];
    LittleEndian::write_u64(&mut bytes, raw);
    let nbytes = len.div_ceil(8).max(1);
    let mut data = vec![0u8; nbytes];
    let n = nbytes.min(8);
    data[..n].copy_from_slice(&bytes[..n]);
    if len > 64 {
        match comp {
            SignMode::TwosCompl if value < 0 => {
                for b in data.iter_mut().skip(8) {
                    *b = 0xFF;
                }
            }
            SignMode::SignBit if value < 0 => {
                data[(len - 1) / 8] |= 1 << ((len - 1) % 8);
            }
            _ => {}
        }
    }
    mask_top_byte(&mut data, len);
    data
}

fn payload_to_int(data: &[u8], len: usize, comp: SignMode) -> Option<i64> {
    if len > 64 && min_bits_bytes(false, data) > 63 {
        // Falls outside i64; the caller keeps the raw magnitude.
        return None;
    }
    let mut bytes = [0u8; 8];
    let n = data.len().min(8);
    bytes[..n].copy_from_slice(&data[..n]);
    let raw = LittleEndian::read_u64(&bytes);
    let raw = if len >= 64 { raw } else { raw & ((1u64 << len) - 1) };
    match comp {
        SignMode::NoSignBit => i64::try_from(raw).ok(),
        SignMode::TwosCompl => {
            if len == 0 || len >= 64 {
                Some(raw as i64)
            } else if raw & top_bit(len) != 0 {
                Some(raw as i64 - (1i64 << len))
            } else {
                Some(raw as i64)
            }
        }
        SignMode::SignBit => {
            if len == 0 {
                return Some(0);
            }
            let negative = raw & top_bit(len) != 0;
            let magnitude = (raw & !top_bit(len)) as i64;
            Some(if negative { -magnitude } else { magnitude })
        }
    }
}

fn bigint_to_payload(negative: bool, magnitude: &[u8], len: usize, comp: SignMode) -> Vec<u8> {
    let nbytes = len.div_ceil(8).max(1);
    let mut data = vec![0u8; nbytes];
    let n = magnitude.len().min(nbytes);
    data[..n].copy_from_slice(&magnitude[..n]);
    mask_top_byte(&mut data, len);
    match comp {
        SignMode::NoSignBit => {}
        SignMode::SignBit => {
            if negative && len > 0 {
                data[(len - 1) / 8] |= 1 << ((len - 1) % 8);
            }
        }
        SignMode::TwosCompl => {
            if negative {
                // Two's complement over exactly `len` bits.
                let mut carry = 1u16;
                for b in data.iter_mut() {
                    let sum = (!*b as u16) + carry;
                    *b = sum as u8;
                    carry = sum >> 8;
                }
                mask_top_byte(&mut data, len);
            }
        }
    }
    data
}

fn string_leaf(
    mut data: Vec<u8>,
    natural_bits: usize,
    desc: &RawFieldDescriptor,
    coding: CodingParams,
) -> Result<Leaf, RawError> {
    // A bit-string value may claim more bits than its byte vector holds;
    // rejecting it here keeps the buffer free of bounds checks.
    if data.len() * 8 < natural_bits {
        return Err(RawError::length_error(natural_bits, data.len() * 8));
    }
    if desc.field_length == 0 || desc.field_length == natural_bits {
        mask_top_byte(&mut data, natural_bits);
        return Ok(Leaf {
            data,
            bit_len: natural_bits,
            coding,
            align: 0,
        });
    }
    if natural_bits > desc.field_length {
        // Truncate to the declared width.
        data.truncate(desc.field_length.div_ceil(8));
        mask_top_byte(&mut data, desc.field_length);
        return Ok(Leaf {
            data,
            bit_len: desc.field_length,
            coding,
            align: 0,
        });
    }
    let filler = (desc.field_length - natural_bits) as isize;
    let align = match desc.align {
        Align::Left => filler,
        Align::Right => -filler,
    };
    mask_top_byte(&mut data, natural_bits);
    Ok(Leaf {
        data,
        bit_len: natural_bits,
        coding,
        align,
    })
}

fn int_field_length(desc: &RawFieldDescriptor, natural: usize) -> usize {
    if desc.field_length > 0 {
        desc.field_length
    } else {
        natural.max(1)
    }
}

fn top_bit(len: usize) -> u64 {
    1u64 << (len - 1).min(63)
}

fn mask_top_byte(data: &mut [u8], len: usize) {
    if len % 8 != 0 {
        if let Some(last) = data.get_mut(len / 8) {
            *last &= (1u8 << (len % 8)) - 1;
        }
        for b in data.iter_mut().skip(len / 8 + 1) {
            *b = 0;
        }
    }
}
