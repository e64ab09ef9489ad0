//! Per-field RAW wire configuration and resolved coding parameters.
//!
//! A [`RawFieldDescriptor`] is the immutable, declarative description of how a
//! single field sits on the wire: bit width, sign representation, byte/bit/hex
//! order, extension-bit policy, padding and alignment. Descriptors are plain
//! values; the built-in ones for the common primitive types are compile-time
//! constants and are never mutated at runtime.

/// Byte order of a multi-byte field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LsbFirst,
    MsbFirst,
}

/// Bit order within a field or within an octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

/// Order of the two hex digits within an octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexOrder {
    LowFirst,
    HighFirst,
}

/// Whether bit groups or whole bytes are laid out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    Lsb,
    Msb,
}

/// Sign representation of integer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Unsigned; the value is stored as-is.
    NoSignBit,
    /// Two's complement in `field_length` bits.
    TwosCompl,
    /// Sign bit plus magnitude.
    SignBit,
}

/// Extension-bit (continuation marker) policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtBit {
    /// No extension bit.
    No,
    /// 0 while more data follows, 1 on the last element.
    Yes,
    /// 1 while more data follows, 0 on the last element.
    Reverse,
}

/// Directionality used when addressing bits within an octet. `Inherited`
/// resolves to the enclosing node's (ultimately the codec's) top bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopBitOrder {
    Inherited,
    LsbFirst,
    MsbFirst,
}

/// Alignment of a payload shorter than its fixed field length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Payload first, filler bits after.
    Left,
    /// Filler bits first, payload at the end of the field.
    Right,
}

/// Interpretation of character payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Ascii,
    Utf8,
}

/// Immutable per-type/per-field RAW configuration.
///
/// `field_length` is in bits; 0 means variable (strings, octet runs).
/// `padding`/`prepadding` are alignment boundaries in bits; 0 means no
/// constraint. `unit` is the number of bits per addressing unit, normally 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFieldDescriptor {
    pub field_length: usize,
    pub comp: SignMode,
    pub byte_order: ByteOrder,
    pub align: Align,
    pub bit_order_in_field: BitOrder,
    pub bit_order_in_octet: BitOrder,
    pub hex_order: HexOrder,
    pub field_order: FieldOrder,
    pub ext_bit: ExtBit,
    pub top_bit_order: TopBitOrder,
    pub padding: usize,
    pub prepadding: usize,
    /// Padding fill pattern, repeated bit-by-bit; empty means zero fill.
    pub padding_pattern: &'static [u8],
    /// Number of valid bits in `padding_pattern`.
    pub pattern_len: usize,
    pub ptr_offset: i64,
    pub unit: usize,
    pub string_format: StringFormat,
}

impl RawFieldDescriptor {
    /// A descriptor with the given bit width and the default wire settings
    /// (unsigned, MSB-first bytes, LSB bit orders, no padding, octet unit).
    pub const fn new(field_length: usize) -> Self {
        RawFieldDescriptor {
            field_length,
            comp: SignMode::NoSignBit,
            byte_order: ByteOrder::MsbFirst,
            align: Align::Left,
            bit_order_in_field: BitOrder::LsbFirst,
            bit_order_in_octet: BitOrder::LsbFirst,
            hex_order: HexOrder::LowFirst,
            field_order: FieldOrder::Lsb,
            ext_bit: ExtBit::No,
            top_bit_order: TopBitOrder::Inherited,
            padding: 0,
            prepadding: 0,
            padding_pattern: &[],
            pattern_len: 0,
            ptr_offset: 0,
            unit: 8,
            string_format: StringFormat::Ascii,
        }
    }

    pub const fn with_comp(mut self, comp: SignMode) -> Self {
        self.comp = comp;
        self
    }

    pub const fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub const fn with_bit_order_in_field(mut self, order: BitOrder) -> Self {
        self.bit_order_in_field = order;
        self
    }

    pub const fn with_bit_order_in_octet(mut self, order: BitOrder) -> Self {
        self.bit_order_in_octet = order;
        self
    }

    pub const fn with_hex_order(mut self, order: HexOrder) -> Self {
        self.hex_order = order;
        self
    }

    pub const fn with_field_order(mut self, order: FieldOrder) -> Self {
        self.field_order = order;
        self
    }

    pub const fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub const fn with_ext_bit(mut self, ext_bit: ExtBit) -> Self {
        self.ext_bit = ext_bit;
        self
    }

    pub const fn with_top_bit_order(mut self, order: TopBitOrder) -> Self {
        self.top_bit_order = order;
        self
    }

    pub const fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub const fn with_prepadding(mut self, prepadding: usize) -> Self {
        self.prepadding = prepadding;
        self
    }

    pub const fn with_padding_pattern(mut self, pattern: &'static [u8], bits: usize) -> Self {
        self.padding_pattern = pattern;
        self.pattern_len = bits;
        self
    }

    pub const fn with_ptr_offset(mut self, offset: i64) -> Self {
        self.ptr_offset = offset;
        self
    }

    pub const fn with_unit(mut self, unit: usize) -> Self {
        self.unit = unit;
        self
    }

    pub const fn with_string_format(mut self, format: StringFormat) -> Self {
        self.string_format = format;
        self
    }
}

/// Default descriptor for integer fields: one octet, unsigned.
pub const INTEGER_RAW: RawFieldDescriptor = RawFieldDescriptor::new(8);

/// Default descriptor for boolean fields: a single bit.
pub const BOOLEAN_RAW: RawFieldDescriptor = RawFieldDescriptor::new(1);

/// Default descriptor for octet strings: variable length, octet aligned.
pub const OCTETSTRING_RAW: RawFieldDescriptor = RawFieldDescriptor::new(0).with_padding(8);

/// Default descriptor for bit strings: variable length, no alignment.
pub const BITSTRING_RAW: RawFieldDescriptor = RawFieldDescriptor::new(0);

/// Default descriptor for character strings: variable length, octet aligned.
pub const CHARSTRING_RAW: RawFieldDescriptor = RawFieldDescriptor::new(0).with_padding(8);

/// Resolved (post-inheritance) coding parameters used while writing or
/// reading one node. Derived once from the descriptor and the ambient top
/// bit order; the resolution determines physical bit placement, so it must
/// stay exactly as specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingParams {
    pub bit_order: BitOrder,
    pub byte_order: ByteOrder,
    pub hex_order: HexOrder,
    pub field_order: FieldOrder,
    pub top_bit_order: BitOrder,
}

impl CodingParams {
    /// Pure, deterministic resolution:
    /// effective bit order = (byte order is MSB) XOR (bit-order-in-field is MSB);
    /// effective byte order = (bit-order-in-octet is MSB) XOR (bit-order-in-field is MSB);
    /// hex and field order pass through.
    pub fn resolve(desc: &RawFieldDescriptor, ambient: BitOrder) -> Self {
        let field_msb = desc.bit_order_in_field == BitOrder::MsbFirst;
        let octet_msb = desc.bit_order_in_octet == BitOrder::MsbFirst;
        let byte_msb = desc.byte_order == ByteOrder::MsbFirst;
        CodingParams {
            bit_order: if byte_msb != field_msb {
                BitOrder::MsbFirst
            } else {
                BitOrder::LsbFirst
            },
            byte_order: if octet_msb != field_msb {
                ByteOrder::MsbFirst
            } else {
                ByteOrder::LsbFirst
            },
            hex_order: desc.hex_order,
            field_order: desc.field_order,
            top_bit_order: match desc.top_bit_order {
                TopBitOrder::Inherited => ambient,
                TopBitOrder::LsbFirst => BitOrder::LsbFirst,
                TopBitOrder::MsbFirst => BitOrder::MsbFirst,
            },
        }
    }
}
