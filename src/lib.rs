//! # rawcodec: bit-level RAW protocol codec
//!
//! A descriptor-driven binary codec: given a structured value (primitive,
//! record, union, sequence-of) and a declarative field descriptor, it
//! produces or consumes an exact bit-level wire representation with
//! configurable byte order, bit order, padding, alignment, extension bits,
//! and fields computed from the layout of other fields (length-of,
//! pointer-of).
//!
//! ## Structure
//!
//! - **Descriptors** ([`descriptor`]): immutable per-field wire
//!   configuration and the resolved [`CodingParams`] that fix physical bit
//!   placement.
//! - **Buffer** ([`buffer`]): bit-addressable read/write buffer with
//!   per-field order permutations, pad patterns and extension-bit spans.
//! - **Encoding tree** ([`tree`]): arena of leaf/composite nodes; the
//!   three-phase encode: layout (`calc_padding`), calculated fields
//!   (`calc_fields`), emission (`fill_buf`).
//! - **Values** ([`value`]): the closed [`RawValue`] universe and the leaf
//!   encode/decode contract, plus `min_bits` and the enum codec helpers.
//! - **Codec** ([`codec`]): schema-driven entry points, tree-based encode,
//!   direct wire-order decode with length-field limits and speculative
//!   union decoding.
//!
//! Encoding builds a private tree per call; decoding reads strictly in wire
//! order and needs no tree. Nothing is shared between concurrent calls, so
//! independent values can be coded from different threads without locks.
//!
//! ## Example
//!
//! ```
//! use rawcodec::{FieldSpec, PrimKind, RawCodec, RawFieldDescriptor, RawValue, TypeSpec};
//!
//! let spec = TypeSpec::Record {
//!     desc: RawFieldDescriptor::new(0),
//!     fields: vec![
//!         FieldSpec::new("tag", TypeSpec::Primitive {
//!             kind: PrimKind::Int,
//!             desc: RawFieldDescriptor::new(8),
//!         }),
//!         FieldSpec::new("flag", TypeSpec::Primitive {
//!             kind: PrimKind::Bool,
//!             desc: RawFieldDescriptor::new(1),
//!         }),
//!     ],
//! };
//! let value = RawValue::Record(vec![RawValue::Int(7), RawValue::Bool(true)]);
//! let codec = RawCodec::new();
//! let bytes = codec.encode("Example", &spec, &value).unwrap();
//! assert_eq!(codec.decode("Example", &spec, &bytes).unwrap(), value);
//! ```

pub mod buffer;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod tree;
pub mod value;

pub use buffer::RawBuffer;
pub use codec::{CalcSpec, FieldSpec, RawCodec, TypeSpec};
pub use descriptor::{
    Align, BitOrder, ByteOrder, CodingParams, ExtBit, FieldOrder, HexOrder, RawFieldDescriptor,
    SignMode, StringFormat, TopBitOrder, BITSTRING_RAW, BOOLEAN_RAW, CHARSTRING_RAW, INTEGER_RAW,
    OCTETSTRING_RAW,
};
pub use error::{ErrorContext, RawError};
pub use tree::{
    CalcField, EncTree, ExtBitHandling, LengthToSpec, Node, NodeContent, NodeId, NodeParams,
    PointerToSpec, TreePos,
};
pub use value::{
    decode_enum, encode_enum, enum_field_length, min_bits, min_bits_bytes, raw_decode, Leaf,
    PrimKind, RawValue,
};
