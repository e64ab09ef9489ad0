//! Encode/decode structured values against a declarative schema.
//!
//! The schema layer ([`TypeSpec`]/[`FieldSpec`]) names each field and binds
//! it to a [`RawFieldDescriptor`]; descriptors are assumed given, there is no
//! schema text format. Encoding builds an [`EncTree`] (one node per value)
//! and runs the three passes; decoding never builds a tree, it pulls
//! descriptor-sized bit runs straight from the buffer in wire order, which
//! works because wire order is also field order. Length fields decoded
//! earlier feed the bit budget of variable-length fields decoded later.

use crate::buffer::RawBuffer;
use crate::descriptor::{BitOrder, RawFieldDescriptor, TopBitOrder};
use crate::error::{self, ErrorContext, RawError};
use crate::tree::{CalcField, EncTree, LengthToSpec, NodeId, NodeParams, PointerToSpec, TreePos};
use crate::value::{self, PrimKind, RawValue};

/// Calculated-field directive on a record field, referring to sibling
/// fields by index.
#[derive(Debug, Clone)]
pub enum CalcSpec {
    /// This field's value is the summed length of the target siblings,
    /// divided by `unit` (rounded up) when given, their element counts
    /// otherwise, plus `offset`.
    LengthTo {
        targets: Vec<usize>,
        unit: Option<usize>,
        offset: i64,
    },
    /// This field's value is the distance from the base sibling to the
    /// target sibling, in `unit` bits rounded up, minus `offset` bits.
    PointerTo {
        target: usize,
        base: usize,
        unit: usize,
        offset: i64,
    },
}

/// One named field of a record or one variant of a union.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub spec: TypeSpec,
    pub optional: bool,
    pub calc: Option<CalcSpec>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, spec: TypeSpec) -> Self {
        FieldSpec {
            name: name.into(),
            spec,
            optional: false,
            calc: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_calc(mut self, calc: CalcSpec) -> Self {
        self.calc = Some(calc);
        self
    }
}

/// Declarative wire type: a primitive with its descriptor, or a compound
/// built from fields/variants/elements.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Primitive {
        kind: PrimKind,
        desc: RawFieldDescriptor,
    },
    Record {
        desc: RawFieldDescriptor,
        fields: Vec<FieldSpec>,
    },
    Union {
        desc: RawFieldDescriptor,
        variants: Vec<FieldSpec>,
    },
    SeqOf {
        desc: RawFieldDescriptor,
        elem: Box<TypeSpec>,
    },
}

impl TypeSpec {
    pub fn desc(&self) -> &RawFieldDescriptor {
        match self {
            TypeSpec::Primitive { desc, .. }
            | TypeSpec::Record { desc, .. }
            | TypeSpec::Union { desc, .. }
            | TypeSpec::SeqOf { desc, .. } => desc,
        }
    }
}

/// Out-of-band bit budget or element count supplied by a decoded length field.
#[derive(Debug, Clone, Copy)]
enum Limit {
    Bits(usize),
    Count(usize),
}

/// The RAW codec: one instance per ambient top-bit-order configuration.
/// Encoding and decoding are synchronous, CPU-bound and share no state, so
/// independent values can be coded concurrently from different threads.
#[derive(Debug, Clone, Copy)]
pub struct RawCodec {
    pub top_bit_order: BitOrder,
}

impl Default for RawCodec {
    fn default() -> Self {
        RawCodec {
            top_bit_order: BitOrder::MsbFirst,
        }
    }
}

impl RawCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one value into fresh wire bytes.
    pub fn encode(&self, name: &str, spec: &TypeSpec, value: &RawValue) -> Result<Vec<u8>, RawError> {
        let mut buf = RawBuffer::new();
        buf.set_order(self.top_bit_order == BitOrder::MsbFirst);
        self.encode_into(name, spec, value, &mut buf)?;
        Ok(buf.into_bytes())
    }

    /// Encode one value, appending to an existing buffer (repeated top-level
    /// fields spanning several invocations share the buffer and its open
    /// extension-bit spans).
    pub fn encode_into(
        &self,
        name: &str,
        spec: &TypeSpec,
        value: &RawValue,
        buf: &mut RawBuffer,
    ) -> Result<(), RawError> {
        let _ctx = ErrorContext::new(format!("While RAW-encoding type '{name}'"));
        let mut tree = self.build_root(spec, value)?;
        tree.encode(buf)
    }

    /// Build the encoding tree without emitting it (layout inspection and
    /// split extension-bit spans want the tree itself).
    pub fn build_tree(&self, spec: &TypeSpec, value: &RawValue) -> Result<EncTree, RawError> {
        self.build_root(spec, value)
    }

    fn build_root(&self, spec: &TypeSpec, value: &RawValue) -> Result<EncTree, RawError> {
        let ambient = self.top_bit_order;
        let params = NodeParams::from_descriptor(spec.desc(), ambient);
        match spec {
            TypeSpec::Primitive { .. } => {
                let leaf = value.raw_encode(spec.desc(), ambient)?;
                Ok(EncTree::new_leaf(params, leaf))
            }
            TypeSpec::Record { .. } | TypeSpec::Union { .. } => {
                let mut tree = EncTree::new_composite(params);
                let root = tree.root();
                self.build_children(&mut tree, root, spec, value, ambient)?;
                Ok(tree)
            }
            TypeSpec::SeqOf { .. } => {
                let mut tree = EncTree::new_composite(params.rec_of());
                let root = tree.root();
                self.build_children(&mut tree, root, spec, value, ambient)?;
                Ok(tree)
            }
        }
    }

    fn build_children(
        &self,
        tree: &mut EncTree,
        parent: NodeId,
        spec: &TypeSpec,
        value: &RawValue,
        ambient: BitOrder,
    ) -> Result<(), RawError> {
        match (spec, value) {
            (TypeSpec::Record { fields, .. }, RawValue::Record(values)) => {
                let parent_pos = tree.node(parent).pos.clone();
                for (i, field) in fields.iter().enumerate() {
                    let v = values.get(i).unwrap_or(&RawValue::Unbound);
                    if matches!(v, RawValue::Omit) {
                        if field.optional {
                            tree.add_omitted(parent);
                            continue;
                        }
                        let _ctx = ErrorContext::new(format!("In field '{}'", field.name));
                        return Err(RawError::unbound());
                    }
                    let _ctx = ErrorContext::new(format!("In field '{}'", field.name));
                    self.build_field(tree, parent, &parent_pos, field, v, ambient)?;
                }
                Ok(())
            }
            (TypeSpec::Union { variants, .. }, RawValue::Union { variant, value }) => {
                let Some(chosen) = variants.get(*variant) else {
                    return Err(RawError::unsupported());
                };
                // Preceding variant slots stay empty so the selected child
                // keeps its schema index in the tree position.
                for _ in 0..*variant {
                    tree.add_omitted(parent);
                }
                let parent_pos = tree.node(parent).pos.clone();
                let _ctx = ErrorContext::new(format!("In variant '{}'", chosen.name));
                self.build_field(tree, parent, &parent_pos, chosen, value, ambient)
            }
            (TypeSpec::SeqOf { elem, .. }, RawValue::SeqOf(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let _ctx = ErrorContext::new(format!("In element {i}"));
                    self.build_node(tree, parent, elem, item, ambient, CalcField::None)?;
                }
                Ok(())
            }
            (_, RawValue::Unbound) => Err(RawError::unbound()),
            _ => Err(RawError::unsupported()),
        }
    }

    fn build_field(
        &self,
        tree: &mut EncTree,
        parent: NodeId,
        parent_pos: &TreePos,
        field: &FieldSpec,
        value: &RawValue,
        ambient: BitOrder,
    ) -> Result<(), RawError> {
        let calc = match &field.calc {
            None => CalcField::None,
            Some(CalcSpec::LengthTo { targets, unit, offset }) => {
                CalcField::LengthTo(LengthToSpec {
                    fields: targets.iter().map(|&j| parent_pos.child(j)).collect(),
                    unit: *unit,
                    offset: *offset,
                })
            }
            Some(CalcSpec::PointerTo { target, base, unit, offset }) => {
                CalcField::PointerTo(PointerToSpec {
                    target: parent_pos.child(*target),
                    base: parent_pos.child(*base),
                    unit: *unit,
                    offset: *offset,
                })
            }
        };
        self.build_node(tree, parent, &field.spec, value, ambient, calc)
    }

    fn build_node(
        &self,
        tree: &mut EncTree,
        parent: NodeId,
        spec: &TypeSpec,
        value: &RawValue,
        ambient: BitOrder,
        calc: CalcField,
    ) -> Result<(), RawError> {
        let desc = spec.desc();
        let params = NodeParams::from_descriptor(desc, ambient);
        // Children inherit the top bit order this node resolved to.
        let child_ambient = params.coding.top_bit_order;
        match spec {
            TypeSpec::Primitive { .. } => {
                let leaf = if matches!(calc, CalcField::None) {
                    value.raw_encode(desc, ambient)?
                } else {
                    // The resolver computes the payload in pass 2; the field
                    // still needs a fixed width for the layout pass.
                    if desc.field_length == 0 {
                        return Err(RawError::invalid_calc(
                            "calculated field requires a fixed field length",
                        ));
                    }
                    value::RawValue::Int(0).raw_encode(desc, ambient)?
                };
                tree.add_leaf(parent, params.with_calc(calc), leaf);
                Ok(())
            }
            TypeSpec::Record { .. } | TypeSpec::Union { .. } => {
                let node = tree.add_composite(parent, params);
                self.build_children(tree, node, spec, value, child_ambient)
            }
            TypeSpec::SeqOf { .. } => {
                let node = tree.add_composite(parent, params.rec_of());
                self.build_children(tree, node, spec, value, child_ambient)
            }
        }
    }

    /// Decode one value from wire bytes. On failure the error is also
    /// reported through the diagnostic context (exactly once); speculative
    /// union attempts inside never report.
    pub fn decode(&self, name: &str, spec: &TypeSpec, bytes: &[u8]) -> Result<RawValue, RawError> {
        let _ctx = ErrorContext::new(format!("While RAW-decoding type '{name}'"));
        let mut buf = RawBuffer::from_bytes(bytes);
        buf.set_order(self.top_bit_order == BitOrder::MsbFirst);
        match self.decode_spec(spec, &mut buf, None, self.top_bit_order) {
            Ok(v) => Ok(v),
            Err(e) => {
                error::report(e.to_string());
                Err(e)
            }
        }
    }

    fn decode_spec(
        &self,
        spec: &TypeSpec,
        buf: &mut RawBuffer,
        limit: Option<Limit>,
        ambient: BitOrder,
    ) -> Result<RawValue, RawError> {
        let desc = spec.desc();
        buf.advance_for_padding(desc.prepadding)?;
        let saved_order = match desc.top_bit_order {
            TopBitOrder::Inherited => None,
            TopBitOrder::LsbFirst => Some(buf.set_order(false)),
            TopBitOrder::MsbFirst => Some(buf.set_order(true)),
        };
        let child_ambient = match desc.top_bit_order {
            TopBitOrder::Inherited => ambient,
            TopBitOrder::LsbFirst => BitOrder::LsbFirst,
            TopBitOrder::MsbFirst => BitOrder::MsbFirst,
        };
        let result = self.decode_body(spec, buf, limit, child_ambient);
        if let Some(order) = saved_order {
            buf.set_order(order);
        }
        let value = result?;
        buf.advance_for_padding(desc.padding)?;
        Ok(value)
    }

    fn decode_body(
        &self,
        spec: &TypeSpec,
        buf: &mut RawBuffer,
        limit: Option<Limit>,
        ambient: BitOrder,
    ) -> Result<RawValue, RawError> {
        let desc = spec.desc();
        match spec {
            TypeSpec::Primitive { kind, .. } => {
                let bit_limit = match limit {
                    Some(Limit::Bits(n)) => Some(n),
                    _ => None,
                };
                let (value, _) = value::raw_decode(*kind, desc, buf, bit_limit, ambient)?;
                if desc.ext_bit != crate::descriptor::ExtBit::No {
                    buf.get_bit()?;
                }
                Ok(value)
            }
            TypeSpec::Record { fields, .. } => {
                // A bit budget on the record bounds its fields as a group:
                // fields without their own limit get the remaining budget,
                // and the read position ends up at the budget boundary.
                let end = match limit {
                    Some(Limit::Bits(n)) => {
                        if n > buf.unread_bit_count() {
                            return Err(RawError::length_error(n, buf.unread_bit_count()));
                        }
                        Some(buf.read_pos() + n)
                    }
                    _ => None,
                };
                let mut limits: Vec<Option<Limit>> = vec![None; fields.len()];
                let mut values = Vec::with_capacity(fields.len());
                for (i, field) in fields.iter().enumerate() {
                    let _ctx = ErrorContext::new(format!("In field '{}'", field.name));
                    let exhausted = match end {
                        Some(e) => buf.read_pos() >= e,
                        None => buf.unread_bit_count() == 0,
                    };
                    if field.optional && exhausted {
                        values.push(RawValue::Omit);
                        continue;
                    }
                    let field_limit = match limits[i].take() {
                        Some(l) => Some(l),
                        None => end.map(|e| Limit::Bits(e.saturating_sub(buf.read_pos()))),
                    };
                    let v = self.decode_spec(&field.spec, buf, field_limit, ambient)?;
                    if let Some(CalcSpec::LengthTo { targets, unit, offset }) = &field.calc {
                        if let Some(n) = v.as_i64() {
                            let n = (n - offset).max(0) as usize;
                            for &j in targets {
                                if j < limits.len() {
                                    limits[j] = Some(match unit {
                                        Some(u) => Limit::Bits(n * u),
                                        None => Limit::Count(n),
                                    });
                                }
                            }
                        }
                    }
                    values.push(v);
                }
                if let (Some(e), Some(Limit::Bits(n))) = (end, limit) {
                    if buf.read_pos() > e {
                        return Err(RawError::length_error(buf.read_pos() - (e - n), n));
                    }
                    buf.set_read_pos(e);
                }
                Ok(RawValue::Record(values))
            }
            TypeSpec::Union { variants, .. } => {
                let saved = buf.read_pos();
                let mut last_err = None;
                for (i, variant) in variants.iter().enumerate() {
                    match self.decode_spec(&variant.spec, buf, limit, ambient) {
                        Ok(v) => {
                            return Ok(RawValue::Union {
                                variant: i,
                                value: Box::new(v),
                            })
                        }
                        Err(e) => {
                            last_err = Some(e);
                            buf.set_read_pos(saved);
                        }
                    }
                }
                Err(last_err.unwrap_or_else(RawError::unsupported))
            }
            TypeSpec::SeqOf { elem, .. } => {
                let mut items = Vec::new();
                if desc.ext_bit != crate::descriptor::ExtBit::No {
                    // Extension-bit terminated: a marker bit follows every
                    // element; the terminator flips the polarity.
                    let more = desc.ext_bit == crate::descriptor::ExtBit::Reverse;
                    loop {
                        items.push(self.decode_spec(elem, buf, None, ambient)?);
                        if buf.get_bit()? != more {
                            break;
                        }
                    }
                } else {
                    match limit {
                        Some(Limit::Count(n)) => {
                            for _ in 0..n {
                                items.push(self.decode_spec(elem, buf, None, ambient)?);
                            }
                        }
                        Some(Limit::Bits(n)) => {
                            if n > buf.unread_bit_count() {
                                return Err(RawError::length_error(n, buf.unread_bit_count()));
                            }
                            let end = buf.read_pos() + n;
                            while buf.read_pos() < end {
                                let before = buf.read_pos();
                                items.push(self.decode_spec(elem, buf, None, ambient)?);
                                if buf.read_pos() == before {
                                    break;
                                }
                            }
                        }
                        None => {
                            while buf.unread_bit_count() > 0 {
                                let before = buf.read_pos();
                                items.push(self.decode_spec(elem, buf, None, ambient)?);
                                if buf.read_pos() == before {
                                    break;
                                }
                            }
                        }
                    }
                }
                Ok(RawValue::SeqOf(items))
            }
        }
    }
}
