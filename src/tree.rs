//! Encoding tree: the two-pass layout and the final buffer emission.
//!
//! A tree is built fresh for one top-level encode call: one node per value,
//! leaves holding raw field bits and composites holding ordered children.
//! The nodes live in an arena ([`EncTree`] owns a `Vec<Node>`); children are
//! stored as index lists and `parent` is a plain index, so there is no
//! manual lifetime juggling and a [`TreePos`] lookup is an array walk.
//!
//! Omitted optional fields keep their sibling slot as `None`: positions of
//! later siblings do not shift, and calculated-field resolution skips the
//! absent slots.
//!
//! The entry point [`EncTree::encode`] runs the three phases in order:
//! 1. [`calc_padding`](EncTree::calc_padding) computes every node's absolute
//!    start position, length and pre/post padding gaps;
//! 2. [`calc_fields`](EncTree::calc_fields) materializes length-to and
//!    pointer-to leaves from the resolved layout;
//! 3. [`fill_buf`](EncTree::fill_buf) is the only side-effecting pass and
//!    writes the bits.

use crate::buffer::RawBuffer;
use crate::descriptor::{
    BitOrder, CodingParams, ExtBit, RawFieldDescriptor, SignMode, TopBitOrder,
};
use crate::error::RawError;
use crate::value::{int_to_payload, Leaf};

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// A path of sibling indices addressing a node from the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreePos {
    indices: Vec<usize>,
}

impl TreePos {
    /// The root position (level 0).
    pub fn root() -> Self {
        TreePos::default()
    }

    /// This position extended by a child's sibling index.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.indices.clone();
        indices.push(index);
        TreePos { indices }
    }

    pub fn level(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Same path with the last sibling index replaced (pointer-base scan).
    pub fn with_last(&self, index: usize) -> Self {
        let mut indices = self.indices.clone();
        if let Some(last) = indices.last_mut() {
            *last = index;
        }
        TreePos { indices }
    }
}

/// Which sibling nodes feed a length-of leaf: their encoded+padding lengths
/// are summed (or their element counts when no unit is given), divided by
/// the unit rounded up, plus an additive offset.
#[derive(Debug, Clone)]
pub struct LengthToSpec {
    pub fields: Vec<TreePos>,
    pub unit: Option<usize>,
    pub offset: i64,
}

/// A pointer-of leaf: `ceil((target.start − base.start − offset) / unit)`.
/// The base is found by scanning forward from the nominal base position
/// until a present node is found (omitted leading fields are skipped).
#[derive(Debug, Clone)]
pub struct PointerToSpec {
    pub target: TreePos,
    pub base: TreePos,
    pub unit: usize,
    pub offset: i64,
}

/// Calculated-field directive; only legal on leaves.
#[derive(Debug, Clone, Default)]
pub enum CalcField {
    #[default]
    None,
    LengthTo(LengthToSpec),
    PointerTo(PointerToSpec),
}

/// Splitting one logical extension-bit span across several encode calls:
/// `Open` starts the span without closing it, `Close` closes a span opened
/// by an earlier call, `OpenClose` does both (the normal case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtBitHandling {
    #[default]
    OpenClose,
    Open,
    Close,
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    Leaf(Leaf),
    Composite { children: Vec<Option<NodeId>> },
}

/// Layout and emission parameters shared by leaves and composites, taken
/// from the field descriptor.
#[derive(Debug, Clone)]
pub struct NodeParams {
    pub coding: CodingParams,
    pub padding: usize,
    pub prepadding: usize,
    pub padding_pattern: &'static [u8],
    pub pattern_len: usize,
    pub ext_bit: ExtBit,
    pub ext_bit_handling: ExtBitHandling,
    pub top_bit_order: TopBitOrder,
    /// Marks a composite as a repeating group: every element is followed by
    /// a continuation marker when `ext_bit` is set.
    pub rec_of: bool,
    pub calc: CalcField,
}

impl NodeParams {
    pub fn from_descriptor(desc: &RawFieldDescriptor, ambient: BitOrder) -> Self {
        NodeParams {
            coding: CodingParams::resolve(desc, ambient),
            padding: desc.padding,
            prepadding: desc.prepadding,
            padding_pattern: desc.padding_pattern,
            pattern_len: desc.pattern_len,
            ext_bit: desc.ext_bit,
            ext_bit_handling: ExtBitHandling::OpenClose,
            top_bit_order: desc.top_bit_order,
            rec_of: false,
            calc: CalcField::None,
        }
    }

    pub fn rec_of(mut self) -> Self {
        self.rec_of = true;
        self
    }

    pub fn with_calc(mut self, calc: CalcField) -> Self {
        self.calc = calc;
        self
    }

    pub fn with_ext_bit_handling(mut self, handling: ExtBitHandling) -> Self {
        self.ext_bit_handling = handling;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub pos: TreePos,
    pub parent: Option<NodeId>,
    pub content: NodeContent,
    pub params: NodeParams,
    /// Absolute bit offset of the payload start; set by pass 1.
    pub start_pos: usize,
    /// Leaf: encoded payload bits (incl. alignment filler, excl. padding).
    /// Composite: span consumed by the children; set by pass 1.
    pub length: usize,
    /// Gap inserted before the payload to satisfy `prepadding`; pass 1.
    pub prepad_length: usize,
    /// Gap inserted after the payload to satisfy `padding`; pass 1.
    pub padlength: usize,
}

/// The encoding tree for one top-level encode call.
#[derive(Debug, Clone)]
pub struct EncTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl EncTree {
    fn make_node(pos: TreePos, parent: Option<NodeId>, params: NodeParams, content: NodeContent) -> Node {
        let length = match &content {
            NodeContent::Leaf(leaf) => leaf.bit_len + leaf.align.unsigned_abs(),
            NodeContent::Composite { .. } => 0,
        };
        Node {
            pos,
            parent,
            content,
            params,
            start_pos: 0,
            length,
            prepad_length: 0,
            padlength: 0,
        }
    }

    /// A tree whose root is a single leaf.
    pub fn new_leaf(params: NodeParams, leaf: Leaf) -> Self {
        let node = Self::make_node(TreePos::root(), None, params, NodeContent::Leaf(leaf));
        EncTree {
            nodes: vec![node],
            root: NodeId(0),
        }
    }

    /// A tree whose root is an empty composite.
    pub fn new_composite(params: NodeParams) -> Self {
        let node = Self::make_node(
            TreePos::root(),
            None,
            params,
            NodeContent::Composite { children: Vec::new() },
        );
        EncTree {
            nodes: vec![node],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn push_child(&mut self, parent: NodeId, child: Option<NodeId>) -> usize {
        match &mut self.nodes[parent.0].content {
            NodeContent::Composite { children } => {
                children.push(child);
                children.len() - 1
            }
            NodeContent::Leaf(_) => unreachable!("leaf node cannot have children"),
        }
    }

    /// Append a leaf child; returns its id.
    pub fn add_leaf(&mut self, parent: NodeId, params: NodeParams, leaf: Leaf) -> NodeId {
        let id = NodeId(self.nodes.len());
        let index = self.push_child(parent, Some(id));
        let pos = self.nodes[parent.0].pos.child(index);
        self.nodes
            .push(Self::make_node(pos, Some(parent), params, NodeContent::Leaf(leaf)));
        id
    }

    /// Append a composite child; returns its id.
    pub fn add_composite(&mut self, parent: NodeId, params: NodeParams) -> NodeId {
        let id = NodeId(self.nodes.len());
        let index = self.push_child(parent, Some(id));
        let pos = self.nodes[parent.0].pos.child(index);
        self.nodes.push(Self::make_node(
            pos,
            Some(parent),
            params,
            NodeContent::Composite { children: Vec::new() },
        ));
        id
    }

    /// Reserve the next sibling slot for an omitted optional field. Later
    /// siblings keep their schema indices; lookups of this slot fail softly.
    pub fn add_omitted(&mut self, parent: NodeId) {
        self.push_child(parent, None);
    }

    /// Resolve a tree position from any node: walk up the parent links to
    /// the root, then down along the position's sibling indices. `None`
    /// (leaf in the way, out-of-range or omitted slot) is not an error; it
    /// marks an absent optional field.
    pub fn resolve(&self, from: NodeId, target: &TreePos) -> Option<NodeId> {
        let mut current = from;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        for &index in target.indices() {
            match &self.nodes[current.0].content {
                NodeContent::Composite { children } => {
                    current = (*children.get(index)?)?;
                }
                NodeContent::Leaf(_) => return None,
            }
        }
        Some(current)
    }

    /// Pass 1: assign `start_pos`, `length` and the padding gaps, walking
    /// depth-first left-to-right from `start` (an absolute bit offset).
    /// Returns the next free bit position. Pure in the sense that the result
    /// depends only on the tree shape and `start`.
    pub fn calc_padding(&mut self, start: usize) -> usize {
        self.calc_padding_node(self.root, start)
    }

    fn calc_padding_node(&mut self, id: NodeId, start: usize) -> usize {
        let prepadding = self.nodes[id.0].params.prepadding;
        let body_start = round_up(start, prepadding);
        self.nodes[id.0].prepad_length = body_start - start;
        self.nodes[id.0].start_pos = body_start;

        let marker = if self.nodes[id.0].params.ext_bit != ExtBit::No { 1 } else { 0 };
        let mut pos = body_start;
        match &self.nodes[id.0].content {
            NodeContent::Leaf(_) => {
                pos += self.nodes[id.0].length + marker;
            }
            NodeContent::Composite { children } => {
                let present: Vec<NodeId> = children.iter().filter_map(|c| *c).collect();
                let per_element = if self.nodes[id.0].params.rec_of { marker } else { 0 };
                for child in present {
                    pos = self.calc_padding_node(child, pos) + per_element;
                }
                self.nodes[id.0].length = pos - body_start;
            }
        }

        let padding = self.nodes[id.0].params.padding;
        let end = round_up(pos, padding);
        self.nodes[id.0].padlength = end - pos;
        end
    }

    /// Pass 2: materialize every length-to and pointer-to leaf from the
    /// layout computed in pass 1, via the integer leaf encoding.
    pub fn calc_fields(&mut self) -> Result<(), RawError> {
        for i in 0..self.nodes.len() {
            let id = NodeId(i);
            let value = match &self.nodes[i].params.calc {
                CalcField::None => continue,
                CalcField::LengthTo(spec) => self.resolve_length_to(id, spec),
                CalcField::PointerTo(spec) => self.resolve_pointer_to(id, spec)?,
            };
            let node = &mut self.nodes[i];
            match &mut node.content {
                NodeContent::Leaf(leaf) => {
                    leaf.data = int_to_payload(value, leaf.bit_len, SignMode::NoSignBit);
                }
                NodeContent::Composite { .. } => {
                    return Err(RawError::invalid_calc(
                        "calculated field directive on a composite node",
                    ));
                }
            }
        }
        Ok(())
    }

    fn resolve_length_to(&self, from: NodeId, spec: &LengthToSpec) -> i64 {
        let mut sum: usize = 0;
        for pos in &spec.fields {
            // Absent targets are omitted optional fields; skip them.
            let Some(target) = self.resolve(from, pos) else {
                continue;
            };
            let node = self.node(target);
            sum += match spec.unit {
                Some(_) => node.length + node.padlength + node.prepad_length,
                None => match &node.content {
                    NodeContent::Composite { children } => {
                        children.iter().filter(|c| c.is_some()).count()
                    }
                    NodeContent::Leaf(_) => 1,
                },
            };
        }
        let value = match spec.unit {
            Some(unit) if unit > 1 => sum.div_ceil(unit),
            _ => sum,
        };
        value as i64 + spec.offset
    }

    fn resolve_pointer_to(&self, from: NodeId, spec: &PointerToSpec) -> Result<i64, RawError> {
        let Some(target) = self.resolve(from, &spec.target) else {
            // Omitted pointer target encodes as a null pointer.
            return Ok(0);
        };
        let Some(&nominal) = spec.base.indices().last() else {
            return Err(RawError::invalid_calc("pointer base is the tree root"));
        };
        let arity = self
            .resolve(from, &parent_of(&spec.base))
            .map(|p| match &self.node(p).content {
                NodeContent::Composite { children } => children.len(),
                NodeContent::Leaf(_) => 0,
            })
            .unwrap_or(0);
        let mut base = None;
        for index in nominal..arity {
            if let Some(found) = self.resolve(from, &spec.base.with_last(index)) {
                base = Some(found);
                break;
            }
        }
        let Some(base) = base else {
            return Err(RawError::invalid_calc("no present base node for pointer field"));
        };
        let distance =
            self.node(target).start_pos as i64 - self.node(base).start_pos as i64 - spec.offset;
        let unit = spec.unit.max(1) as i64;
        Ok(div_ceil_i64(distance, unit))
    }

    /// Pass 3: emit the bits. The only side-effecting pass. A node with a
    /// non-inherited top bit order overrides the buffer order for itself and
    /// its subtree, restoring the previous order on exit (strictly LIFO).
    pub fn fill_buf(&self, buf: &mut RawBuffer) {
        self.fill_node(self.root, buf);
    }

    fn fill_node(&self, id: NodeId, buf: &mut RawBuffer) {
        let node = self.node(id);
        let params = &node.params;
        if node.prepad_length > 0 {
            buf.put_pad(
                node.prepad_length,
                params.padding_pattern,
                params.pattern_len,
                params.coding.field_order,
            );
        }
        let saved_order = match params.top_bit_order {
            TopBitOrder::Inherited => None,
            TopBitOrder::LsbFirst => Some(buf.set_order(false)),
            TopBitOrder::MsbFirst => Some(buf.set_order(true)),
        };
        let ext = params.ext_bit != ExtBit::No;
        let reverse = params.ext_bit == ExtBit::Reverse;
        let opens = matches!(params.ext_bit_handling, ExtBitHandling::OpenClose | ExtBitHandling::Open);
        let closes = matches!(params.ext_bit_handling, ExtBitHandling::OpenClose | ExtBitHandling::Close);
        match &node.content {
            NodeContent::Leaf(leaf) => {
                if ext && opens {
                    buf.start_ext_bit(reverse);
                }
                buf.put_bits(leaf.bit_len, &leaf.data, &leaf.coding, leaf.align);
                if ext {
                    buf.put_ext_bit();
                    if closes {
                        buf.stop_ext_bit();
                    }
                }
            }
            NodeContent::Composite { children } => {
                let group_ext = ext && params.rec_of;
                if group_ext && opens {
                    buf.start_ext_bit(reverse);
                }
                for child in children.iter().filter_map(|c| *c) {
                    self.fill_node(child, buf);
                    if group_ext {
                        buf.put_ext_bit();
                    }
                }
                if group_ext && closes {
                    buf.stop_ext_bit();
                }
            }
        }
        if let Some(order) = saved_order {
            buf.set_order(order);
        }
        if node.padlength > 0 {
            buf.put_pad(
                node.padlength,
                params.padding_pattern,
                params.pattern_len,
                params.coding.field_order,
            );
        }
    }

    /// Run the three phases against the buffer: layout, calculated fields,
    /// emission. Layout starts at the buffer's current write position so
    /// pointer arithmetic is absolute.
    pub fn encode(&mut self, buf: &mut RawBuffer) -> Result<(), RawError> {
        self.calc_padding(buf.bit_len());
        self.calc_fields()?;
        self.fill_buf(buf);
        Ok(())
    }
}

fn parent_of(pos: &TreePos) -> TreePos {
    let mut indices = pos.indices().to_vec();
    indices.pop();
    TreePos { indices }
}

fn round_up(value: usize, boundary: usize) -> usize {
    if boundary == 0 {
        value
    } else {
        value.div_ceil(boundary) * boundary
    }
}

fn div_ceil_i64(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) == (b < 0) {
        q + 1
    } else {
        q
    }
}
