//! The binary field tree.
//!
//! Every node of a [`BfnTree`] stands for one field or sub-structure of a wire
//! message. Nodes live in an arena and are addressed by stable [`NodeId`]s.
//! Children are owned, ordered, and serialized in insertion order.
//! Dependencies are non-owning edges that let a derived field (a length)
//! be recomputed from the current state of another field.
//!
//! Construction is two-phase: nodes are built detached, wired together, and
//! then [`BfnTree::attach`]ed, which runs the first update pass. Only attached
//! nodes accept setters, and every setter propagates to all transitive
//! dependents before it returns.

use crate::as_path::{Asn, AsnWidth, SegmentType};
use crate::attribute::AttrType;
use crate::catalog::MutationWeights;
use crate::codec;
use crate::communities::Community;
use crate::error::BfnError;
use log::{debug, trace};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Key of a node inside a [`BfnTree`]. It stays valid until the node is
/// removed; the slot may then be handed to a later insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A field whose encoding depends only on its own state.
pub trait LeafField {
    fn encoded_len(&self) -> usize;
    fn encode_into(&self, out: &mut Vec<u8>);
}

/// The element type a list is declared to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Asn(AsnWidth),
    Community,
    PathSegment(AsnWidth),
}

/// How a length field measures its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// Serialized size in bytes.
    ByteLength,
    /// Number of list elements.
    ElementCount,
}

/// A fixed-width unsigned field derived from the size of other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Length {
    value: u64,
    width: usize,
    include_self: bool,
    aggregate: Aggregate,
    wrap: bool,
}

impl Length {
    pub fn new(width: usize, aggregate: Aggregate) -> Result<Self, BfnError> {
        if width == 0 || width > codec::MAX_UINT_WIDTH {
            return Err(BfnError::InvalidWidth {
                expected: codec::MAX_UINT_WIDTH,
                actual: width,
            });
        }
        Ok(Self {
            value: 0,
            width,
            include_self: false,
            aggregate,
            wrap: false,
        })
    }

    /// Counts the length field's own encoded width in the reported size.
    pub fn including_self(mut self) -> Self {
        self.include_self = true;
        self
    }

    /// Lets oversized results wrap around instead of failing.
    pub fn wrapping(mut self) -> Self {
        self.wrap = true;
        self
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    pub fn includes_self(&self) -> bool {
        self.include_self
    }

    fn fit(&self, total: u64) -> Result<u64, BfnError> {
        let max = codec::max_for_width(self.width);
        if total <= max {
            Ok(total)
        } else if self.wrap {
            Ok(total & max)
        } else {
            Err(BfnError::OutOfRange {
                value: total,
                width: self.width,
            })
        }
    }
}

impl LeafField for Length {
    fn encoded_len(&self) -> usize {
        self.width
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_be_bytes()[codec::MAX_UINT_WIDTH - self.width..]);
    }
}

/// What a node is. Leaves carry their state; composites carry only their shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Asn(Asn),
    SegmentType(SegmentType),
    Length(Length),
    AttrType(AttrType),
    Community(Community),
    /// Homogeneous, variable-length sequence.
    List(ElementKind),
    /// (segment type, segment length, ASN list).
    PathSegment(AsnWidth),
    /// (attribute type, attribute length, value).
    Attribute,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Asn(_) => "asn",
            NodeKind::SegmentType(_) => "segment-type",
            NodeKind::Length(length) => match length.aggregate {
                Aggregate::ByteLength => "byte-length",
                Aggregate::ElementCount => "element-count",
            },
            NodeKind::AttrType(_) => "attribute-type",
            NodeKind::Community(_) => "community",
            NodeKind::List(_) => "list",
            NodeKind::PathSegment(_) => "path-segment",
            NodeKind::Attribute => "attribute",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            NodeKind::List(_) | NodeKind::PathSegment(_) | NodeKind::Attribute
        )
    }

    /// The list element type this node can be installed as, if any.
    pub fn element_kind(&self) -> Option<ElementKind> {
        match self {
            NodeKind::Asn(asn) => Some(ElementKind::Asn(asn.width())),
            NodeKind::Community(_) => Some(ElementKind::Community),
            NodeKind::PathSegment(width) => Some(ElementKind::PathSegment(*width)),
            _ => None,
        }
    }

    fn leaf(&self) -> Option<&dyn LeafField> {
        match self {
            NodeKind::Asn(asn) => Some(asn),
            NodeKind::SegmentType(segment_type) => Some(segment_type),
            NodeKind::Length(length) => Some(length),
            NodeKind::AttrType(attr_type) => Some(attr_type),
            NodeKind::Community(community) => Some(community),
            NodeKind::List(_) | NodeKind::PathSegment(_) | NodeKind::Attribute => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    dependencies: Vec<NodeId>,
    attached: bool,
}

/// Arena holding one or more field trees plus the mutation weights used when
/// drawing operators for them.
///
/// Slots freed by removal are reused by later inserts, so a long-lived tree
/// whose lists are replaced over and over stays at the size of its peak live
/// node count.
#[derive(Debug, Clone, Default)]
pub struct BfnTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    weights: MutationWeights,
}

impl BfnTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: MutationWeights) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            weights,
        }
    }

    pub fn weights(&self) -> &MutationWeights {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut MutationWeights {
        &mut self.weights
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all live nodes, in slot order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| NodeId(index))
    }

    fn node(&self, id: NodeId) -> Result<&Node, BfnError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(BfnError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, BfnError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(BfnError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind, BfnError> {
        Ok(&self.node(id)?.kind)
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> Result<&mut NodeKind, BfnError> {
        Ok(&mut self.node_mut(id)?.kind)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], BfnError> {
        Ok(&self.node(id)?.children)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, BfnError> {
        Ok(self.node(id)?.parent)
    }

    pub fn dependencies(&self, id: NodeId) -> Result<&[NodeId], BfnError> {
        Ok(&self.node(id)?.dependencies)
    }

    pub fn is_attached(&self, id: NodeId) -> Result<bool, BfnError> {
        Ok(self.node(id)?.attached)
    }

    /// The `index`-th child of `id`, which must be of a composite `expected` shape.
    pub(crate) fn child_at(
        &self,
        id: NodeId,
        index: usize,
        expected: &'static str,
    ) -> Result<NodeId, BfnError> {
        let node = self.node(id)?;
        if node.kind.name() != expected {
            return Err(BfnError::WrongKind { node: id, expected });
        }
        node.children
            .get(index)
            .copied()
            .ok_or(BfnError::WrongKind { node: id, expected })
    }

    /// Creates a detached, parentless node.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: Vec::new(),
            dependencies: Vec::new(),
            attached: false,
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self
                .nodes
                .get(current.0)
                .and_then(Option::as_ref)
                .and_then(|n| n.parent);
        }
        false
    }

    /// Transfers ownership of the parentless `child` to `parent` and returns
    /// the key it is now reachable under.
    ///
    /// Lists only accept children of their declared element kind. The
    /// child's attached state follows its new owner; no update pass runs.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, BfnError> {
        let parent_kind = self.kind(parent)?;
        if !parent_kind.is_composite() {
            return Err(BfnError::WrongKind {
                node: parent,
                expected: "composite",
            });
        }
        if let NodeKind::List(expected) = parent_kind {
            let expected = *expected;
            let actual = self.kind(child)?.element_kind();
            if actual != Some(expected) {
                return Err(BfnError::ElementKindMismatch { expected, actual });
            }
        }
        if self.node(child)?.parent.is_some() {
            return Err(BfnError::AlreadyOwned(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(BfnError::InvalidOwner { parent, child });
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.refresh_attachment(child)?;
        Ok(child)
    }

    /// Recomputes the attached flag of `id` and its descendants.
    ///
    /// A node is attached when its owner is; a composite counts as attached as
    /// soon as it sits under an attached owner, whatever its children are.
    /// Parentless nodes keep their own flag.
    pub fn refresh_attachment(&mut self, id: NodeId) -> Result<(), BfnError> {
        let node = self.node(id)?;
        let attached = match node.parent {
            Some(parent) => self.node(parent)?.attached,
            None => node.attached,
        };
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current)?;
            node.attached = attached;
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }

    /// Attaches the parentless `root` and runs the first update pass over it.
    pub fn attach(&mut self, root: NodeId) -> Result<(), BfnError> {
        if self.parent(root)?.is_some() {
            return Err(BfnError::AlreadyOwned(root));
        }
        self.transact(|tree| {
            tree.node_mut(root)?.attached = true;
            tree.refresh_attachment(root)?;
            tree.update_subtree(root)
        })
    }

    /// Registers that `dependent` is recomputed from `dependency`.
    ///
    /// Does not recompute anything. Rejects edges that would make a node
    /// depend on itself, directly or transitively.
    pub fn declare_dependency(
        &mut self,
        dependent: NodeId,
        dependency: NodeId,
    ) -> Result<(), BfnError> {
        self.node(dependent)?;
        self.node(dependency)?;
        if dependent == dependency || self.depends_on(dependency, dependent)? {
            return Err(BfnError::DependencyCycle {
                dependent,
                dependency,
            });
        }
        let dependencies = &mut self.node_mut(dependent)?.dependencies;
        if !dependencies.contains(&dependency) {
            dependencies.push(dependency);
        }
        Ok(())
    }

    /// Like [`BfnTree::declare_dependency`], for two children of `parent`.
    pub fn declare_child_dependency(
        &mut self,
        parent: NodeId,
        dependent: NodeId,
        dependency: NodeId,
    ) -> Result<(), BfnError> {
        for key in [dependent, dependency] {
            if !self.children(parent)?.contains(&key) {
                return Err(BfnError::NotAChild { parent, child: key });
            }
        }
        self.declare_dependency(dependent, dependency)
    }

    fn depends_on(&self, from: NodeId, target: NodeId) -> Result<bool, BfnError> {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return Ok(true);
            }
            if seen.insert(current) {
                stack.extend(self.node(current)?.dependencies.iter().copied());
            }
        }
        Ok(false)
    }

    /// Recomputes the derived state of `id` from its dependencies.
    ///
    /// Idempotent. Dependencies must already be up to date; calling this in
    /// the wrong order reads stale sizes. Nodes without derived state are left
    /// untouched.
    pub fn update_from_dependencies(&mut self, id: NodeId) -> Result<(), BfnError> {
        let node = self.node(id)?;
        let NodeKind::Length(length) = &node.kind else {
            return Ok(());
        };
        let mut total = if length.include_self {
            length.width as u64
        } else {
            0
        };
        for dependency in &node.dependencies {
            total += match length.aggregate {
                Aggregate::ByteLength => self.byte_len(*dependency)? as u64,
                Aggregate::ElementCount => self.element_count(*dependency)? as u64,
            };
        }
        let value = length.fit(total)?;
        trace!("length {id} <- {value}");
        if let NodeKind::Length(length) = self.kind_mut(id)? {
            length.value = value;
        }
        Ok(())
    }

    /// Wire bytes of `id` and its descendants.
    pub fn serialize(&self, id: NodeId) -> Result<Vec<u8>, BfnError> {
        let mut out = Vec::with_capacity(self.byte_len(id)?);
        self.write_into(id, &mut out)?;
        Ok(out)
    }

    fn write_into(&self, id: NodeId, out: &mut Vec<u8>) -> Result<(), BfnError> {
        let node = self.node(id)?;
        match node.kind.leaf() {
            Some(leaf) => leaf.encode_into(out),
            None => {
                for child in &node.children {
                    self.write_into(*child, out)?;
                }
            }
        }
        Ok(())
    }

    /// Serialized size of `id` without building the payload.
    pub fn byte_len(&self, id: NodeId) -> Result<usize, BfnError> {
        let node = self.node(id)?;
        match node.kind.leaf() {
            Some(leaf) => Ok(leaf.encoded_len()),
            None => node
                .children
                .iter()
                .try_fold(0, |acc, child| Ok(acc + self.byte_len(*child)?)),
        }
    }

    /// Number of elements of a list.
    pub fn element_count(&self, id: NodeId) -> Result<usize, BfnError> {
        let node = self.node(id)?;
        match node.kind {
            NodeKind::List(_) => Ok(node.children.len()),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "list",
            }),
        }
    }

    /// Attached nodes with dependencies, ordered so that every node comes after
    /// each derived node living inside one of its dependencies.
    fn update_order(&self) -> Result<Vec<NodeId>, BfnError> {
        let derived: Vec<NodeId> = self
            .node_ids()
            .filter(|id| {
                self.node(*id)
                    .map(|n| n.attached && !n.dependencies.is_empty())
                    .unwrap_or(false)
            })
            .collect();
        let mut indegree = vec![0usize; derived.len()];
        let mut successors = vec![Vec::new(); derived.len()];
        for (d_idx, dependent) in derived.iter().enumerate() {
            let dependencies = &self.node(*dependent)?.dependencies;
            for (e_idx, earlier) in derived.iter().enumerate() {
                if e_idx != d_idx
                    && dependencies
                        .iter()
                        .any(|dependency| self.is_ancestor_or_self(*dependency, *earlier))
                {
                    successors[e_idx].push(d_idx);
                    indegree[d_idx] += 1;
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..derived.len()).filter(|i| indegree[*i] == 0).collect();
        let mut order = Vec::with_capacity(derived.len());
        while let Some(idx) = ready.pop_front() {
            order.push(derived[idx]);
            for &next in &successors[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }
        if order.len() != derived.len() {
            let stuck = derived[(0..derived.len())
                .find(|i| indegree[*i] > 0)
                .unwrap_or_default()];
            let dependency = self.node(stuck)?.dependencies[0];
            return Err(BfnError::DependencyCycle {
                dependent: stuck,
                dependency,
            });
        }
        Ok(order)
    }

    /// Updates every attached derived node inside the subtree of `root`.
    fn update_subtree(&mut self, root: NodeId) -> Result<(), BfnError> {
        for id in self.update_order()? {
            if self.is_ancestor_or_self(root, id) {
                self.update_from_dependencies(id)?;
            }
        }
        Ok(())
    }

    /// Recomputes every node that transitively depends on `changed`.
    ///
    /// A change to a node is also a change to each of its ancestors, so a
    /// length measuring a list is refreshed when an element deep inside it
    /// changes.
    fn propagate(&mut self, changed: NodeId) -> Result<(), BfnError> {
        let mut dirty = vec![changed];
        for id in self.update_order()? {
            let stale = self.node(id)?.dependencies.iter().any(|dependency| {
                dirty
                    .iter()
                    .any(|touched| self.is_ancestor_or_self(*dependency, *touched))
            });
            if stale {
                self.update_from_dependencies(id)?;
                dirty.push(id);
            }
        }
        Ok(())
    }

    /// Runs `f` and restores the whole arena if it fails.
    fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, BfnError>,
    ) -> Result<T, BfnError> {
        let snapshot = (self.nodes.clone(), self.free.clone());
        let result = f(self);
        if let Err(e) = &result {
            debug!("rolling back rejected change: {e}");
            (self.nodes, self.free) = snapshot;
        }
        result
    }

    fn ensure_attached(&self, id: NodeId) -> Result<(), BfnError> {
        if self.node(id)?.attached {
            Ok(())
        } else {
            Err(BfnError::Detached(id))
        }
    }

    /// Applies `set` to the leaf state of `id`, then propagates.
    ///
    /// `set` must validate before it assigns; on any failure the tree is left
    /// as it was.
    pub(crate) fn set_leaf(
        &mut self,
        id: NodeId,
        set: impl FnOnce(NodeId, &mut NodeKind) -> Result<(), BfnError>,
    ) -> Result<(), BfnError> {
        self.ensure_attached(id)?;
        self.transact(|tree| {
            set(id, tree.kind_mut(id)?)?;
            tree.propagate(id)
        })
    }

    /// Frees `id` and everything it owns. Dependency edges that pointed into
    /// the removed subtree are dropped so a reused slot is never mistaken for
    /// the old node.
    fn remove_subtree(&mut self, id: NodeId) -> Result<(), BfnError> {
        let mut removed = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self
                .nodes
                .get_mut(current.0)
                .and_then(Option::take)
                .ok_or(BfnError::UnknownNode(current))?;
            removed.insert(current);
            self.free.push(current.0);
            stack.extend(node.children);
        }
        for node in self.nodes.iter_mut().flatten() {
            node.dependencies
                .retain(|dependency| !removed.contains(dependency));
        }
        Ok(())
    }

    /// Drops a parentless node and everything it owns.
    pub fn discard(&mut self, id: NodeId) -> Result<(), BfnError> {
        if self.parent(id)?.is_some() {
            return Err(BfnError::AlreadyOwned(id));
        }
        self.remove_subtree(id)
    }

    //--- Lists

    /// Builds a detached list of `kind` owning `elements` in order.
    pub fn new_list(
        &mut self,
        kind: ElementKind,
        elements: impl IntoIterator<Item = NodeId>,
    ) -> Result<NodeId, BfnError> {
        let list = self.insert(NodeKind::List(kind));
        for element in elements {
            self.append_child(list, element)?;
        }
        Ok(list)
    }

    fn ensure_list(&self, id: NodeId) -> Result<(), BfnError> {
        match self.kind(id)? {
            NodeKind::List(_) => Ok(()),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "list",
            }),
        }
    }

    /// Discards every element of `list` and installs `elements` instead.
    pub fn replace_elements(&mut self, list: NodeId, elements: Vec<NodeId>) -> Result<(), BfnError> {
        self.ensure_list(list)?;
        self.ensure_attached(list)?;
        self.transact(|tree| {
            let old = std::mem::take(&mut tree.node_mut(list)?.children);
            for child in old {
                tree.remove_subtree(child)?;
            }
            for element in elements {
                tree.append_child(list, element)?;
            }
            tree.update_subtree(list)?;
            tree.propagate(list)
        })
    }

    /// Adds one element at the tail of `list`.
    pub fn append_element(&mut self, list: NodeId, element: NodeId) -> Result<(), BfnError> {
        self.ensure_list(list)?;
        self.ensure_attached(list)?;
        self.transact(|tree| {
            tree.append_child(list, element)?;
            tree.update_subtree(element)?;
            tree.propagate(list)
        })
    }

    //--- Lengths

    /// Overwrites a length with an explicit value.
    ///
    /// The value stays until a dependency of the length changes again.
    pub fn set_length(&mut self, id: NodeId, value: u64) -> Result<(), BfnError> {
        self.set_leaf(id, |id, kind| match kind {
            NodeKind::Length(length) => {
                codec::check_range(value, length.width)?;
                length.value = value;
                Ok(())
            }
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "length",
            }),
        })
    }

    pub fn length(&self, id: NodeId) -> Result<&Length, BfnError> {
        match self.kind(id)? {
            NodeKind::Length(length) => Ok(length),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "length",
            }),
        }
    }
}
