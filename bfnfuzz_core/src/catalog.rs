//! Mutation catalogs.
//!
//! Every node kind draws from a static list of tagged operators. A kind's
//! catalog is the concatenation of the layers it inherits from and its own
//! additions; for example a segment length gets every generic length operator
//! plus one that reports bytes instead of AS numbers. Each operator pairs a
//! generator, which draws a candidate value, with the setter that applies it.

use crate::as_path::{Asn, AsnWidth, SegmentType};
use crate::attribute::EXTENDED_LEN;
use crate::codec;
use crate::communities::{COMMUNITY_LEN, Community, WellKnownCommunity};
use crate::error::BfnError;
use crate::node::{Aggregate, BfnTree, ElementKind, NodeId, NodeKind};
use log::{debug, trace};
use rand::distr::{Distribution, weighted::WeightedIndex};
use rand::{Rng, RngCore};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Weight of an operator nobody configured.
pub const DEFAULT_OPERATOR_WEIGHT: u32 = 1;
/// Upper bound on the number of elements a list replacement generates.
pub const MAX_GENERATED_ELEMENTS: usize = 8;
/// Upper bound on the AS count of a generated path segment.
pub const MAX_GENERATED_SEGMENT_ASNS: usize = 8;

/// AS numbers that sit on interesting boundaries: reserved, AS_TRANS,
/// private-use ranges, and the ends of the 2- and 4-byte spaces.
const BOUNDARY_ASNS: &[u32] = &[
    0,
    1,
    23456,
    64495,
    64496,
    64511,
    64512,
    65534,
    65535,
    65536,
    4_199_999_999,
    4_200_000_000,
    4_294_967_294,
    4_294_967_295,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorId {
    RandomAsn,
    BoundaryAsn,
    RandomSegmentType,
    RandomLength,
    OffByOneLength,
    LengthAsByteCount,
    LengthAsElementCount,
    RandomFlags,
    RandomCommunityAsn,
    RandomCommunityOperation,
    WellKnownCommunity,
    RandomCommunityBytes,
    AppendRandomElement,
    ReplaceRandomElements,
}

/// Free-standing description of a list element, turned into nodes by
/// [`BfnTree::build_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementSpec {
    Asn(Asn),
    Community(Community),
    PathSegment {
        segment_type: SegmentType,
        asns: Vec<u32>,
        width: AsnWidth,
    },
}

fn random_asn_value(width: AsnWidth, rng: &mut dyn RngCore) -> u32 {
    match width {
        AsnWidth::Two => u32::from(rng.random::<u16>()),
        AsnWidth::Four => rng.random::<u32>(),
    }
}

impl ElementSpec {
    pub fn random(kind: ElementKind, rng: &mut dyn RngCore) -> Self {
        match kind {
            ElementKind::Asn(width) => {
                let value = random_asn_value(width, rng);
                match width {
                    AsnWidth::Two => ElementSpec::Asn(Asn::two(value as u16)),
                    AsnWidth::Four => ElementSpec::Asn(Asn::four(value)),
                }
            }
            ElementKind::Community => {
                ElementSpec::Community(Community::new(rng.random(), rng.random()))
            }
            ElementKind::PathSegment(width) => {
                let count = rng.random_range(1..=MAX_GENERATED_SEGMENT_ASNS);
                ElementSpec::PathSegment {
                    segment_type: SegmentType::ALL[rng.random_range(0..SegmentType::ALL.len())],
                    asns: (0..count).map(|_| random_asn_value(width, rng)).collect(),
                    width,
                }
            }
        }
    }
}

/// A candidate produced by a generator and consumed by its setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationValue {
    Asn(u32),
    SegmentType(SegmentType),
    Length(u64),
    Flags(u8),
    CommunityAsn(u16),
    CommunityOperation(u16),
    WellKnown(WellKnownCommunity),
    Bytes(Vec<u8>),
    Element(ElementSpec),
    Elements(Vec<ElementSpec>),
}

pub type Generator = fn(&BfnTree, NodeId, &mut dyn RngCore) -> Result<MutationValue, BfnError>;
pub type Setter = fn(&mut BfnTree, NodeId, MutationValue) -> Result<(), BfnError>;

#[derive(Debug, Clone, Copy)]
pub struct MutationOperator {
    pub id: OperatorId,
    pub generate: Generator,
    pub apply: Setter,
    pub weight: u32,
}

const fn operator(id: OperatorId, generate: Generator, apply: Setter) -> MutationOperator {
    MutationOperator {
        id,
        generate,
        apply,
        weight: DEFAULT_OPERATOR_WEIGHT,
    }
}

fn unexpected(value: MutationValue) -> BfnError {
    BfnError::InvalidInput(format!("unexpected mutation value {value:?}"))
}

//--- Generators

fn gen_random_asn(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let width = tree.asn(id)?.width();
    Ok(MutationValue::Asn(random_asn_value(width, rng)))
}

fn gen_boundary_asn(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let max = tree.asn(id)?.width().max();
    let candidates: Vec<u32> = BOUNDARY_ASNS.iter().copied().filter(|asn| *asn <= max).collect();
    Ok(MutationValue::Asn(candidates[rng.random_range(0..candidates.len())]))
}

fn gen_segment_type(_: &BfnTree, _: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let index = rng.random_range(0..SegmentType::ALL.len());
    Ok(MutationValue::SegmentType(SegmentType::ALL[index]))
}

fn gen_random_length(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let width = tree.length(id)?.width();
    Ok(MutationValue::Length(
        rng.random_range(0..=codec::max_for_width(width)),
    ))
}

fn gen_off_by_one_length(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let length = tree.length(id)?;
    let max = codec::max_for_width(length.width());
    let value = match length.value() {
        0 => 1,
        v if v == max => v - 1,
        v if rng.random_bool(0.5) => v + 1,
        v => v - 1,
    };
    Ok(MutationValue::Length(value))
}

fn measured(tree: &BfnTree, id: NodeId, aggregate: Aggregate) -> Result<u64, BfnError> {
    let length = tree.length(id)?;
    let mut total = if length.includes_self() {
        length.width() as u64
    } else {
        0
    };
    for dependency in tree.dependencies(id)? {
        total += match aggregate {
            Aggregate::ByteLength => tree.byte_len(*dependency)? as u64,
            Aggregate::ElementCount => tree.element_count(*dependency)? as u64,
        };
    }
    Ok(total)
}

fn gen_length_as_byte_count(tree: &BfnTree, id: NodeId, _: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    Ok(MutationValue::Length(measured(tree, id, Aggregate::ByteLength)?))
}

fn gen_length_as_element_count(tree: &BfnTree, id: NodeId, _: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    Ok(MutationValue::Length(measured(tree, id, Aggregate::ElementCount)?))
}

fn gen_random_flags(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let current = tree.attr_type(id)?.flags();
    Ok(MutationValue::Flags(
        (rng.random::<u8>() & !EXTENDED_LEN) | (current & EXTENDED_LEN),
    ))
}

fn gen_community_asn(_: &BfnTree, _: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    Ok(MutationValue::CommunityAsn(rng.random()))
}

fn gen_community_operation(_: &BfnTree, _: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    Ok(MutationValue::CommunityOperation(rng.random()))
}

fn gen_well_known(_: &BfnTree, _: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let index = rng.random_range(0..WellKnownCommunity::ALL.len());
    Ok(MutationValue::WellKnown(WellKnownCommunity::ALL[index]))
}

fn gen_community_bytes(_: &BfnTree, _: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let mut bytes = vec![0u8; COMMUNITY_LEN];
    rng.fill_bytes(&mut bytes);
    Ok(MutationValue::Bytes(bytes))
}

fn list_kind(tree: &BfnTree, id: NodeId) -> Result<ElementKind, BfnError> {
    match tree.kind(id)? {
        NodeKind::List(kind) => Ok(*kind),
        _ => Err(BfnError::WrongKind {
            node: id,
            expected: "list",
        }),
    }
}

fn gen_element(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let kind = list_kind(tree, id)?;
    Ok(MutationValue::Element(ElementSpec::random(kind, rng)))
}

fn gen_elements(tree: &BfnTree, id: NodeId, rng: &mut dyn RngCore) -> Result<MutationValue, BfnError> {
    let kind = list_kind(tree, id)?;
    let count = rng.random_range(0..=MAX_GENERATED_ELEMENTS);
    Ok(MutationValue::Elements(
        (0..count).map(|_| ElementSpec::random(kind, rng)).collect(),
    ))
}

//--- Setters

fn apply_asn(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::Asn(asn) => tree.set_asn(id, asn),
        other => Err(unexpected(other)),
    }
}

fn apply_segment_type(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::SegmentType(segment_type) => tree.set_segment_type(id, segment_type),
        other => Err(unexpected(other)),
    }
}

fn apply_length(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::Length(length) => tree.set_length(id, length),
        other => Err(unexpected(other)),
    }
}

fn apply_flags(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::Flags(flags) => tree.set_attr_flags(id, flags),
        other => Err(unexpected(other)),
    }
}

fn apply_community_asn(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::CommunityAsn(asn) => tree.set_community_asn(id, asn),
        other => Err(unexpected(other)),
    }
}

fn apply_community_operation(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::CommunityOperation(operation) => tree.set_community_operation(id, operation),
        other => Err(unexpected(other)),
    }
}

fn apply_well_known(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::WellKnown(well_known) => tree.set_well_known_community(id, well_known),
        other => Err(unexpected(other)),
    }
}

fn apply_community_bytes(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    match value {
        MutationValue::Bytes(bytes) => tree.set_community_bytes(id, &bytes),
        other => Err(unexpected(other)),
    }
}

fn apply_element(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    let MutationValue::Element(spec) = value else {
        return Err(unexpected(value));
    };
    let element = tree.build_element(&spec)?;
    if let Err(e) = tree.append_element(id, element) {
        tree.discard(element)?;
        return Err(e);
    }
    Ok(())
}

fn apply_elements(tree: &mut BfnTree, id: NodeId, value: MutationValue) -> Result<(), BfnError> {
    let MutationValue::Elements(specs) = value else {
        return Err(unexpected(value));
    };
    let elements = specs
        .iter()
        .map(|spec| tree.build_element(spec))
        .collect::<Result<Vec<_>, _>>()?;
    if let Err(e) = tree.replace_elements(id, elements.clone()) {
        for element in elements {
            tree.discard(element)?;
        }
        return Err(e);
    }
    Ok(())
}

//--- Catalogs

const ASN_OPERATORS: &[MutationOperator] = &[
    operator(OperatorId::RandomAsn, gen_random_asn, apply_asn),
    operator(OperatorId::BoundaryAsn, gen_boundary_asn, apply_asn),
];

const SEGMENT_TYPE_OPERATORS: &[MutationOperator] = &[operator(
    OperatorId::RandomSegmentType,
    gen_segment_type,
    apply_segment_type,
)];

const LENGTH_OPERATORS: &[MutationOperator] = &[
    operator(OperatorId::RandomLength, gen_random_length, apply_length),
    operator(OperatorId::OffByOneLength, gen_off_by_one_length, apply_length),
];

// Confuse the two ways of measuring: bytes where AS numbers are counted and
// the other way round.
const SEGMENT_LENGTH_OPERATORS: &[MutationOperator] = &[operator(
    OperatorId::LengthAsByteCount,
    gen_length_as_byte_count,
    apply_length,
)];

const ATTRIBUTE_LENGTH_OPERATORS: &[MutationOperator] = &[operator(
    OperatorId::LengthAsElementCount,
    gen_length_as_element_count,
    apply_length,
)];

const ATTR_TYPE_OPERATORS: &[MutationOperator] =
    &[operator(OperatorId::RandomFlags, gen_random_flags, apply_flags)];

const COMMUNITY_OPERATORS: &[MutationOperator] = &[
    operator(OperatorId::RandomCommunityAsn, gen_community_asn, apply_community_asn),
    operator(
        OperatorId::RandomCommunityOperation,
        gen_community_operation,
        apply_community_operation,
    ),
    operator(OperatorId::WellKnownCommunity, gen_well_known, apply_well_known),
    operator(
        OperatorId::RandomCommunityBytes,
        gen_community_bytes,
        apply_community_bytes,
    ),
];

const LIST_OPERATORS: &[MutationOperator] = &[
    operator(OperatorId::AppendRandomElement, gen_element, apply_element),
    operator(OperatorId::ReplaceRandomElements, gen_elements, apply_elements),
];

/// The operators available to a node of `kind`, inherited layers first.
pub fn catalog(kind: &NodeKind) -> Vec<&'static MutationOperator> {
    let layers: Vec<&'static [MutationOperator]> = match kind {
        NodeKind::Asn(_) => vec![ASN_OPERATORS],
        NodeKind::SegmentType(_) => vec![SEGMENT_TYPE_OPERATORS],
        NodeKind::Length(length) => match length.aggregate() {
            Aggregate::ByteLength => vec![LENGTH_OPERATORS, ATTRIBUTE_LENGTH_OPERATORS],
            Aggregate::ElementCount => vec![LENGTH_OPERATORS, SEGMENT_LENGTH_OPERATORS],
        },
        NodeKind::AttrType(_) => vec![ATTR_TYPE_OPERATORS],
        NodeKind::Community(_) => vec![COMMUNITY_OPERATORS],
        NodeKind::List(_) => vec![LIST_OPERATORS],
        NodeKind::PathSegment(_) | NodeKind::Attribute => Vec::new(),
    };
    layers.into_iter().flatten().collect()
}

/// Per-operator weight overrides, keyed by operator id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MutationWeights {
    overrides: BTreeMap<OperatorId, u32>,
}

impl MutationWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: OperatorId, weight: u32) -> &mut Self {
        self.overrides.insert(id, weight);
        self
    }

    pub fn weight(&self, operator: &MutationOperator) -> u32 {
        self.overrides
            .get(&operator.id)
            .copied()
            .unwrap_or(operator.weight)
    }
}

/// Which operator was applied to which node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedMutation {
    pub node: NodeId,
    pub operator: OperatorId,
}

impl BfnTree {
    /// Materializes an element description as detached nodes.
    pub fn build_element(&mut self, spec: &ElementSpec) -> Result<NodeId, BfnError> {
        match spec {
            ElementSpec::Asn(asn) => Ok(self.insert(NodeKind::Asn(*asn))),
            ElementSpec::Community(community) => Ok(self.insert(NodeKind::Community(*community))),
            ElementSpec::PathSegment {
                segment_type,
                asns,
                width,
            } => self.new_path_segment(*segment_type, asns, *width),
        }
    }

    /// Sum of the live weights of the operators available to `id`.
    pub fn catalog_weight(&self, id: NodeId) -> Result<u64, BfnError> {
        Ok(catalog(self.kind(id)?)
            .iter()
            .map(|op| u64::from(self.weights().weight(op)))
            .sum())
    }

    /// Draws one operator for `id` by weight, generates a candidate and
    /// applies it.
    pub fn mutate_node(
        &mut self,
        id: NodeId,
        rng: &mut dyn RngCore,
    ) -> Result<AppliedMutation, BfnError> {
        let operators = catalog(self.kind(id)?);
        let weights: Vec<u32> = operators
            .iter()
            .map(|op| self.weights().weight(op))
            .collect();
        let index = WeightedIndex::new(&weights).map_err(|_| BfnError::NoMutation(id))?;
        let operator = operators[index.sample(&mut *rng)];
        let value = (operator.generate)(self, id, rng)?;
        trace!("{id}: {:?} candidate {value:?}", operator.id);
        (operator.apply)(self, id, value)?;
        debug!("applied {:?} to {} {id}", operator.id, self.kind(id)?.name());
        Ok(AppliedMutation {
            node: id,
            operator: operator.id,
        })
    }

    /// Picks an attached node, weighted by its catalog, and mutates it.
    pub fn mutate_random(&mut self, rng: &mut dyn RngCore) -> Result<AppliedMutation, BfnError> {
        let mut candidates = Vec::new();
        for id in self.node_ids() {
            if self.is_attached(id)? {
                let weight = self.catalog_weight(id)?;
                if weight > 0 {
                    candidates.push((id, weight));
                }
            }
        }
        if candidates.is_empty() {
            return Err(BfnError::NothingToMutate);
        }
        let index = WeightedIndex::new(candidates.iter().map(|(_, weight)| *weight))
            .map_err(|_| BfnError::NothingToMutate)?;
        let (id, _) = candidates[index.sample(&mut *rng)];
        self.mutate_node(id, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::as_path::{AsPathOptions, AsPathSpec, SegmentSpec};
    use crate::node::Length;
    use proptest::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn ids(kind: &NodeKind) -> Vec<OperatorId> {
        catalog(kind).iter().map(|op| op.id).collect()
    }

    fn mixed_tree() -> (BfnTree, NodeId, NodeId) {
        let mut tree = BfnTree::new();
        let spec = AsPathSpec::Segments(vec![
            SegmentSpec::Sequence(vec![65001, 65002, 65003]),
            SegmentSpec::Set {
                set: [64512, 64513].into(),
            },
        ]);
        let as_path = tree
            .new_as_path_attribute(&spec, &AsPathOptions::default())
            .unwrap();
        tree.attach(as_path).unwrap();
        let communities = tree
            .new_communities_attribute(&[(65001, 1), (65002, 2)])
            .unwrap();
        tree.attach(communities).unwrap();
        (tree, as_path, communities)
    }

    /// Every length equals what its dependencies measure right now.
    fn assert_lengths_consistent(tree: &BfnTree) {
        for id in tree.node_ids() {
            if let NodeKind::Length(length) = tree.kind(id).unwrap() {
                let fresh = measured(tree, id, length.aggregate()).unwrap();
                assert_eq!(length.value(), fresh, "stale length {id}");
            }
        }
    }

    #[test]
    fn catalogs_inherit_the_generic_length_operators() {
        let segment_length = NodeKind::Length(Length::new(1, Aggregate::ElementCount).unwrap());
        assert_eq!(
            ids(&segment_length),
            vec![
                OperatorId::RandomLength,
                OperatorId::OffByOneLength,
                OperatorId::LengthAsByteCount
            ]
        );
        let attr_length = NodeKind::Length(Length::new(2, Aggregate::ByteLength).unwrap());
        assert_eq!(
            ids(&attr_length),
            vec![
                OperatorId::RandomLength,
                OperatorId::OffByOneLength,
                OperatorId::LengthAsElementCount
            ]
        );
        assert_eq!(
            ids(&NodeKind::SegmentType(SegmentType::Set)),
            vec![OperatorId::RandomSegmentType]
        );
        assert_eq!(ids(&NodeKind::Community(Community::new(0, 0))).len(), 4);
        assert!(ids(&NodeKind::Attribute).is_empty());
        assert!(ids(&NodeKind::PathSegment(AsnWidth::Four)).is_empty());
    }

    #[test]
    fn zero_weights_disable_a_node() {
        let (mut tree, as_path, _) = mixed_tree();
        let type_node = tree.attribute_parts(as_path).unwrap().type_node;
        tree.weights_mut().set(OperatorId::RandomFlags, 0);
        let mut rng = ChaCha8Rng::from_seed([3u8; 32]);

        assert_eq!(tree.catalog_weight(type_node).unwrap(), 0);
        assert_eq!(
            tree.mutate_node(type_node, &mut rng),
            Err(BfnError::NoMutation(type_node))
        );
        let value = tree.attribute_parts(as_path).unwrap().value;
        let segment = tree.children(value).unwrap()[0];
        assert_eq!(
            tree.mutate_node(segment, &mut rng),
            Err(BfnError::NoMutation(segment))
        );
    }

    #[test]
    fn overrides_steer_the_draw() {
        let (mut tree, _, communities) = mixed_tree();
        let value = tree.attribute_parts(communities).unwrap().value;
        let entry = tree.children(value).unwrap()[0];
        for op in [
            OperatorId::RandomCommunityAsn,
            OperatorId::RandomCommunityOperation,
            OperatorId::RandomCommunityBytes,
        ] {
            tree.weights_mut().set(op, 0);
        }
        let mut rng = ChaCha8Rng::from_seed([4u8; 32]);

        for _ in 0..20 {
            let applied = tree.mutate_node(entry, &mut rng).unwrap();
            assert_eq!(applied.operator, OperatorId::WellKnownCommunity);
            assert_eq!(tree.community(entry).unwrap().asn(), 0xFFFF);
        }
    }

    #[test]
    fn segment_type_draw_covers_all_four() {
        let (mut tree, as_path, _) = mixed_tree();
        let value = tree.attribute_parts(as_path).unwrap().value;
        let segment = tree.children(value).unwrap()[0];
        let type_node = tree.children(segment).unwrap()[0];
        let mut rng = ChaCha8Rng::from_seed([5u8; 32]);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            tree.mutate_node(type_node, &mut rng).unwrap();
            if let NodeKind::SegmentType(segment_type) = tree.kind(type_node).unwrap() {
                seen.insert(*segment_type);
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn random_mutations_never_leave_lengths_stale() {
        let (mut tree, as_path, communities) = mixed_tree();
        for op in [
            OperatorId::RandomLength,
            OperatorId::OffByOneLength,
            OperatorId::LengthAsByteCount,
            OperatorId::LengthAsElementCount,
        ] {
            tree.weights_mut().set(op, 0);
        }
        let mut rng = ChaCha8Rng::from_seed([6u8; 32]);

        let mut applied = 0;
        for _ in 0..500 {
            match tree.mutate_random(&mut rng) {
                Ok(_) => applied += 1,
                Err(e) => assert!(e.is_rejection(), "unexpected error {e}"),
            }
            assert_lengths_consistent(&tree);
        }
        assert!(applied > 250, "only {applied} mutations applied");
        for attribute in [as_path, communities] {
            let bytes = tree.serialize(attribute).unwrap();
            let (_, consumed) = crate::attribute::decode_attribute(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn explicit_length_mutations_break_lengths_on_purpose() {
        let (mut tree, as_path, _) = mixed_tree();
        let length = tree.attribute_parts(as_path).unwrap().length;
        let mut rng = ChaCha8Rng::from_seed([7u8; 32]);
        let honest = tree.length(length).unwrap().value();

        tree.weights_mut()
            .set(OperatorId::RandomLength, 0)
            .set(OperatorId::LengthAsElementCount, 0);
        let applied = tree.mutate_node(length, &mut rng).unwrap();
        assert_eq!(applied.operator, OperatorId::OffByOneLength);
        assert_eq!(
            tree.length(length).unwrap().value().abs_diff(honest),
            1
        );
    }

    #[test]
    fn empty_arena_has_nothing_to_mutate() {
        let mut tree = BfnTree::new();
        let mut rng = ChaCha8Rng::from_seed([8u8; 32]);
        assert_eq!(tree.mutate_random(&mut rng), Err(BfnError::NothingToMutate));
    }

    #[test]
    fn weights_deserialize_from_kebab_case_keys() {
        let weights: MutationWeights =
            toml::from_str("random-asn = 5\nappend-random-element = 0").unwrap();
        let asn = &ASN_OPERATORS[0];
        let boundary = &ASN_OPERATORS[1];
        assert_eq!(weights.weight(asn), 5);
        assert_eq!(weights.weight(boundary), DEFAULT_OPERATOR_WEIGHT);
        assert_eq!(weights.weight(&LIST_OPERATORS[0]), 0);
    }

    proptest! {
        #[test]
        fn lengths_track_values_for_any_seed(seed in any::<u64>()) {
            let (mut tree, _, _) = mixed_tree();
            for op in [
                OperatorId::RandomLength,
                OperatorId::OffByOneLength,
                OperatorId::LengthAsByteCount,
                OperatorId::LengthAsElementCount,
            ] {
                tree.weights_mut().set(op, 0);
            }
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..50 {
                if let Err(e) = tree.mutate_random(&mut rng) {
                    prop_assert!(e.is_rejection());
                }
            }
            assert_lengths_consistent(&tree);
        }
    }
}
