//! AS_PATH: AS numbers, path segments and the segment-partitioning factory.

use crate::attribute::{MAX_SHORT_LENGTH, PathAttributeType};
use crate::codec;
use crate::error::BfnError;
use crate::node::{Aggregate, BfnTree, ElementKind, LeafField, Length, NodeId, NodeKind};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// Most AS numbers a single segment can count in its one-byte length.
pub const MAX_SEGMENT_ASNS: usize = 255;

/// Encoded size of an AS number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum AsnWidth {
    Two,
    #[default]
    Four,
}

impl AsnWidth {
    pub fn bytes(self) -> usize {
        match self {
            AsnWidth::Two => 2,
            AsnWidth::Four => 4,
        }
    }

    pub fn max(self) -> u32 {
        match self {
            AsnWidth::Two => u32::from(u16::MAX),
            AsnWidth::Four => u32::MAX,
        }
    }
}

impl TryFrom<u8> for AsnWidth {
    type Error = BfnError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(AsnWidth::Two),
            4 => Ok(AsnWidth::Four),
            other => Err(BfnError::InvalidWidth {
                expected: 4,
                actual: usize::from(other),
            }),
        }
    }
}

/// An AS number with its encoded width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asn {
    value: u32,
    width: AsnWidth,
}

impl Asn {
    pub fn new(value: u32, width: AsnWidth) -> Result<Self, BfnError> {
        codec::check_range(u64::from(value), width.bytes())?;
        Ok(Self { value, width })
    }

    pub fn two(value: u16) -> Self {
        Self {
            value: u32::from(value),
            width: AsnWidth::Two,
        }
    }

    pub fn four(value: u32) -> Self {
        Self {
            value,
            width: AsnWidth::Four,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> AsnWidth {
        self.width
    }
}

impl LeafField for Asn {
    fn encoded_len(&self) -> usize {
        self.width.bytes()
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self.width {
            AsnWidth::Two => out.extend_from_slice(&(self.value as u16).to_be_bytes()),
            AsnWidth::Four => out.extend_from_slice(&self.value.to_be_bytes()),
        }
    }
}

/// AS_PATH segment types as defined in RFC 4271 and RFC 5065.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    Set,
    Sequence,
    ConfedSequence,
    ConfedSet,
}

impl SegmentType {
    pub const ALL: [SegmentType; 4] = [
        SegmentType::Set,
        SegmentType::Sequence,
        SegmentType::ConfedSequence,
        SegmentType::ConfedSet,
    ];
}

impl From<SegmentType> for u8 {
    fn from(value: SegmentType) -> u8 {
        match value {
            SegmentType::Set => 1,
            SegmentType::Sequence => 2,
            SegmentType::ConfedSequence => 3,
            SegmentType::ConfedSet => 4,
        }
    }
}

impl TryFrom<u8> for SegmentType {
    type Error = BfnError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SegmentType::Set),
            2 => Ok(SegmentType::Sequence),
            3 => Ok(SegmentType::ConfedSequence),
            4 => Ok(SegmentType::ConfedSet),
            other => Err(BfnError::InvalidInput(format!(
                "unknown segment type {other}"
            ))),
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            SegmentType::Set => "AS_SET",
            SegmentType::Sequence => "AS_SEQUENCE",
            SegmentType::ConfedSequence => "AS_CONFED_SEQUENCE",
            SegmentType::ConfedSet => "AS_CONFED_SET",
        })
    }
}

impl LeafField for SegmentType {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

/// One segment of factory input. An ordered list becomes an AS_SEQUENCE, a
/// `{ set = [..] }` table an AS_SET in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SegmentSpec {
    Sequence(Vec<u32>),
    Set { set: BTreeSet<u32> },
}

impl SegmentSpec {
    pub fn segment_type(&self) -> SegmentType {
        match self {
            SegmentSpec::Sequence(_) => SegmentType::Sequence,
            SegmentSpec::Set { .. } => SegmentType::Set,
        }
    }

    pub fn asns(&self) -> Vec<u32> {
        match self {
            SegmentSpec::Sequence(asns) => asns.clone(),
            SegmentSpec::Set { set } => set.iter().copied().collect(),
        }
    }
}

/// Factory input: one segment, or several in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AsPathSpec {
    Segment(SegmentSpec),
    Segments(Vec<SegmentSpec>),
}

impl AsPathSpec {
    /// Parses loosely typed configuration data.
    ///
    /// Anything that is neither a list of AS numbers, a set table, nor a list
    /// of those is an [`BfnError::InvalidInput`].
    pub fn from_value(value: toml::Value) -> Result<Self, BfnError> {
        value.try_into().map_err(|e: toml::de::Error| {
            BfnError::InvalidInput(format!(
                "AS path must be a list/set or a list of lists/sets: {}",
                e.message()
            ))
        })
    }

    pub fn segments(&self) -> &[SegmentSpec] {
        match self {
            AsPathSpec::Segment(segment) => std::slice::from_ref(segment),
            AsPathSpec::Segments(segments) => segments,
        }
    }
}

/// Knobs for the AS_PATH factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsPathOptions {
    pub asn_width: AsnWidth,
    /// Split segments longer than [`MAX_SEGMENT_ASNS`].
    pub partition_segments: bool,
}

impl Default for AsPathOptions {
    fn default() -> Self {
        Self {
            asn_width: AsnWidth::Four,
            partition_segments: true,
        }
    }
}

/// Cuts `items` into chunks of at most `chunk` elements, counting from the
/// tail, and returns them head to tail.
///
/// `split_from_end(0..600, 255)` yields chunks of 90, 255 and 255 elements.
/// An empty input yields no chunk at all. A `chunk` of zero is rejected.
pub fn split_from_end<T: Clone>(items: &[T], chunk: usize) -> Result<Vec<Vec<T>>, BfnError> {
    if chunk == 0 {
        return Err(BfnError::InvalidInput("chunk size must be at least 1".to_string()));
    }
    let mut chunks = Vec::new();
    let mut end = items.len();
    while end > 0 {
        let start = end.saturating_sub(chunk);
        chunks.push(items[start..end].to_vec());
        end = start;
    }
    chunks.reverse();
    Ok(chunks)
}

impl BfnTree {
    fn build_asns(&mut self, asns: &[u32], width: AsnWidth) -> Result<Vec<NodeId>, BfnError> {
        let values = asns
            .iter()
            .map(|asn| Asn::new(*asn, width))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values
            .into_iter()
            .map(|asn| self.insert(NodeKind::Asn(asn)))
            .collect())
    }

    /// Builds a detached path segment: type, AS count, AS numbers.
    pub fn new_path_segment(
        &mut self,
        segment_type: SegmentType,
        asns: &[u32],
        width: AsnWidth,
    ) -> Result<NodeId, BfnError> {
        let elements = self.build_asns(asns, width)?;
        let value = self.new_list(ElementKind::Asn(width), elements)?;
        let type_node = self.insert(NodeKind::SegmentType(segment_type));
        let length = self.insert(NodeKind::Length(Length::new(1, Aggregate::ElementCount)?));

        let segment = self.insert(NodeKind::PathSegment(width));
        self.append_child(segment, type_node)?;
        self.append_child(segment, length)?;
        self.append_child(segment, value)?;
        self.declare_child_dependency(segment, length, value)?;
        Ok(segment)
    }

    /// Builds the detached AS_PATH value: one path segment per input segment,
    /// or per chunk when partitioning. Segments keep the order they were given
    /// in.
    pub fn new_as_path(
        &mut self,
        spec: &AsPathSpec,
        options: &AsPathOptions,
    ) -> Result<NodeId, BfnError> {
        let mut segments = Vec::new();
        for segment in spec.segments() {
            let asns = segment.asns();
            let chunks = if options.partition_segments {
                split_from_end(&asns, MAX_SEGMENT_ASNS)?
            } else {
                vec![asns]
            };
            if chunks.len() > 1 {
                debug!(
                    "partitioned {} segment of {} ASNs into {} segments",
                    segment.segment_type(),
                    segment.asns().len(),
                    chunks.len()
                );
            }
            for chunk in chunks {
                segments.push(self.new_path_segment(
                    segment.segment_type(),
                    &chunk,
                    options.asn_width,
                )?);
            }
        }
        self.new_list(ElementKind::PathSegment(options.asn_width), segments)
    }

    /// Builds a detached AS_PATH attribute. The extended-length flag is set
    /// when the value is longer than 255 bytes.
    pub fn new_as_path_attribute(
        &mut self,
        spec: &AsPathSpec,
        options: &AsPathOptions,
    ) -> Result<NodeId, BfnError> {
        let value = self.new_as_path(spec, options)?;
        let extended = self.byte_len(value)? > MAX_SHORT_LENGTH;
        self.new_attribute(PathAttributeType::AsPath, extended, value)
    }

    pub fn set_asn(&mut self, id: NodeId, value: u32) -> Result<(), BfnError> {
        self.set_leaf(id, |id, kind| match kind {
            NodeKind::Asn(asn) => {
                *asn = Asn::new(value, asn.width())?;
                Ok(())
            }
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "asn",
            }),
        })
    }

    pub fn set_segment_type(
        &mut self,
        id: NodeId,
        segment_type: SegmentType,
    ) -> Result<(), BfnError> {
        self.set_leaf(id, |id, kind| match kind {
            NodeKind::SegmentType(current) => {
                *current = segment_type;
                Ok(())
            }
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "segment-type",
            }),
        })
    }

    pub fn set_path_segment_type(
        &mut self,
        segment: NodeId,
        segment_type: SegmentType,
    ) -> Result<(), BfnError> {
        let type_node = self.child_at(segment, 0, "path-segment")?;
        self.set_segment_type(type_node, segment_type)
    }

    /// Forces the AS count of a segment, regardless of its content.
    pub fn set_path_segment_length(&mut self, segment: NodeId, count: u64) -> Result<(), BfnError> {
        let length = self.child_at(segment, 1, "path-segment")?;
        self.set_length(length, count)
    }

    pub fn set_path_segment_value(&mut self, segment: NodeId, asns: &[u32]) -> Result<(), BfnError> {
        let list = self.child_at(segment, 2, "path-segment")?;
        let NodeKind::PathSegment(width) = *self.kind(segment)? else {
            return Err(BfnError::WrongKind {
                node: segment,
                expected: "path-segment",
            });
        };
        let elements = self.build_asns(asns, width)?;
        if let Err(e) = self.replace_elements(list, elements.clone()) {
            for element in elements {
                self.discard(element)?;
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn append_as_to_path_segment(&mut self, segment: NodeId, asn: u32) -> Result<(), BfnError> {
        let list = self.child_at(segment, 2, "path-segment")?;
        let NodeKind::PathSegment(width) = *self.kind(segment)? else {
            return Err(BfnError::WrongKind {
                node: segment,
                expected: "path-segment",
            });
        };
        let element = self.insert(NodeKind::Asn(Asn::new(asn, width)?));
        if let Err(e) = self.append_element(list, element) {
            self.discard(element)?;
            return Err(e);
        }
        Ok(())
    }

    /// Appends a detached path segment to an AS_PATH attribute.
    pub fn append_as_path_segment(&mut self, attribute: NodeId, segment: NodeId) -> Result<(), BfnError> {
        let value = self.attribute_parts(attribute)?.value;
        self.append_element(value, segment)
    }

    /// Replaces every segment of an AS_PATH attribute.
    pub fn set_as_path_segments(
        &mut self,
        attribute: NodeId,
        segments: Vec<NodeId>,
    ) -> Result<(), BfnError> {
        let value = self.attribute_parts(attribute)?.value;
        self.replace_elements(value, segments)
    }

    pub fn asn(&self, id: NodeId) -> Result<Asn, BfnError> {
        match self.kind(id)? {
            NodeKind::Asn(asn) => Ok(*asn),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "asn",
            }),
        }
    }
}

/// A path segment read back from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSegment {
    pub segment_type: u8,
    pub count: u8,
    pub asns: Vec<u32>,
}

/// Parses an AS_PATH value. Each segment carries `count` AS numbers of
/// `width` bytes.
pub fn decode_as_path(value: &[u8], width: AsnWidth) -> Result<Vec<DecodedSegment>, BfnError> {
    let mut segments = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        if rest.len() < 2 {
            return Err(BfnError::InvalidWidth {
                expected: 2,
                actual: rest.len(),
            });
        }
        let (segment_type, count) = (rest[0], rest[1]);
        let body_len = usize::from(count) * width.bytes();
        let body = rest.get(2..2 + body_len).ok_or(BfnError::InvalidWidth {
            expected: body_len,
            actual: rest.len() - 2,
        })?;
        let asns = body
            .chunks_exact(width.bytes())
            .map(|chunk| codec::decode_uint(chunk).map(|v| v as u32))
            .collect::<Result<Vec<_>, _>>()?;
        segments.push(DecodedSegment {
            segment_type,
            count,
            asns,
        });
        rest = &rest[2 + body_len..];
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{EXTENDED_LEN, decode_attribute};
    use proptest::prelude::*;

    fn sequence(range: std::ops::Range<u32>) -> AsPathSpec {
        AsPathSpec::Segment(SegmentSpec::Sequence(range.collect()))
    }

    fn attached_as_path(tree: &mut BfnTree, spec: &AsPathSpec, options: &AsPathOptions) -> NodeId {
        let attribute = tree.new_as_path_attribute(spec, options).unwrap();
        tree.attach(attribute).unwrap();
        attribute
    }

    #[test]
    fn split_from_end_chunks_from_the_tail() {
        let items: Vec<u32> = (0..600).collect();
        let chunks = split_from_end(&items, 255).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![90, 255, 255]);
        assert_eq!(chunks.concat(), items);
        assert!(split_from_end::<u32>(&[], 255).unwrap().is_empty());
        assert_eq!(split_from_end(&[1, 2], 255).unwrap(), vec![vec![1, 2]]);
    }

    #[test]
    fn split_from_end_rejects_a_zero_chunk() {
        assert!(matches!(
            split_from_end(&[1, 2, 3], 0),
            Err(BfnError::InvalidInput(_))
        ));
        assert!(matches!(
            split_from_end::<u32>(&[], 0),
            Err(BfnError::InvalidInput(_))
        ));
    }

    #[test]
    fn long_sequence_is_partitioned_into_three_segments() {
        let mut tree = BfnTree::new();
        let attribute = attached_as_path(&mut tree, &sequence(0..600), &AsPathOptions::default());
        let bytes = tree.serialize(attribute).unwrap();

        let (raw, consumed) = decode_attribute(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(raw.flags & EXTENDED_LEN, EXTENDED_LEN);
        assert_eq!(raw.length, 3 * 2 + 600 * 4);

        let segments = decode_as_path(raw.value, AsnWidth::Four).unwrap();
        let sizes: Vec<usize> = segments.iter().map(|s| s.asns.len()).collect();
        assert_eq!(sizes, vec![90, 255, 255]);
        assert!(segments.iter().all(|s| s.segment_type == 2));
        assert!(segments.iter().all(|s| usize::from(s.count) == s.asns.len()));
        let flattened: Vec<u32> = segments.into_iter().flat_map(|s| s.asns).collect();
        assert_eq!(flattened, (0..600).collect::<Vec<u32>>());
    }

    #[test]
    fn unpartitioned_long_segment_cannot_be_attached() {
        let mut tree = BfnTree::new();
        let options = AsPathOptions {
            partition_segments: false,
            ..AsPathOptions::default()
        };
        let attribute = tree.new_as_path_attribute(&sequence(0..256), &options).unwrap();
        assert_eq!(
            tree.attach(attribute),
            Err(BfnError::OutOfRange {
                value: 256,
                width: 1
            })
        );
        assert!(!tree.is_attached(attribute).unwrap());
    }

    #[test]
    fn segments_keep_their_supplied_order() {
        let mut tree = BfnTree::new();
        let spec = AsPathSpec::Segments(vec![
            SegmentSpec::Sequence(vec![65003, 65002]),
            SegmentSpec::Set {
                set: BTreeSet::from([64513, 64512]),
            },
        ]);
        let attribute = attached_as_path(&mut tree, &spec, &AsPathOptions::default());
        let bytes = tree.serialize(attribute).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x40, 2, 20, // flags, AS_PATH, length
                2, 2, 0, 0, 0xFD, 0xEB, 0, 0, 0xFD, 0xEA, // AS_SEQUENCE
                1, 2, 0, 0, 0xFC, 0x00, 0, 0, 0xFC, 0x01, // AS_SET, ascending
            ]
        );
    }

    #[test]
    fn two_byte_asns_are_range_checked() {
        let mut tree = BfnTree::new();
        let options = AsPathOptions {
            asn_width: AsnWidth::Two,
            ..AsPathOptions::default()
        };
        assert!(matches!(
            tree.new_as_path_attribute(&sequence(65535..65537), &options),
            Err(BfnError::OutOfRange { value: 65536, width: 2 })
        ));

        let attribute = attached_as_path(&mut tree, &sequence(1..3), &options);
        assert_eq!(
            tree.serialize(attribute).unwrap(),
            vec![0x40, 2, 6, 2, 2, 0, 1, 0, 2]
        );
    }

    #[test]
    fn segment_setters_keep_lengths_consistent() {
        let mut tree = BfnTree::new();
        let attribute = attached_as_path(&mut tree, &sequence(1..3), &AsPathOptions::default());
        let value = tree.attribute_parts(attribute).unwrap().value;
        let segment = tree.children(value).unwrap()[0];

        tree.append_as_to_path_segment(segment, 3).unwrap();
        tree.set_path_segment_type(segment, SegmentType::ConfedSet).unwrap();
        let bytes = tree.serialize(attribute).unwrap();
        assert_eq!(&bytes[..5], &[0x40, 2, 14, 4, 3]);

        tree.set_path_segment_value(segment, &[7]).unwrap();
        let bytes = tree.serialize(attribute).unwrap();
        assert_eq!(bytes, vec![0x40, 2, 6, 4, 1, 0, 0, 0, 7]);

        let extra = tree
            .new_path_segment(SegmentType::Set, &[9, 10], AsnWidth::Four)
            .unwrap();
        tree.append_as_path_segment(attribute, extra).unwrap();
        let wire = tree.serialize(attribute).unwrap();
        let (raw, _) = decode_attribute(&wire).unwrap();
        assert_eq!(raw.length, 6 + 10);

        let replacement = tree
            .new_path_segment(SegmentType::Sequence, &[], AsnWidth::Four)
            .unwrap();
        tree.set_as_path_segments(attribute, vec![replacement]).unwrap();
        assert_eq!(
            tree.serialize(attribute).unwrap(),
            vec![0x40, 2, 2, 2, 0]
        );
    }

    #[test]
    fn full_segment_rejects_another_asn() {
        let mut tree = BfnTree::new();
        let attribute = attached_as_path(&mut tree, &sequence(0..255), &AsPathOptions::default());
        let value = tree.attribute_parts(attribute).unwrap().value;
        let segment = tree.children(value).unwrap()[0];
        let before = tree.serialize(attribute).unwrap();
        let live = tree.len();

        assert_eq!(
            tree.append_as_to_path_segment(segment, 1),
            Err(BfnError::OutOfRange {
                value: 256,
                width: 1
            })
        );
        assert_eq!(tree.serialize(attribute).unwrap(), before);
        assert_eq!(tree.len(), live);
    }

    #[test]
    fn segment_setters_reject_other_node_kinds() {
        let mut tree = BfnTree::new();
        let attribute = attached_as_path(&mut tree, &sequence(1..3), &AsPathOptions::default());
        let before = tree.serialize(attribute).unwrap();
        let live = tree.len();

        let wrong_kind = Err(BfnError::WrongKind {
            node: attribute,
            expected: "path-segment",
        });
        assert_eq!(tree.set_path_segment_value(attribute, &[7]), wrong_kind);
        assert_eq!(tree.append_as_to_path_segment(attribute, 7), wrong_kind);
        assert_eq!(tree.serialize(attribute).unwrap(), before);
        assert_eq!(tree.len(), live);
    }

    #[test]
    fn spec_parsing_reports_type_errors() {
        let single: toml::Value = toml::from_str::<toml::Table>("p = [1, 2, 3]").unwrap()["p"].clone();
        assert_eq!(
            AsPathSpec::from_value(single).unwrap(),
            AsPathSpec::Segment(SegmentSpec::Sequence(vec![1, 2, 3]))
        );

        let nested: toml::Value =
            toml::from_str::<toml::Table>("p = [[1], { set = [3, 2] }]").unwrap()["p"].clone();
        let spec = AsPathSpec::from_value(nested).unwrap();
        assert_eq!(spec.segments().len(), 2);
        assert_eq!(spec.segments()[1].asns(), vec![2, 3]);
        assert_eq!(spec.segments()[1].segment_type(), SegmentType::Set);

        let bogus: toml::Value = toml::Value::String("65001".into());
        assert!(matches!(
            AsPathSpec::from_value(bogus),
            Err(BfnError::InvalidInput(_))
        ));
    }

    fn segment_strategy() -> impl Strategy<Value = (bool, Vec<u32>)> {
        let asns = prop_oneof![
            4 => prop::collection::vec(any::<u32>(), 1..20),
            1 => prop::collection::vec(any::<u32>(), 256..600),
        ];
        (any::<bool>(), asns)
    }

    proptest! {
        #[test]
        fn factory_output_decodes_to_its_input(
            segments in prop::collection::vec(segment_strategy(), 0..4),
            two_byte in any::<bool>(),
        ) {
            let width = if two_byte { AsnWidth::Two } else { AsnWidth::Four };
            let specs: Vec<SegmentSpec> = segments
                .iter()
                .map(|(is_set, asns)| {
                    let asns = asns
                        .iter()
                        .map(|asn| if two_byte { asn & 0xFFFF } else { *asn });
                    if *is_set {
                        SegmentSpec::Set { set: asns.collect() }
                    } else {
                        SegmentSpec::Sequence(asns.collect())
                    }
                })
                .collect();
            let expected: Vec<(u8, Vec<u32>)> = specs
                .iter()
                .flat_map(|spec| {
                    let code = u8::from(spec.segment_type());
                    split_from_end(&spec.asns(), MAX_SEGMENT_ASNS)
                        .unwrap()
                        .into_iter()
                        .map(move |chunk| (code, chunk))
                })
                .collect();

            let mut tree = BfnTree::new();
            let options = AsPathOptions {
                asn_width: width,
                partition_segments: true,
            };
            let attribute = attached_as_path(&mut tree, &AsPathSpec::Segments(specs), &options);

            let bytes = tree.serialize(attribute).unwrap();
            let (raw, consumed) = decode_attribute(&bytes).unwrap();
            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!((raw.flags & !EXTENDED_LEN, raw.code), (0x40, 2));
            prop_assert_eq!(raw.flags & EXTENDED_LEN != 0, raw.value.len() > 255);
            prop_assert_eq!(raw.length, tree.byte_len(tree.attribute_parts(attribute).unwrap().value).unwrap());
            let decoded: Vec<(u8, Vec<u32>)> = decode_as_path(raw.value, width)
                .unwrap()
                .into_iter()
                .map(|segment| {
                    assert_eq!(usize::from(segment.count), segment.asns.len());
                    (segment.segment_type, segment.asns)
                })
                .collect();
            prop_assert_eq!(decoded, expected);
        }
    }
}
