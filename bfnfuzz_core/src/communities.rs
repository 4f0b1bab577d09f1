//! COMMUNITIES (RFC 1997): four-byte (ASN, operation) pairs.

use crate::attribute::{MAX_SHORT_LENGTH, PathAttributeType};
use crate::codec;
use crate::error::BfnError;
use crate::node::{BfnTree, ElementKind, LeafField, NodeId, NodeKind};

/// Encoded size of a single community.
pub const COMMUNITY_LEN: usize = 4;

/// A standard community: 16-bit ASN followed by a 16-bit operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Community {
    asn: u16,
    operation: u16,
}

impl Community {
    pub fn new(asn: u16, operation: u16) -> Self {
        Self { asn, operation }
    }

    /// Splits a 4-byte buffer into its ASN and operation halves.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BfnError> {
        if bytes.len() != COMMUNITY_LEN {
            return Err(BfnError::InvalidWidth {
                expected: COMMUNITY_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            asn: codec::decode_uint(&bytes[..2])? as u16,
            operation: codec::decode_uint(&bytes[2..])? as u16,
        })
    }

    pub fn to_bytes(self) -> [u8; COMMUNITY_LEN] {
        let [a0, a1] = self.asn.to_be_bytes();
        let [o0, o1] = self.operation.to_be_bytes();
        [a0, a1, o0, o1]
    }

    pub fn asn(&self) -> u16 {
        self.asn
    }

    pub fn operation(&self) -> u16 {
        self.operation
    }
}

impl LeafField for Community {
    fn encoded_len(&self) -> usize {
        COMMUNITY_LEN
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }
}

/// Well-known communities from RFC 1997.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownCommunity {
    NoExport,
    NoAdvertise,
    NoExportSubconfed,
}

impl WellKnownCommunity {
    pub const ALL: [WellKnownCommunity; 3] = [
        WellKnownCommunity::NoExport,
        WellKnownCommunity::NoAdvertise,
        WellKnownCommunity::NoExportSubconfed,
    ];

    pub fn bytes(self) -> [u8; COMMUNITY_LEN] {
        match self {
            WellKnownCommunity::NoExport => [0xFF, 0xFF, 0xFF, 0x01],
            WellKnownCommunity::NoAdvertise => [0xFF, 0xFF, 0xFF, 0x02],
            WellKnownCommunity::NoExportSubconfed => [0xFF, 0xFF, 0xFF, 0x03],
        }
    }
}

impl From<WellKnownCommunity> for Community {
    fn from(value: WellKnownCommunity) -> Self {
        let [a0, a1, o0, o1] = value.bytes();
        Community::new(u16::from_be_bytes([a0, a1]), u16::from_be_bytes([o0, o1]))
    }
}

impl BfnTree {
    /// Builds a detached list of communities from (asn, operation) pairs.
    pub fn new_community_list(&mut self, pairs: &[(u16, u16)]) -> Result<NodeId, BfnError> {
        let elements: Vec<NodeId> = pairs
            .iter()
            .map(|(asn, operation)| self.insert(NodeKind::Community(Community::new(*asn, *operation))))
            .collect();
        self.new_list(ElementKind::Community, elements)
    }

    /// Builds a detached COMMUNITIES attribute. The extended-length flag is set
    /// when the value is longer than 255 bytes.
    pub fn new_communities_attribute(&mut self, pairs: &[(u16, u16)]) -> Result<NodeId, BfnError> {
        let value = self.new_community_list(pairs)?;
        let extended = self.byte_len(value)? > MAX_SHORT_LENGTH;
        self.new_attribute(PathAttributeType::Communities, extended, value)
    }

    pub fn community(&self, id: NodeId) -> Result<Community, BfnError> {
        match self.kind(id)? {
            NodeKind::Community(community) => Ok(*community),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "community",
            }),
        }
    }

    fn update_community(
        &mut self,
        id: NodeId,
        update: impl FnOnce(&mut Community) -> Result<(), BfnError>,
    ) -> Result<(), BfnError> {
        self.set_leaf(id, |id, kind| match kind {
            NodeKind::Community(community) => update(community),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "community",
            }),
        })
    }

    pub fn set_community(&mut self, id: NodeId, asn: u16, operation: u16) -> Result<(), BfnError> {
        self.update_community(id, |community| {
            *community = Community::new(asn, operation);
            Ok(())
        })
    }

    pub fn set_community_asn(&mut self, id: NodeId, asn: u16) -> Result<(), BfnError> {
        self.update_community(id, |community| {
            community.asn = asn;
            Ok(())
        })
    }

    pub fn set_community_operation(&mut self, id: NodeId, operation: u16) -> Result<(), BfnError> {
        self.update_community(id, |community| {
            community.operation = operation;
            Ok(())
        })
    }

    pub fn set_well_known_community(
        &mut self,
        id: NodeId,
        well_known: WellKnownCommunity,
    ) -> Result<(), BfnError> {
        self.update_community(id, |community| {
            *community = well_known.into();
            Ok(())
        })
    }

    /// Sets a community from an arbitrary buffer, which must be 4 bytes long.
    pub fn set_community_bytes(&mut self, id: NodeId, bytes: &[u8]) -> Result<(), BfnError> {
        self.update_community(id, |community| {
            *community = Community::from_bytes(bytes)?;
            Ok(())
        })
    }
}

/// Parses a COMMUNITIES value into its entries.
pub fn decode_communities(value: &[u8]) -> Result<Vec<Community>, BfnError> {
    let chunks = value.chunks_exact(COMMUNITY_LEN);
    if !chunks.remainder().is_empty() {
        return Err(BfnError::InvalidWidth {
            expected: value.len() - chunks.remainder().len() + COMMUNITY_LEN,
            actual: value.len(),
        });
    }
    chunks.map(Community::from_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{EXTENDED_LEN, decode_attribute};
    use proptest::prelude::*;

    fn attached_communities(tree: &mut BfnTree, pairs: &[(u16, u16)]) -> NodeId {
        let attribute = tree.new_communities_attribute(pairs).unwrap();
        tree.attach(attribute).unwrap();
        attribute
    }

    fn first_community(tree: &BfnTree, attribute: NodeId) -> NodeId {
        let value = tree.attribute_parts(attribute).unwrap().value;
        tree.children(value).unwrap()[0]
    }

    #[test]
    fn no_export_sets_both_halves() {
        let mut tree = BfnTree::new();
        let attribute = attached_communities(&mut tree, &[(65001, 100)]);
        let entry = first_community(&tree, attribute);

        tree.set_well_known_community(entry, WellKnownCommunity::NoExport)
            .unwrap();
        let community = tree.community(entry).unwrap();
        assert_eq!(community.asn(), 0xFFFF);
        assert_eq!(community.operation(), 0xFF01);
        assert_eq!(tree.serialize(entry).unwrap(), vec![0xFF, 0xFF, 0xFF, 0x01]);
    }

    #[test]
    fn seventy_pairs_need_an_extended_length() {
        let mut tree = BfnTree::new();
        let pairs: Vec<(u16, u16)> = (0..70).map(|i| (65000, i)).collect();
        let attribute = attached_communities(&mut tree, &pairs);
        let bytes = tree.serialize(attribute).unwrap();

        assert_eq!(bytes[0] & EXTENDED_LEN, EXTENDED_LEN);
        assert_eq!(bytes[1], 8);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 280);
        assert_eq!(bytes.len(), 4 + 280);

        let (raw, _) = decode_attribute(&bytes).unwrap();
        let decoded = decode_communities(raw.value).unwrap();
        let round_trip: Vec<(u16, u16)> = decoded
            .iter()
            .map(|c| (c.asn(), c.operation()))
            .collect();
        assert_eq!(round_trip, pairs);
    }

    #[test]
    fn short_community_list_uses_one_byte_length() {
        let mut tree = BfnTree::new();
        let attribute = attached_communities(&mut tree, &[(1, 2), (3, 4)]);
        assert_eq!(
            tree.serialize(attribute).unwrap(),
            vec![0xC0, 8, 8, 0, 1, 0, 2, 0, 3, 0, 4]
        );
    }

    #[test]
    fn three_byte_buffer_is_rejected_without_side_effects() {
        let mut tree = BfnTree::new();
        let attribute = attached_communities(&mut tree, &[(65001, 100)]);
        let entry = first_community(&tree, attribute);
        let before = tree.serialize(attribute).unwrap();

        assert_eq!(
            tree.set_community_bytes(entry, &[1, 2, 3]),
            Err(BfnError::InvalidWidth {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(tree.community(entry).unwrap(), Community::new(65001, 100));
        assert_eq!(tree.serialize(attribute).unwrap(), before);

        tree.set_community_bytes(entry, &[0x12, 0x34, 0x56, 0x78])
            .unwrap();
        assert_eq!(tree.community(entry).unwrap(), Community::new(0x1234, 0x5678));
    }

    #[test]
    fn half_setters_touch_only_their_half() {
        let mut tree = BfnTree::new();
        let attribute = attached_communities(&mut tree, &[(1, 2)]);
        let entry = first_community(&tree, attribute);

        tree.set_community_asn(entry, 7).unwrap();
        assert_eq!(tree.community(entry).unwrap(), Community::new(7, 2));
        tree.set_community_operation(entry, 9).unwrap();
        assert_eq!(tree.community(entry).unwrap(), Community::new(7, 9));
        tree.set_community(entry, 10, 11).unwrap();
        assert_eq!(tree.serialize(entry).unwrap(), vec![0, 10, 0, 11]);
    }

    #[test]
    fn well_known_values_decompose() {
        let decoded: Vec<Community> = WellKnownCommunity::ALL
            .iter()
            .map(|wk| Community::from(*wk))
            .collect();
        assert_eq!(
            decoded,
            vec![
                Community::new(0xFFFF, 0xFF01),
                Community::new(0xFFFF, 0xFF02),
                Community::new(0xFFFF, 0xFF03)
            ]
        );
        assert!(decode_communities(&[0, 1, 2]).is_err());
    }

    proptest! {
        #[test]
        fn factory_output_decodes_to_its_pairs(
            pairs in prop::collection::vec(any::<(u16, u16)>(), 0..100),
        ) {
            let mut tree = BfnTree::new();
            let attribute = attached_communities(&mut tree, &pairs);
            let bytes = tree.serialize(attribute).unwrap();
            let (raw, consumed) = decode_attribute(&bytes).unwrap();

            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(raw.code, 8);
            prop_assert_eq!(raw.flags & EXTENDED_LEN != 0, pairs.len() * 4 > 255);
            let decoded: Vec<(u16, u16)> = decode_communities(raw.value)
                .unwrap()
                .iter()
                .map(|c| (c.asn(), c.operation()))
                .collect();
            prop_assert_eq!(decoded, pairs);
        }
    }
}
