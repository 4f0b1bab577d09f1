pub mod as_path;
pub mod attribute;
pub mod catalog;
pub mod codec;
pub mod communities;
pub mod config;
pub mod error;
pub mod mutator;
pub mod node;
pub mod router;

pub use as_path::{AsPathOptions, AsPathSpec, Asn, AsnWidth, SegmentSpec, SegmentType};
pub use attribute::{AttrType, AttributeParts, PathAttributeType, RawAttribute, decode_attribute};
pub use catalog::{AppliedMutation, MutationOperator, MutationWeights, OperatorId};
pub use communities::{Community, WellKnownCommunity};
pub use config::FuzzConfig;
pub use error::BfnError;
pub use mutator::{Mutator, TreeMutator};
pub use node::{BfnTree, ElementKind, NodeId, NodeKind};
pub use router::{Campaign, CrashReport, RouterControl, RouterError, RouterSettings};
