use crate::node::{ElementKind, NodeId};
use thiserror::Error;

/// Errors raised by the field tree, its codecs and its factories.
///
/// All errors are raised synchronously where the violation happens. A setter
/// that fails leaves the tree exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BfnError {
    /// A numeric value does not fit the configured byte width.
    #[error("value {value} does not fit in {width} byte(s)")]
    OutOfRange { value: u64, width: usize },
    /// A fixed-width input had the wrong size.
    #[error("expected {expected} byte(s), got {actual}")]
    InvalidWidth { expected: usize, actual: usize },
    #[error("splice offset {offset} is past the end of a {len}-byte buffer")]
    SpliceOffset { offset: usize, len: usize },
    /// The extended-length flag disagrees with the length field's width.
    #[error("extended-length flag is {flag} but the length field is {width} byte(s) wide")]
    ExtendedLengthMismatch { flag: bool, width: usize },
    /// Factory input of an unsupported shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("list holds {expected:?} elements, got {actual:?}")]
    ElementKindMismatch {
        expected: ElementKind,
        actual: Option<ElementKind>,
    },
    #[error("no node with key {0}")]
    UnknownNode(NodeId),
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("node {0} already has an owner")]
    AlreadyOwned(NodeId),
    #[error("node {child} cannot be owned by {parent}")]
    InvalidOwner { parent: NodeId, child: NodeId },
    #[error("node {0} is detached; attach it before mutating")]
    Detached(NodeId),
    #[error("dependency from {dependent} on {dependency} would create a cycle")]
    DependencyCycle { dependent: NodeId, dependency: NodeId },
    #[error("node {0} has no applicable mutation")]
    NoMutation(NodeId),
    #[error("no attached node has an applicable mutation")]
    NothingToMutate,
    #[error("node {node} is not a {expected}")]
    WrongKind { node: NodeId, expected: &'static str },
}

impl BfnError {
    /// Whether a mutation driver may simply draw another mutation after this
    /// error, as opposed to the tree being misused.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BfnError::OutOfRange { .. }
                | BfnError::InvalidWidth { .. }
                | BfnError::ElementKindMismatch { .. }
                | BfnError::NoMutation(_)
        )
    }
}
