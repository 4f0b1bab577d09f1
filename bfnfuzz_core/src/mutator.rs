use crate::catalog::AppliedMutation;
use crate::error::BfnError;
use crate::node::{BfnTree, NodeId};
use log::{debug, warn};
use rand::RngCore;

/// Mutations stacked onto the template per generated input, if not overridden.
pub const DEFAULT_MUTATIONS_PER_INPUT: usize = 1;
/// Rejected draws tolerated per mutation before giving up on it.
pub const DEFAULT_MAX_ATTEMPTS: usize = 16;

/// A `Mutator` produces the next wire payload to hand to the target.
///
/// # Type Parameters
/// * `R`: The type of random number generator used for mutation decisions.
pub trait Mutator<R: RngCore> {
    /// Generates one input.
    ///
    /// # Returns
    /// `Result<Vec<u8>, anyhow::Error>`:
    ///   - `Ok(bytes)`: The serialized, mutated message.
    ///   - `Err(error)`: The tree was misused; drawing again will not help.
    fn mutate(&mut self, rng: &mut R) -> Result<Vec<u8>, anyhow::Error>;
}

/// Structure-aware mutator over a field tree.
///
/// Every input starts from a fresh copy of the template, so nodes discarded
/// by list replacements never pile up across iterations. Rejected draws
/// (a value that does not fit, a zero-weight node) are re-rolled up to
/// `max_attempts` times.
#[derive(Debug, Clone)]
pub struct TreeMutator {
    template: BfnTree,
    root: NodeId,
    mutations_per_input: usize,
    max_attempts: usize,
    last_applied: Vec<AppliedMutation>,
}

impl TreeMutator {
    /// Creates a mutator over `root`, which must already be attached.
    pub fn new(template: BfnTree, root: NodeId) -> Result<Self, BfnError> {
        if !template.is_attached(root)? {
            return Err(BfnError::Detached(root));
        }
        Ok(Self {
            template,
            root,
            mutations_per_input: DEFAULT_MUTATIONS_PER_INPUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_applied: Vec::new(),
        })
    }

    pub fn with_mutations_per_input(mut self, mutations: usize) -> Self {
        self.mutations_per_input = mutations;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn template(&self) -> &BfnTree {
        &self.template
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The mutations that produced the most recent input.
    pub fn last_applied(&self) -> &[AppliedMutation] {
        &self.last_applied
    }

    /// Returns a mutated copy of the template.
    pub fn mutate_tree(&mut self, rng: &mut dyn RngCore) -> Result<BfnTree, BfnError> {
        let mut tree = self.template.clone();
        self.last_applied.clear();
        for _ in 0..self.mutations_per_input {
            if let Some(applied) = self.mutate_once(&mut tree, rng)? {
                self.last_applied.push(applied);
            }
        }
        Ok(tree)
    }

    fn mutate_once(
        &self,
        tree: &mut BfnTree,
        rng: &mut dyn RngCore,
    ) -> Result<Option<AppliedMutation>, BfnError> {
        for attempt in 1..=self.max_attempts {
            match tree.mutate_random(rng) {
                Ok(applied) => return Ok(Some(applied)),
                Err(e) if e.is_rejection() => {
                    debug!("attempt {attempt}/{} rejected: {e}", self.max_attempts);
                }
                Err(e) => return Err(e),
            }
        }
        warn!(
            "no mutation accepted after {} attempts, emitting input unchanged",
            self.max_attempts
        );
        Ok(None)
    }
}

impl<R: RngCore> Mutator<R> for TreeMutator {
    fn mutate(&mut self, rng: &mut R) -> Result<Vec<u8>, anyhow::Error> {
        let tree = self.mutate_tree(rng)?;
        Ok(tree.serialize(self.root)?)
    }
}
