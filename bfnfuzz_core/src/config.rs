use crate::as_path::{AsPathOptions, AsPathSpec, AsnWidth, SegmentSpec};
use crate::attribute::PathAttributeType;
use crate::catalog::MutationWeights;
use crate::mutator::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MUTATIONS_PER_INPUT, TreeMutator};
use crate::node::{BfnTree, NodeId};
use crate::router::RouterSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzerSettings {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_mutations_per_input")]
    pub mutations_per_input: usize,
}

pub fn default_iterations() -> u64 {
    1000
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_mutations_per_input() -> usize {
    DEFAULT_MUTATIONS_PER_INPUT
}

impl Default for FuzzerSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            iterations: default_iterations(),
            max_attempts: default_max_attempts(),
            mutations_per_input: default_mutations_per_input(),
        }
    }
}

/// The attribute every input is derived from.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct AttributeSettings {
    #[serde(default)]
    pub kind: PathAttributeType,
    #[serde(default)]
    pub asn_width: AsnWidth,
    #[serde(default = "default_partition_segments")]
    pub partition_segments: bool,
    /// Kept loosely typed so a malformed path is reported by the AS_PATH
    /// factory rather than as a generic parse failure.
    #[serde(default)]
    pub as_path: Option<toml::Value>,
    #[serde(default = "default_communities")]
    pub communities: Vec<(u16, u16)>,
}

fn default_partition_segments() -> bool {
    true
}

fn default_communities() -> Vec<(u16, u16)> {
    vec![(65001, 100)]
}

impl Default for AttributeSettings {
    fn default() -> Self {
        Self {
            kind: PathAttributeType::default(),
            asn_width: AsnWidth::default(),
            partition_segments: default_partition_segments(),
            as_path: None,
            communities: default_communities(),
        }
    }
}

impl AttributeSettings {
    pub fn as_path_spec(&self) -> Result<AsPathSpec, anyhow::Error> {
        match &self.as_path {
            Some(value) => Ok(AsPathSpec::from_value(value.clone())?),
            None => Ok(AsPathSpec::Segment(SegmentSpec::Sequence(vec![65001, 65002]))),
        }
    }

    pub fn as_path_options(&self) -> AsPathOptions {
        AsPathOptions {
            asn_width: self.asn_width,
            partition_segments: self.partition_segments,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Hex,
    Json,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
    pub directory: Option<PathBuf>,
    #[serde(default = "default_unique_only")]
    pub unique_only: bool,
}

fn default_unique_only() -> bool {
    true
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            directory: None,
            unique_only: default_unique_only(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzConfig {
    #[serde(default)]
    pub fuzzer: FuzzerSettings,
    #[serde(default)]
    pub attribute: AttributeSettings,
    #[serde(default)]
    pub weights: MutationWeights,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub router: Option<RouterSettings>,
}

impl FuzzConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Builds and attaches the configured attribute, returning the tree and
    /// the attribute's key.
    pub fn build_tree(&self) -> Result<(BfnTree, NodeId), anyhow::Error> {
        let mut tree = BfnTree::with_weights(self.weights.clone());
        let root = match self.attribute.kind {
            PathAttributeType::AsPath => {
                let spec = self.attribute.as_path_spec()?;
                tree.new_as_path_attribute(&spec, &self.attribute.as_path_options())?
            }
            PathAttributeType::Communities => {
                tree.new_communities_attribute(&self.attribute.communities)?
            }
        };
        tree.attach(root)?;
        Ok((tree, root))
    }

    pub fn build_mutator(&self) -> Result<TreeMutator, anyhow::Error> {
        let (tree, root) = self.build_tree()?;
        Ok(TreeMutator::new(tree, root)?
            .with_mutations_per_input(self.fuzzer.mutations_per_input)
            .with_max_attempts(self.fuzzer.max_attempts))
    }
}
